//! Identifier newtypes.
//!
//! Row ids are `{prefix}_` + base58 of 16 random bytes (see
//! [`crate::crypto::random::new_id`]).

use serde::{Deserialize, Serialize};

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub const PREFIX: &'static str = $prefix;

            /// Fresh random identifier.
            pub fn generate() -> Self {
                Self(crate::crypto::random::new_id($prefix))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }
    };
}

string_id!(
    /// A course.
    CourseId, "crs"
);
string_id!(
    /// A module within a course.
    ModuleId, "mod"
);
string_id!(
    /// A (learner, course) enrollment.
    EnrollmentId, "enr"
);
string_id!(
    /// A quiz item.
    ItemId, "itm"
);
string_id!(
    /// A persisted exam paper.
    PaperId, "ppr"
);
string_id!(
    /// An exam session; this is the `exam_id` handed to learners.
    ExamId, "exm"
);
string_id!(
    /// An issued certificate.
    CertificateId, "cert"
);
