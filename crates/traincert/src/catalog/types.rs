//! Catalog data structures.

use serde::{Deserialize, Serialize};

use crate::ids::{CourseId, ModuleId};

/// A course learners enrol in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Course {
    pub id: CourseId,
    pub slug: String,
    pub title: String,
    pub created_at: String,
}

/// One instructional module. `order` is 1-based and contiguous per course.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Module {
    pub id: ModuleId,
    pub course_id: CourseId,
    pub order: u32,
    /// Legacy gate bookkeeping key, e.g. `"m3-lockout"`.
    pub module_key: Option<String>,
    pub title: String,
    pub content_ref: String,
    /// Whether the module carries an instructional demo that counts toward
    /// certificate eligibility.
    pub demo: bool,
}

impl Module {
    /// Whether `key` is this module's legacy key or id.
    pub fn is_named(&self, key: &str) -> bool {
        self.module_key.as_deref() == Some(key) || self.id.0 == key
    }
}

/// Find a module by key or id, falling back to its order number.
pub fn find_module<'a>(modules: &'a [Module], key: &str) -> Option<&'a Module> {
    modules.iter().find(|m| m.is_named(key)).or_else(|| {
        let order = key.parse::<u32>().ok()?;
        modules.iter().find(|m| m.order == order)
    })
}

/// Input for [`crate::catalog::add_module`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewModule {
    pub order: u32,
    pub module_key: Option<String>,
    pub title: String,
    pub content_ref: String,
    #[serde(default = "default_demo")]
    pub demo: bool,
}

fn default_demo() -> bool {
    true
}

impl NewModule {
    /// A demo-bearing module with no legacy key.
    pub fn new(order: u32, title: impl Into<String>, content_ref: impl Into<String>) -> Self {
        Self {
            order,
            module_key: None,
            title: title.into(),
            content_ref: content_ref.into(),
            demo: true,
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.module_key = Some(key.into());
        self
    }

    pub fn without_demo(mut self) -> Self {
        self.demo = false;
        self
    }
}
