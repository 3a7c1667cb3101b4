//! Course catalog: courses and their ordered modules.
//!
//! Module orders within a course must be exactly `1..=N`. The schema rejects
//! duplicates; [`validate_module_orders`] rejects gaps, so a broken catalog
//! surfaces as `DataIntegrity` instead of skewing progress maths.

pub mod engine;
pub mod types;

pub use types::{find_module, Course, Module, NewModule};

pub use engine::{
    add_module, course_by_id, course_by_slug, course_modules, create_course, module_by_key,
    validate_module_orders,
};
