//! Versioned quiz items.
//!
//! Every state transition bumps `version` by exactly one and appends exactly
//! one revision row, in one IMMEDIATE transaction with a compare-and-swap on
//! the version it read. `UNIQUE(item_id, version)` on the revision table backs
//! this up at the store level.

pub mod engine;
pub mod types;

pub use types::{ItemDraft, ItemEdit, ItemStatus, QuizItem, QuizItemRevision, RevisionAction};

pub use engine::{
    create_item, edit_item, get_item, item_history, items_by_ids, publish_item, published_items,
    unpublish_item,
};
