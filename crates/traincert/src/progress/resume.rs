//! Resume-order strategies, tried in sequence until one answers.

use std::collections::HashSet;

use super::types::{ResumeDecision, ResumeState, ResumeTier};

/// Everything a strategy may look at.
#[derive(Debug, Clone, Default)]
pub struct ResumeContext {
    pub stored: Option<ResumeState>,
    /// Module orders of the course, ascending.
    pub module_orders: Vec<u32>,
    /// Orders of modules with at least one passed quiz attempt.
    pub passed_orders: HashSet<u32>,
}

impl ResumeContext {
    pub fn max_order(&self) -> u32 {
        self.module_orders.iter().copied().max().unwrap_or(1).max(1)
    }
}

/// One tier of the resume fallback chain.
pub trait ResumeStrategy: Send + Sync {
    fn tier(&self) -> ResumeTier;
    fn resolve(&self, ctx: &ResumeContext) -> Option<u32>;
}

/// Tier 1: a positive stored pointer.
pub struct StoredPointer;

impl ResumeStrategy for StoredPointer {
    fn tier(&self) -> ResumeTier {
        ResumeTier::StoredPointer
    }

    fn resolve(&self, ctx: &ResumeContext) -> Option<u32> {
        let order = ctx.stored.as_ref()?.order?;
        if order > 0 {
            Some(u32::try_from(order).unwrap_or(u32::MAX))
        } else {
            None
        }
    }
}

/// Tier 2: first module without a passed quiz, else the last module.
pub struct FirstUnpassedQuiz;

impl ResumeStrategy for FirstUnpassedQuiz {
    fn tier(&self) -> ResumeTier {
        ResumeTier::FirstUnpassedQuiz
    }

    fn resolve(&self, ctx: &ResumeContext) -> Option<u32> {
        if ctx.module_orders.is_empty() {
            return None;
        }
        ctx.module_orders
            .iter()
            .copied()
            .find(|o| !ctx.passed_orders.contains(o))
            .or(Some(ctx.max_order()))
    }
}

/// Tier 3: module 1.
pub struct DefaultFirst;

impl ResumeStrategy for DefaultFirst {
    fn tier(&self) -> ResumeTier {
        ResumeTier::DefaultFirst
    }

    fn resolve(&self, _ctx: &ResumeContext) -> Option<u32> {
        Some(1)
    }
}

/// Production chain.
pub static DEFAULT_STRATEGIES: [&dyn ResumeStrategy; 3] =
    [&StoredPointer, &FirstUnpassedQuiz, &DefaultFirst];

/// Evaluate `strategies` in order; the first answer wins and is clamped to
/// `1..=max_order`.
pub fn resolve_with(strategies: &[&dyn ResumeStrategy], ctx: &ResumeContext) -> ResumeDecision {
    let max = ctx.max_order();
    for strategy in strategies {
        if let Some(order) = strategy.resolve(ctx) {
            return ResumeDecision {
                order: order.clamp(1, max),
                tier: strategy.tier(),
            };
        }
    }
    ResumeDecision {
        order: 1,
        tier: ResumeTier::DefaultFirst,
    }
}
