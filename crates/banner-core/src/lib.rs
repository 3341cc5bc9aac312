//! `banner-core` is the pure evaluation pipeline of the Banner feature-flag
//! service. It turns a self-contained flag snapshot plus a subject context
//! into a deterministic decision.
//!
//! Nothing in this crate performs I/O: the snapshot carries everything the
//! evaluator needs (variants, rules, resolved segments), which is what makes
//! decisions reproducible across processes and safe to compute concurrently.

pub mod context;
pub mod evaluator;
pub mod hasher;
pub mod operators;
pub mod rule;
pub mod segment;
pub mod snapshot;
pub mod variant;

pub use context::{Context, Value};
pub use evaluator::{evaluate, Decision, Reason};
pub use hasher::bucket;
pub use operators::Operator;
pub use snapshot::{
    FlagKind, FlagSnapshot, MatchType, OverlaySnapshot, RuleKind, RuleSnapshot, SegmentRuleSnapshot,
    SegmentSnapshot, VariantSnapshot,
};
