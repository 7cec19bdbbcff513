use thiserror::Error;

use stammbaum_store::StoreError;

/// Structured filter-engine error types.
#[derive(Debug, Error)]
pub enum FilterError {
    // ── Configuration errors ──────────────────────────────

    #[error("unknown logical operator '{0}' — expected one of: and, or, one")]
    UnknownOperator(String),

    #[error("unknown rule class '{0}'")]
    UnknownRule(String),

    #[error("rule '{rule}' expects {expected} argument(s), got {got}")]
    RuleArity { rule: String, expected: usize, got: usize },

    #[error("rule '{rule}': bad argument '{value}': {reason}")]
    RuleArgument {
        rule: &'static str,
        value: String,
        reason: String,
    },

    #[error("cyclic filter reference: '{0}'")]
    CyclicFilter(String),

    // ── Rule lifecycle errors ─────────────────────────────

    #[error("invalid pattern: {0}")]
    Pattern(#[from] regex::Error),

    // ── Store errors ──────────────────────────────────────

    #[error(transparent)]
    Store(#[from] StoreError),
}
