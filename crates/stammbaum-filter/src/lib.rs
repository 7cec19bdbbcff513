//! # stammbaum-filter
//!
//! Predicate-based record filtering for the Stammbaum store.
//!
//! A [`Filter`] is a named, ordered collection of [`rule::Rule`]s combined
//! with a logical operator (AND / OR / EXACTLY-ONE) and an inversion flag
//! applied to the combined result. Applying a filter selects the handles of
//! the records that satisfy the composite predicate, over one of four
//! candidate universes: the full category, the category in hierarchy order,
//! an explicit handle list, or rows carrying a handle column — each with
//! its own output-ordering contract.
//!
//! Before scanning, the [`optimizer`] turns rule hints into conservative
//! include/exclude handle sets, so candidates that cannot change the result
//! are skipped without a record fetch or a rule call. Pruning never changes
//! what an application returns.
//!
//! ```ignore
//! use stammbaum_filter::{Filter, FilterRegistry, PrepareContext};
//! use stammbaum_filter::rules::{HasNameOf, IsFemale};
//!
//! let mut filter = Filter::new("women named Weber");
//! filter.add_rule(Box::new(IsFemale::new()));
//! filter.add_rule(Box::new(HasNameOf::new("", "Weber")));
//!
//! let registry = FilterRegistry::new();
//! let ctx = PrepareContext::new(&store, &registry);
//! let matches = filter.apply(&ctx, None)?;
//! ```

pub mod defs;
pub mod error;
pub mod filter;
pub mod optimizer;
pub mod progress;
pub mod registry;
pub mod rule;
pub mod rules;

pub use defs::{rule_to_def, FilterDef, RuleCatalog, RuleDef};
pub use error::FilterError;
pub use filter::{Filter, Operator};
pub use optimizer::Pruning;
pub use progress::{CountingProgress, NullProgress, ProgressSink};
pub use registry::FilterRegistry;
pub use rule::{Hint, PrepareContext, Rule, RuleParams};
