use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use stammbaum_store::Record;

use crate::error::FilterError;
use crate::filter::{Filter, Operator};
use crate::rule::Rule;

// ─────────────────────────────────────────────
// Definition values
// ─────────────────────────────────────────────

/// Persisted form of one rule: the class name plus the parameter triple.
///
/// A rule built from a definition re-emits the identical definition, so
/// filter collections survive a round trip through any serde format without
/// loss. The storage format itself lives with the authoring tooling, not
/// here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleDef {
    pub class: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub use_regex: bool,
    #[serde(default)]
    pub use_case: bool,
}

impl RuleDef {
    pub fn new(class: impl Into<String>, args: Vec<String>) -> Self {
        Self { class: class.into(), args, use_regex: false, use_case: false }
    }
}

/// Persisted form of one filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterDef {
    pub name: String,
    #[serde(default)]
    pub comment: String,
    pub op: Operator,
    #[serde(default)]
    pub invert: bool,
    #[serde(default)]
    pub rules: Vec<RuleDef>,
}

// ─────────────────────────────────────────────
// RuleCatalog
// ─────────────────────────────────────────────

type RuleBuilder<R> = fn(&RuleDef) -> Result<Box<dyn Rule<R>>, FilterError>;

/// Class-name → constructor table for one category's known rules.
///
/// The catalog is how definitions come back to life: look the class up,
/// validate the arguments, build the typed rule.
pub struct RuleCatalog<R: Record> {
    builders: HashMap<&'static str, RuleBuilder<R>>,
}

impl<R: Record> Default for RuleCatalog<R> {
    fn default() -> Self {
        Self { builders: HashMap::new() }
    }
}

impl<R: Record> RuleCatalog<R> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, class: &'static str, builder: RuleBuilder<R>) {
        self.builders.insert(class, builder);
    }

    pub fn contains(&self, class: &str) -> bool {
        self.builders.contains_key(class)
    }

    pub fn classes(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.builders.keys().copied()
    }

    pub fn build_rule(&self, def: &RuleDef) -> Result<Box<dyn Rule<R>>, FilterError> {
        let builder = self
            .builders
            .get(def.class.as_str())
            .ok_or_else(|| FilterError::UnknownRule(def.class.clone()))?;
        builder(def)
    }

    pub fn build_filter(&self, def: &FilterDef) -> Result<Filter<R>, FilterError> {
        let mut filter = Filter::new(&def.name);
        filter.set_comment(&def.comment);
        filter.set_operator(def.op);
        filter.set_invert(def.invert);
        for rule_def in &def.rules {
            filter.add_rule(self.build_rule(rule_def)?);
        }
        Ok(filter)
    }
}

impl<R: Record> std::fmt::Debug for RuleCatalog<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleCatalog")
            .field("classes", &self.builders.keys().collect::<Vec<_>>())
            .finish()
    }
}

// ─────────────────────────────────────────────
// Emission
// ─────────────────────────────────────────────

impl<R: Record> Filter<R> {
    /// Re-emit the persisted form of this filter.
    pub fn to_def(&self) -> FilterDef {
        FilterDef {
            name: self.name().to_string(),
            comment: self.comment().to_string(),
            op: self.operator(),
            invert: self.invert(),
            rules: self.rules().iter().map(|r| rule_to_def(r.as_ref())).collect(),
        }
    }
}

/// Re-emit the persisted form of one rule.
pub fn rule_to_def<R: Record>(rule: &dyn Rule<R>) -> RuleDef {
    RuleDef {
        class: rule.name().to_string(),
        args: rule.args().to_vec(),
        use_regex: rule.use_regex(),
        use_case: rule.use_case(),
    }
}

/// Argument-count check shared by the concrete rule constructors.
pub(crate) fn expect_args(def: &RuleDef, expected: usize) -> Result<(), FilterError> {
    if def.args.len() != expected {
        return Err(FilterError::RuleArity {
            rule: def.class.clone(),
            expected,
            got: def.args.len(),
        });
    }
    Ok(())
}
