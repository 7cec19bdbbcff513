use std::collections::HashSet;

use tracing::{debug, trace};

use stammbaum_store::{Handle, Record};

use crate::error::FilterError;
use crate::filter::{Filter, Operator};
use crate::registry::FilterRegistry;
use crate::rule::Hint;

// ─────────────────────────────────────────────
// Pruning
// ─────────────────────────────────────────────

/// Conservative pre-scan candidate pruning.
///
/// `include`: only these handles can possibly match — everything else is
/// skipped without a record fetch or a rule call. `exclude`: these handles
/// cannot match. Either side absent means "no constraint". Pruning never
/// changes what an application returns, only which candidates it evaluates.
#[derive(Debug, Clone, Default)]
pub struct Pruning {
    pub include: Option<HashSet<Handle>>,
    pub exclude: Option<HashSet<Handle>>,
}

impl Pruning {
    /// No constraint in either direction.
    pub fn none() -> Self {
        Self::default()
    }

    /// True when the candidate must still be evaluated.
    pub fn admits(&self, handle: Handle) -> bool {
        if let Some(include) = &self.include {
            if !include.contains(&handle) {
                return false;
            }
        }
        if let Some(exclude) = &self.exclude {
            if exclude.contains(&handle) {
                return false;
            }
        }
        true
    }

    pub fn is_unconstrained(&self) -> bool {
        self.include.is_none() && self.exclude.is_none()
    }

    /// Fold another contribution in: inclusions intersect (a candidate
    /// must be admissible by every contributor to survive an AND),
    /// exclusions unite (a candidate any contributor rules out is gone).
    fn merge(&mut self, other: Pruning) {
        self.include = match (self.include.take(), other.include) {
            (Some(a), Some(b)) => Some(&a & &b),
            (Some(a), None) => Some(a),
            (None, b) => b,
        };
        self.exclude = match (self.exclude.take(), other.exclude) {
            (Some(a), Some(b)) => Some(&a | &b),
            (Some(a), None) => Some(a),
            (None, b) => b,
        };
    }

    /// Inverting a filter inverts membership, which swaps which side is
    /// safe to skip.
    fn invert(&mut self) {
        std::mem::swap(&mut self.include, &mut self.exclude);
    }
}

// ─────────────────────────────────────────────
// compute
// ─────────────────────────────────────────────

/// Compute pruning sets for `filter` from its rules' hints, without
/// invoking any per-record predicate.
///
/// Only AND composites and single-rule filters are pruned (the three
/// operators coincide for one rule). Under OR or EXACTLY-ONE with several
/// rules, one rule's exclusion says nothing about the composite, so the
/// optimizer deliberately contributes nothing — that restriction is a
/// soundness boundary, not a missing feature.
///
/// Nested filter references resolve through `registry`; a name that is
/// absent contributes nothing (the scan falls back to full evaluation for
/// that branch), while a reference cycle is a configuration error.
pub fn compute<R: Record>(
    filter: &Filter<R>,
    registry: &FilterRegistry<R>,
) -> Result<Pruning, FilterError> {
    let mut resolving: HashSet<String> = HashSet::new();
    let pruning = compute_guarded(filter, registry, &mut resolving)?;
    if !pruning.is_unconstrained() {
        debug!(
            filter = %filter.name(),
            include = pruning.include.as_ref().map(HashSet::len),
            exclude = pruning.exclude.as_ref().map(HashSet::len),
            "candidate pruning computed"
        );
    }
    Ok(pruning)
}

fn compute_guarded<R: Record>(
    filter: &Filter<R>,
    registry: &FilterRegistry<R>,
    resolving: &mut HashSet<String>,
) -> Result<Pruning, FilterError> {
    if filter.rules().is_empty() {
        return Ok(Pruning::none());
    }
    if filter.operator() != Operator::And && filter.rules().len() > 1 {
        return Ok(Pruning::none());
    }

    let mut pruning = Pruning::none();
    for rule in filter.rules() {
        match rule.hint() {
            Hint::None => {}
            Hint::Selected(set) => {
                trace!(rule = rule.name(), selected = set.len(), "selected-handle hint");
                pruning.merge(Pruning { include: Some(set), exclude: None });
            }
            Hint::Filter(name) => {
                let Some(nested) = registry.get(&name) else {
                    debug!(filter = %name, "referenced filter not in registry, no contribution");
                    continue;
                };
                if !resolving.insert(name.clone()) {
                    return Err(FilterError::CyclicFilter(name));
                }
                let nested_pruning = {
                    let guard = nested
                        .try_borrow()
                        .map_err(|_| FilterError::CyclicFilter(name.clone()))?;
                    compute_guarded(&guard, registry, resolving)?
                };
                resolving.remove(&name);
                pruning.merge(nested_pruning);
            }
        }
    }

    if filter.invert() {
        pruning.invert();
    }
    Ok(pruning)
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use stammbaum_store::Person;

    use crate::rule::{Rule, RuleParams};

    use super::*;

    /// Stub exposing a fixed hint; never actually evaluated here.
    #[derive(Debug)]
    struct Hinted {
        params: RuleParams,
        hint: Hint,
    }

    impl Hinted {
        fn selected(handles: &[Handle]) -> Self {
            Self {
                params: RuleParams::default(),
                hint: Hint::Selected(handles.iter().copied().collect()),
            }
        }

        fn nested(name: &str) -> Self {
            Self { params: RuleParams::default(), hint: Hint::Filter(name.to_string()) }
        }

        fn opaque() -> Self {
            Self { params: RuleParams::default(), hint: Hint::None }
        }
    }

    impl Rule<Person> for Hinted {
        fn name(&self) -> &'static str {
            "Hinted"
        }

        fn params(&self) -> &RuleParams {
            &self.params
        }

        fn matches(&self, _store: &stammbaum_store::Store, _record: &Person) -> bool {
            unreachable!("the optimizer must never evaluate a predicate")
        }

        fn hint(&self) -> Hint {
            self.hint.clone()
        }
    }

    fn handles(n: usize) -> Vec<Handle> {
        (0..n).map(|_| Handle::new()).collect()
    }

    #[test]
    fn admits_honors_both_sides() {
        let hs = handles(3);
        let pruning = Pruning {
            include: Some([hs[0], hs[1]].into_iter().collect()),
            exclude: Some([hs[1]].into_iter().collect()),
        };
        assert!(pruning.admits(hs[0]));
        assert!(!pruning.admits(hs[1]), "excluded wins over included");
        assert!(!pruning.admits(hs[2]));
        assert!(Pruning::none().admits(hs[2]));
    }

    #[test]
    fn empty_filter_is_unconstrained() {
        let filter: Filter<Person> = Filter::new("f");
        let registry = FilterRegistry::new();
        assert!(compute(&filter, &registry).unwrap().is_unconstrained());
    }

    #[test]
    fn and_intersects_selected_sets() {
        let hs = handles(3);
        let mut filter: Filter<Person> = Filter::new("f");
        filter.add_rule(Box::new(Hinted::selected(&[hs[0], hs[1]])));
        filter.add_rule(Box::new(Hinted::selected(&[hs[1], hs[2]])));
        filter.add_rule(Box::new(Hinted::opaque()));

        let registry = FilterRegistry::new();
        let pruning = compute(&filter, &registry).unwrap();
        let include = pruning.include.unwrap();
        assert_eq!(include.len(), 1);
        assert!(include.contains(&hs[1]));
        assert!(pruning.exclude.is_none());
    }

    #[test]
    fn invert_swaps_the_sides() {
        let hs = handles(2);
        let mut filter: Filter<Person> = Filter::new("f");
        filter.set_invert(true);
        filter.add_rule(Box::new(Hinted::selected(&hs)));

        let registry = FilterRegistry::new();
        let pruning = compute(&filter, &registry).unwrap();
        assert!(pruning.include.is_none());
        assert_eq!(pruning.exclude.unwrap().len(), 2);
    }

    #[test]
    fn multi_rule_or_contributes_nothing() {
        let hs = handles(2);
        for op in [crate::filter::Operator::Or, crate::filter::Operator::One] {
            let mut filter: Filter<Person> = Filter::new("f");
            filter.set_operator(op);
            filter.add_rule(Box::new(Hinted::selected(&[hs[0]])));
            filter.add_rule(Box::new(Hinted::selected(&[hs[1]])));

            let registry = FilterRegistry::new();
            assert!(compute(&filter, &registry).unwrap().is_unconstrained());
        }
    }

    #[test]
    fn single_rule_is_pruned_under_any_operator() {
        let hs = handles(1);
        for op in [
            crate::filter::Operator::And,
            crate::filter::Operator::Or,
            crate::filter::Operator::One,
        ] {
            let mut filter: Filter<Person> = Filter::new("f");
            filter.set_operator(op);
            filter.add_rule(Box::new(Hinted::selected(&hs)));

            let registry = FilterRegistry::new();
            let pruning = compute(&filter, &registry).unwrap();
            assert_eq!(pruning.include.unwrap().len(), 1);
        }
    }

    #[test]
    fn nested_reference_contributes_recursively() {
        let hs = handles(2);
        let mut registry = FilterRegistry::new();
        let mut nested: Filter<Person> = Filter::new("nested");
        nested.add_rule(Box::new(Hinted::selected(&hs)));
        registry.insert(nested);

        let mut filter: Filter<Person> = Filter::new("outer");
        filter.add_rule(Box::new(Hinted::nested("nested")));

        let pruning = compute(&filter, &registry).unwrap();
        assert_eq!(pruning.include.unwrap().len(), 2);
    }

    #[test]
    fn unknown_nested_reference_is_benign() {
        let mut filter: Filter<Person> = Filter::new("outer");
        filter.add_rule(Box::new(Hinted::nested("missing")));

        let registry = FilterRegistry::new();
        assert!(compute(&filter, &registry).unwrap().is_unconstrained());
    }

    #[test]
    fn reference_cycle_is_an_error() {
        let mut registry = FilterRegistry::new();

        let mut a: Filter<Person> = Filter::new("a");
        a.add_rule(Box::new(Hinted::nested("b")));
        registry.insert(a);

        let mut b: Filter<Person> = Filter::new("b");
        b.add_rule(Box::new(Hinted::nested("a")));
        registry.insert(b);

        let mut outer: Filter<Person> = Filter::new("outer");
        outer.add_rule(Box::new(Hinted::nested("a")));

        let err = compute(&outer, &registry).unwrap_err();
        assert!(matches!(err, FilterError::CyclicFilter(_)));
    }

    #[test]
    fn diamond_references_are_not_cycles() {
        let hs = handles(1);
        let mut registry = FilterRegistry::new();

        let mut shared: Filter<Person> = Filter::new("shared");
        shared.add_rule(Box::new(Hinted::selected(&hs)));
        registry.insert(shared);

        let mut left: Filter<Person> = Filter::new("left");
        left.add_rule(Box::new(Hinted::nested("shared")));
        registry.insert(left);

        let mut right: Filter<Person> = Filter::new("right");
        right.add_rule(Box::new(Hinted::nested("shared")));
        registry.insert(right);

        let mut outer: Filter<Person> = Filter::new("outer");
        outer.add_rule(Box::new(Hinted::nested("left")));
        outer.add_rule(Box::new(Hinted::nested("right")));

        let pruning = compute(&outer, &registry).unwrap();
        assert_eq!(pruning.include.unwrap().len(), 1);
    }
}
