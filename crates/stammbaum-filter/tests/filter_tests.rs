//! Integration tests for stammbaum-filter.
//!
//! These exercise the full pipeline: build an in-memory store with a small
//! family tree, compose filters, and assert over result sets, orderings,
//! and how many predicate evaluations the optimizer saves.

use std::cell::Cell;
use std::collections::HashSet;
use std::rc::Rc;

use stammbaum_filter::rules::{
    ChangedSince, HasNameOf, IsDescendantOf, IsEnclosedBy, IsFemale, MatchesFilter,
    person_catalog,
};
use stammbaum_filter::{
    CountingProgress, Filter, FilterDef, FilterError, FilterRegistry, Hint, Operator,
    PrepareContext, Rule, RuleDef, RuleParams,
};
use stammbaum_store::{Family, Gender, Handle, Name, Person, Place, Store};

// ─────────────────────────────────────────────
// Fixture
// ─────────────────────────────────────────────

/// Three generations around Anna Stein:
///
/// ```text
/// Anna (I0001, f) ⚭ Bruno (I0002, m)          Erika Vogel (I0006, f)
///   ├── Clara (I0003, f) ⚭ Franz (I0005, m)
///   │     └── Greta (I0007, f)
///   └── Dieter (I0004, m)
/// ```
struct TreeFixture {
    store: Store,
    anna: Handle,
    bruno: Handle,
    clara: Handle,
    dieter: Handle,
    erika: Handle,
    greta: Handle,
}

fn person(id: &str, given: &str, surname: &str, gender: Gender) -> Person {
    Person::new(id, Name::new(given, surname), gender)
}

fn tree_fixture() -> TreeFixture {
    let mut anna = person("I0001", "Anna", "Stein", Gender::Female);
    let mut bruno = person("I0002", "Bruno", "Stein", Gender::Male);
    let mut clara = person("I0003", "Clara", "Stein", Gender::Female);
    let dieter = person("I0004", "Dieter", "Stein", Gender::Male);
    let mut franz = person("I0005", "Franz", "Huber", Gender::Male);
    let erika = person("I0006", "Erika", "Vogel", Gender::Female);
    let greta = person("I0007", "Greta", "Huber", Gender::Female);

    let mut parents = Family::new("F0001");
    parents.father = Some(bruno.handle);
    parents.mother = Some(anna.handle);
    parents.children = vec![clara.handle, dieter.handle];

    let mut second = Family::new("F0002");
    second.father = Some(franz.handle);
    second.mother = Some(clara.handle);
    second.children = vec![greta.handle];

    anna.families.push(parents.handle);
    bruno.families.push(parents.handle);
    clara.families.push(second.handle);
    franz.families.push(second.handle);

    let (anna_h, bruno_h, clara_h, dieter_h, erika_h, greta_h) = (
        anna.handle,
        bruno.handle,
        clara.handle,
        dieter.handle,
        erika.handle,
        greta.handle,
    );

    let mut store = Store::new();
    for p in [anna, bruno, clara, dieter, franz, erika, greta] {
        store.add_person(p);
    }
    store.add_family(parents);
    store.add_family(second);

    TreeFixture {
        store,
        anna: anna_h,
        bruno: bruno_h,
        clara: clara_h,
        dieter: dieter_h,
        erika: erika_h,
        greta: greta_h,
    }
}

fn as_set(handles: &[Handle]) -> HashSet<Handle> {
    handles.iter().copied().collect()
}

// ─────────────────────────────────────────────
// Test rules
// ─────────────────────────────────────────────

/// Matches a fixed handle set; counts predicate invocations and optionally
/// exposes the set as a hint.
#[derive(Debug)]
struct SelectedStub {
    params: RuleParams,
    set: HashSet<Handle>,
    calls: Rc<Cell<usize>>,
    expose_hint: bool,
}

impl SelectedStub {
    fn new(handles: &[Handle], expose_hint: bool) -> (Self, Rc<Cell<usize>>) {
        let calls = Rc::new(Cell::new(0));
        let stub = Self {
            params: RuleParams::default(),
            set: handles.iter().copied().collect(),
            calls: Rc::clone(&calls),
            expose_hint,
        };
        (stub, calls)
    }
}

impl Rule<Person> for SelectedStub {
    fn name(&self) -> &'static str {
        "SelectedStub"
    }

    fn params(&self) -> &RuleParams {
        &self.params
    }

    fn matches(&self, _store: &Store, record: &Person) -> bool {
        self.calls.set(self.calls.get() + 1);
        self.set.contains(&record.handle)
    }

    fn hint(&self) -> Hint {
        if self.expose_hint {
            Hint::Selected(self.set.clone())
        } else {
            Hint::None
        }
    }
}

/// Counts lifecycle calls; matches everything.
#[derive(Debug)]
struct LifecycleSpy {
    params: RuleParams,
    prepares: Rc<Cell<usize>>,
    resets: Rc<Cell<usize>>,
}

impl LifecycleSpy {
    fn new() -> (Self, Rc<Cell<usize>>, Rc<Cell<usize>>) {
        let prepares = Rc::new(Cell::new(0));
        let resets = Rc::new(Cell::new(0));
        let spy = Self {
            params: RuleParams::default(),
            prepares: Rc::clone(&prepares),
            resets: Rc::clone(&resets),
        };
        (spy, prepares, resets)
    }
}

impl Rule<Person> for LifecycleSpy {
    fn name(&self) -> &'static str {
        "LifecycleSpy"
    }

    fn params(&self) -> &RuleParams {
        &self.params
    }

    fn prepare(&mut self, _ctx: &PrepareContext<'_, Person>) -> Result<(), FilterError> {
        self.prepares.set(self.prepares.get() + 1);
        Ok(())
    }

    fn matches(&self, _store: &Store, _record: &Person) -> bool {
        true
    }

    fn reset(&mut self) {
        self.resets.set(self.resets.get() + 1);
    }
}

// ─────────────────────────────────────────────
// Composition scenarios
// ─────────────────────────────────────────────

#[test]
fn and_over_subset_and_its_inversion() {
    let fx = tree_fixture();
    let registry = FilterRegistry::new();
    let ctx = PrepareContext::new(&fx.store, &registry);
    let universe = [fx.anna, fx.bruno, fx.erika];

    // Single rule matching {anna, bruno} out of a three-handle universe.
    let mut filter = Filter::new("steins");
    filter.add_rule(Box::new(HasNameOf::new("", "Stein")));
    let matched = filter.apply_to_handles(&ctx, &universe, None).unwrap();
    assert_eq!(as_set(&matched), as_set(&[fx.anna, fx.bruno]));

    filter.set_invert(true);
    let matched = filter.apply_to_handles(&ctx, &universe, None).unwrap();
    assert_eq!(matched, vec![fx.erika]);
}

#[test]
fn exactly_one_disqualifies_double_matches() {
    let fx = tree_fixture();
    let registry = FilterRegistry::new();
    let ctx = PrepareContext::new(&fx.store, &registry);
    let universe = [fx.anna, fx.clara, fx.dieter];

    // Rule 1 matches {anna, clara}; rule 2 matches {clara, dieter}.
    // Clara matches both, so EXACTLY-ONE keeps only anna and dieter.
    let (rule1, _) = SelectedStub::new(&[fx.anna, fx.clara], false);
    let (rule2, _) = SelectedStub::new(&[fx.clara, fx.dieter], false);
    let mut filter = Filter::new("one-of");
    filter.set_operator(Operator::One);
    filter.add_rule(Box::new(rule1));
    filter.add_rule(Box::new(rule2));

    let matched = filter.apply_to_handles(&ctx, &universe, None).unwrap();
    assert_eq!(as_set(&matched), as_set(&[fx.anna, fx.dieter]));
}

#[test]
fn zero_rules_return_the_entire_universe_in_every_mode() {
    let fx = tree_fixture();
    let registry = FilterRegistry::new();
    let ctx = PrepareContext::new(&fx.store, &registry);

    let mut filter: Filter<Person> = Filter::new("empty");
    assert!(filter.is_empty());

    let all = filter.apply(&ctx, None).unwrap();
    assert_eq!(as_set(&all), as_set(&fx.store.people().handles()));

    let subset = [fx.clara, fx.erika];
    assert_eq!(filter.apply_to_handles(&ctx, &subset, None).unwrap(), subset.to_vec());

    let rows = vec![("x", fx.anna), ("y", fx.bruno)];
    let kept = filter.apply_to_rows(&ctx, &rows, |r| r.1, None).unwrap();
    assert_eq!(kept, rows);
}

// ─────────────────────────────────────────────
// Ordering contracts
// ─────────────────────────────────────────────

#[test]
fn handle_list_output_preserves_input_order_and_duplicates() {
    let fx = tree_fixture();
    let registry = FilterRegistry::new();
    let ctx = PrepareContext::new(&fx.store, &registry);

    let mut filter = Filter::new("steins");
    filter.add_rule(Box::new(HasNameOf::new("", "Stein")));

    // erika does not match; anna appears twice and must come out twice,
    // in place.
    let input = [fx.erika, fx.anna, fx.bruno, fx.anna];
    let matched = filter.apply_to_handles(&ctx, &input, None).unwrap();
    assert_eq!(matched, vec![fx.anna, fx.bruno, fx.anna]);
}

#[test]
fn row_output_preserves_original_rows_and_order() {
    let fx = tree_fixture();
    let registry = FilterRegistry::new();
    let ctx = PrepareContext::new(&fx.store, &registry);

    let (rule, _) = SelectedStub::new(&[fx.anna, fx.clara], false);
    let mut filter = Filter::new("pick");
    filter.add_rule(Box::new(rule));

    let rows = vec![
        ("x".to_string(), fx.anna),
        ("y".to_string(), fx.bruno),
        ("z".to_string(), fx.clara),
    ];
    let kept = filter.apply_to_rows(&ctx, &rows, |row| row.1, None).unwrap();
    assert_eq!(kept, vec![("x".to_string(), fx.anna), ("z".to_string(), fx.clara)]);
}

#[test]
fn tree_mode_follows_the_hierarchy_cursor() {
    let mut store = Store::new();
    let germany = Place::new("P1", "Deutschland");
    let mut saxony = Place::new("P2", "Sachsen");
    let mut roecken = Place::new("P3", "Röcken");
    let mut leipzig = Place::new("P4", "Leipzig");
    let france = Place::new("P5", "France");

    saxony.parent = Some(germany.handle);
    roecken.parent = Some(saxony.handle);
    leipzig.parent = Some(saxony.handle);

    let saxony_handle = saxony.handle;
    let mut towns = [roecken.handle, leipzig.handle];
    towns.sort_unstable();

    for p in [germany, saxony, roecken, leipzig, france] {
        store.add_place(p);
    }

    let registry = FilterRegistry::new();
    let ctx = PrepareContext::new(&store, &registry);

    let mut filter = Filter::new("in saxony");
    filter.add_rule(Box::new(IsEnclosedBy::new("P2")));

    // Hierarchy order: the enclosing place first, then its towns in
    // sibling (handle) order.
    let matched = filter.apply_tree(&ctx, None).unwrap();
    assert_eq!(matched, vec![saxony_handle, towns[0], towns[1]]);
}

// ─────────────────────────────────────────────
// Optimizer behavior under apply
// ─────────────────────────────────────────────

#[test]
fn selected_hint_skips_candidates_outside_the_set() {
    let fx = tree_fixture();
    let registry = FilterRegistry::new();
    let ctx = PrepareContext::new(&fx.store, &registry);
    let universe = [fx.anna, fx.bruno, fx.erika];

    let (rule, calls) = SelectedStub::new(&[fx.anna, fx.bruno], true);
    let mut filter = Filter::new("hinted");
    filter.add_rule(Box::new(rule));

    let matched = filter.apply_to_handles(&ctx, &universe, None).unwrap();
    assert_eq!(as_set(&matched), as_set(&[fx.anna, fx.bruno]));
    assert!(
        calls.get() <= 2,
        "predicate ran {} times; erika must never be evaluated",
        calls.get()
    );
}

#[test]
fn pruning_never_changes_the_result() {
    let fx = tree_fixture();
    let registry = FilterRegistry::new();
    let ctx = PrepareContext::new(&fx.store, &registry);

    // Same predicate twice: once exposing its hint, once hidden.
    let run = |expose_hint: bool| {
        let (rule, calls) = SelectedStub::new(&[fx.anna, fx.clara, fx.greta], expose_hint);
        let mut filter = Filter::new("probe");
        filter.add_rule(Box::new(rule));
        let matched = filter.apply(&ctx, None).unwrap();
        (as_set(&matched), calls.get())
    };

    let (with_hint, evals_with_hint) = run(true);
    let (without_hint, evals_without_hint) = run(false);

    assert_eq!(with_hint, without_hint);
    assert!(evals_with_hint < evals_without_hint);
    assert_eq!(evals_without_hint, fx.store.people().len());
}

#[test]
fn inverted_selected_hint_excludes_instead() {
    let fx = tree_fixture();
    let registry = FilterRegistry::new();
    let ctx = PrepareContext::new(&fx.store, &registry);
    let universe = [fx.anna, fx.bruno, fx.erika];

    let (rule, calls) = SelectedStub::new(&[fx.anna, fx.bruno], true);
    let mut filter = Filter::new("hinted");
    filter.set_invert(true);
    filter.add_rule(Box::new(rule));

    let matched = filter.apply_to_handles(&ctx, &universe, None).unwrap();
    assert_eq!(matched, vec![fx.erika]);
    assert_eq!(calls.get(), 1, "only erika survives the swapped pruning");
}

#[test]
fn descendant_walk_feeds_the_optimizer() {
    let fx = tree_fixture();
    let registry = FilterRegistry::new();
    let ctx = PrepareContext::new(&fx.store, &registry);

    let mut filter = Filter::new("line of anna");
    filter.add_rule(Box::new(IsDescendantOf::new("I0001")));

    let matched = filter.apply(&ctx, None).unwrap();
    assert_eq!(
        as_set(&matched),
        as_set(&[fx.anna, fx.clara, fx.dieter, fx.greta])
    );
}

// ─────────────────────────────────────────────
// Nested filters
// ─────────────────────────────────────────────

fn registry_with_line_of_anna() -> FilterRegistry<Person> {
    let mut registry = FilterRegistry::new();
    let mut line = Filter::new("line of anna");
    line.add_rule(Box::new(IsDescendantOf::new("I0001")));
    registry.insert(line);
    registry
}

#[test]
fn nested_filter_composes_with_local_rules() {
    let fx = tree_fixture();
    let registry = registry_with_line_of_anna();
    let ctx = PrepareContext::new(&fx.store, &registry);

    let mut filter = Filter::new("women of the line");
    filter.add_rule(Box::new(MatchesFilter::new("line of anna")));
    filter.add_rule(Box::new(IsFemale::new()));

    let matched = filter.apply(&ctx, None).unwrap();
    assert_eq!(as_set(&matched), as_set(&[fx.anna, fx.clara, fx.greta]));
}

#[test]
fn nested_hints_prune_the_outer_scan() {
    let fx = tree_fixture();
    let registry = registry_with_line_of_anna();
    let ctx = PrepareContext::new(&fx.store, &registry);

    let (probe, calls) = SelectedStub::new(
        &[fx.anna, fx.bruno, fx.clara, fx.dieter, fx.erika, fx.greta],
        false,
    );
    let mut filter = Filter::new("probed");
    filter.add_rule(Box::new(MatchesFilter::new("line of anna")));
    filter.add_rule(Box::new(probe));

    let matched = filter.apply(&ctx, None).unwrap();
    assert_eq!(matched.len(), 4);
    assert_eq!(
        calls.get(),
        4,
        "the nested filter's descendant set must bound the scan"
    );
}

#[test]
fn unknown_nested_name_is_benign() {
    let fx = tree_fixture();
    let registry: FilterRegistry<Person> = FilterRegistry::new();
    let ctx = PrepareContext::new(&fx.store, &registry);

    let mut filter = Filter::new("dangling");
    filter.add_rule(Box::new(MatchesFilter::new("no such filter")));

    let matched = filter.apply(&ctx, None).unwrap();
    assert!(matched.is_empty());

    filter.set_invert(true);
    let matched = filter.apply(&ctx, None).unwrap();
    assert_eq!(matched.len(), fx.store.people().len());
}

#[test]
fn cyclic_nested_references_fail() {
    let fx = tree_fixture();
    let mut registry = FilterRegistry::new();

    let mut a: Filter<Person> = Filter::new("a");
    a.add_rule(Box::new(MatchesFilter::new("b")));
    registry.insert(a);

    let mut b: Filter<Person> = Filter::new("b");
    b.add_rule(Box::new(MatchesFilter::new("a")));
    registry.insert(b);

    let ctx = PrepareContext::new(&fx.store, &registry);
    let mut outer = Filter::new("outer");
    outer.add_rule(Box::new(MatchesFilter::new("a")));

    let err = outer.apply(&ctx, None).unwrap_err();
    assert!(matches!(err, FilterError::CyclicFilter(_)), "got: {err}");
}

// ─────────────────────────────────────────────
// Lifecycle and failure paths
// ─────────────────────────────────────────────

#[test]
fn prepare_failure_aborts_and_resets_the_prepared_prefix() {
    let fx = tree_fixture();
    let registry = FilterRegistry::new();
    let ctx = PrepareContext::new(&fx.store, &registry);

    let (first, prepares_first, resets_first) = LifecycleSpy::new();
    let (third, prepares_third, _) = LifecycleSpy::new();

    let mut filter = Filter::new("broken");
    filter.add_rule(Box::new(first));
    filter.add_rule(Box::new(ChangedSince::new("not a timestamp")));
    filter.add_rule(Box::new(third));

    let err = filter.apply(&ctx, None).unwrap_err();
    assert!(matches!(err, FilterError::RuleArgument { .. }), "got: {err}");
    assert_eq!(prepares_first.get(), 1);
    assert_eq!(resets_first.get(), 1, "the prepared prefix must be released");
    assert_eq!(prepares_third.get(), 0, "rules after the failure stay untouched");
}

#[test]
fn lifecycle_runs_once_per_application() {
    let fx = tree_fixture();
    let registry = FilterRegistry::new();
    let ctx = PrepareContext::new(&fx.store, &registry);

    let (spy, prepares, resets) = LifecycleSpy::new();
    let mut filter = Filter::new("spied");
    filter.add_rule(Box::new(spy));

    filter.apply(&ctx, None).unwrap();
    filter.apply(&ctx, None).unwrap();
    assert_eq!(prepares.get(), 2);
    assert_eq!(resets.get(), 2);
}

#[test]
fn invalid_pattern_fails_the_application() {
    let fx = tree_fixture();
    let registry = FilterRegistry::new();
    let ctx = PrepareContext::new(&fx.store, &registry);

    let mut filter = Filter::new("bad pattern");
    filter.add_rule(Box::new(HasNameOf::with_flags("(unclosed", "", true, false)));

    let err = filter.apply(&ctx, None).unwrap_err();
    assert!(matches!(err, FilterError::Pattern(_)), "got: {err}");
}

#[test]
fn dangling_candidate_handle_is_a_hard_failure() {
    let fx = tree_fixture();
    let registry = FilterRegistry::new();
    let ctx = PrepareContext::new(&fx.store, &registry);

    let mut filter: Filter<Person> = Filter::new("empty");
    let err = filter
        .apply_to_handles(&ctx, &[fx.anna, Handle::new()], None)
        .unwrap_err();
    assert!(matches!(err, FilterError::Store(_)), "got: {err}");
}

#[test]
fn progress_steps_once_per_candidate_even_when_pruned() {
    let fx = tree_fixture();
    let registry = FilterRegistry::new();
    let ctx = PrepareContext::new(&fx.store, &registry);

    let (rule, calls) = SelectedStub::new(&[fx.anna], true);
    let mut filter = Filter::new("hinted");
    filter.add_rule(Box::new(rule));

    let mut progress = CountingProgress::default();
    let matched = filter.apply(&ctx, Some(&mut progress)).unwrap();

    assert_eq!(matched, vec![fx.anna]);
    assert_eq!(progress.total, fx.store.people().len());
    assert_eq!(progress.steps, fx.store.people().len());
    assert!(progress.ended);
    assert_eq!(calls.get(), 1);
}

// ─────────────────────────────────────────────
// Definition round-trip
// ─────────────────────────────────────────────

#[test]
fn filters_round_trip_through_their_definitions() {
    let fx = tree_fixture();
    let catalog = person_catalog();

    let json = r#"{
        "name": "women named Stein",
        "comment": "authored in the editor",
        "op": "and",
        "invert": false,
        "rules": [
            { "class": "HasNameOf", "args": ["", "Stein"] },
            { "class": "IsFemale", "args": [] }
        ]
    }"#;
    let def: FilterDef = serde_json::from_str(json).unwrap();
    let mut filter = catalog.build_filter(&def).unwrap();

    assert_eq!(filter.to_def(), def, "definitions survive the round trip");

    let registry = FilterRegistry::new();
    let ctx = PrepareContext::new(&fx.store, &registry);
    let matched = filter.apply(&ctx, None).unwrap();
    assert_eq!(as_set(&matched), as_set(&[fx.anna, fx.clara]));
}

#[test]
fn modifier_flags_round_trip() {
    let catalog = person_catalog();
    let def = RuleDef {
        class: "HasNameOf".to_string(),
        args: vec!["".to_string(), "^st".to_string()],
        use_regex: true,
        use_case: false,
    };
    let rule = catalog.build_rule(&def).unwrap();
    assert_eq!(stammbaum_filter::rule_to_def(rule.as_ref()), def);
}

#[test]
fn unknown_operator_fails_deserialization() {
    let err = serde_json::from_str::<FilterDef>(
        r#"{ "name": "x", "op": "xor", "rules": [] }"#,
    )
    .unwrap_err();
    assert!(err.to_string().contains("unknown logical operator"));
}

#[test]
fn unknown_rule_class_fails_construction() {
    let catalog = person_catalog();
    let err = catalog
        .build_rule(&RuleDef::new("NoSuchRule", vec![]))
        .unwrap_err();
    assert!(matches!(err, FilterError::UnknownRule(ref c) if c == "NoSuchRule"));
}

#[test]
fn wrong_argument_count_fails_construction() {
    let catalog = person_catalog();
    let err = catalog.build_rule(&RuleDef::new("HasIdOf", vec![])).unwrap_err();
    assert!(
        matches!(err, FilterError::RuleArity { expected: 1, got: 0, .. }),
        "got: {err}"
    );
}
