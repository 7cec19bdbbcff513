//! Rules meaningful for every record category.

use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

use regex::Regex;
use tracing::debug;

use stammbaum_store::{Handle, Record, Store};

use crate::defs::{expect_args, RuleDef};
use crate::error::FilterError;
use crate::filter::Filter;
use crate::rule::{Hint, PrepareContext, Rule, RuleParams};
use crate::rules::params_from_def;

// ─────────────────────────────────────────────
// Everyone
// ─────────────────────────────────────────────

/// Matches every record unconditionally. The no-op rule: a filter holding
/// only this rule (and no inversion) is considered empty.
#[derive(Debug, Default)]
pub struct Everyone {
    params: RuleParams,
}

impl Everyone {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_def(def: &RuleDef) -> Result<Self, FilterError> {
        expect_args(def, 0)?;
        Ok(Self { params: params_from_def(def) })
    }
}

impl<R: Record> Rule<R> for Everyone {
    fn name(&self) -> &'static str {
        "Everyone"
    }

    fn params(&self) -> &RuleParams {
        &self.params
    }

    fn is_empty(&self) -> bool {
        true
    }

    fn matches(&self, _store: &Store, _record: &R) -> bool {
        true
    }
}

// ─────────────────────────────────────────────
// HasIdOf
// ─────────────────────────────────────────────

/// Matches the record whose id equals the argument.
///
/// Preparation resolves the id against the category table once, so the
/// match set is known in advance and exposed to the optimizer.
#[derive(Debug)]
pub struct HasIdOf {
    params: RuleParams,
    id: String,
    selected: Option<HashSet<Handle>>,
}

impl HasIdOf {
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            params: RuleParams::new(vec![id.clone()]),
            id,
            selected: None,
        }
    }

    pub(crate) fn from_def(def: &RuleDef) -> Result<Self, FilterError> {
        expect_args(def, 1)?;
        Ok(Self {
            id: def.args[0].clone(),
            params: params_from_def(def),
            selected: None,
        })
    }
}

impl<R: Record> Rule<R> for HasIdOf {
    fn name(&self) -> &'static str {
        "HasIdOf"
    }

    fn params(&self) -> &RuleParams {
        &self.params
    }

    fn prepare(&mut self, ctx: &PrepareContext<'_, R>) -> Result<(), FilterError> {
        let selected: HashSet<Handle> = ctx
            .store
            .table::<R>()
            .cursor()
            .filter(|(_, record)| record.id() == self.id)
            .map(|(handle, _)| handle)
            .collect();
        self.selected = Some(selected);
        Ok(())
    }

    fn matches(&self, _store: &Store, record: &R) -> bool {
        match &self.selected {
            Some(selected) => selected.contains(&record.handle()),
            None => record.id() == self.id,
        }
    }

    fn reset(&mut self) {
        self.selected = None;
    }

    fn hint(&self) -> Hint {
        match &self.selected {
            Some(selected) => Hint::Selected(selected.clone()),
            None => Hint::None,
        }
    }
}

// ─────────────────────────────────────────────
// RegExpIdOf
// ─────────────────────────────────────────────

/// Matches records whose id matches the regular-expression argument.
/// Case-insensitive unless the case modifier is set.
#[derive(Debug)]
pub struct RegExpIdOf {
    params: RuleParams,
    pattern: String,
    compiled: Option<Regex>,
}

impl RegExpIdOf {
    pub fn new(pattern: impl Into<String>, use_case: bool) -> Self {
        let pattern = pattern.into();
        Self {
            params: RuleParams::with_flags(vec![pattern.clone()], true, use_case),
            pattern,
            compiled: None,
        }
    }

    pub(crate) fn from_def(def: &RuleDef) -> Result<Self, FilterError> {
        expect_args(def, 1)?;
        Ok(Self {
            pattern: def.args[0].clone(),
            params: params_from_def(def),
            compiled: None,
        })
    }
}

impl<R: Record> Rule<R> for RegExpIdOf {
    fn name(&self) -> &'static str {
        "RegExpIdOf"
    }

    fn params(&self) -> &RuleParams {
        &self.params
    }

    fn prepare(&mut self, _ctx: &PrepareContext<'_, R>) -> Result<(), FilterError> {
        let pattern = if self.params.use_case {
            self.pattern.clone()
        } else {
            format!("(?i){}", self.pattern)
        };
        self.compiled = Some(Regex::new(&pattern)?);
        Ok(())
    }

    fn matches(&self, _store: &Store, record: &R) -> bool {
        self.compiled
            .as_ref()
            .map(|re| re.is_match(record.id()))
            .unwrap_or(false)
    }

    fn reset(&mut self) {
        self.compiled = None;
    }
}

// ─────────────────────────────────────────────
// ChangedSince
// ─────────────────────────────────────────────

/// Matches records last changed at or after the given unix timestamp
/// (seconds, passed as a string argument and parsed during preparation).
#[derive(Debug)]
pub struct ChangedSince {
    params: RuleParams,
    raw: String,
    since: Option<i64>,
}

impl ChangedSince {
    pub fn new(since: impl Into<String>) -> Self {
        let raw = since.into();
        Self {
            params: RuleParams::new(vec![raw.clone()]),
            raw,
            since: None,
        }
    }

    pub(crate) fn from_def(def: &RuleDef) -> Result<Self, FilterError> {
        expect_args(def, 1)?;
        Ok(Self {
            raw: def.args[0].clone(),
            params: params_from_def(def),
            since: None,
        })
    }
}

impl<R: Record> Rule<R> for ChangedSince {
    fn name(&self) -> &'static str {
        "ChangedSince"
    }

    fn params(&self) -> &RuleParams {
        &self.params
    }

    fn prepare(&mut self, _ctx: &PrepareContext<'_, R>) -> Result<(), FilterError> {
        let since = self.raw.trim().parse::<i64>().map_err(|e| {
            FilterError::RuleArgument {
                rule: "ChangedSince",
                value: self.raw.clone(),
                reason: e.to_string(),
            }
        })?;
        self.since = Some(since);
        Ok(())
    }

    fn matches(&self, _store: &Store, record: &R) -> bool {
        self.since.map(|since| record.change() >= since).unwrap_or(false)
    }

    fn reset(&mut self) {
        self.since = None;
    }
}

// ─────────────────────────────────────────────
// MatchesFilter
// ─────────────────────────────────────────────

/// Matches records matched by another, named filter from the registry.
///
/// Preparation resolves the name and cascades preparation into the shared
/// instance, guarded against reference cycles. A name the registry does
/// not know is benign: the rule simply matches nothing and the scan falls
/// back to ordinary evaluation for this branch.
#[derive(Debug)]
pub struct MatchesFilter<R: Record> {
    params: RuleParams,
    filter_name: String,
    inner: Option<Rc<RefCell<Filter<R>>>>,
}

impl<R: Record> MatchesFilter<R> {
    pub fn new(name: impl Into<String>) -> Self {
        let filter_name = name.into();
        Self {
            params: RuleParams::new(vec![filter_name.clone()]),
            filter_name,
            inner: None,
        }
    }

    pub(crate) fn from_def(def: &RuleDef) -> Result<Self, FilterError> {
        expect_args(def, 1)?;
        Ok(Self {
            filter_name: def.args[0].clone(),
            params: params_from_def(def),
            inner: None,
        })
    }
}

impl<R: Record> Rule<R> for MatchesFilter<R> {
    fn name(&self) -> &'static str {
        "MatchesFilter"
    }

    fn params(&self) -> &RuleParams {
        &self.params
    }

    fn prepare(&mut self, ctx: &PrepareContext<'_, R>) -> Result<(), FilterError> {
        let Some(shared) = ctx.registry.get(&self.filter_name) else {
            debug!(filter = %self.filter_name, "referenced filter not in registry, rule matches nothing");
            self.inner = None;
            return Ok(());
        };

        if !ctx.begin_resolve(&self.filter_name) {
            return Err(FilterError::CyclicFilter(self.filter_name.clone()));
        }
        let prepared = shared
            .try_borrow_mut()
            .map_err(|_| FilterError::CyclicFilter(self.filter_name.clone()))
            .and_then(|mut filter| filter.prepare(ctx));
        ctx.end_resolve(&self.filter_name);
        prepared?;

        self.inner = Some(shared);
        Ok(())
    }

    fn matches(&self, store: &Store, record: &R) -> bool {
        match &self.inner {
            Some(filter) => filter
                .try_borrow()
                .map(|filter| filter.check_record(store, record))
                .unwrap_or(false),
            None => false,
        }
    }

    fn reset(&mut self) {
        if let Some(filter) = self.inner.take() {
            if let Ok(mut filter) = filter.try_borrow_mut() {
                filter.reset();
            }
        }
    }

    fn hint(&self) -> Hint {
        Hint::Filter(self.filter_name.clone())
    }
}
