use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use stammbaum_store::{Handle, Record, Store};

use crate::error::FilterError;
use crate::optimizer;
use crate::progress::{NullProgress, ProgressSink};
use crate::rule::{PrepareContext, Rule};

// ─────────────────────────────────────────────
// Operator
// ─────────────────────────────────────────────

/// Logical combination applied to a filter's per-record rule results.
///
/// The runtime operator is a closed enum — an unrecognized operator cannot
/// reach the evaluation loop. The configuration error surfaces where text
/// becomes a value: [`Operator::from_str`] and definition deserialization
/// fail with [`FilterError::UnknownOperator`] instead of defaulting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Operator {
    /// Every rule must match.
    And,
    /// At least one rule must match.
    Or,
    /// Precisely one rule must match.
    One,
}

impl Operator {
    pub fn as_str(self) -> &'static str {
        match self {
            Operator::And => "and",
            Operator::Or => "or",
            Operator::One => "one",
        }
    }
}

impl Default for Operator {
    fn default() -> Self {
        Self::And
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operator {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "and" => Ok(Operator::And),
            "or" => Ok(Operator::Or),
            "one" => Ok(Operator::One),
            other => Err(FilterError::UnknownOperator(other.to_string())),
        }
    }
}

impl TryFrom<String> for Operator {
    type Error = FilterError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Operator> for String {
    fn from(op: Operator) -> Self {
        op.as_str().to_string()
    }
}

// ─────────────────────────────────────────────
// Filter
// ─────────────────────────────────────────────

/// A named composite predicate: an ordered rule list, a logical operator,
/// and an inversion flag.
///
/// Rule insertion order is evaluation order — short-circuiting operators
/// test the first rules first. Inversion applies to the *combined* result,
/// never to individual rules: an inverted EXACTLY-ONE matches records where
/// zero or two-plus rules match.
#[derive(Debug)]
pub struct Filter<R: Record> {
    name: String,
    comment: String,
    op: Operator,
    invert: bool,
    rules: Vec<Box<dyn Rule<R>>>,
    /// Nesting depth of outstanding `prepare` requests. Shared filters
    /// reached through several nested references prepare their rules once
    /// and reset them when the last request unwinds.
    prepare_depth: u32,
}

impl<R: Record> Filter<R> {
    /// A new, empty filter combining with AND and no inversion.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            comment: String::new(),
            op: Operator::default(),
            invert: false,
            rules: Vec::new(),
            prepare_depth: 0,
        }
    }

    // ── Configuration ──────────────────────────────────

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn comment(&self) -> &str {
        &self.comment
    }

    pub fn set_comment(&mut self, comment: impl Into<String>) {
        self.comment = comment.into();
    }

    pub fn operator(&self) -> Operator {
        self.op
    }

    pub fn set_operator(&mut self, op: Operator) {
        self.op = op;
    }

    pub fn invert(&self) -> bool {
        self.invert
    }

    pub fn set_invert(&mut self, invert: bool) {
        self.invert = invert;
    }

    pub fn add_rule(&mut self, rule: Box<dyn Rule<R>>) {
        self.rules.push(rule);
    }

    pub fn remove_rule(&mut self, index: usize) -> Option<Box<dyn Rule<R>>> {
        if index < self.rules.len() {
            Some(self.rules.remove(index))
        } else {
            None
        }
    }

    pub fn rules(&self) -> &[Box<dyn Rule<R>>] {
        &self.rules
    }

    /// A filter is empty when it cannot constrain anything: no rules at
    /// all, or a single match-everything rule without inversion.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
            || (self.rules.len() == 1 && self.rules[0].is_empty() && !self.invert)
    }

    // ── Lifecycle ──────────────────────────────────────

    /// Prepare every rule, in order. Normally driven by the apply methods;
    /// public so nested-delegation rules can cascade preparation.
    ///
    /// On failure the rules already prepared are reset; the failing rule
    /// and the ones after it acquired nothing and are left alone.
    pub fn prepare(&mut self, ctx: &PrepareContext<'_, R>) -> Result<(), FilterError> {
        self.prepare_depth += 1;
        if self.prepare_depth > 1 {
            return Ok(());
        }
        for idx in 0..self.rules.len() {
            if let Err(err) = self.rules[idx].prepare(ctx) {
                for rule in &mut self.rules[..idx] {
                    rule.reset();
                }
                self.prepare_depth -= 1;
                return Err(err);
            }
        }
        Ok(())
    }

    /// Release rule preparation state. The counterpart of [`Filter::prepare`].
    pub fn reset(&mut self) {
        self.prepare_depth = self.prepare_depth.saturating_sub(1);
        if self.prepare_depth == 0 {
            for rule in &mut self.rules {
                rule.reset();
            }
        }
    }

    // ── Evaluation ─────────────────────────────────────

    /// Evaluate the composite predicate against one materialized record.
    ///
    /// A zero-rule filter combines to true — it matches everything — and
    /// inversion is then applied to that combined value like any other.
    pub fn check_record(&self, store: &Store, record: &R) -> bool {
        let combined = if self.rules.is_empty() {
            true
        } else {
            match self.op {
                Operator::And => self.rules.iter().all(|r| r.matches(store, record)),
                Operator::Or => self.rules.iter().any(|r| r.matches(store, record)),
                Operator::One => {
                    let mut found = false;
                    let mut disqualified = false;
                    for rule in &self.rules {
                        if rule.matches(store, record) {
                            if found {
                                // A second match already disqualifies.
                                disqualified = true;
                                break;
                            }
                            found = true;
                        }
                    }
                    found && !disqualified
                }
            }
        };
        combined != self.invert
    }

    // ── Application modes ──────────────────────────────

    /// Scan the full category enumeration. Output order is the
    /// store-native cursor order; callers must not rely on more than set
    /// membership.
    pub fn apply(
        &mut self,
        ctx: &PrepareContext<'_, R>,
        progress: Option<&mut dyn ProgressSink>,
    ) -> Result<Vec<Handle>, FilterError> {
        self.prepare(ctx)?;
        let result = self.scan_cursor(ctx, false, progress);
        self.reset();
        result
    }

    /// Scan in hierarchy order. Output order equals the category's tree
    /// cursor traversal.
    pub fn apply_tree(
        &mut self,
        ctx: &PrepareContext<'_, R>,
        progress: Option<&mut dyn ProgressSink>,
    ) -> Result<Vec<Handle>, FilterError> {
        self.prepare(ctx)?;
        let result = self.scan_cursor(ctx, true, progress);
        self.reset();
        result
    }

    /// Evaluate an explicit candidate list. Each distinct handle is tested
    /// once; every input element whose handle passed is emitted, in the
    /// original input order (duplicates included). A handle with no record
    /// behind it is a hard failure.
    pub fn apply_to_handles(
        &mut self,
        ctx: &PrepareContext<'_, R>,
        handles: &[Handle],
        progress: Option<&mut dyn ProgressSink>,
    ) -> Result<Vec<Handle>, FilterError> {
        self.prepare(ctx)?;
        let result = self.scan_handles(ctx, handles, progress);
        self.reset();
        result
    }

    /// Evaluate rows that carry a handle column, selected by `handle_of`.
    ///
    /// The candidate universe is the distinct handle set (when a handle
    /// repeats, the later occurrence displaces the earlier in the dedup
    /// map — immaterial here, because the result is emitted from the
    /// original rows: every row whose handle passed, in original order).
    pub fn apply_to_rows<T, F>(
        &mut self,
        ctx: &PrepareContext<'_, R>,
        rows: &[T],
        handle_of: F,
        progress: Option<&mut dyn ProgressSink>,
    ) -> Result<Vec<T>, FilterError>
    where
        T: Clone,
        F: Fn(&T) -> Handle,
    {
        self.prepare(ctx)?;
        let result = self.scan_rows(ctx, rows, &handle_of, progress);
        self.reset();
        result
    }

    // ── Scan internals ─────────────────────────────────
    //
    // Every scan: compute pruning sets, walk the candidate universe,
    // step the progress sink per candidate, skip candidates the pruning
    // rejects (treated as non-matches, no record fetch, no rule calls),
    // combine the rest. Reset runs on the error path too — release is
    // guaranteed even when results are not.

    fn scan_cursor(
        &self,
        ctx: &PrepareContext<'_, R>,
        tree: bool,
        progress: Option<&mut dyn ProgressSink>,
    ) -> Result<Vec<Handle>, FilterError> {
        let mut null = NullProgress;
        let sink: &mut dyn ProgressSink = match progress {
            Some(sink) => sink,
            None => &mut null,
        };

        let pruning = optimizer::compute(self, ctx.registry)?;
        let table = ctx.store.table::<R>();

        sink.begin(table.len());
        let mut matched = Vec::new();
        let mut evaluated = 0usize;
        let cursor: Box<dyn Iterator<Item = (Handle, &R)> + '_> = if tree {
            Box::new(table.tree_cursor())
        } else {
            Box::new(table.cursor())
        };
        for (handle, record) in cursor {
            sink.step();
            if !pruning.admits(handle) {
                continue;
            }
            evaluated += 1;
            if self.check_record(ctx.store, record) {
                matched.push(handle);
            }
        }
        sink.end();

        debug!(
            filter = %self.name,
            total = table.len(),
            evaluated,
            matched = matched.len(),
            tree,
            "cursor scan complete"
        );
        Ok(matched)
    }

    fn scan_handles(
        &self,
        ctx: &PrepareContext<'_, R>,
        handles: &[Handle],
        progress: Option<&mut dyn ProgressSink>,
    ) -> Result<Vec<Handle>, FilterError> {
        let mut null = NullProgress;
        let sink: &mut dyn ProgressSink = match progress {
            Some(sink) => sink,
            None => &mut null,
        };

        let pruning = optimizer::compute(self, ctx.registry)?;
        let table = ctx.store.table::<R>();

        sink.begin(handles.len());
        let mut seen: HashSet<Handle> = HashSet::with_capacity(handles.len());
        let mut passed: HashSet<Handle> = HashSet::new();
        for &handle in handles {
            sink.step();
            if !seen.insert(handle) {
                continue;
            }
            if !pruning.admits(handle) {
                continue;
            }
            let record = table.get(handle)?;
            if self.check_record(ctx.store, record) {
                passed.insert(handle);
            }
        }
        sink.end();

        debug!(
            filter = %self.name,
            candidates = seen.len(),
            matched = passed.len(),
            "handle-list scan complete"
        );
        Ok(handles.iter().copied().filter(|h| passed.contains(h)).collect())
    }

    fn scan_rows<T>(
        &self,
        ctx: &PrepareContext<'_, R>,
        rows: &[T],
        handle_of: &dyn Fn(&T) -> Handle,
        progress: Option<&mut dyn ProgressSink>,
    ) -> Result<Vec<T>, FilterError>
    where
        T: Clone,
    {
        let mut null = NullProgress;
        let sink: &mut dyn ProgressSink = match progress {
            Some(sink) => sink,
            None => &mut null,
        };

        let pruning = optimizer::compute(self, ctx.registry)?;
        let table = ctx.store.table::<R>();

        let universe: HashSet<Handle> = rows.iter().map(|row| handle_of(row)).collect();
        sink.begin(universe.len());
        let mut passed: HashSet<Handle> = HashSet::new();
        for &handle in &universe {
            sink.step();
            if !pruning.admits(handle) {
                continue;
            }
            let record = table.get(handle)?;
            if self.check_record(ctx.store, record) {
                passed.insert(handle);
            }
        }
        sink.end();

        debug!(
            filter = %self.name,
            candidates = universe.len(),
            matched = passed.len(),
            "row scan complete"
        );
        Ok(rows
            .iter()
            .filter(|row| passed.contains(&handle_of(row)))
            .cloned()
            .collect())
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
