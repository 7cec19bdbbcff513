//! Place rules.

use std::collections::{HashMap, HashSet, VecDeque};

use stammbaum_store::{Handle, Place, Store};

use crate::defs::{expect_args, RuleDef};
use crate::error::FilterError;
use crate::rule::{Hint, PrepareContext, Rule, RuleParams};
use crate::rules::params_from_def;

// ─────────────────────────────────────────────
// IsEnclosedBy
// ─────────────────────────────────────────────

/// Matches the place with the given id and every place transitively
/// enclosed by it.
///
/// Place enclosure is stored child → parent; preparation builds the
/// reverse index in one pass and walks it breadth-first.
#[derive(Debug)]
pub struct IsEnclosedBy {
    params: RuleParams,
    id: String,
    enclosed: Option<HashSet<Handle>>,
}

impl IsEnclosedBy {
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            params: RuleParams::new(vec![id.clone()]),
            id,
            enclosed: None,
        }
    }

    pub(crate) fn from_def(def: &RuleDef) -> Result<Self, FilterError> {
        expect_args(def, 1)?;
        Ok(Self {
            id: def.args[0].clone(),
            params: params_from_def(def),
            enclosed: None,
        })
    }
}

impl Rule<Place> for IsEnclosedBy {
    fn name(&self) -> &'static str {
        "IsEnclosedBy"
    }

    fn params(&self) -> &RuleParams {
        &self.params
    }

    fn prepare(&mut self, ctx: &PrepareContext<'_, Place>) -> Result<(), FilterError> {
        let places = ctx.store.places();
        let mut enclosed: HashSet<Handle> = HashSet::new();

        let root = places.cursor().find(|(_, p)| p.id == self.id).map(|(h, _)| h);
        if let Some(root) = root {
            let mut children: HashMap<Handle, Vec<Handle>> = HashMap::new();
            for (handle, place) in places.cursor() {
                if let Some(parent) = place.parent {
                    children.entry(parent).or_default().push(handle);
                }
            }

            enclosed.insert(root);
            let mut queue = VecDeque::from([root]);
            while let Some(handle) = queue.pop_front() {
                if let Some(kids) = children.get(&handle) {
                    for &kid in kids {
                        if enclosed.insert(kid) {
                            queue.push_back(kid);
                        }
                    }
                }
            }
        }

        self.enclosed = Some(enclosed);
        Ok(())
    }

    fn matches(&self, _store: &Store, record: &Place) -> bool {
        self.enclosed
            .as_ref()
            .map(|set| set.contains(&record.handle))
            .unwrap_or(false)
    }

    fn reset(&mut self) {
        self.enclosed = None;
    }

    fn hint(&self) -> Hint {
        match &self.enclosed {
            Some(set) => Hint::Selected(set.clone()),
            None => Hint::None,
        }
    }
}
