//! Person rules.

use std::collections::{HashSet, VecDeque};

use regex::Regex;

use stammbaum_store::{Gender, Handle, Person, Store};

use crate::defs::{expect_args, RuleDef};
use crate::error::FilterError;
use crate::rule::{Hint, PrepareContext, Rule, RuleParams};
use crate::rules::params_from_def;

// ─────────────────────────────────────────────
// IsFemale / IsMale
// ─────────────────────────────────────────────

/// Matches people recorded as female.
#[derive(Debug, Default)]
pub struct IsFemale {
    params: RuleParams,
}

impl IsFemale {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_def(def: &RuleDef) -> Result<Self, FilterError> {
        expect_args(def, 0)?;
        Ok(Self { params: params_from_def(def) })
    }
}

impl Rule<Person> for IsFemale {
    fn name(&self) -> &'static str {
        "IsFemale"
    }

    fn params(&self) -> &RuleParams {
        &self.params
    }

    fn matches(&self, _store: &Store, record: &Person) -> bool {
        record.gender == Gender::Female
    }
}

/// Matches people recorded as male.
#[derive(Debug, Default)]
pub struct IsMale {
    params: RuleParams,
}

impl IsMale {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_def(def: &RuleDef) -> Result<Self, FilterError> {
        expect_args(def, 0)?;
        Ok(Self { params: params_from_def(def) })
    }
}

impl Rule<Person> for IsMale {
    fn name(&self) -> &'static str {
        "IsMale"
    }

    fn params(&self) -> &RuleParams {
        &self.params
    }

    fn matches(&self, _store: &Store, record: &Person) -> bool {
        record.gender == Gender::Male
    }
}

// ─────────────────────────────────────────────
// HasNameOf
// ─────────────────────────────────────────────

/// One prepared name-component matcher. An empty argument matches anything.
#[derive(Debug)]
enum TextMatch {
    Any,
    Substring { needle: String, exact_case: bool },
    Pattern(Regex),
}

impl TextMatch {
    fn build(arg: &str, use_regex: bool, use_case: bool) -> Result<Self, FilterError> {
        if arg.is_empty() {
            return Ok(Self::Any);
        }
        if use_regex {
            let pattern = if use_case { arg.to_string() } else { format!("(?i){arg}") };
            Ok(Self::Pattern(Regex::new(&pattern)?))
        } else {
            let needle = if use_case { arg.to_string() } else { arg.to_lowercase() };
            Ok(Self::Substring { needle, exact_case: use_case })
        }
    }

    fn hit(&self, text: &str) -> bool {
        match self {
            Self::Any => true,
            Self::Substring { needle, exact_case: true } => text.contains(needle.as_str()),
            Self::Substring { needle, exact_case: false } => {
                text.to_lowercase().contains(needle.as_str())
            }
            Self::Pattern(re) => re.is_match(text),
        }
    }
}

/// Matches people by given name and surname, over the primary and every
/// alternate name. The modifier flags select substring vs regex matching
/// and case sensitivity; empty arguments are wildcards.
#[derive(Debug)]
pub struct HasNameOf {
    params: RuleParams,
    given: String,
    surname: String,
    given_match: Option<TextMatch>,
    surname_match: Option<TextMatch>,
}

impl HasNameOf {
    /// Case-insensitive substring matching.
    pub fn new(given: impl Into<String>, surname: impl Into<String>) -> Self {
        Self::with_flags(given, surname, false, false)
    }

    pub fn with_flags(
        given: impl Into<String>,
        surname: impl Into<String>,
        use_regex: bool,
        use_case: bool,
    ) -> Self {
        let given = given.into();
        let surname = surname.into();
        Self {
            params: RuleParams::with_flags(
                vec![given.clone(), surname.clone()],
                use_regex,
                use_case,
            ),
            given,
            surname,
            given_match: None,
            surname_match: None,
        }
    }

    pub(crate) fn from_def(def: &RuleDef) -> Result<Self, FilterError> {
        expect_args(def, 2)?;
        Ok(Self {
            given: def.args[0].clone(),
            surname: def.args[1].clone(),
            params: params_from_def(def),
            given_match: None,
            surname_match: None,
        })
    }
}

impl Rule<Person> for HasNameOf {
    fn name(&self) -> &'static str {
        "HasNameOf"
    }

    fn params(&self) -> &RuleParams {
        &self.params
    }

    fn prepare(&mut self, _ctx: &PrepareContext<'_, Person>) -> Result<(), FilterError> {
        let (use_regex, use_case) = (self.params.use_regex, self.params.use_case);
        self.given_match = Some(TextMatch::build(&self.given, use_regex, use_case)?);
        self.surname_match = Some(TextMatch::build(&self.surname, use_regex, use_case)?);
        Ok(())
    }

    fn matches(&self, _store: &Store, record: &Person) -> bool {
        let (Some(given), Some(surname)) = (&self.given_match, &self.surname_match) else {
            return false;
        };
        std::iter::once(&record.name)
            .chain(record.alternate_names.iter())
            .any(|name| given.hit(&name.given) && surname.hit(&name.surname))
    }

    fn reset(&mut self) {
        self.given_match = None;
        self.surname_match = None;
    }
}

// ─────────────────────────────────────────────
// IsDescendantOf
// ─────────────────────────────────────────────

/// Matches the person with the given id and everyone descended from them
/// through the family graph.
///
/// Preparation walks the graph breadth-first once; afterwards the match is
/// a set lookup, and the set doubles as the optimizer hint.
#[derive(Debug)]
pub struct IsDescendantOf {
    params: RuleParams,
    id: String,
    descendants: Option<HashSet<Handle>>,
}

impl IsDescendantOf {
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            params: RuleParams::new(vec![id.clone()]),
            id,
            descendants: None,
        }
    }

    pub(crate) fn from_def(def: &RuleDef) -> Result<Self, FilterError> {
        expect_args(def, 1)?;
        Ok(Self {
            id: def.args[0].clone(),
            params: params_from_def(def),
            descendants: None,
        })
    }
}

impl Rule<Person> for IsDescendantOf {
    fn name(&self) -> &'static str {
        "IsDescendantOf"
    }

    fn params(&self) -> &RuleParams {
        &self.params
    }

    fn prepare(&mut self, ctx: &PrepareContext<'_, Person>) -> Result<(), FilterError> {
        let people = ctx.store.people();
        let mut descendants: HashSet<Handle> = HashSet::new();

        let root = people.cursor().find(|(_, p)| p.id == self.id).map(|(h, _)| h);
        if let Some(root) = root {
            descendants.insert(root);
            let mut queue = VecDeque::from([root]);
            while let Some(handle) = queue.pop_front() {
                let person = people.get(handle)?;
                for &family_handle in &person.families {
                    let family = ctx.store.families().get(family_handle)?;
                    for &child in &family.children {
                        if descendants.insert(child) {
                            queue.push_back(child);
                        }
                    }
                }
            }
        }

        self.descendants = Some(descendants);
        Ok(())
    }

    fn matches(&self, _store: &Store, record: &Person) -> bool {
        self.descendants
            .as_ref()
            .map(|set| set.contains(&record.handle))
            .unwrap_or(false)
    }

    fn reset(&mut self) {
        self.descendants = None;
    }

    fn hint(&self) -> Hint {
        match &self.descendants {
            Some(set) => Hint::Selected(set.clone()),
            None => Hint::None,
        }
    }
}

// ─────────────────────────────────────────────
// HasAttributeOf
// ─────────────────────────────────────────────

/// Matches people carrying the named attribute; a non-empty second
/// argument must additionally appear in the attribute's rendered value.
#[derive(Debug)]
pub struct HasAttributeOf {
    params: RuleParams,
    key: String,
    value: String,
}

impl HasAttributeOf {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        let key = key.into();
        let value = value.into();
        Self {
            params: RuleParams::new(vec![key.clone(), value.clone()]),
            key,
            value,
        }
    }

    pub(crate) fn from_def(def: &RuleDef) -> Result<Self, FilterError> {
        expect_args(def, 2)?;
        Ok(Self {
            key: def.args[0].clone(),
            value: def.args[1].clone(),
            params: params_from_def(def),
        })
    }
}

impl Rule<Person> for HasAttributeOf {
    fn name(&self) -> &'static str {
        "HasAttributeOf"
    }

    fn params(&self) -> &RuleParams {
        &self.params
    }

    fn matches(&self, _store: &Store, record: &Person) -> bool {
        let Some(value) = record.attributes.get(&self.key) else {
            return false;
        };
        if self.value.is_empty() {
            return true;
        }
        match value {
            serde_json::Value::String(s) => s.contains(&self.value),
            other => other.to_string().contains(&self.value),
        }
    }
}
