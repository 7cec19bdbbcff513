//! The concrete rule catalog.
//!
//! A representative set of rules, not the full authoring palette: the
//! category-generic rules every record kind understands, the person rules
//! that exercise graph traversal and name matching, and the place rule
//! that exercises the hierarchical category. New rules implement
//! [`crate::rule::Rule`] and register a constructor in a
//! [`RuleCatalog`](crate::defs::RuleCatalog).

pub mod any;
pub mod person;
pub mod place;

pub use any::{ChangedSince, Everyone, HasIdOf, MatchesFilter, RegExpIdOf};
pub use person::{HasAttributeOf, HasNameOf, IsDescendantOf, IsFemale, IsMale};
pub use place::IsEnclosedBy;

use stammbaum_store::{Person, Place, Record};

use crate::defs::{RuleCatalog, RuleDef};
use crate::rule::RuleParams;

/// The parameter triple exactly as the definition carries it.
pub(crate) fn params_from_def(def: &RuleDef) -> RuleParams {
    RuleParams::with_flags(def.args.clone(), def.use_regex, def.use_case)
}

/// Register the rules meaningful for every category.
pub fn register_common<R: Record + 'static>(catalog: &mut RuleCatalog<R>) {
    catalog.register("Everyone", |def| Ok(Box::new(Everyone::from_def(def)?)));
    catalog.register("HasIdOf", |def| Ok(Box::new(HasIdOf::from_def(def)?)));
    catalog.register("RegExpIdOf", |def| Ok(Box::new(RegExpIdOf::from_def(def)?)));
    catalog.register("ChangedSince", |def| Ok(Box::new(ChangedSince::from_def(def)?)));
    catalog.register("MatchesFilter", |def| Ok(Box::new(MatchesFilter::from_def(def)?)));
}

/// The person category's known rules.
pub fn person_catalog() -> RuleCatalog<Person> {
    let mut catalog = RuleCatalog::new();
    register_common(&mut catalog);
    catalog.register("IsFemale", |def| Ok(Box::new(IsFemale::from_def(def)?)));
    catalog.register("IsMale", |def| Ok(Box::new(IsMale::from_def(def)?)));
    catalog.register("HasNameOf", |def| Ok(Box::new(HasNameOf::from_def(def)?)));
    catalog.register("IsDescendantOf", |def| Ok(Box::new(IsDescendantOf::from_def(def)?)));
    catalog.register("HasAttributeOf", |def| Ok(Box::new(HasAttributeOf::from_def(def)?)));
    catalog
}

/// The place category's known rules.
pub fn place_catalog() -> RuleCatalog<Place> {
    let mut catalog = RuleCatalog::new();
    register_common(&mut catalog);
    catalog.register("IsEnclosedBy", |def| Ok(Box::new(IsEnclosedBy::from_def(def)?)));
    catalog
}
