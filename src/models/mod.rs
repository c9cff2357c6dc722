//! Core records shared by every pipeline phase.

mod finding;
mod revision;
mod unit;

pub use finding::{Rule, Severity, ValidationFinding};
pub use revision::{CitationGap, RevisionKind, RevisionRecord};
pub use unit::{Anchor, Category, ContentUnit, UnitKind};
