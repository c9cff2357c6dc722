//! Service layer for document revision.
//!
//! This module contains the domain logic each pipeline phase delegates to.
//! Services hold no run state; the pipeline owns scheduling and collection.

pub mod classify;
pub mod content_analysis;
pub mod crossref;
pub mod dossier;
pub mod references;
pub mod revise;
pub mod similarity;

pub use classify::{Classification, Classifier, LabelSet};
pub use content_analysis::{ContentAnalyzer, UnitAnalysis};
pub use crossref::find_citation_gaps;
pub use dossier::{Dossier, DossierEntry, GlobalAnalysis, GlobalConsistencyAnalyzer};
pub use references::{HttpProbe, LinkProbe, ReferenceCheck};
pub use revise::{RevisionOutcome, Reviser};
pub use similarity::similarity;
