//! Inspection record evidence.

pub mod model;

pub use model::{EvidenceRow, InspectionEvidence};
