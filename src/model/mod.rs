//! Data model (spec.md §3): the types that flow between every other module.

pub mod assessment;
pub mod citation;
pub mod event;
pub mod evidence;
pub mod report;

pub use assessment::{JudgeAssessment, Recommendation};
pub use citation::{Citation, SourceKind};
pub use event::{Event, EventKind};
pub use evidence::{Evidence, Metadata};
pub use report::{Reference, Report};
