//! Collection and report assembly
//!
//! - [`buffer`] - Per-kind row buffers shared by the collection tasks
//! - [`orchestrator`] - Runs every (project, kind) pair concurrently
//! - [`report`] - Turns the frozen buffers into the CSV document

pub mod buffer;
pub mod orchestrator;
pub mod report;

pub use buffer::{FrozenSections, SectionBuffer, SectionBuffers};
pub use orchestrator::{run, Collection, CollectionStats};
pub use report::{assemble, report_file_name, Report, DEFAULT_REPORT_PREFIX};
