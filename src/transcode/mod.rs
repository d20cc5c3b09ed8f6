//! Multi-quality transcoding.
//!
//! Uploads are turned into a [`TranscodeJob`] and handed to the
//! [`TranscodeOrchestrator`], which encodes each requested quality with an
//! [`reelhouse_av::Encoder`]. Variant files on disk are the source of truth
//! for which qualities exist; the [`JobTable`] only tracks progress.

mod job;
mod orchestrator;

pub use job::{JobRecord, JobStatus, JobTable, TranscodeJob, JOB_HISTORY_LIMIT};
pub use orchestrator::{available_qualities, OrchestratorOptions, TranscodeOrchestrator};
