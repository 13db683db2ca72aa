// src/progress.rs
use crate::record::Status;

/// Progress reporting for a run. The CLI implements this to narrate to the
/// operator; the library itself logs through tracing regardless.
pub trait Progress {
    /// Called at the start with the number of eligible records.
    fn begin(&mut self, _total: usize) {}

    /// Free-form status line for human eyes.
    fn log(&mut self, _msg: &str) {}

    /// One record reached `status` (possibly unchanged).
    fn item_done(&mut self, _record_id: &str, _status: Status) {}

    /// One record failed at `stage`.
    fn item_failed(&mut self, _record_id: &str, _stage: &str, _reason: &str) {}

    /// Called at the end, successful or not.
    fn finish(&mut self) {}
}

/// A no-op progress sink.
pub struct NullProgress;
impl Progress for NullProgress {}
