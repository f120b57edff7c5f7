pub mod capture;
pub mod error;
pub mod runner;
pub mod scheduler;
pub mod timelapse;

pub use capture::{take_snapshot, HttpTransport, SnapshotFetcher};
pub use error::{AssembleError, FetchError, JobError, ScheduleError, Stage, StageError, WriteError};
pub use runner::{snapshot_all, timelapse_all, BatchReport};
pub use scheduler::{FireOutcome, JobKind, Scheduler};
pub use timelapse::{assemble, create_timelapse, Assembled};
