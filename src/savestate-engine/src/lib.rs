//! Checkpoint lifecycle engine for SaveState.
//!
//! A checkpoint is an annotated git tag named `save_<millis>_<token>`, where
//! the token is the URL-safe base64 of the display name. The engine creates,
//! lists, loads, renames, overwrites, diffs and deletes checkpoints in the
//! managed working directory, preserves uncommitted work across loads, and
//! serializes every mutating operation through a single-slot lock.

pub mod checkpoint;
pub mod codec;
pub mod engine;
pub mod error;
pub mod lock;
pub mod outcome;
pub mod scheduler;
pub mod service;

pub use checkpoint::{Checkpoint, DEFAULT_DESCRIPTION, DiffEntry, FileStatus};
pub use codec::{DecodedName, MAX_NAME_BYTES, TAG_PREFIX, TagId, decode_name, encode_name};
pub use engine::{
    AuthorizeReport, CheckpointEngine, CreatedCheckpoint, DeleteReport, DiffReport, EMPTY_TREE, EngineStatus,
    InterruptedWorkReport, LoadReport, OverwriteMode, OverwriteReport, RenameReport, UpdateReport,
};
pub use error::{EngineError, Result};
pub use lock::{OperationGuard, OperationLock};
pub use outcome::Outcome;
pub use scheduler::{AutoSaveScheduler, CycleOutcome, SchedulerState, SkipReason};
pub use service::{SaveStateService, ServiceStatus};
