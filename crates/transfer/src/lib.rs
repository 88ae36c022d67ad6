#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Chunked CAS download engine
//!
//! A request's descriptors are split into byte ranges, fetched over one
//! bounded [`WorkerPool`], written at their offsets into per-file staging
//! files, verified, and renamed into place. Failed or cancelled files never
//! leave anything at their final path.

mod orchestrator;
mod pool;
mod progress;
mod state;
mod sweep;
mod writer;

pub use orchestrator::{TransferOptions, TransferOrchestrator};
pub use pool::WorkerPool;
pub use progress::ProgressTracker;
pub use state::ChunkState;
pub use sweep::{is_staging_file, sweep_orphaned_staging, STAGING_SUFFIX};
pub use writer::{ReassemblyWriter, VerifiedFile, WriteHandle};
