#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Client for files stored in a hub's content-addressed storage
//!
//! ```no_run
//! # async fn demo() -> Result<(), hubcas::Error> {
//! use hubcas::{CasClient, Direction, TransferRequest};
//!
//! let client = CasClient::new(std::env::var("HF_TOKEN").ok())?;
//! let Some(descriptor) = client.resolve("Qwen/Qwen3-0.6B", "tokenizer.json", None).await? else {
//!     return Ok(());
//! };
//! let credential = client
//!     .authorize("Qwen/Qwen3-0.6B", None, Direction::Download)
//!     .await?;
//! let result = client
//!     .download(TransferRequest::new(vec![descriptor], "./weights", credential))
//!     .await?;
//! println!("{}", result.paths[0].display());
//! # Ok(())
//! # }
//! ```

mod client;

pub use client::CasClient;

pub use hubcas_config::Config;
pub use hubcas_errors::{Error, TransferError, TransferErrorKind, UserFacingError};
pub use hubcas_events::{EventMessage, EventReceiver, EventSender};
pub use hubcas_hub::Resolution;
pub use hubcas_transfer::{sweep_orphaned_staging, WorkerPool};
pub use hubcas_types::{
    AccessCredential, ContentDescriptor, Direction, PartialTransferResult, RepoId,
    TransferRequest, TransferResult, DEFAULT_REVISION,
};
pub use tokio_util::sync::CancellationToken;
