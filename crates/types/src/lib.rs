#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Core type definitions for the hubcas client
//!
//! This crate provides the data model shared by resolution, credential
//! issuance and the transfer engine.

pub mod chunk;
pub mod credential;
pub mod descriptor;
pub mod repo;
pub mod transfer;

// Re-export commonly used types
pub use chunk::ChunkHandle;
pub use credential::{AccessCredential, CredentialScope, Direction};
pub use descriptor::ContentDescriptor;
pub use repo::{RepoId, RepoType};
pub use transfer::{PartialTransferResult, TransferRequest, TransferResult};

/// Revision used when the caller does not name one
pub const DEFAULT_REVISION: &str = "main";
