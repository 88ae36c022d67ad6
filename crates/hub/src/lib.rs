#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Hub-side collaborators of the CAS client
//!
//! [`ReferenceResolver`] turns a `(repo, path, revision)` reference into a
//! content descriptor by reading the Hub's pointer representation, and
//! [`CasAuthProvider`] exchanges a scope for a short-lived CAS credential.

mod auth;
mod metadata;
mod pointer;
mod resolver;

pub use auth::CasAuthProvider;
pub use metadata::{FileMetadata, DEFAULT_HUB_ENDPOINT};
pub use pointer::{parse_pointer, should_try_pointer, MAX_POINTER_SIZE};
pub use resolver::{ReferenceResolver, Resolution};

use hubcas_net::encode_segment;

/// Percent-encode each segment of a repository file path, keeping separators
pub(crate) fn encode_path(path: &str) -> String {
    path.split('/')
        .map(encode_segment)
        .collect::<Vec<_>>()
        .join("/")
}
