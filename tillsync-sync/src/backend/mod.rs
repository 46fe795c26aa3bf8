//! Remote replay backends.
//!
//! The remote system is reached through [`RemoteBackend`]: one call per
//! operation kind plus the reference-data reads that feed the cache mirror.

pub mod http;
pub mod memory;
pub mod remote;

pub use http::{HttpBackend, HttpBackendConfig};
pub use memory::{FailureHook, MemoryBackend};
pub use remote::{FailureKind, RemoteBackend, RemoteError, RemoteResult, replay};
