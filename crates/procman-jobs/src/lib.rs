//! Job status tracking and result memoization for procman.
//!
//! Every unit of work submitted to a process is tracked by a
//! [`JobStatusRecord`] addressed by job id, and every computed result is
//! memoized under the fingerprint of the inputs that produced it. Both live
//! in the same key-value store, separated by namespace.
//!
//! # Module Organization
//!
//! - [`store`] - The [`CacheBackend`](store::CacheBackend) contract, its
//!   in-memory and Redis implementations, and the [`JobStore`] and
//!   [`ResultCache`] views layered on top of it
//! - [`record`] - The job status record and the result it points at
//! - [`status`] - Job lifecycle states and their transition rules
//! - [`page`] - Offset/limit pagination shared by every listing
//! - [`error`] - [`JobError`], raised by the domain stores
//! - [`constants`] - Key namespaces and link relation names

pub mod constants;
pub mod error;
pub mod page;
pub mod record;
pub mod status;
pub mod store;

pub use constants::*;
pub use error::JobError;
pub use page::Page;
pub use record::{JobResult, JobStatusRecord, Link};
pub use status::JobStatus;
pub use store::jobs::JobStore;
pub use store::memory::InMemoryBackend;
pub use store::results::ResultCache;
pub use store::{CacheBackend, ListJobsOptions, StorageError, StoreConfig};
