//! Store contract consumed by the trellis engine.
//!
//! This crate defines the persistence seams the engine resolves runs
//! and task instances through:
//! - run records (find, atomic get-or-create, cascading delete)
//! - task instance records (find, insert, state updates, listing)
//! - published workflow versions (publish, latest)
//!
//! The in-memory adapter is deterministic and test-friendly. Production
//! deployments put a transactional backend behind the same traits.

#![deny(unsafe_code)]
#![warn(rust_2018_idioms)]

mod error;
pub mod memory;
mod traits;

pub use error::{StoreError, StoreResult};
pub use memory::InMemoryStore;
pub use traits::{PlatformStore, RunSelector, RunStore, TaskInstanceStore, WorkflowVersionStore};
