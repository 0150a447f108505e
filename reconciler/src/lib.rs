//! Reconciliation core for fleetman-managed node groups.
//!
//! One reconciliation pass is sequential and synchronous: cloud state
//! discovery ([`cloud::CloudStateAggregator`]) feeds drift and rotation
//! evaluation ([`launch::LaunchResourceManager`]), which performs any
//! create/update/delete actions. Each pass operates on its own private
//! state; concurrent passes for different node groups never contend on
//! shared memory.

pub mod cloud;
pub mod config;
pub mod drift;
mod error;
pub mod launch;
pub mod pass;
pub mod versions;

pub use crate::error::{Error, Result};
pub use crate::pass::{reconcile_once, ReconcileInput};
