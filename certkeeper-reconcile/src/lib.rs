//! # certkeeper-reconcile
//!
//! Declarative reconciliation of certificate slots against the cert daemon.
//!
//! [`find_match`] locates the tracked request for a storage location,
//! [`plan`] turns desired state plus match into a daemon operation,
//! [`Reconciler`] executes it, and [`wait_for_terminal`] observes issuance.

pub mod error;
pub mod matcher;
pub mod reconciler;
pub mod waiter;

pub use error::ReconcileError;
pub use matcher::find_match;
pub use reconciler::{plan, Plan, Reconciler};
pub use waiter::{wait_for_resubmission, wait_for_terminal, WaitError, WaitSettings};
