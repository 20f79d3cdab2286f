//! Reconciliation of locally cached sessions with durable storage.

mod reconcile;
mod sink;

pub use reconcile::{reconcile, ReconcileReport};
pub use sink::{HttpSink, SessionSink};
