//! Client side of the cert daemon IPC: wire types, transport, error surface.

pub mod client;
mod error;
pub mod protocol;

pub use client::{DaemonClient, SocketClient};
pub use error::{DaemonError, DUPLICATE_CODE, NOT_FOUND_CODE};
pub use protocol::{DaemonRequest, DaemonResponse, ResubmitParams, SubmitParams};
