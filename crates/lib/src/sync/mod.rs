//! Client-side dispatch between the Local Replica and the remote service.
//!
//! A client talks to the [`Synchronizer`] only. Each call carries a
//! [`ConnectivityContext`] describing the caller right now, and the
//! synchronizer sends the call to exactly one [`RecordApi`] implementation:
//! the device-local [`LocalReplica`](crate::replica::LocalReplica), or the
//! remote store through a [`RemoteClient`] (or, in-process, a
//! [`SessionHandle`](crate::service::SessionHandle)).

pub mod error;
mod record_api;
mod remote;
mod synchronizer;

pub use error::SyncError;
pub use record_api::RecordApi;
pub use remote::RemoteClient;
pub use synchronizer::{ConnectivityContext, ImportSummary, Route, Synchronizer};
