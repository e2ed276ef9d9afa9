//! Polling client for the chatroom.
//!
//! [`ChatClient`] is a typed HTTP client for the server API; [`Poller`]
//! drives the recurring check-then-maybe-refresh cycle against it and
//! pushes whole-set snapshots into a [`MessageView`].

mod client;
mod poller;

pub use client::{ChatClient, ClientError};
pub use poller::{MessageView, Poller, PollerConfig, PollerState};
