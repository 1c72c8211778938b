//! Network stack
//!
//! Blocking HTTP behind the [`Transport`] trait, so the engine can be driven
//! by an in-memory transport in tests.

mod client;
mod request;
mod response;

pub use client::{NetworkClient, Transport, ACCEPT_MARKUP};
#[cfg(test)]
pub use client::MockTransport;
pub use request::{Method, Request};
pub use response::Response;
