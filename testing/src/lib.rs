//! # Record Relay Testing
//!
//! Testing utilities for Record Relay.
//!
//! This crate provides:
//! - [`InMemoryTransport`]: records requests and answers them through a responder
//! - [`fixtures`]: a sample configuration, action configs, scope and bodies
//! - [`CycleTest`]: Given-When-Then harness for the orchestrator
//!
//! ## Example
//!
//! ```
//! use record_relay_runtime::transport::Transport;
//! use record_relay_testing::{InMemoryTransport, fixtures};
//!
//! # tokio_test::block_on(async {
//! let transport = InMemoryTransport::new();
//! let configs = fixtures::sample_action_configs();
//! let objs = fixtures::sample_objs();
//! let request = fixtures::sample_request(
//!     &fixtures::sample_config(),
//!     &configs[0],
//!     &fixtures::scope_values(),
//!     &objs[fixtures::CITIES],
//! );
//!
//! transport.send(&request).await.unwrap();
//! assert_eq!(transport.requests(), vec![request]);
//! # });
//! ```

pub mod fixtures;

mod cycle_test;
mod transport;

pub use cycle_test::{CycleTest, Outputs};
pub use transport::{InMemoryTransport, Responder, error_response, ok_response};
