//! # quickmt-server
//!
//! The HTTP surface of the translation gateway:
//!
//! - JSON endpoints under `/api`: translate, identify-language, models,
//!   languages, health
//! - error mapping from the runtime taxonomy to status codes with
//!   `{"detail": ...}` bodies
//! - graceful shutdown via `CancellationToken` coordination

#![deny(unsafe_code)]

pub mod api;
pub mod error;
pub mod server;
pub mod shutdown;
pub mod state;

pub use server::GatewayServer;
pub use state::AppState;
