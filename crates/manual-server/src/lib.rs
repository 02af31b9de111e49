//! Manual Server - REST API for Awesome Manual.
//!
//! Exposes `manual-core` over HTTP: JSON for plain writes, multipart when a
//! thumbnail or step image is attached.

pub mod error;
pub mod form;
pub mod handlers;
pub mod server;

pub use error::ApiError;
pub use form::ManualForm;
pub use server::{router, start_server, AppState};
