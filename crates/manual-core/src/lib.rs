//! Manual Core - Headless library for Awesome Manual.
//!
//! Manuals are ordered step-by-step guides with tags, a thumbnail and
//! optional per-step images. This crate owns persistence (SQLite), attachment
//! storage and validation. The HTTP layer lives in `manual-server`.
//!
//! # Example
//!
//! ```rust,ignore
//! use manual_core::{DataPaths, ManualParams, ManualService, ManualWrite};
//!
//! #[tokio::main]
//! async fn main() -> manual_core::Result<()> {
//!     let service = ManualService::open(&DataPaths::new("/path/to/data"))?;
//!
//!     let params = ManualParams {
//!         title: Some("Git Basics".into()),
//!         ..Default::default()
//!     };
//!     let manual = service.create(ManualWrite::new(params)).await?;
//!     println!("Created manual {}", manual.id);
//!
//!     Ok(())
//! }
//! ```

pub mod attachments;
pub mod config;
pub mod error;
pub mod models;
pub mod seed;
pub mod service;
pub mod store;
pub mod validation;

// Re-export commonly used types
pub use attachments::{Attachments, BlobStore, DiskBlobStore, StagedBlob};
pub use config::{ApiConfig, AppConfig, DataPaths, SeedConfig, ServerConfig};
pub use error::{ManualError, Result};
pub use models::{
    attachment_url, Attachment, Manual, ManualDetail, ManualOverview, ManualParams,
    ManualSummary, ManualWrite, Step, StepAttributes, StepImageChange, StepView, Tag, Upload,
};
pub use seed::{seed_demo_content, SeedReport};
pub use service::ManualService;
pub use store::{ManualStore, StepImageOutcome};
