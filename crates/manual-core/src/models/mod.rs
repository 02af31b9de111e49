//! Data types shared by the store, the HTTP layer, and the client.
//!
//! - Records (this module) are what the store reads back.
//! - [`views`] are the JSON shapes served by the API.
//! - [`input`] are the request payloads accepted by create/update.

pub mod input;
pub mod views;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use input::{ManualParams, ManualWrite, StepAttributes, StepImageChange, Upload};
pub use views::{attachment_url, ManualDetail, ManualSummary, StepView};

/// A uniquely-named label shared between manuals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: i64,
    pub name: String,
}

/// Metadata of a stored file. The bytes live in the blob store under `key`.
#[derive(Debug, Clone, PartialEq)]
pub struct Attachment {
    pub id: i64,
    pub key: String,
    pub filename: String,
    pub content_type: Option<String>,
    pub byte_size: i64,
    /// `blake3:<hex>` digest of the content.
    pub checksum: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub id: i64,
    pub manual_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub position: i64,
    pub image: Option<Attachment>,
}

/// A manual with its steps in read order.
#[derive(Debug, Clone, PartialEq)]
pub struct Manual {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub thumbnail: Option<Attachment>,
    pub tags: Vec<Tag>,
    pub steps: Vec<Step>,
}

/// List-view projection of a manual: step bodies are never loaded.
#[derive(Debug, Clone, PartialEq)]
pub struct ManualOverview {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub updated_at: DateTime<Utc>,
    pub thumbnail: Option<Attachment>,
    pub tags: Vec<Tag>,
    pub step_count: i64,
}
