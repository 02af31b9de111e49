//! Request payloads for manual create/update.
//!
//! The wire format is forgiving in the same places browsers and form encoders
//! are: `steps_attributes` may arrive as a JSON-encoded string, numeric fields
//! may arrive as strings, and `_destroy` follows the usual form-boolean rules
//! (`false`, `0`, `"f"`, `"off"` and friends are false, anything else true).

use crate::error::{ManualError, Result};
use bytes::Bytes;
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Scalar fields and nested children of a manual write.
///
/// `None` means "leave unchanged" on update and "not supplied" on create.
/// `description` distinguishes an absent key (`None`) from an explicit
/// `null` (`Some(None)`), which clears it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ManualParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_nullable"
    )]
    pub description: Option<Option<String>>,
    /// Replaces the manual's tag set when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag_names: Option<Vec<String>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_steps"
    )]
    pub steps_attributes: Option<Vec<StepAttributes>>,
}

/// One step descriptor: with `id` it edits (or destroys) an existing step,
/// without `id` it creates a new one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepAttributes {
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_lenient_i64"
    )]
    pub id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_nullable"
    )]
    pub description: Option<Option<String>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_lenient_i64"
    )]
    pub position: Option<i64>,
    #[serde(
        rename = "_destroy",
        default,
        skip_serializing_if = "is_false",
        deserialize_with = "deserialize_flag"
    )]
    pub destroy: bool,
}

impl StepAttributes {
    /// A new step at `position`.
    pub fn new(title: impl Into<String>, description: Option<String>, position: i64) -> Self {
        Self {
            id: None,
            title: Some(title.into()),
            description: description.map(Some),
            position: Some(position),
            destroy: false,
        }
    }

    /// A descriptor that destroys the step with `id`.
    pub fn destroy(id: i64) -> Self {
        Self {
            id: Some(id),
            destroy: true,
            ..Default::default()
        }
    }

    /// Parse the JSON string carried by a multipart `steps_attributes` field.
    pub fn parse_list(encoded: &str) -> Result<Vec<StepAttributes>> {
        serde_json::from_str(encoded).map_err(|e| ManualError::InvalidPayload {
            message: format!("steps_attributes is not a valid JSON array: {}", e),
        })
    }
}

/// An uploaded file.
#[derive(Debug, Clone, PartialEq)]
pub struct Upload {
    pub filename: String,
    pub content_type: Option<String>,
    pub data: Bytes,
}

impl Upload {
    pub fn new(
        filename: impl Into<String>,
        content_type: Option<String>,
        data: impl Into<Bytes>,
    ) -> Self {
        Self {
            filename: filename.into(),
            content_type,
            data: data.into(),
        }
    }
}

/// Change to a single step's image.
#[derive(Debug, Clone, PartialEq)]
pub enum StepImageChange {
    /// Attach the file, replacing any existing image.
    Attach(Upload),
    /// Remove the existing image without replacement.
    Remove,
}

/// Everything a create/update request carries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ManualWrite {
    pub params: ManualParams,
    pub thumbnail: Option<Upload>,
    /// Keyed by step id; applied after the main write.
    pub step_images: BTreeMap<i64, StepImageChange>,
}

impl ManualWrite {
    pub fn new(params: ManualParams) -> Self {
        Self {
            params,
            ..Default::default()
        }
    }

    pub fn with_thumbnail(mut self, upload: Upload) -> Self {
        self.thumbnail = Some(upload);
        self
    }

    pub fn with_step_image(mut self, step_id: i64, change: StepImageChange) -> Self {
        self.step_images.insert(step_id, change);
        self
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// Present keys become `Some`, so a `null` survives as `Some(None)`.
fn deserialize_nullable<'de, D>(deserializer: D) -> std::result::Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StepsField {
    List(Vec<StepAttributes>),
    Encoded(String),
}

fn deserialize_steps<'de, D>(deserializer: D) -> std::result::Result<Option<Vec<StepAttributes>>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<StepsField>::deserialize(deserializer)? {
        None => Ok(None),
        Some(StepsField::List(steps)) => Ok(Some(steps)),
        Some(StepsField::Encoded(encoded)) => serde_json::from_str(&encoded)
            .map(Some)
            .map_err(de::Error::custom),
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum IntOrText {
    Int(i64),
    Text(String),
}

fn deserialize_lenient_i64<'de, D>(deserializer: D) -> std::result::Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<IntOrText>::deserialize(deserializer)? {
        None => Ok(None),
        Some(IntOrText::Int(value)) => Ok(Some(value)),
        Some(IntOrText::Text(text)) if text.trim().is_empty() => Ok(None),
        Some(IntOrText::Text(text)) => text
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| de::Error::custom(format!("expected an integer, got {:?}", text))),
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum FlagValue {
    Bool(bool),
    Int(i64),
    Text(String),
}

fn deserialize_flag<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<FlagValue>::deserialize(deserializer)? {
        None => false,
        Some(FlagValue::Bool(value)) => value,
        Some(FlagValue::Int(value)) => value != 0,
        Some(FlagValue::Text(text)) => !is_false_text(text.trim()),
    })
}

/// Blank text and the usual false spellings; every other value is true.
fn is_false_text(text: &str) -> bool {
    text.is_empty()
        || ["0", "f", "false", "off"]
            .iter()
            .any(|falsy| text.eq_ignore_ascii_case(falsy))
}
