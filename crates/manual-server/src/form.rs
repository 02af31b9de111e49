//! Request body decoding for manual create/update.
//!
//! Clients post `multipart/form-data` when a file is attached and JSON
//! otherwise. Both decode into a [`ManualWrite`].
//!
//! Multipart field names:
//! - `manual[title]`, `manual[description]`: plain text; an empty description clears it
//! - `manual[tag_names][]`: repeated once per tag; a single empty value clears the tags
//! - `manual[steps_attributes]`: JSON-encoded array of step descriptors
//! - `manual[thumbnail]`: file
//! - `step_images[<step id>]`: file, or the literal `null` to remove the image

use crate::error::ApiError;
use axum::extract::multipart::{Field, MultipartError};
use axum::extract::{FromRequest, Multipart, Request};
use axum::http::{header, HeaderMap};
use bytes::Bytes;
use manual_core::{ApiConfig, ManualParams, ManualWrite, StepAttributes, StepImageChange, Upload};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::debug;

const TITLE_FIELD: &str = "manual[title]";
const DESCRIPTION_FIELD: &str = "manual[description]";
const TAG_NAMES_FIELD: &str = "manual[tag_names][]";
const STEPS_FIELD: &str = "manual[steps_attributes]";
const THUMBNAIL_FIELD: &str = "manual[thumbnail]";
const STEP_IMAGES_PREFIX: &str = "step_images[";

/// Decoded create/update body.
#[derive(Debug)]
pub struct ManualForm(pub ManualWrite);

#[axum::async_trait]
impl<S> FromRequest<S> for ManualForm
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        if is_multipart(req.headers()) {
            let multipart = Multipart::from_request(req, state)
                .await
                .map_err(|rejection| ApiError::Rejected {
                    status: rejection.status(),
                    message: rejection.body_text(),
                })?;
            decode_multipart(multipart).await.map(ManualForm)
        } else {
            let body = Bytes::from_request(req, state)
                .await
                .map_err(|rejection| ApiError::Rejected {
                    status: rejection.status(),
                    message: rejection.body_text(),
                })?;
            decode_json(&body).map(ManualForm)
        }
    }
}

fn is_multipart(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(|ct| {
            ct.trim_start()
                .to_ascii_lowercase()
                .starts_with("multipart/form-data")
        })
        .unwrap_or(false)
}

fn missing_manual() -> ApiError {
    ApiError::BadRequest("param is missing or the value is empty: manual".to_string())
}

fn parse_step_id(key: &str) -> Option<i64> {
    key.trim().parse().ok()
}

/// Decode `{manual: {...}, step_images?: {<id>: "null"}}`.
///
/// The `manual` wrapper is optional: without it the top-level object, minus
/// `step_images`, holds the manual fields. JSON carries no files, so the only
/// step image change it can express is removal.
pub fn decode_json(body: &[u8]) -> Result<ManualWrite, ApiError> {
    let mut object = match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(object)) => object,
        Ok(_) => return Err(ApiError::BadRequest("JSON body must be an object".to_string())),
        Err(e) => return Err(ApiError::BadRequest(format!("Invalid JSON body: {}", e))),
    };

    let step_images = match object.remove("step_images") {
        None | Some(Value::Null) => Map::new(),
        Some(Value::Object(entries)) => entries,
        Some(_) => {
            return Err(ApiError::BadRequest(
                "step_images must be an object keyed by step id".to_string(),
            ))
        }
    };
    let fields = match object.remove("manual") {
        Some(Value::Null) => return Err(missing_manual()),
        Some(fields) => fields,
        None if object.is_empty() && step_images.is_empty() => return Err(missing_manual()),
        None => Value::Object(object),
    };
    let params: ManualParams = serde_json::from_value(fields)
        .map_err(|e| ApiError::BadRequest(format!("Invalid manual parameters: {}", e)))?;

    let mut write = ManualWrite::new(params);
    for (key, value) in step_images {
        match &value {
            Value::Null => {}
            Value::String(s) if s == ApiConfig::REMOVE_IMAGE_SIGNAL => {}
            _ => {
                return Err(ApiError::BadRequest(format!(
                    "step_images[{}] must be \"{}\" in a JSON body",
                    key,
                    ApiConfig::REMOVE_IMAGE_SIGNAL
                )))
            }
        }
        match parse_step_id(&key) {
            Some(step_id) => write = write.with_step_image(step_id, StepImageChange::Remove),
            None => debug!("Ignoring step_images entry with non-numeric id {:?}", key),
        }
    }
    Ok(write)
}

fn multipart_error(err: MultipartError) -> ApiError {
    ApiError::Rejected {
        status: err.status(),
        message: err.body_text(),
    }
}

async fn text(field: Field<'_>) -> Result<String, ApiError> {
    field.text().await.map_err(multipart_error)
}

/// Read a file field. An empty part with no filename (an unset file input)
/// counts as no file.
async fn upload(field: Field<'_>) -> Result<Option<Upload>, ApiError> {
    let filename = field.file_name().unwrap_or_default().to_string();
    let content_type = field.content_type().map(str::to_string);
    let data = field.bytes().await.map_err(multipart_error)?;
    if filename.is_empty() && data.is_empty() {
        return Ok(None);
    }
    Ok(Some(Upload::new(filename, content_type, data)))
}

/// Decode a `multipart/form-data` body using the field names above.
pub async fn decode_multipart(mut multipart: Multipart) -> Result<ManualWrite, ApiError> {
    let mut params = ManualParams::default();
    let mut thumbnail = None;
    let mut step_images = BTreeMap::new();
    let mut recognized = false;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };

        match name.as_str() {
            TITLE_FIELD => params.title = Some(text(field).await?),
            DESCRIPTION_FIELD => {
                // Multipart has no null; an empty value clears
                let value = text(field).await?;
                params.description = Some((!value.is_empty()).then_some(value));
            }
            TAG_NAMES_FIELD | "manual[tag_names]" => {
                let value = text(field).await?;
                let names = params.tag_names.get_or_insert_with(Vec::new);
                if !value.is_empty() {
                    names.push(value);
                }
            }
            STEPS_FIELD => {
                let encoded = text(field).await?;
                params.steps_attributes = Some(StepAttributes::parse_list(&encoded)?);
            }
            THUMBNAIL_FIELD => thumbnail = upload(field).await?,
            other => {
                let Some(key) = other
                    .strip_prefix(STEP_IMAGES_PREFIX)
                    .and_then(|rest| rest.strip_suffix(']'))
                else {
                    debug!("Ignoring multipart field {:?}", other);
                    continue;
                };

                let change = if field.file_name().is_some() {
                    upload(field).await?.map(StepImageChange::Attach)
                } else {
                    let value = text(field).await?;
                    if value == ApiConfig::REMOVE_IMAGE_SIGNAL {
                        Some(StepImageChange::Remove)
                    } else if value.is_empty() {
                        None
                    } else {
                        return Err(ApiError::BadRequest(format!(
                            "step_images[{}] must be a file or \"{}\"",
                            key,
                            ApiConfig::REMOVE_IMAGE_SIGNAL
                        )));
                    }
                };

                match (parse_step_id(key), change) {
                    (Some(step_id), Some(change)) => {
                        step_images.insert(step_id, change);
                    }
                    _ => debug!("Ignoring step_images entry {:?}", key),
                }
            }
        }
        recognized = true;
    }

    if !recognized {
        return Err(missing_manual());
    }

    Ok(ManualWrite {
        params,
        thumbnail,
        step_images,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_body_with_string_encoded_steps() {
        let body = br#"{
            "manual": {
                "title": "T",
                "tag_names": ["x", "x"],
                "steps_attributes": "[{\"title\":\"S1\",\"position\":\"1\"}]"
            }
        }"#;

        let write = decode_json(body).unwrap();
        assert_eq!(write.params.title.as_deref(), Some("T"));
        assert_eq!(write.params.tag_names.as_ref().unwrap().len(), 2);
        let steps = write.params.steps_attributes.unwrap();
        assert_eq!(steps[0].title.as_deref(), Some("S1"));
        assert_eq!(steps[0].position, Some(1));
        assert!(write.thumbnail.is_none());
    }

    #[test]
    fn test_json_step_image_removal() {
        let body = br#"{"manual": {}, "step_images": {"3": "null", "4": null, "abc": "null"}}"#;

        let write = decode_json(body).unwrap();
        assert_eq!(write.step_images.len(), 2);
        assert_eq!(write.step_images.get(&3), Some(&StepImageChange::Remove));
        assert_eq!(write.step_images.get(&4), Some(&StepImageChange::Remove));
    }

    #[test]
    fn test_json_without_manual_wrapper() {
        let body = br#"{
            "title": "T",
            "description": null,
            "tag_names": ["x", "x"],
            "steps_attributes": [{"title": "S1", "position": 1}],
            "step_images": {"9": "null"}
        }"#;

        let write = decode_json(body).unwrap();
        assert_eq!(write.params.title.as_deref(), Some("T"));
        assert_eq!(write.params.description, Some(None));
        assert_eq!(write.params.tag_names.as_ref().unwrap().len(), 2);
        assert_eq!(write.params.steps_attributes.unwrap()[0].position, Some(1));
        assert_eq!(write.step_images.get(&9), Some(&StepImageChange::Remove));

        let write = decode_json(br#"{"title": ""}"#).unwrap();
        assert_eq!(write.params.title.as_deref(), Some(""));
    }

    #[test]
    fn test_json_rejects_bad_bodies() {
        let bodies: [&[u8]; 8] = [
            b"not json",
            b"[1, 2]",
            b"{}",
            br#"{"manual": null}"#,
            br#"{"manual": "T"}"#,
            br#"{"manual": {"steps_attributes": "[{"}}"#,
            br#"{"steps_attributes": "[{"}"#,
            br#"{"manual": {}, "step_images": {"1": "file.png"}}"#,
        ];
        for body in bodies {
            assert!(
                matches!(decode_json(body), Err(ApiError::BadRequest(_))),
                "expected 400 for {}",
                String::from_utf8_lossy(body)
            );
        }
    }

    #[test]
    fn test_multipart_detection() {
        let mut headers = HeaderMap::new();
        assert!(!is_multipart(&headers));

        headers.insert(
            header::CONTENT_TYPE,
            "multipart/form-data; boundary=abc".parse().unwrap(),
        );
        assert!(is_multipart(&headers));

        headers.insert(header::CONTENT_TYPE, "application/json".parse().unwrap());
        assert!(!is_multipart(&headers));
    }
}
