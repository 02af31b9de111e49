//! Manual Client - typed wrapper around the Awesome Manual REST API.
//!
//! Writes go out as JSON unless a file is attached, in which case the body is
//! `multipart/form-data` with tag names as repeated `manual[tag_names][]`
//! fields and the step list as a JSON string in `manual[steps_attributes]`.
//!
//! Every failure, whether transport or a non-2xx status, is reported as a
//! [`ClientError`] naming the operation and nothing more.

use manual_core::{
    ApiConfig, AppConfig, ManualDetail, ManualParams, ManualSummary, ManualWrite,
    StepImageChange, Upload,
};
use reqwest::multipart::{Form, Part};
use reqwest::RequestBuilder;
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::debug;
use url::Url;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A failed client call. The underlying cause is logged, not carried.
#[derive(Debug, Error)]
#[error("Failed to {operation}")]
pub struct ClientError {
    operation: &'static str,
}

impl ClientError {
    fn new(operation: &'static str, cause: impl std::fmt::Display) -> Self {
        debug!("{} failed: {}", operation, cause);
        Self { operation }
    }

    /// The operation that failed, e.g. `"create manual"`.
    pub fn operation(&self) -> &str {
        self.operation
    }
}

/// Client for one manual server.
#[derive(Debug, Clone)]
pub struct ManualClient {
    http: reqwest::Client,
    base: Url,
}

impl ManualClient {
    /// Client for the server at `base_url`, e.g. `http://127.0.0.1:3000`.
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        const OPERATION: &str = "configure client";
        let base = Url::parse(base_url).map_err(|e| ClientError::new(OPERATION, e))?;
        let http = reqwest::Client::builder()
            .user_agent(AppConfig::USER_AGENT)
            .build()
            .map_err(|e| ClientError::new(OPERATION, e))?;
        Ok(Self::with_client(http, base))
    }

    pub fn with_client(http: reqwest::Client, base: Url) -> Self {
        Self { http, base }
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn endpoint(&self, operation: &'static str, path: &str) -> Result<Url, ClientError> {
        self.base
            .join(path)
            .map_err(|e| ClientError::new(operation, e))
    }

    fn manual_endpoint(&self, operation: &'static str, id: i64) -> Result<Url, ClientError> {
        self.endpoint(operation, &format!("{}/{}", ApiConfig::MANUALS_PATH, id))
    }

    async fn send(
        &self,
        operation: &'static str,
        request: RequestBuilder,
    ) -> Result<reqwest::Response, ClientError> {
        let response = request
            .send()
            .await
            .map_err(|e| ClientError::new(operation, e))?;
        debug!("{} -> {}", operation, response.status());
        response
            .error_for_status()
            .map_err(|e| ClientError::new(operation, e))
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        request: RequestBuilder,
    ) -> Result<T, ClientError> {
        self.send(operation, request)
            .await?
            .json::<T>()
            .await
            .map_err(|e| ClientError::new(operation, e))
    }

    pub async fn get_manuals(&self) -> Result<Vec<ManualSummary>, ClientError> {
        const OPERATION: &str = "fetch manuals";
        let url = self.endpoint(OPERATION, ApiConfig::MANUALS_PATH)?;
        self.send_json(OPERATION, self.http.get(url)).await
    }

    pub async fn get_manual(&self, id: i64) -> Result<ManualDetail, ClientError> {
        const OPERATION: &str = "fetch manual";
        let url = self.manual_endpoint(OPERATION, id)?;
        self.send_json(OPERATION, self.http.get(url)).await
    }

    /// Create a manual. Step images are not sent: new steps have no ids yet.
    pub async fn create_manual(&self, write: ManualWrite) -> Result<ManualDetail, ClientError> {
        const OPERATION: &str = "create manual";
        let url = self.endpoint(OPERATION, ApiConfig::MANUALS_PATH)?;
        let write = ManualWrite {
            step_images: BTreeMap::new(),
            ..write
        };
        let request = self.with_body(OPERATION, self.http.post(url), write)?;
        self.send_json(OPERATION, request).await
    }

    pub async fn update_manual(
        &self,
        id: i64,
        write: ManualWrite,
    ) -> Result<ManualDetail, ClientError> {
        const OPERATION: &str = "update manual";
        let url = self.manual_endpoint(OPERATION, id)?;
        let request = self.with_body(OPERATION, self.http.patch(url), write)?;
        self.send_json(OPERATION, request).await
    }

    pub async fn delete_manual(&self, id: i64) -> Result<(), ClientError> {
        const OPERATION: &str = "delete manual";
        let url = self.manual_endpoint(OPERATION, id)?;
        self.send(OPERATION, self.http.delete(url)).await?;
        Ok(())
    }

    /// Download an attachment by the `thumbnail_url`/`image_url` the API returned.
    pub async fn fetch_attachment(&self, url: &str) -> Result<Vec<u8>, ClientError> {
        const OPERATION: &str = "fetch attachment";
        let url = self.endpoint(OPERATION, url)?;
        let bytes = self
            .send(OPERATION, self.http.get(url))
            .await?
            .bytes()
            .await
            .map_err(|e| ClientError::new(OPERATION, e))?;
        Ok(bytes.to_vec())
    }

    fn with_body(
        &self,
        operation: &'static str,
        request: RequestBuilder,
        write: ManualWrite,
    ) -> Result<RequestBuilder, ClientError> {
        if needs_multipart(&write) {
            let form = multipart_body(write).map_err(|e| ClientError::new(operation, e))?;
            Ok(request.multipart(form))
        } else {
            Ok(request.json(&json_body(&write)))
        }
    }
}

/// Multipart is only needed when a file travels with the write.
pub fn needs_multipart(write: &ManualWrite) -> bool {
    write.thumbnail.is_some()
        || write
            .step_images
            .values()
            .any(|change| matches!(change, StepImageChange::Attach(_)))
}

/// `{manual: {...}, step_images?: {<id>: "null"}}`.
pub fn json_body(write: &ManualWrite) -> Value {
    let mut removals = Map::new();
    for (step_id, change) in &write.step_images {
        if let StepImageChange::Remove = change {
            removals.insert(
                step_id.to_string(),
                Value::from(ApiConfig::REMOVE_IMAGE_SIGNAL),
            );
        }
    }

    let mut body = json!({ "manual": write.params });
    if !removals.is_empty() {
        body["step_images"] = Value::Object(removals);
    }
    body
}

fn file_part(upload: Upload) -> Result<Part, BoxError> {
    let part = Part::bytes(upload.data.to_vec()).file_name(upload.filename);
    Ok(match upload.content_type {
        Some(content_type) => part.mime_str(&content_type)?,
        None => part,
    })
}

/// Encode a write as `multipart/form-data`.
pub fn multipart_body(write: ManualWrite) -> Result<Form, BoxError> {
    let ManualWrite {
        params,
        thumbnail,
        step_images,
    } = write;
    let ManualParams {
        title,
        description,
        tag_names,
        steps_attributes,
    } = params;

    let mut form = Form::new();
    if let Some(title) = title {
        form = form.text("manual[title]", title);
    }
    // Multipart has no null; an empty value clears the description
    if let Some(description) = description {
        form = form.text("manual[description]", description.unwrap_or_default());
    }
    match tag_names {
        // A lone empty value tells the server to clear the tags
        Some(names) if names.is_empty() => form = form.text("manual[tag_names][]", ""),
        Some(names) => {
            for name in names {
                form = form.text("manual[tag_names][]", name);
            }
        }
        None => {}
    }
    if let Some(steps) = steps_attributes {
        form = form.text("manual[steps_attributes]", serde_json::to_string(&steps)?);
    }
    if let Some(upload) = thumbnail {
        form = form.part("manual[thumbnail]", file_part(upload)?);
    }
    for (step_id, change) in step_images {
        let name = format!("step_images[{}]", step_id);
        form = match change {
            StepImageChange::Attach(upload) => form.part(name, file_part(upload)?),
            StepImageChange::Remove => form.text(name, ApiConfig::REMOVE_IMAGE_SIGNAL),
        };
    }
    Ok(form)
}
