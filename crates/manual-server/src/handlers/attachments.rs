//! Serving stored thumbnails and step images.

use crate::error::ApiError;
use crate::server::AppState;
use axum::extract::{Path, State};
use axum::http::{header, HeaderValue};
use axum::response::{IntoResponse, Response};
use std::sync::Arc;

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

pub async fn show_attachment(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
) -> Result<Response, ApiError> {
    let (attachment, data) = state.service.attachment(&key).await?;

    let content_type = attachment
        .content_type
        .filter(|ct| HeaderValue::from_str(ct).is_ok())
        .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string());
    let disposition = format!(
        "inline; filename=\"{}\"",
        header_safe_filename(&attachment.filename)
    );

    Ok((
        [
            (header::CONTENT_TYPE, content_type),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        data,
    )
        .into_response())
}

/// Filename restricted to printable ASCII without quotes or backslashes.
fn header_safe_filename(filename: &str) -> String {
    filename
        .chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c.is_ascii_graphic() || c == ' ' => c,
            _ => '_',
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_safe_filename() {
        assert_eq!(header_safe_filename("cover photo.png"), "cover photo.png");
        assert_eq!(header_safe_filename("a\"b\\c.jpg"), "a_b_c.jpg");
        assert_eq!(header_safe_filename("写真.jpg"), "__.jpg");
    }
}
