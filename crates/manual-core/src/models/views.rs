//! JSON response shapes.

use super::{Manual, ManualOverview, Step, Tag};
use crate::config::ApiConfig;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Public path of a stored attachment.
pub fn attachment_url(key: &str) -> String {
    format!("{}/{}", ApiConfig::ATTACHMENTS_PATH, key)
}

/// One entry of `GET /api/v1/manuals`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManualSummary {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub tags: Vec<Tag>,
    pub updated_at: DateTime<Utc>,
    pub step_count: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
}

/// Full manual as returned by show/create/update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManualDetail {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub tags: Vec<Tag>,
    pub steps: Vec<StepView>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepView {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub position: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl From<&ManualOverview> for ManualSummary {
    fn from(overview: &ManualOverview) -> Self {
        Self {
            id: overview.id,
            title: overview.title.clone(),
            description: overview.description.clone(),
            tags: overview.tags.clone(),
            updated_at: overview.updated_at,
            step_count: overview.step_count,
            thumbnail_url: overview.thumbnail.as_ref().map(|a| attachment_url(&a.key)),
        }
    }
}

impl From<&Step> for StepView {
    fn from(step: &Step) -> Self {
        Self {
            id: step.id,
            title: step.title.clone(),
            description: step.description.clone(),
            position: step.position,
            image_url: step.image.as_ref().map(|a| attachment_url(&a.key)),
        }
    }
}

impl From<&Manual> for ManualDetail {
    fn from(manual: &Manual) -> Self {
        Self {
            id: manual.id,
            title: manual.title.clone(),
            description: manual.description.clone(),
            tags: manual.tags.clone(),
            steps: manual.steps.iter().map(StepView::from).collect(),
            updated_at: manual.updated_at,
            thumbnail_url: manual.thumbnail.as_ref().map(|a| attachment_url(&a.key)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Attachment;
    use serde_json::json;

    fn attachment(key: &str) -> Attachment {
        Attachment {
            id: 1,
            key: key.to_string(),
            filename: "cover.png".to_string(),
            content_type: Some("image/png".to_string()),
            byte_size: 3,
            checksum: "blake3:00".to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_summary_omits_missing_thumbnail() {
        let overview = ManualOverview {
            id: 7,
            title: "Onboarding".to_string(),
            description: None,
            updated_at: Utc::now(),
            thumbnail: None,
            tags: vec![Tag { id: 1, name: "hr".to_string() }],
            step_count: 3,
        };
        let value = serde_json::to_value(ManualSummary::from(&overview)).unwrap();
        assert!(value.get("thumbnail_url").is_none());
        assert_eq!(value["step_count"], json!(3));
        assert!(value.get("steps").is_none());
    }

    #[test]
    fn test_detail_renders_attachment_urls() {
        let now = Utc::now();
        let manual = Manual {
            id: 1,
            title: "Git basics".to_string(),
            description: Some("Clone, branch, commit".to_string()),
            created_at: now,
            updated_at: now,
            thumbnail: Some(attachment("0123456789abcdef0123456789abcdef")),
            tags: vec![],
            steps: vec![
                Step {
                    id: 10,
                    manual_id: 1,
                    title: "Clone".to_string(),
                    description: None,
                    position: 1,
                    image: None,
                },
                Step {
                    id: 11,
                    manual_id: 1,
                    title: "Branch".to_string(),
                    description: None,
                    position: 2,
                    image: Some(attachment("fedcba9876543210fedcba9876543210")),
                },
            ],
        };

        let detail = ManualDetail::from(&manual);
        assert_eq!(
            detail.thumbnail_url.as_deref(),
            Some("/api/v1/attachments/0123456789abcdef0123456789abcdef")
        );
        let value = serde_json::to_value(&detail).unwrap();
        assert!(value["steps"][0].get("image_url").is_none());
        assert_eq!(
            value["steps"][1]["image_url"],
            json!("/api/v1/attachments/fedcba9876543210fedcba9876543210")
        );
    }
}
