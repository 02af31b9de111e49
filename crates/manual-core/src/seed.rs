//! Demo content for a fresh database.

use crate::config::{AppConfig, SeedConfig};
use crate::error::{ManualError, Result};
use crate::models::{ManualParams, ManualWrite, StepAttributes, StepImageChange, Upload};
use crate::service::ManualService;
use tracing::{info, warn};

const DEMO_TAGS: [&str; 8] = [
    "Training",
    "New Hire Education",
    "Onboarding",
    "HR",
    "General Affairs",
    "Development",
    "Sales",
    "Marketing",
];

struct DemoManual {
    title: &'static str,
    description: &'static str,
    image_seed: &'static str,
    /// Seed prefix for per-step images; `None` leaves steps without images.
    step_image_seed: Option<&'static str>,
    tags: &'static [&'static str],
    steps: &'static [(&'static str, &'static str)],
}

const DEMO_MANUALS: [DemoManual; 4] = [
    DemoManual {
        title: "Running New Hire Training",
        description: "The overall flow of the new hire training program and the points that matter most.",
        image_seed: "training",
        step_image_seed: Some("training-step"),
        tags: &["Training", "New Hire Education", "Onboarding"],
        steps: &[
            (
                "Prepare in advance",
                "Good preparation makes training work. Get materials ready, book the room, \
                 and contact participants, using a checklist so nothing is missed.",
            ),
            (
                "First-day orientation",
                "The first day matters most for settling in. Explain the mission and vision, \
                 introduce the organization, and walk through the basic rules.",
            ),
            (
                "Run job training",
                "Build the knowledge and skills the job needs. Mix lectures with hands-on \
                 exercises for training that sticks.",
            ),
            (
                "Follow up",
                "Keep following up after training to support growth. Use 1on1 meetings and \
                 a mentor program.",
            ),
        ],
    },
    DemoManual {
        title: "Remote Work Best Practices",
        description: "Guidelines for efficient, productive remote work.",
        image_seed: "remote-work",
        step_image_seed: Some("remote-step"),
        tags: &["HR", "Development"],
        steps: &[
            (
                "Set up your workspace",
                "A comfortable workspace is the first step to productivity. Secure a proper \
                 desk and chair, enough light, and a stable internet connection.",
            ),
            (
                "Use communication tools well",
                "Pick between Slack, Zoom and Microsoft Teams by purpose and keep \
                 communication with the team smooth.",
            ),
            (
                "Manage your time",
                "Staying focused at home is hard. Try the Pomodoro technique and take \
                 regular breaks.",
            ),
        ],
    },
    DemoManual {
        title: "Filing Expense Reports",
        description: "The flow from submitting an expense claim to approval.",
        image_seed: "expense",
        step_image_seed: None,
        tags: &["General Affairs"],
        steps: &[
            (
                "Create the expense claim",
                "Gather the receipts and enter them in the expense system.",
            ),
            (
                "Manager approval",
                "Your manager reviews the claim and approves or returns it.",
            ),
            (
                "Accounting",
                "Accounting checks the approved claim and processes the payment.",
            ),
        ],
    },
    DemoManual {
        title: "Git Basics",
        description: "The Git basics every developer on the team needs.",
        image_seed: "git",
        step_image_seed: None,
        tags: &["Development"],
        steps: &[
            (
                "Clone the repository",
                "Copy the remote repository locally with git clone.",
            ),
            (
                "Create and switch branches",
                "Start each feature or bug fix on a new branch.",
            ),
            (
                "Commit and push",
                "Commit your changes and push them to the remote repository.",
            ),
        ],
    },
];

/// Counts of what seeding produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeedReport {
    /// True when the database already had manuals and nothing was inserted.
    pub skipped: bool,
    pub manuals: usize,
    pub tags: usize,
    pub steps: usize,
    pub thumbnails: usize,
    pub step_images: usize,
}

/// Insert the demo manuals into an empty database.
///
/// Images are fetched from `<image_base>/<seed>/<width>/<height>`. With no
/// `image_base` the manuals are created without images. A failed fetch only
/// logs a warning.
pub async fn seed_demo_content(
    service: &ManualService,
    image_base: Option<&str>,
) -> Result<SeedReport> {
    let store = service.store().clone();
    let existing = tokio::task::spawn_blocking(move || store.count_manuals())
        .await
        .map_err(|e| ManualError::Other(format!("Store task failed: {}", e)))??;
    if existing > 0 {
        info!("Database already has {} manuals, skipping seed", existing);
        return Ok(SeedReport {
            skipped: true,
            ..Default::default()
        });
    }

    let tags = service
        .resolve_tags(DEMO_TAGS.iter().map(|name| name.to_string()).collect())
        .await?;

    let fetcher = match image_base {
        Some(base) => Some(ImageFetcher::new(base)?),
        None => None,
    };

    let mut report = SeedReport {
        tags: tags.len(),
        ..Default::default()
    };

    for demo in &DEMO_MANUALS {
        let params = ManualParams {
            title: Some(demo.title.to_string()),
            description: Some(Some(demo.description.to_string())),
            tag_names: Some(demo.tags.iter().map(|t| t.to_string()).collect()),
            steps_attributes: Some(
                demo.steps
                    .iter()
                    .zip(1..)
                    .map(|((title, description), position)| {
                        StepAttributes::new(*title, Some(description.to_string()), position)
                    })
                    .collect(),
            ),
        };

        let mut write = ManualWrite::new(params);
        if let Some(fetcher) = &fetcher {
            let (w, h) = SeedConfig::THUMBNAIL_SIZE;
            let filename = format!("{}_thumbnail.jpg", demo.image_seed.replace('-', "_"));
            if let Some(upload) = fetcher.fetch(demo.image_seed, w, h, &filename).await {
                write = write.with_thumbnail(upload);
            }
        }

        let created = service.create(write).await?;
        report.manuals += 1;
        report.steps += created.steps.len();
        if created.thumbnail_url.is_some() {
            report.thumbnails += 1;
        }

        if let (Some(fetcher), Some(prefix)) = (&fetcher, demo.step_image_seed) {
            let (w, h) = SeedConfig::STEP_IMAGE_SIZE;
            let mut images = ManualWrite::new(ManualParams::default());
            for (step, index) in created.steps.iter().zip(1..) {
                let seed = format!("{}-{}", prefix, index);
                let filename = format!("{}.jpg", seed.replace('-', "_"));
                if let Some(upload) = fetcher.fetch(&seed, w, h, &filename).await {
                    images = images.with_step_image(step.id, StepImageChange::Attach(upload));
                }
            }
            if !images.step_images.is_empty() {
                let updated = service.update(created.id, images).await?;
                report.step_images += updated
                    .steps
                    .iter()
                    .filter(|s| s.image_url.is_some())
                    .count();
            }
        }
    }

    info!(
        "Seeded {} manuals, {} tags, and {} steps ({} thumbnails, {} step images)",
        report.manuals, report.tags, report.steps, report.thumbnails, report.step_images
    );
    Ok(report)
}

struct ImageFetcher {
    client: reqwest::Client,
    base: String,
}

impl ImageFetcher {
    fn new(base: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(SeedConfig::FETCH_TIMEOUT)
            .user_agent(AppConfig::USER_AGENT)
            .build()?;
        Ok(Self {
            client,
            base: base.trim_end_matches('/').to_string(),
        })
    }

    async fn fetch(&self, seed: &str, width: u32, height: u32, filename: &str) -> Option<Upload> {
        let url = format!("{}/{}/{}/{}", self.base, seed, width, height);
        match self.download(&url).await {
            Ok(data) => Some(Upload::new(filename, Some("image/jpeg".to_string()), data)),
            Err(e) => {
                warn!("Could not fetch seed image {}: {}", url, e);
                None
            }
        }
    }

    async fn download(&self, url: &str) -> Result<bytes::Bytes> {
        let response = self.client.get(url).send().await?.error_for_status()?;
        Ok(response.bytes().await?)
    }
}
