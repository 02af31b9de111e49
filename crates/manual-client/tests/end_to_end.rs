//! Client calls against a real server on an ephemeral port.

use manual_client::ManualClient;
use manual_core::{
    DataPaths, ManualParams, ManualService, ManualWrite, ServerConfig, StepAttributes,
    StepImageChange, Upload,
};
use manual_server::start_server;
use tempfile::TempDir;

async fn start() -> (ManualClient, TempDir) {
    let data = TempDir::new().expect("Failed to create temp dir");
    let service = ManualService::open(&DataPaths::new(data.path())).unwrap();
    let addr = start_server(service, "127.0.0.1", 0, ServerConfig::MAX_UPLOAD_BYTES)
        .await
        .unwrap();
    let client = ManualClient::new(&format!("http://{}", addr)).unwrap();
    (client, data)
}

fn png(name: &str, data: &'static [u8]) -> Upload {
    Upload::new(name, Some("image/png".into()), data)
}

fn params(title: &str, steps: &[&str]) -> ManualParams {
    ManualParams {
        title: Some(title.into()),
        description: Some(Some("How to".into())),
        tag_names: Some(vec!["x".into(), "x".into()]),
        steps_attributes: Some(
            steps
                .iter()
                .zip(1..)
                .map(|(title, position)| StepAttributes::new(*title, None, position))
                .collect(),
        ),
    }
}

#[tokio::test]
async fn test_json_round_trip() {
    let (client, _data) = start().await;

    let created = client
        .create_manual(ManualWrite::new(params("T", &["S1"])))
        .await
        .unwrap();
    assert_eq!(created.tags.len(), 1);
    assert_eq!(created.steps[0].title, "S1");
    assert_eq!(created.steps[0].position, 1);

    let listed = client.get_manuals().await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].step_count, 1);

    let fetched = client.get_manual(created.id).await.unwrap();
    assert_eq!(fetched, created);
}

#[tokio::test]
async fn test_multipart_create_and_step_images() {
    let (client, _data) = start().await;

    let created = client
        .create_manual(
            ManualWrite::new(params("Photos", &["one", "two"]))
                .with_thumbnail(png("cover.png", b"cover")),
        )
        .await
        .unwrap();
    assert_eq!(created.tags.len(), 1);
    assert_eq!(created.steps.len(), 2);
    let thumbnail = created.thumbnail_url.clone().unwrap();
    assert_eq!(client.fetch_attachment(&thumbnail).await.unwrap(), b"cover");

    let one = created.steps[0].id;
    let updated = client
        .update_manual(
            created.id,
            ManualWrite::new(ManualParams::default())
                .with_step_image(one, StepImageChange::Attach(png("one.png", b"one"))),
        )
        .await
        .unwrap();
    let image = updated.steps[0].image_url.clone().unwrap();
    assert_eq!(client.fetch_attachment(&image).await.unwrap(), b"one");

    // Removal alone travels as JSON
    let updated = client
        .update_manual(
            created.id,
            ManualWrite::new(ManualParams::default()).with_step_image(one, StepImageChange::Remove),
        )
        .await
        .unwrap();
    assert!(updated.steps[0].image_url.is_none());
    assert!(client.fetch_attachment(&image).await.is_err());
}

#[tokio::test]
async fn test_clearing_tags_over_multipart() {
    let (client, _data) = start().await;
    let created = client
        .create_manual(ManualWrite::new(params("T", &[])))
        .await
        .unwrap();
    assert_eq!(created.tags.len(), 1);
    assert_eq!(created.description.as_deref(), Some("How to"));

    let cleared = ManualParams {
        description: Some(None),
        tag_names: Some(Vec::new()),
        ..Default::default()
    };
    let updated = client
        .update_manual(
            created.id,
            ManualWrite::new(cleared).with_thumbnail(png("t.png", b"t")),
        )
        .await
        .unwrap();
    assert!(updated.tags.is_empty());
    assert!(updated.description.is_none());
    assert!(updated.thumbnail_url.is_some());
}

#[tokio::test]
async fn test_failures_name_the_operation() {
    let (client, _data) = start().await;

    let err = client.get_manual(999).await.unwrap_err();
    assert_eq!(err.to_string(), "Failed to fetch manual");
    // The HTTP status stays out of the error
    assert!(std::error::Error::source(&err).is_none());

    let err = client
        .create_manual(ManualWrite::new(ManualParams::default()))
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Failed to create manual");

    let err = client.delete_manual(999).await.unwrap_err();
    assert_eq!(err.operation(), "delete manual");

    let unreachable = ManualClient::new("http://127.0.0.1:1").unwrap();
    let err = unreachable.get_manuals().await.unwrap_err();
    assert_eq!(err.to_string(), "Failed to fetch manuals");
    assert!(std::error::Error::source(&err).is_none());
}

#[tokio::test]
async fn test_delete() {
    let (client, _data) = start().await;
    let created = client
        .create_manual(ManualWrite::new(params("T", &["S1"])))
        .await
        .unwrap();

    client.delete_manual(created.id).await.unwrap();
    assert!(client.get_manual(created.id).await.is_err());
    assert!(client.get_manuals().await.unwrap().is_empty());
}
