//! Manual operations as the API layer sees them.
//!
//! `ManualService` pairs the SQLite store with blob storage: uploads are
//! staged before the store transaction, staged blobs are discarded when the
//! transaction fails, and blobs a committed write orphaned are discarded
//! afterwards. Store calls run on the blocking pool.

use crate::attachments::{is_valid_key, Attachments, BlobStore, DiskBlobStore, StagedBlob};
use crate::config::DataPaths;
use crate::error::{ManualError, Result};
use crate::models::{
    Attachment, ManualDetail, ManualSummary, ManualWrite, StepImageChange, Tag, Upload,
};
use crate::store::{ManualStore, StepImageOutcome};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Facade over the manual store and attachment storage.
#[derive(Clone)]
pub struct ManualService {
    store: ManualStore,
    attachments: Attachments,
}

impl ManualService {
    pub fn new(store: ManualStore, blobs: Arc<dyn BlobStore>) -> Self {
        Self {
            store,
            attachments: Attachments::new(blobs),
        }
    }

    /// Open the database and blob directory under a data root.
    pub fn open(paths: &DataPaths) -> Result<Self> {
        let store = ManualStore::open(paths.database_path())?;
        let blobs = DiskBlobStore::new(paths.storage_dir());
        info!(
            "Manual data at {} (blobs in {})",
            paths.root().display(),
            blobs.root().display()
        );
        Ok(Self::new(store, Arc::new(blobs)))
    }

    pub fn store(&self) -> &ManualStore {
        &self.store
    }

    pub fn attachments(&self) -> &Attachments {
        &self.attachments
    }

    async fn blocking<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(ManualStore) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let store = self.store.clone();
        tokio::task::spawn_blocking(move || f(store))
            .await
            .map_err(|e| ManualError::Other(format!("Store task failed: {}", e)))?
    }

    async fn stage(&self, upload: Option<&Upload>) -> Result<Option<StagedBlob>> {
        match upload {
            Some(upload) => Ok(Some(self.attachments.stage(upload).await?)),
            None => Ok(None),
        }
    }

    async fn discard_staged(&self, staged: Option<StagedBlob>) {
        if let Some(blob) = staged {
            self.attachments.discard([blob.key]).await;
        }
    }

    /// Summaries of every manual.
    pub async fn list(&self) -> Result<Vec<ManualSummary>> {
        let overviews = self.blocking(|store| store.list_manuals()).await?;
        Ok(overviews.iter().map(ManualSummary::from).collect())
    }

    /// Full manual with steps in position order.
    pub async fn get(&self, manual_id: i64) -> Result<ManualDetail> {
        let manual = self
            .blocking(move |store| store.get_manual(manual_id))
            .await?
            .ok_or(ManualError::ManualNotFound { id: manual_id })?;
        Ok(ManualDetail::from(&manual))
    }

    /// Create a manual. Step images are not accepted on create.
    pub async fn create(&self, write: ManualWrite) -> Result<ManualDetail> {
        let ManualWrite {
            params,
            thumbnail,
            step_images,
        } = write;
        if !step_images.is_empty() {
            debug!(
                "Ignoring {} step images on create; steps have no ids yet",
                step_images.len()
            );
        }

        let staged = self.stage(thumbnail.as_ref()).await?;
        let blob = staged.clone();
        let result = self
            .blocking(move |store| store.create_manual(&params, blob.as_ref()))
            .await;

        match result {
            Ok(manual_id) => {
                info!("Created manual {}", manual_id);
                self.get(manual_id).await
            }
            Err(e) => {
                self.discard_staged(staged).await;
                Err(e)
            }
        }
    }

    /// Update a manual, then apply per-step image changes.
    pub async fn update(&self, manual_id: i64, write: ManualWrite) -> Result<ManualDetail> {
        let ManualWrite {
            params,
            thumbnail,
            step_images,
        } = write;

        let staged = self.stage(thumbnail.as_ref()).await?;
        let blob = staged.clone();
        let result = self
            .blocking(move |store| store.update_manual(manual_id, &params, blob.as_ref()))
            .await;

        let orphaned = match result {
            Ok(orphaned) => orphaned,
            Err(e) => {
                self.discard_staged(staged).await;
                return Err(e);
            }
        };
        self.attachments.discard(&orphaned).await;

        self.apply_step_images(manual_id, step_images).await?;
        info!("Updated manual {}", manual_id);
        self.get(manual_id).await
    }

    async fn apply_step_images(
        &self,
        manual_id: i64,
        images: BTreeMap<i64, StepImageChange>,
    ) -> Result<()> {
        for (step_id, change) in images {
            let staged = match &change {
                StepImageChange::Attach(upload) => self.stage(Some(upload)).await?,
                StepImageChange::Remove => None,
            };
            let blob = staged.clone();
            let outcome = self
                .blocking(move |store| store.set_step_image(manual_id, step_id, blob.as_ref()))
                .await;

            match outcome {
                Ok(StepImageOutcome::Applied { replaced }) => {
                    self.attachments.discard(replaced).await;
                }
                Ok(StepImageOutcome::StepNotFound) => {
                    debug!(
                        "Ignoring image change for step {} outside manual {}",
                        step_id, manual_id
                    );
                    self.discard_staged(staged).await;
                }
                Err(e) => {
                    self.discard_staged(staged).await;
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    /// Delete a manual and discard its files.
    pub async fn delete(&self, manual_id: i64) -> Result<()> {
        let orphaned = self
            .blocking(move |store| store.delete_manual(manual_id))
            .await?;
        self.attachments.discard(&orphaned).await;
        info!("Deleted manual {}", manual_id);
        Ok(())
    }

    /// Attachment metadata and bytes by key.
    pub async fn attachment(&self, key: &str) -> Result<(Attachment, Vec<u8>)> {
        let not_found = || ManualError::AttachmentNotFound {
            key: key.to_string(),
        };
        if !is_valid_key(key) {
            return Err(not_found());
        }

        let lookup = key.to_string();
        let attachment = self
            .blocking(move |store| store.find_attachment(&lookup))
            .await?
            .ok_or_else(not_found)?;
        let data = self.attachments.read(key).await?;
        Ok((attachment, data))
    }

    /// Find or create tags by name.
    pub async fn resolve_tags(&self, names: Vec<String>) -> Result<Vec<Tag>> {
        self.blocking(move |store| store.resolve_tags(&names)).await
    }
}
