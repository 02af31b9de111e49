//! Aggregate writes: create, update, delete, and per-step image changes.
//!
//! Each write validates inside its transaction before modifying anything and
//! returns the blob keys it orphaned so the caller can discard them after
//! commit.

use super::tags::{dedupe_names, link_tags, replace_links, resolve_tag_ids};
use super::{begin_write, ManualStore};
use crate::attachments::StagedBlob;
use crate::error::{ManualError, Result};
use crate::models::{ManualParams, StepAttributes};
use crate::validation::{check_manual_title, check_step, check_tag_names, foreign_step, Violations};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use tracing::debug;

/// Result of attaching or removing a step image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepImageOutcome {
    /// The change was applied; `replaced` is the key of the previous image.
    Applied { replaced: Option<String> },
    /// No step with that id belongs to the manual.
    StepNotFound,
}

struct NewStep {
    title: String,
    description: Option<String>,
    position: i64,
}

struct ExistingStep {
    title: String,
    description: Option<String>,
    position: i64,
    image: Option<(i64, String)>,
}

enum StepOp {
    Create(NewStep),
    Update { id: i64, step: NewStep },
    Destroy(i64),
}

impl ManualStore {
    /// Insert a manual with its tags, steps, and optional thumbnail.
    pub fn create_manual(&self, input: &ManualParams, thumbnail: Option<&StagedBlob>) -> Result<i64> {
        let mut conn = self.lock()?;
        let tx = begin_write(&mut conn)?;

        let title = input.title.clone().unwrap_or_default();
        let tag_names = input.tag_names.as_deref().map(dedupe_names).unwrap_or_default();

        let mut violations = Violations::new();
        check_manual_title(&title, &mut violations);
        check_tag_names(&tag_names, &mut violations);

        let mut new_steps = Vec::new();
        for (index, attrs) in steps_of(input).iter().enumerate() {
            if let Some(step_id) = attrs.id {
                // A brand-new manual owns no steps yet
                foreign_step(index, step_id, &mut violations);
                continue;
            }
            if attrs.destroy {
                continue;
            }
            if let Some(step) = new_step(index, attrs, &mut violations) {
                new_steps.push(step);
            }
        }
        violations.into_result()?;

        let now = Utc::now();
        tx.execute(
            "INSERT INTO manuals (title, description, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?3)",
            params![title, input.description.clone().flatten(), now],
        )?;
        let manual_id = tx.last_insert_rowid();

        if let Some(blob) = thumbnail {
            let attachment_id = insert_attachment(&tx, blob, now)?;
            tx.execute(
                "UPDATE manuals SET thumbnail_id = ?1 WHERE id = ?2",
                params![attachment_id, manual_id],
            )?;
        }

        let tag_ids = resolve_tag_ids(&tx, &tag_names, now)?;
        link_tags(&tx, manual_id, &tag_ids, now)?;

        for step in &new_steps {
            insert_step(&tx, manual_id, step, now)?;
        }

        tx.commit()?;
        debug!(
            "Created manual {} with {} steps and {} tags",
            manual_id,
            new_steps.len(),
            tag_ids.len()
        );
        Ok(manual_id)
    }

    /// Apply scalar changes, tag replacement, nested step edits, and an
    /// optional new thumbnail. Returns blob keys no longer referenced.
    pub fn update_manual(
        &self,
        manual_id: i64,
        input: &ManualParams,
        thumbnail: Option<&StagedBlob>,
    ) -> Result<Vec<String>> {
        let mut conn = self.lock()?;
        let tx = begin_write(&mut conn)?;

        let (current_title, current_description, current_thumbnail) = tx
            .query_row(
                "SELECT m.title, m.description, a.id, a.key
                 FROM manuals m LEFT JOIN attachments a ON a.id = m.thumbnail_id
                 WHERE m.id = ?1",
                params![manual_id],
                |row| {
                    let title: String = row.get(0)?;
                    let description: Option<String> = row.get(1)?;
                    let thumbnail_id: Option<i64> = row.get(2)?;
                    let thumbnail_key: Option<String> = row.get(3)?;
                    Ok((title, description, thumbnail_id.zip(thumbnail_key)))
                },
            )
            .optional()?
            .ok_or(ManualError::ManualNotFound { id: manual_id })?;
        let existing_steps = load_existing_steps(&tx, manual_id)?;

        let title = input.title.clone().unwrap_or(current_title);
        // An explicit null clears, an absent key keeps
        let description = match &input.description {
            Some(description) => description.clone(),
            None => current_description,
        };
        let tag_names = input.tag_names.as_deref().map(dedupe_names);

        let mut violations = Violations::new();
        check_manual_title(&title, &mut violations);
        if let Some(names) = &tag_names {
            check_tag_names(names, &mut violations);
        }

        let mut ops = Vec::new();
        for (index, attrs) in steps_of(input).iter().enumerate() {
            match attrs.id {
                Some(step_id) => match existing_steps.get(&step_id) {
                    None => foreign_step(index, step_id, &mut violations),
                    Some(_) if attrs.destroy => ops.push(StepOp::Destroy(step_id)),
                    Some(current) => {
                        let step_title = attrs.title.clone().unwrap_or_else(|| current.title.clone());
                        let position = attrs.position.or(Some(current.position));
                        check_step(index, &step_title, position, &mut violations);
                        ops.push(StepOp::Update {
                            id: step_id,
                            step: NewStep {
                                title: step_title,
                                description: match &attrs.description {
                                    Some(description) => description.clone(),
                                    None => current.description.clone(),
                                },
                                position: position.unwrap_or(current.position),
                            },
                        });
                    }
                },
                None if attrs.destroy => {}
                None => {
                    if let Some(step) = new_step(index, attrs, &mut violations) {
                        ops.push(StepOp::Create(step));
                    }
                }
            }
        }
        violations.into_result()?;

        let now = Utc::now();
        let mut orphaned = Vec::new();

        tx.execute(
            "UPDATE manuals SET title = ?1, description = ?2, updated_at = ?3 WHERE id = ?4",
            params![title, description, now, manual_id],
        )?;

        if let Some(blob) = thumbnail {
            let attachment_id = insert_attachment(&tx, blob, now)?;
            tx.execute(
                "UPDATE manuals SET thumbnail_id = ?1 WHERE id = ?2",
                params![attachment_id, manual_id],
            )?;
            if let Some((old_id, old_key)) = current_thumbnail {
                delete_attachment_row(&tx, old_id)?;
                orphaned.push(old_key);
            }
        }

        if let Some(names) = &tag_names {
            let tag_ids = resolve_tag_ids(&tx, names, now)?;
            replace_links(&tx, manual_id, &tag_ids, now)?;
        }

        for op in &ops {
            match op {
                StepOp::Create(step) => {
                    insert_step(&tx, manual_id, step, now)?;
                }
                StepOp::Update { id, step } => {
                    tx.execute(
                        "UPDATE steps SET title = ?1, description = ?2, position = ?3, updated_at = ?4
                         WHERE id = ?5 AND manual_id = ?6",
                        params![step.title, step.description, step.position, now, id, manual_id],
                    )?;
                }
                StepOp::Destroy(id) => {
                    let deleted = tx.execute(
                        "DELETE FROM steps WHERE id = ?1 AND manual_id = ?2",
                        params![id, manual_id],
                    )?;
                    if deleted > 0 {
                        if let Some((image_id, image_key)) =
                            existing_steps.get(id).and_then(|s| s.image.clone())
                        {
                            delete_attachment_row(&tx, image_id)?;
                            orphaned.push(image_key);
                        }
                    }
                }
            }
        }

        tx.commit()?;
        debug!(
            "Updated manual {} ({} step operations, {} blobs orphaned)",
            manual_id,
            ops.len(),
            orphaned.len()
        );
        Ok(orphaned)
    }

    /// Delete a manual, its steps, its tag links, and its attachment rows.
    /// Tags themselves survive. Returns the orphaned blob keys.
    pub fn delete_manual(&self, manual_id: i64) -> Result<Vec<String>> {
        let mut conn = self.lock()?;
        let tx = begin_write(&mut conn)?;

        let exists: bool = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM manuals WHERE id = ?1)",
            params![manual_id],
            |row| row.get(0),
        )?;
        if !exists {
            return Err(ManualError::ManualNotFound { id: manual_id });
        }

        let attachments: Vec<(i64, String)> = {
            let mut stmt = tx.prepare(
                "SELECT id, key FROM attachments
                 WHERE id IN (SELECT thumbnail_id FROM manuals WHERE id = ?1)
                    OR id IN (SELECT image_id FROM steps WHERE manual_id = ?1)",
            )?;
            let rows = stmt.query_map(params![manual_id], |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
            })?;
            rows.collect::<rusqlite::Result<_>>()?
        };

        tx.execute("DELETE FROM manuals WHERE id = ?1", params![manual_id])?;
        for (attachment_id, _) in &attachments {
            delete_attachment_row(&tx, *attachment_id)?;
        }

        tx.commit()?;
        debug!(
            "Deleted manual {} ({} attachments)",
            manual_id,
            attachments.len()
        );
        Ok(attachments.into_iter().map(|(_, key)| key).collect())
    }

    /// Attach (`Some`) or remove (`None`) the image of a step in `manual_id`.
    pub fn set_step_image(
        &self,
        manual_id: i64,
        step_id: i64,
        image: Option<&StagedBlob>,
    ) -> Result<StepImageOutcome> {
        let mut conn = self.lock()?;
        let tx = begin_write(&mut conn)?;

        let current = tx
            .query_row(
                "SELECT a.id, a.key FROM steps s
                 LEFT JOIN attachments a ON a.id = s.image_id
                 WHERE s.id = ?1 AND s.manual_id = ?2",
                params![step_id, manual_id],
                |row| {
                    let id: Option<i64> = row.get(0)?;
                    let key: Option<String> = row.get(1)?;
                    Ok(id.zip(key))
                },
            )
            .optional()?;
        let Some(current) = current else {
            return Ok(StepImageOutcome::StepNotFound);
        };

        if current.is_none() && image.is_none() {
            return Ok(StepImageOutcome::Applied { replaced: None });
        }

        let now = Utc::now();
        let image_id = image
            .map(|blob| insert_attachment(&tx, blob, now))
            .transpose()?;
        tx.execute(
            "UPDATE steps SET image_id = ?1, updated_at = ?2 WHERE id = ?3",
            params![image_id, now, step_id],
        )?;

        let replaced = match current {
            Some((old_id, old_key)) => {
                delete_attachment_row(&tx, old_id)?;
                Some(old_key)
            }
            None => None,
        };

        tx.commit()?;
        debug!(
            "Step {} image {}",
            step_id,
            if image.is_some() { "attached" } else { "removed" }
        );
        Ok(StepImageOutcome::Applied { replaced })
    }
}

fn steps_of(input: &ManualParams) -> &[StepAttributes] {
    input.steps_attributes.as_deref().unwrap_or_default()
}

/// Validate a descriptor for a step that doesn't exist yet.
fn new_step(index: usize, attrs: &StepAttributes, violations: &mut Violations) -> Option<NewStep> {
    let title = attrs.title.clone().unwrap_or_default();
    check_step(index, &title, attrs.position, violations);
    attrs.position.map(|position| NewStep {
        title,
        description: attrs.description.clone().flatten(),
        position,
    })
}

fn load_existing_steps(conn: &Connection, manual_id: i64) -> Result<HashMap<i64, ExistingStep>> {
    let mut stmt = conn.prepare(
        "SELECT s.id, s.title, s.description, s.position, a.id, a.key
         FROM steps s LEFT JOIN attachments a ON a.id = s.image_id
         WHERE s.manual_id = ?1",
    )?;
    let rows = stmt.query_map(params![manual_id], |row| {
        let image_id: Option<i64> = row.get(4)?;
        let image_key: Option<String> = row.get(5)?;
        Ok((
            row.get::<_, i64>(0)?,
            ExistingStep {
                title: row.get(1)?,
                description: row.get(2)?,
                position: row.get(3)?,
                image: image_id.zip(image_key),
            },
        ))
    })?;
    Ok(rows.collect::<rusqlite::Result<HashMap<_, _>>>()?)
}

fn insert_step(conn: &Connection, manual_id: i64, step: &NewStep, now: DateTime<Utc>) -> Result<i64> {
    conn.execute(
        "INSERT INTO steps (manual_id, title, description, position, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
        params![manual_id, step.title, step.description, step.position, now],
    )?;
    Ok(conn.last_insert_rowid())
}

fn insert_attachment(conn: &Connection, blob: &StagedBlob, now: DateTime<Utc>) -> Result<i64> {
    conn.execute(
        "INSERT INTO attachments (key, filename, content_type, byte_size, checksum, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            blob.key,
            blob.filename,
            blob.content_type,
            blob.byte_size,
            blob.checksum,
            now
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

fn delete_attachment_row(conn: &Connection, attachment_id: i64) -> Result<()> {
    conn.execute("DELETE FROM attachments WHERE id = ?1", params![attachment_id])?;
    Ok(())
}
