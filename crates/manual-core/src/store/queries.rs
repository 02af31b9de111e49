//! Read paths: list projection, full manual, attachments, tags.

use super::tags::tags_for_manual;
use super::ManualStore;
use crate::error::Result;
use crate::models::{Attachment, Manual, ManualOverview, Step, Tag};
use rusqlite::{params, OptionalExtension, Row};
use std::collections::HashMap;

/// Attachment columns selected through a `LEFT JOIN attachments a`.
const ATTACHMENT_COLUMNS: &str =
    "a.id, a.key, a.filename, a.content_type, a.byte_size, a.checksum, a.created_at";

impl ManualStore {
    /// Every manual with tags, step count, and thumbnail; no step bodies.
    pub fn list_manuals(&self) -> Result<Vec<ManualOverview>> {
        let conn = self.lock()?;

        let mut tags_by_manual: HashMap<i64, Vec<Tag>> = HashMap::new();
        {
            let mut stmt = conn.prepare(
                "SELECT mt.manual_id, t.id, t.name FROM manual_tags mt
                 JOIN tags t ON t.id = mt.tag_id
                 ORDER BY t.name",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    Tag {
                        id: row.get(1)?,
                        name: row.get(2)?,
                    },
                ))
            })?;
            for row in rows {
                let (manual_id, tag) = row?;
                tags_by_manual.entry(manual_id).or_default().push(tag);
            }
        }

        let sql = format!(
            "SELECT m.id, m.title, m.description, m.updated_at,
                    (SELECT COUNT(*) FROM steps s WHERE s.manual_id = m.id),
                    {}
             FROM manuals m LEFT JOIN attachments a ON a.id = m.thumbnail_id
             ORDER BY m.id",
            ATTACHMENT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([], |row| {
            Ok(ManualOverview {
                id: row.get(0)?,
                title: row.get(1)?,
                description: row.get(2)?,
                updated_at: row.get(3)?,
                step_count: row.get(4)?,
                thumbnail: attachment_at(row, 5)?,
                tags: Vec::new(),
            })
        })?;

        let mut manuals = Vec::new();
        for row in rows {
            let mut overview = row?;
            overview.tags = tags_by_manual.remove(&overview.id).unwrap_or_default();
            manuals.push(overview);
        }
        Ok(manuals)
    }

    /// A manual with tags, thumbnail, and steps ordered by position.
    pub fn get_manual(&self, manual_id: i64) -> Result<Option<Manual>> {
        let conn = self.lock()?;

        let sql = format!(
            "SELECT m.id, m.title, m.description, m.created_at, m.updated_at, {}
             FROM manuals m LEFT JOIN attachments a ON a.id = m.thumbnail_id
             WHERE m.id = ?1",
            ATTACHMENT_COLUMNS
        );
        let manual = conn
            .query_row(&sql, params![manual_id], |row| {
                Ok(Manual {
                    id: row.get(0)?,
                    title: row.get(1)?,
                    description: row.get(2)?,
                    created_at: row.get(3)?,
                    updated_at: row.get(4)?,
                    thumbnail: attachment_at(row, 5)?,
                    tags: Vec::new(),
                    steps: Vec::new(),
                })
            })
            .optional()?;

        let Some(mut manual) = manual else {
            return Ok(None);
        };

        manual.tags = tags_for_manual(&conn, manual_id)?;

        let sql = format!(
            "SELECT s.id, s.manual_id, s.title, s.description, s.position, {}
             FROM steps s LEFT JOIN attachments a ON a.id = s.image_id
             WHERE s.manual_id = ?1
             ORDER BY s.position ASC, s.id ASC",
            ATTACHMENT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![manual_id], |row| {
            Ok(Step {
                id: row.get(0)?,
                manual_id: row.get(1)?,
                title: row.get(2)?,
                description: row.get(3)?,
                position: row.get(4)?,
                image: attachment_at(row, 5)?,
            })
        })?;
        for row in rows {
            manual.steps.push(row?);
        }

        Ok(Some(manual))
    }

    /// Attachment metadata by blob key.
    pub fn find_attachment(&self, key: &str) -> Result<Option<Attachment>> {
        let conn = self.lock()?;
        let sql = format!("SELECT {} FROM attachments a WHERE a.key = ?1", ATTACHMENT_COLUMNS);
        let attachment = conn
            .query_row(&sql, params![key], |row| attachment_at(row, 0))
            .optional()?
            .flatten();
        Ok(attachment)
    }

    /// All tags, by name.
    pub fn list_tags(&self) -> Result<Vec<Tag>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT id, name FROM tags ORDER BY name")?;
        let rows = stmt.query_map([], |row| {
            Ok(Tag {
                id: row.get(0)?,
                name: row.get(1)?,
            })
        })?;

        let mut tags = Vec::new();
        for row in rows {
            tags.push(row?);
        }
        Ok(tags)
    }

    /// Number of manuals.
    pub fn count_manuals(&self) -> Result<usize> {
        let conn = self.lock()?;
        let count: usize = conn.query_row("SELECT COUNT(*) FROM manuals", [], |row| row.get(0))?;
        Ok(count)
    }
}

/// Read [`ATTACHMENT_COLUMNS`] starting at `offset`; NULL id means no attachment.
fn attachment_at(row: &Row, offset: usize) -> rusqlite::Result<Option<Attachment>> {
    let id: Option<i64> = row.get(offset)?;
    let Some(id) = id else {
        return Ok(None);
    };
    Ok(Some(Attachment {
        id,
        key: row.get(offset + 1)?,
        filename: row.get(offset + 2)?,
        content_type: row.get(offset + 3)?,
        byte_size: row.get(offset + 4)?,
        checksum: row.get(offset + 5)?,
        created_at: row.get(offset + 6)?,
    }))
}
