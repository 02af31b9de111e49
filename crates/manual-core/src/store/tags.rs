//! Tag lookup-or-create and manual/tag links.

use super::{begin_write, is_unique_violation, ManualStore};
use crate::config::DatabaseConfig;
use crate::error::{ManualError, Result};
use crate::models::Tag;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashSet;
use tracing::debug;

impl ManualStore {
    /// Resolve each name to an existing tag, creating the missing ones.
    ///
    /// Duplicate names resolve once; the result preserves first-seen order.
    pub fn resolve_tags(&self, names: &[String]) -> Result<Vec<Tag>> {
        let mut conn = self.lock()?;
        let tx = begin_write(&mut conn)?;
        let now = Utc::now();
        let tags = dedupe_names(names)
            .iter()
            .map(|name| find_or_create(&tx, name, now))
            .collect::<Result<Vec<_>>>()?;
        tx.commit()?;
        Ok(tags)
    }
}

/// Drop repeated names, keeping the first occurrence.
pub(super) fn dedupe_names(names: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    names
        .iter()
        .filter(|name| seen.insert(name.as_str()))
        .cloned()
        .collect()
}

fn find_by_name(conn: &Connection, name: &str) -> Result<Option<Tag>> {
    let tag = conn
        .query_row(
            "SELECT id, name FROM tags WHERE name = ?1",
            params![name],
            |row| {
                Ok(Tag {
                    id: row.get(0)?,
                    name: row.get(1)?,
                })
            },
        )
        .optional()?;
    Ok(tag)
}

/// Find the tag named `name` or create it.
///
/// A concurrent writer may insert the same name between our lookup and our
/// insert; the unique index rejects the second insert and we look up again.
pub(super) fn find_or_create(conn: &Connection, name: &str, now: DateTime<Utc>) -> Result<Tag> {
    for attempt in 1..=DatabaseConfig::TAG_RESOLVE_ATTEMPTS {
        if let Some(tag) = find_by_name(conn, name)? {
            return Ok(tag);
        }

        match conn.execute(
            "INSERT INTO tags (name, created_at, updated_at) VALUES (?1, ?2, ?2)",
            params![name, now],
        ) {
            Ok(_) => {
                let id = conn.last_insert_rowid();
                debug!("Created tag {:?} ({})", name, id);
                return Ok(Tag {
                    id,
                    name: name.to_string(),
                });
            }
            Err(e) if is_unique_violation(&e) => {
                debug!(
                    "Tag {:?} was created concurrently (attempt {}), retrying lookup",
                    name, attempt
                );
            }
            Err(e) => return Err(e.into()),
        }
    }

    Err(ManualError::Database {
        message: format!("Could not resolve tag {:?}", name),
        source: None,
    })
}

/// Resolve names to tag ids, creating tags as needed.
pub(super) fn resolve_tag_ids(conn: &Connection, names: &[String], now: DateTime<Utc>) -> Result<Vec<i64>> {
    dedupe_names(names)
        .iter()
        .map(|name| find_or_create(conn, name, now).map(|tag| tag.id))
        .collect()
}

/// Link tags to a manual. Existing links are left alone.
pub(super) fn link_tags(conn: &Connection, manual_id: i64, tag_ids: &[i64], now: DateTime<Utc>) -> Result<()> {
    let mut stmt = conn.prepare(
        "INSERT OR IGNORE INTO manual_tags (manual_id, tag_id, created_at) VALUES (?1, ?2, ?3)",
    )?;
    for tag_id in tag_ids {
        stmt.execute(params![manual_id, tag_id, now])?;
    }
    Ok(())
}

/// Make the manual's links match `tag_ids` exactly.
pub(super) fn replace_links(conn: &Connection, manual_id: i64, tag_ids: &[i64], now: DateTime<Utc>) -> Result<()> {
    let keep: HashSet<i64> = tag_ids.iter().copied().collect();
    let current: Vec<i64> = {
        let mut stmt = conn.prepare("SELECT tag_id FROM manual_tags WHERE manual_id = ?1")?;
        let rows = stmt.query_map(params![manual_id], |row| row.get(0))?;
        rows.collect::<rusqlite::Result<_>>()?
    };

    for tag_id in current.into_iter().filter(|id| !keep.contains(id)) {
        conn.execute(
            "DELETE FROM manual_tags WHERE manual_id = ?1 AND tag_id = ?2",
            params![manual_id, tag_id],
        )?;
    }

    link_tags(conn, manual_id, tag_ids, now)
}

/// Tags linked to one manual, by name.
pub(super) fn tags_for_manual(conn: &Connection, manual_id: i64) -> Result<Vec<Tag>> {
    let mut stmt = conn.prepare(
        "SELECT t.id, t.name FROM manual_tags mt
         JOIN tags t ON t.id = mt.tag_id
         WHERE mt.manual_id = ?1
         ORDER BY t.name",
    )?;
    let rows = stmt.query_map(params![manual_id], |row| {
        Ok(Tag {
            id: row.get(0)?,
            name: row.get(1)?,
        })
    })?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}
