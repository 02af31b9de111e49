use super::*;
use crate::attachments::{compute_checksum, generate_key, StagedBlob};
use crate::models::{ManualParams, StepAttributes, Tag};
use std::sync::Arc;
use tempfile::TempDir;

fn create_test_store() -> ManualStore {
    ManualStore::open_in_memory().unwrap()
}

fn staged(filename: &str) -> StagedBlob {
    StagedBlob {
        key: generate_key(),
        filename: filename.to_string(),
        content_type: Some("image/png".to_string()),
        byte_size: 4,
        checksum: compute_checksum(b"data"),
    }
}

fn params(title: &str, tags: &[&str], steps: Vec<StepAttributes>) -> ManualParams {
    ManualParams {
        title: Some(title.to_string()),
        description: Some(Some(format!("About {}", title))),
        tag_names: Some(tags.iter().map(|t| t.to_string()).collect()),
        steps_attributes: Some(steps),
    }
}

fn step(title: &str, position: i64) -> StepAttributes {
    StepAttributes::new(title, None, position)
}

fn edit(id: i64, title: &str) -> StepAttributes {
    StepAttributes {
        id: Some(id),
        title: Some(title.to_string()),
        ..Default::default()
    }
}

#[test]
fn test_open_creates_database_file() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("nested").join("manuals.db");
    let store = ManualStore::open(&db_path).unwrap();
    assert!(db_path.exists());
    assert_eq!(store.db_path(), Some(db_path.as_path()));

    // Reopening keeps the schema and data
    store.create_manual(&params("Kept", &[], vec![]), None).unwrap();
    drop(store);
    let reopened = ManualStore::open(&db_path).unwrap();
    assert_eq!(reopened.count_manuals().unwrap(), 1);
}

#[test]
fn test_create_and_get() {
    let store = create_test_store();
    let id = store
        .create_manual(
            &params("Git basics", &["dev"], vec![step("Commit", 2), step("Clone", 1)]),
            None,
        )
        .unwrap();

    let manual = store.get_manual(id).unwrap().unwrap();
    assert_eq!(manual.title, "Git basics");
    assert_eq!(manual.description.as_deref(), Some("About Git basics"));
    assert_eq!(manual.tags.len(), 1);
    assert_eq!(manual.tags[0].name, "dev");
    assert!(manual.thumbnail.is_none());

    // Steps come back in position order
    let titles: Vec<_> = manual.steps.iter().map(|s| s.title.as_str()).collect();
    assert_eq!(titles, ["Clone", "Commit"]);
    assert_eq!(manual.steps[0].position, 1);
}

#[test]
fn test_get_missing_manual() {
    let store = create_test_store();
    assert!(store.get_manual(999).unwrap().is_none());
}

#[test]
fn test_duplicate_tag_names_resolve_once() {
    let store = create_test_store();
    let id = store
        .create_manual(&params("T", &["x", "x"], vec![step("S1", 1)]), None)
        .unwrap();

    let manual = store.get_manual(id).unwrap().unwrap();
    assert_eq!(manual.tags.len(), 1);
    assert_eq!(manual.tags[0].name, "x");
    assert_eq!(store.list_tags().unwrap().len(), 1);
}

#[test]
fn test_existing_tag_is_reused() {
    let store = create_test_store();
    let existing = store.resolve_tags(&["onboarding".to_string()]).unwrap();

    let first = store
        .create_manual(&params("First", &["onboarding", "hr"], vec![]), None)
        .unwrap();
    let second = store
        .create_manual(&params("Second", &["onboarding"], vec![]), None)
        .unwrap();

    let first = store.get_manual(first).unwrap().unwrap();
    let second = store.get_manual(second).unwrap().unwrap();
    let reused = first.tags.iter().find(|t| t.name == "onboarding").unwrap();
    assert_eq!(reused.id, existing[0].id);
    assert_eq!(second.tags[0].id, existing[0].id);

    // No two tag rows share a name
    let names: Vec<_> = store.list_tags().unwrap().into_iter().map(|t| t.name).collect();
    assert_eq!(names, ["hr", "onboarding"]);
}

#[test]
fn test_resolve_tags_dedupes_and_preserves_order() {
    let store = create_test_store();
    let tags = store
        .resolve_tags(&["b".to_string(), "a".to_string(), "b".to_string()])
        .unwrap();
    let names: Vec<_> = tags.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, ["b", "a"]);

    let again = store.resolve_tags(&["a".to_string()]).unwrap();
    assert_eq!(again[0].id, tags[1].id);
}

#[test]
fn test_tag_uniqueness_is_enforced_by_storage() {
    let store = create_test_store();
    store.resolve_tags(&["dup".to_string()]).unwrap();

    let conn = store.lock().unwrap();
    let err = conn
        .execute(
            "INSERT INTO tags (name, created_at, updated_at) VALUES ('dup', '', '')",
            [],
        )
        .unwrap_err();
    assert!(is_unique_violation(&err));
}

#[test]
fn test_concurrent_handles_resolve_same_tags() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("manuals.db");
    let first = ManualStore::open(&db_path).unwrap();
    let second = ManualStore::open(&db_path).unwrap();
    let barrier = Arc::new(std::sync::Barrier::new(2));

    let workers: Vec<_> = [first, second]
        .into_iter()
        .enumerate()
        .map(|(worker, store)| {
            let barrier = Arc::clone(&barrier);
            std::thread::spawn(move || {
                barrier.wait();
                (0..25)
                    .map(|round| {
                        let mut names = vec![
                            "shared".to_string(),
                            format!("round-{}", round),
                            format!("round-{}", round + 1),
                        ];
                        if worker == 1 {
                            names.reverse();
                        }
                        store.resolve_tags(&names).unwrap()
                    })
                    .collect::<Vec<_>>()
            })
        })
        .collect();
    let results: Vec<Vec<Vec<Tag>>> = workers.into_iter().map(|w| w.join().unwrap()).collect();

    let tags = ManualStore::open(&db_path).unwrap().list_tags().unwrap();
    let mut names: Vec<_> = tags.iter().map(|t| t.name.clone()).collect();
    let total = names.len();
    names.sort();
    names.dedup();
    assert_eq!(names.len(), total);
    // "shared" plus round-0 through round-25
    assert_eq!(total, 27);

    // Both handles saw the same id for every name
    for resolved in results.iter().flatten().flatten() {
        let stored = tags.iter().find(|t| t.name == resolved.name).unwrap();
        assert_eq!(stored.id, resolved.id);
    }
}

#[test]
fn test_validation_reports_every_violation_and_writes_nothing() {
    let store = create_test_store();
    let input = ManualParams {
        title: Some("".to_string()),
        description: None,
        tag_names: Some(vec!["new-tag".to_string()]),
        steps_attributes: Some(vec![
            StepAttributes {
                title: Some("No position".to_string()),
                ..Default::default()
            },
            step("", 0),
        ]),
    };

    let err = store.create_manual(&input, None).unwrap_err();
    assert_eq!(
        err.validation_messages().unwrap(),
        [
            "Title can't be blank".to_string(),
            "Steps[0] position can't be blank".to_string(),
            "Steps[1] title can't be blank".to_string(),
            "Steps[1] position must be greater than 0".to_string(),
        ]
    );
    assert_eq!(store.count_manuals().unwrap(), 0);
    assert!(store.list_tags().unwrap().is_empty());
}

#[test]
fn test_create_rejects_step_ids() {
    let store = create_test_store();
    let err = store
        .create_manual(&params("T", &[], vec![edit(5, "Existing")]), None)
        .unwrap_err();
    assert_eq!(
        err.validation_messages().unwrap(),
        ["Steps[0] id 5 does not belong to this manual".to_string()]
    );
}

#[test]
fn test_create_skips_new_steps_marked_for_destruction() {
    let store = create_test_store();
    let mut discarded = step("Discarded", 1);
    discarded.destroy = true;
    let id = store
        .create_manual(&params("T", &[], vec![discarded, step("Kept", 1)]), None)
        .unwrap();
    let manual = store.get_manual(id).unwrap().unwrap();
    assert_eq!(manual.steps.len(), 1);
    assert_eq!(manual.steps[0].title, "Kept");
}

#[test]
fn test_list_manuals_counts_steps() {
    let store = create_test_store();
    store
        .create_manual(&params("Three", &["a"], vec![step("1", 1), step("2", 2), step("3", 3)]), None)
        .unwrap();
    store
        .create_manual(&params("Empty", &[], vec![]), Some(&staged("cover.png")))
        .unwrap();

    let list = store.list_manuals().unwrap();
    assert_eq!(list.len(), 2);
    assert_eq!(list[0].title, "Three");
    assert_eq!(list[0].step_count, 3);
    assert_eq!(list[0].tags[0].name, "a");
    assert!(list[0].thumbnail.is_none());
    assert_eq!(list[1].step_count, 0);
    assert_eq!(list[1].thumbnail.as_ref().unwrap().filename, "cover.png");
}

#[test]
fn test_update_scalars_and_steps() {
    let store = create_test_store();
    let id = store
        .create_manual(&params("Old", &[], vec![step("A", 1), step("B", 2), step("C", 3)]), None)
        .unwrap();
    let before = store.get_manual(id).unwrap().unwrap();
    let (a, b, c) = (&before.steps[0], &before.steps[1], &before.steps[2]);

    let input = ManualParams {
        title: Some("New".to_string()),
        description: None,
        tag_names: None,
        steps_attributes: Some(vec![
            edit(a.id, "A edited"),
            StepAttributes::destroy(b.id),
            step("D", 4),
        ]),
    };
    let orphaned = store.update_manual(id, &input, None).unwrap();
    assert!(orphaned.is_empty());

    let after = store.get_manual(id).unwrap().unwrap();
    assert_eq!(after.title, "New");
    // Description was not supplied and stays as it was
    assert_eq!(after.description, before.description);
    let titles: Vec<_> = after.steps.iter().map(|s| s.title.as_str()).collect();
    assert_eq!(titles, ["A edited", "C", "D"]);
    assert_eq!(after.steps[1].id, c.id);
    assert!(after.updated_at >= before.updated_at);
}

#[test]
fn test_update_null_description_clears() {
    let store = create_test_store();
    let mut with_step = step("A", 1);
    with_step.description = Some(Some("Step notes".to_string()));
    let id = store
        .create_manual(&params("T", &[], vec![with_step]), None)
        .unwrap();
    let step_id = store.get_manual(id).unwrap().unwrap().steps[0].id;

    let input = ManualParams {
        description: Some(None),
        steps_attributes: Some(vec![StepAttributes {
            id: Some(step_id),
            description: Some(None),
            ..Default::default()
        }]),
        ..Default::default()
    };
    store.update_manual(id, &input, None).unwrap();

    let manual = store.get_manual(id).unwrap().unwrap();
    assert_eq!(manual.title, "T");
    assert_eq!(manual.description, None);
    assert_eq!(manual.steps[0].description, None);
    assert_eq!(manual.steps[0].title, "A");
}

#[test]
fn test_update_destroy_removes_step_image() {
    let store = create_test_store();
    let id = store
        .create_manual(&params("T", &[], vec![step("A", 1), step("B", 2)]), None)
        .unwrap();
    let manual = store.get_manual(id).unwrap().unwrap();
    let (a, b) = (manual.steps[0].id, manual.steps[1].id);

    let image = staged("a.png");
    store.set_step_image(id, a, Some(&image)).unwrap();
    let other = staged("b.png");
    store.set_step_image(id, b, Some(&other)).unwrap();

    let input = ManualParams {
        steps_attributes: Some(vec![StepAttributes::destroy(a)]),
        ..Default::default()
    };
    let orphaned = store.update_manual(id, &input, None).unwrap();
    assert_eq!(orphaned, vec![image.key.clone()]);
    assert!(store.find_attachment(&image.key).unwrap().is_none());

    let manual = store.get_manual(id).unwrap().unwrap();
    assert_eq!(manual.steps.len(), 1);
    assert_eq!(manual.steps[0].id, b);
    assert_eq!(manual.steps[0].image.as_ref().unwrap().key, other.key);
}

#[test]
fn test_update_replaces_tag_links() {
    let store = create_test_store();
    let id = store.create_manual(&params("T", &["a", "b"], vec![]), None).unwrap();

    let input = ManualParams {
        tag_names: Some(vec!["b".to_string(), "c".to_string()]),
        ..Default::default()
    };
    store.update_manual(id, &input, None).unwrap();
    let names: Vec<_> = store
        .get_manual(id)
        .unwrap()
        .unwrap()
        .tags
        .into_iter()
        .map(|t| t.name)
        .collect();
    assert_eq!(names, ["b", "c"]);
    // Unlinked tags survive
    assert_eq!(store.list_tags().unwrap().len(), 3);

    let clear = ManualParams {
        tag_names: Some(vec![]),
        ..Default::default()
    };
    store.update_manual(id, &clear, None).unwrap();
    assert!(store.get_manual(id).unwrap().unwrap().tags.is_empty());
}

#[test]
fn test_update_rejects_foreign_steps_atomically() {
    let store = create_test_store();
    let mine = store.create_manual(&params("Mine", &[], vec![step("A", 1)]), None).unwrap();
    let theirs = store
        .create_manual(&params("Theirs", &[], vec![step("X", 1)]), None)
        .unwrap();
    let foreign_id = store.get_manual(theirs).unwrap().unwrap().steps[0].id;
    let own_id = store.get_manual(mine).unwrap().unwrap().steps[0].id;

    let input = ManualParams {
        title: Some("Renamed".to_string()),
        steps_attributes: Some(vec![edit(own_id, "A2"), edit(foreign_id, "Hijacked")]),
        ..Default::default()
    };
    let err = store.update_manual(mine, &input, None).unwrap_err();
    assert_eq!(
        err.validation_messages().unwrap(),
        [format!("Steps[1] id {} does not belong to this manual", foreign_id)]
    );

    let mine = store.get_manual(mine).unwrap().unwrap();
    assert_eq!(mine.title, "Mine");
    assert_eq!(mine.steps[0].title, "A");
    assert_eq!(store.get_manual(theirs).unwrap().unwrap().steps[0].title, "X");
}

#[test]
fn test_update_missing_manual() {
    let store = create_test_store();
    let err = store
        .update_manual(42, &ManualParams::default(), None)
        .unwrap_err();
    assert!(matches!(err, ManualError::ManualNotFound { id: 42 }));
}

#[test]
fn test_thumbnail_replacement_orphans_old_blob() {
    let store = create_test_store();
    let first = staged("first.png");
    let id = store.create_manual(&params("T", &[], vec![]), Some(&first)).unwrap();

    let second = staged("second.png");
    let orphaned = store
        .update_manual(id, &ManualParams::default(), Some(&second))
        .unwrap();
    assert_eq!(orphaned, vec![first.key.clone()]);
    assert!(store.find_attachment(&first.key).unwrap().is_none());

    let manual = store.get_manual(id).unwrap().unwrap();
    assert_eq!(manual.thumbnail.unwrap().key, second.key);
}

#[test]
fn test_set_step_image_attach_replace_remove() {
    let store = create_test_store();
    let id = store.create_manual(&params("T", &[], vec![step("A", 1)]), None).unwrap();
    let step_id = store.get_manual(id).unwrap().unwrap().steps[0].id;

    let first = staged("one.png");
    assert_eq!(
        store.set_step_image(id, step_id, Some(&first)).unwrap(),
        StepImageOutcome::Applied { replaced: None }
    );

    let second = staged("two.png");
    assert_eq!(
        store.set_step_image(id, step_id, Some(&second)).unwrap(),
        StepImageOutcome::Applied {
            replaced: Some(first.key.clone())
        }
    );

    assert_eq!(
        store.set_step_image(id, step_id, None).unwrap(),
        StepImageOutcome::Applied {
            replaced: Some(second.key.clone())
        }
    );
    assert!(store.get_manual(id).unwrap().unwrap().steps[0].image.is_none());

    // Removing again is a no-op
    assert_eq!(
        store.set_step_image(id, step_id, None).unwrap(),
        StepImageOutcome::Applied { replaced: None }
    );
}

#[test]
fn test_set_step_image_ignores_other_manuals() {
    let store = create_test_store();
    let mine = store.create_manual(&params("Mine", &[], vec![]), None).unwrap();
    let theirs = store.create_manual(&params("Theirs", &[], vec![step("X", 1)]), None).unwrap();
    let foreign = store.get_manual(theirs).unwrap().unwrap().steps[0].id;

    assert_eq!(
        store.set_step_image(mine, foreign, Some(&staged("x.png"))).unwrap(),
        StepImageOutcome::StepNotFound
    );
}

#[test]
fn test_delete_cascades_but_keeps_tags_and_other_manuals() {
    let store = create_test_store();
    let thumb = staged("thumb.png");
    let doomed = store
        .create_manual(&params("Doomed", &["shared"], vec![step("A", 1), step("B", 2)]), Some(&thumb))
        .unwrap();
    let survivor = store
        .create_manual(&params("Survivor", &["shared"], vec![step("S", 1)]), None)
        .unwrap();
    let step_id = store.get_manual(doomed).unwrap().unwrap().steps[0].id;
    let image = staged("step.png");
    store.set_step_image(doomed, step_id, Some(&image)).unwrap();

    let mut orphaned = store.delete_manual(doomed).unwrap();
    orphaned.sort();
    let mut expected = vec![thumb.key.clone(), image.key.clone()];
    expected.sort();
    assert_eq!(orphaned, expected);

    assert!(store.get_manual(doomed).unwrap().is_none());
    let conn = store.lock().unwrap();
    let steps: i64 = conn
        .query_row("SELECT COUNT(*) FROM steps WHERE manual_id = ?1", [doomed], |r| r.get(0))
        .unwrap();
    let links: i64 = conn
        .query_row("SELECT COUNT(*) FROM manual_tags WHERE manual_id = ?1", [doomed], |r| r.get(0))
        .unwrap();
    let attachments: i64 = conn
        .query_row("SELECT COUNT(*) FROM attachments", [], |r| r.get(0))
        .unwrap();
    drop(conn);
    assert_eq!(steps, 0);
    assert_eq!(links, 0);
    assert_eq!(attachments, 0);

    let survivor = store.get_manual(survivor).unwrap().unwrap();
    assert_eq!(survivor.steps.len(), 1);
    assert_eq!(survivor.tags[0].name, "shared");
    assert_eq!(store.list_tags().unwrap().len(), 1);
}

#[test]
fn test_delete_missing_manual() {
    let store = create_test_store();
    assert!(matches!(
        store.delete_manual(7),
        Err(ManualError::ManualNotFound { id: 7 })
    ));
}
