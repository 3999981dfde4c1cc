mod common;

use common::{Fixture, git};
use pretty_assertions::assert_eq;
use savestate_engine::{DEFAULT_DESCRIPTION, EngineError, FileStatus, MAX_NAME_BYTES, OverwriteMode};

#[tokio::test]
async fn test_create_then_list_yields_single_checkpoint() {
    let fx = Fixture::new().await;

    let created = fx
        .engine
        .create("Test 1", Some("first save"))
        .await
        .unwrap();
    assert!(!created.value.committed);

    let list = fx.engine.list().await.unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0].name, "Test 1");
    assert!(list[0].name_decoded);
    assert_eq!(list[0].description, "first save");
    assert_eq!(list[0].author, "Tester");
    assert_eq!(list[0].tag, created.value.tag);
    assert_eq!(fx.remote_tags(), vec![created.value.tag.clone()]);

    let config = fx.engine.config_store().get().await;
    assert_eq!(config.last_save.unwrap().tag, created.value.tag);
    assert_eq!(config.current_save, None);
}

#[tokio::test]
async fn test_create_without_description_uses_default() {
    let fx = Fixture::new().await;
    fx.write("level.txt", "1");

    let created = fx.engine.create("日本語 🎮", None).await.unwrap();
    assert!(created.value.committed);

    let list = fx.engine.list().await.unwrap();
    assert_eq!(list[0].name, "日本語 🎮");
    assert_eq!(list[0].description, DEFAULT_DESCRIPTION);
    assert_eq!(fx.git(&["log", "-1", "--format=%s"]), "Checkpoint: 日本語 🎮");
    assert_eq!(fx.git(&["log", "-1", "--format=%an"]), "Tester");
}

#[tokio::test]
async fn test_create_rejects_blank_name() {
    let fx = Fixture::new().await;

    let err = fx.engine.create("   ", None).await.unwrap_err();

    assert!(matches!(err, EngineError::InvalidInput(_)));
    assert!(fx.local_tags().is_empty());
}

#[tokio::test]
async fn test_list_orders_newest_first_and_ignores_foreign_tags() {
    let fx = Fixture::new().await;
    fx.engine.create("older", None).await.unwrap();
    fx.write("a.txt", "a");
    fx.engine.create("newer", None).await.unwrap();
    fx.git(&["tag", "v1.0.0"]);
    fx.git(&["push", "origin", "v1.0.0"]);

    let names: Vec<String> = fx
        .engine
        .list()
        .await
        .unwrap()
        .into_iter()
        .map(|c| c.name)
        .collect();

    assert_eq!(names, vec!["newer".to_string(), "older".to_string()]);
}

#[tokio::test]
async fn test_concurrent_create_is_rejected_as_busy() {
    let fx = Fixture::new().await;

    let (first, second) = tokio::join!(
        fx.engine.create("first", None),
        fx.engine.create("second", None)
    );

    let results = [first, second];
    let busy: Vec<_> = results
        .iter()
        .filter_map(|r| match r {
            Err(EngineError::Busy { operation }) => Some(operation.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(busy, vec!["create".to_string()]);
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert_eq!(fx.local_tags().len(), 1);
    assert!(!fx.engine.lock().is_held());
}

#[tokio::test]
async fn test_failed_tag_push_removes_local_tag() {
    let fx = Fixture::new().await;
    fx.break_remote();

    let err = fx.engine.create("unpushed", None).await.unwrap_err();

    assert_eq!(err.code(), "remote_error");
    assert!(err.details().is_some());
    assert!(fx.local_tags().is_empty());
    assert!(fx.engine.config_store().get().await.last_save.is_none());
}

#[tokio::test]
async fn test_create_rejects_name_too_long_for_a_tag() {
    let fx = Fixture::new().await;

    let err = fx
        .engine
        .create(&"x".repeat(MAX_NAME_BYTES + 1), None)
        .await
        .unwrap_err();

    assert_eq!(err.code(), "invalid_input");
    assert!(fx.local_tags().is_empty());

    let longest = fx
        .engine
        .create(&"é".repeat(MAX_NAME_BYTES / 2), None)
        .await
        .unwrap();
    assert_eq!(fx.remote_tags(), vec![longest.value.tag]);
}

#[tokio::test]
async fn test_load_with_dirty_tree_preserves_interrupted_work() {
    let fx = Fixture::new().await;
    fx.write("save.txt", "v1");
    let tag = fx.engine.create("one", None).await.unwrap().value.tag;

    fx.write("save.txt", "v2");
    fx.write("notes/new.txt", "untracked");
    let loaded = fx.engine.load(&tag).await.unwrap();

    assert!(loaded.value.interrupted_work_saved);
    let config = fx.engine.config_store().get().await;
    assert!(config.has_temp_stash);
    assert_eq!(config.current_save.unwrap().tag, tag);
    assert_eq!(fx.read("save.txt").as_deref(), Some("v1"));
    assert_eq!(fx.read("notes/new.txt"), None);
    assert_eq!(fx.git(&["rev-parse", "HEAD"]), loaded.value.commit);
    assert_eq!(fx.git(&["rev-parse", "--abbrev-ref", "HEAD"]), "HEAD");

    fx.engine.apply_interrupted_work().await.unwrap();

    assert!(!fx.engine.config_store().get().await.has_temp_stash);
    assert_eq!(fx.read("save.txt").as_deref(), Some("v2"));
    assert_eq!(fx.read("notes/new.txt").as_deref(), Some("untracked"));
    assert_eq!(fx.stash_count(), 0);
}

#[tokio::test]
async fn test_load_with_clean_tree_leaves_flag_false() {
    let fx = Fixture::new().await;
    fx.write("save.txt", "v1");
    let first = fx.engine.create("one", None).await.unwrap().value.tag;
    fx.write("save.txt", "v2");
    fx.engine.create("two", None).await.unwrap();

    let loaded = fx.engine.load(&first).await.unwrap();

    assert!(!loaded.value.interrupted_work_saved);
    assert!(!fx.engine.config_store().get().await.has_temp_stash);
    assert_eq!(fx.read("save.txt").as_deref(), Some("v1"));
    assert_eq!(fx.stash_count(), 0);
}

#[tokio::test]
async fn test_load_refuses_second_interrupted_work_record() {
    let fx = Fixture::new().await;
    let tag = fx.engine.create("base", None).await.unwrap().value.tag;

    fx.write("a.txt", "first edit");
    fx.engine.load(&tag).await.unwrap();
    fx.write("b.txt", "second edit");

    let err = fx.engine.load(&tag).await.unwrap_err();

    assert!(matches!(err, EngineError::InterruptedWorkPending));
    assert_eq!(fx.stash_count(), 1);
    assert_eq!(fx.read("b.txt").as_deref(), Some("second edit"));
}

#[tokio::test]
async fn test_load_unknown_tag_is_not_found() {
    let fx = Fixture::new().await;

    let err = fx.engine.load("save_1_bm9wZQ").await.unwrap_err();

    assert!(matches!(err, EngineError::NotFound(_)));
}

#[tokio::test]
async fn test_discard_drops_interrupted_work() {
    let fx = Fixture::new().await;
    let tag = fx.engine.create("base", None).await.unwrap().value.tag;
    fx.write("scratch.txt", "throwaway");
    fx.engine.load(&tag).await.unwrap();

    fx.engine.discard_interrupted_work().await.unwrap();

    assert!(!fx.engine.config_store().get().await.has_temp_stash);
    assert_eq!(fx.stash_count(), 0);
    assert_eq!(fx.read("scratch.txt"), None);

    let err = fx.engine.discard_interrupted_work().await.unwrap_err();
    assert!(matches!(err, EngineError::NoInterruptedWork));
}

#[tokio::test]
async fn test_interrupted_work_flag_heals_when_stash_is_missing() {
    let fx = Fixture::new().await;
    fx.engine
        .config_store()
        .update(|c| c.has_temp_stash = true)
        .await
        .unwrap();

    let status = fx.engine.status().await.unwrap();
    assert!(!status.has_temp_stash);

    fx.engine
        .config_store()
        .update(|c| c.has_temp_stash = true)
        .await
        .unwrap();
    let err = fx.engine.apply_interrupted_work().await.unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));
    assert!(!fx.engine.config_store().get().await.has_temp_stash);
}

#[tokio::test]
async fn test_foreign_stash_entries_are_left_alone() {
    let fx = Fixture::new().await;
    let tag = fx.engine.create("base", None).await.unwrap().value.tag;
    fx.write("mine.txt", "interrupted");
    fx.engine.load(&tag).await.unwrap();

    fx.write("other.txt", "manual stash");
    fx.git(&["stash", "push", "--include-untracked", "-m", "manual"]);

    fx.engine.apply_interrupted_work().await.unwrap();

    assert_eq!(fx.read("mine.txt").as_deref(), Some("interrupted"));
    assert_eq!(fx.read("other.txt"), None);
    assert!(fx.git(&["stash", "list"]).contains("manual"));
}

#[tokio::test]
async fn test_delete_clears_current_pointer_only_for_that_checkpoint() {
    let fx = Fixture::new().await;
    let keep = fx.engine.create("keep", None).await.unwrap().value.tag;
    fx.write("x.txt", "x");
    let other = fx.engine.create("other", None).await.unwrap().value.tag;
    fx.engine.load(&keep).await.unwrap();

    let deleted = fx.engine.delete(&other).await.unwrap();
    assert!(!deleted.value.cleared_current);
    assert!(!deleted.has_warnings());
    assert_eq!(
        fx.engine.config_store().get().await.current_save.unwrap().tag,
        keep
    );

    let deleted = fx.engine.delete(&keep).await.unwrap();
    assert!(deleted.value.cleared_current);
    assert_eq!(fx.engine.config_store().get().await.current_save, None);
    assert!(fx.local_tags().is_empty());
    assert!(fx.remote_tags().is_empty());
}

#[tokio::test]
async fn test_delete_with_unreachable_remote_succeeds_with_warning() {
    let fx = Fixture::new().await;
    let tag = fx.engine.create("doomed", None).await.unwrap().value.tag;
    fx.break_remote();

    let deleted = fx.engine.delete(&tag).await.unwrap();

    assert!(!deleted.value.remote_deleted);
    assert_eq!(deleted.warnings.len(), 1);
    assert!(fx.local_tags().is_empty());
    assert_eq!(fx.remote_tags(), vec![tag]);
}

#[tokio::test]
async fn test_rename_to_same_name_keeps_identity() {
    let fx = Fixture::new().await;
    let tag = fx
        .engine
        .create("Boss", Some("before the fight"))
        .await
        .unwrap()
        .value
        .tag;

    let renamed = fx
        .engine
        .rename(&tag, "Boss", Some("after the fight"))
        .await
        .unwrap();

    assert!(!renamed.value.identity_changed);
    assert_eq!(renamed.value.tag, tag);
    let list = fx.engine.list().await.unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0].tag, tag);
    assert_eq!(list[0].description, "after the fight");
    assert_eq!(fx.remote_tags(), vec![tag]);
}

#[tokio::test]
async fn test_rename_same_name_push_failure_is_fatal() {
    let fx = Fixture::new().await;
    let tag = fx
        .engine
        .create("Boss", Some("before the fight"))
        .await
        .unwrap()
        .value
        .tag;
    fx.break_remote();

    let err = fx
        .engine
        .rename(&tag, "Boss", Some("after the fight"))
        .await
        .unwrap_err();

    assert_eq!(err.code(), "remote_error");
    assert!(err.to_string().contains("check that the token may overwrite tags"));
    assert!(err.details().is_some());
    assert_eq!(fx.local_tags(), vec![tag.clone()]);
    assert_eq!(fx.remote_tags(), vec![tag.clone()]);
    let remote_message = git(
        &fx.remote,
        &["tag", "--list", "--format=%(contents)", tag.as_str()],
    );
    assert!(remote_message.contains("before the fight"));
}

#[tokio::test]
async fn test_rename_to_new_name_replaces_identity() {
    let fx = Fixture::new().await;
    let old = fx
        .engine
        .create("Draft", Some("keep me"))
        .await
        .unwrap()
        .value
        .tag;
    let commit = fx.remote_commit(&old);
    fx.engine.load(&old).await.unwrap();

    let renamed = fx.engine.rename(&old, "Final", None).await.unwrap();

    let new = renamed.value.tag.clone();
    assert!(renamed.value.identity_changed);
    assert_ne!(new, old);
    assert_eq!(fx.local_tags(), vec![new.clone()]);
    assert_eq!(fx.remote_tags(), vec![new.clone()]);
    assert_eq!(fx.remote_commit(&new), commit);

    let list = fx.engine.list().await.unwrap();
    assert_eq!(list[0].name, "Final");
    assert_eq!(list[0].description, "keep me");

    let config = fx.engine.config_store().get().await;
    assert_eq!(config.current_save.unwrap().tag, new);
    assert_eq!(config.last_save.unwrap().tag, new);
}

#[tokio::test]
async fn test_overwrite_keeps_identity_and_moves_commit() {
    let fx = Fixture::new().await;
    fx.write("world.txt", "day 1");
    let tag = fx
        .engine
        .create("World", Some("main save"))
        .await
        .unwrap()
        .value
        .tag;
    let before = fx.remote_commit(&tag);
    fx.engine
        .config_store()
        .update(|c| c.last_save = None)
        .await
        .unwrap();

    fx.write("world.txt", "day 2");
    let outcome = fx.engine.overwrite(&tag, OverwriteMode::Manual).await.unwrap();

    assert!(outcome.value.committed);
    assert_eq!(outcome.value.previous_commit, before);
    assert_ne!(fx.remote_commit(&tag), before);
    assert_eq!(fx.remote_commit(&tag), outcome.value.commit);
    assert_eq!(fx.remote_tags(), vec![tag.clone()]);

    let list = fx.engine.list().await.unwrap();
    assert_eq!(list[0].tag, tag);
    assert_eq!(list[0].description, "main save");
    assert_eq!(
        fx.engine.config_store().get().await.last_save.unwrap().tag,
        tag
    );
}

#[tokio::test]
async fn test_overwrite_push_failure_is_fatal_and_drops_new_local_tag() {
    let fx = Fixture::new().await;
    fx.write("world.txt", "day 1");
    let tag = fx.engine.create("World", None).await.unwrap().value.tag;
    let before = fx.remote_commit(&tag);
    fx.write("world.txt", "day 2");
    fx.break_remote();

    let err = fx
        .engine
        .overwrite(&tag, OverwriteMode::Manual)
        .await
        .unwrap_err();

    assert_eq!(err.code(), "remote_error");
    assert!(err.details().is_some());
    assert!(fx.local_tags().is_empty());
    assert_eq!(fx.remote_tags(), vec![tag.clone()]);
    assert_eq!(fx.remote_commit(&tag), before);
    assert!(!fx.engine.lock().is_held());
}

#[tokio::test]
async fn test_autonomous_overwrite_leaves_last_save_alone() {
    let fx = Fixture::new().await;
    let tag = fx.engine.create("auto", None).await.unwrap().value.tag;
    fx.engine
        .config_store()
        .update(|c| c.last_save = None)
        .await
        .unwrap();

    fx.write("progress.txt", "more");
    fx.engine
        .overwrite(&tag, OverwriteMode::Autonomous)
        .await
        .unwrap();

    assert!(fx.engine.config_store().get().await.last_save.is_none());
    assert_eq!(fx.local_tags(), vec![tag]);
}

#[tokio::test]
async fn test_diff_against_itself_is_empty() {
    let fx = Fixture::new().await;
    fx.write("a.txt", "a");
    let tag = fx.engine.create("snap", None).await.unwrap().value.tag;

    let report = fx.engine.diff(&tag, &tag).await.unwrap();

    assert!(report.files.is_empty());
    assert!(!report.against_empty_tree);
}

#[tokio::test]
async fn test_diff_first_checkpoint_against_empty_tree_lists_all_added() {
    let fx = Fixture::with_files(&[("readme.txt", "hello"), ("maps/one.txt", "1")]).await;
    let tag = fx.engine.create("first", None).await.unwrap().value.tag;

    let report = fx.engine.diff(&format!("{tag}^"), &tag).await.unwrap();

    assert!(report.against_empty_tree);
    let mut files: Vec<_> = report.files.iter().map(|f| f.file_name.as_str()).collect();
    files.sort_unstable();
    assert_eq!(files, vec!["maps/one.txt", "readme.txt"]);
    assert!(report.files.iter().all(|f| f.status == FileStatus::Added));
}

#[tokio::test]
async fn test_diff_between_checkpoints_classifies_changes() {
    let fx = Fixture::with_files(&[("keep.txt", "same"), ("edit.txt", "v1"), ("drop.txt", "bye")])
        .await;
    let first = fx.engine.create("first", None).await.unwrap().value.tag;

    fx.write("edit.txt", "v2");
    std::fs::remove_file(fx.workspace().join("drop.txt")).unwrap();
    fx.write("new.txt", "hi");
    let second = fx.engine.create("second", None).await.unwrap().value.tag;

    let report = fx.engine.diff(&first, &second).await.unwrap();
    let mut pairs: Vec<_> = report
        .files
        .iter()
        .map(|f| (f.file_name.clone(), f.status.as_str().to_string()))
        .collect();
    pairs.sort();

    assert_eq!(
        pairs,
        vec![
            ("drop.txt".to_string(), "deleted".to_string()),
            ("edit.txt".to_string(), "modified".to_string()),
            ("new.txt".to_string(), "added".to_string()),
        ]
    );
}

#[tokio::test]
async fn test_diff_unknown_ref_is_not_found() {
    let fx = Fixture::new().await;
    let tag = fx.engine.create("snap", None).await.unwrap().value.tag;

    let err = fx.engine.diff("save_1_bm9wZQ", &tag).await.unwrap_err();

    assert!(matches!(err, EngineError::NotFound(_)));
}

#[tokio::test]
async fn test_second_client_tracks_existing_branch_and_sees_checkpoints() {
    let fx = Fixture::new().await;
    fx.write("shared.txt", "from first");
    let tag = fx.engine.create("shared", None).await.unwrap().value.tag;

    let second = fx.second_engine().await;
    let report = second.authorize(None).await.unwrap();

    assert!(!report.value.created_branch);
    assert!(report.value.initialized_repository);
    let list = second.list().await.unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0].tag, tag);

    second.load(&tag).await.unwrap();
    let shared = std::fs::read_to_string(second.paths().workspace_dir.join("shared.txt")).unwrap();
    assert_eq!(shared, "from first");
}

#[tokio::test]
async fn test_force_reinitialize_resets_pointers_and_reconnects() {
    let fx = Fixture::new().await;
    let tag = fx.engine.create("survivor", None).await.unwrap().value.tag;
    fx.engine.load(&tag).await.unwrap();

    let outcome = fx.engine.force_reinitialize().await.unwrap();

    assert!(outcome.value.initialized_repository);
    let config = fx.engine.config_store().get().await;
    assert!(config.is_authorized);
    assert!(config.last_save.is_none());
    assert!(config.current_save.is_none());
    assert_eq!(fx.engine.list().await.unwrap()[0].tag, tag);
}

#[tokio::test]
async fn test_status_reports_detached_checkpoint() {
    let fx = Fixture::new().await;
    let tag = fx.engine.create("here", None).await.unwrap().value.tag;

    let before = fx.engine.status().await.unwrap();
    assert!(before.initialized);
    assert_eq!(before.current_branch.as_deref(), Some("main"));

    fx.engine.load(&tag).await.unwrap();
    let after = fx.engine.status().await.unwrap();

    assert_eq!(after.current_branch, None);
    assert_eq!(after.current_save.unwrap().tag, tag);
    assert_eq!(after.operation, None);
}

#[tokio::test]
async fn test_authorize_requires_repository_url() {
    let dir = tempfile::tempdir().unwrap();
    let engine = savestate_engine::CheckpointEngine::open(
        savestate_storage::SaveStatePaths::from_root(dir.path().to_path_buf()),
    )
    .await
    .unwrap();

    let err = engine.authorize(None).await.unwrap_err();

    assert!(matches!(err, EngineError::InvalidInput(_)));
}

#[tokio::test]
async fn test_authorize_with_unreachable_remote_fails() {
    let dir = tempfile::tempdir().unwrap();
    let engine = savestate_engine::CheckpointEngine::open(
        savestate_storage::SaveStatePaths::from_root(dir.path().join("data")),
    )
    .await
    .unwrap();
    let missing = dir.path().join("nowhere.git").to_str().unwrap().to_string();
    engine
        .config_store()
        .update(|c| c.repo_url = missing)
        .await
        .unwrap();

    let err = engine.authorize(None).await.unwrap_err();

    assert_eq!(err.code(), "remote_error");
    assert!(!engine.config_store().get().await.is_authorized);
}
