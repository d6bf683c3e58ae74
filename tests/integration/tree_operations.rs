//! Integration tests for path-addressed folder and file operations

use super::test_utils::{boot_temp, path};
use jsonfs::{FsError, PathError, Vec3};
use serde_json::json;

#[tokio::test]
async fn test_write_then_read_is_coherent_before_flush() {
    let (_temp_dir, manager) = boot_temp().await;
    let file = manager
        .create_or_get_file(&path("static://world/spawn.vec3"))
        .unwrap();
    let (op, _) = file.operate_as::<Vec3>(None).unwrap();
    let spawn = Vec3 { x: 1.0, y: 0.0, z: -4.0 };
    op.write(spawn).unwrap();

    assert_eq!(op.read().unwrap(), spawn);
    assert_eq!(file.to_json()["data"], json!(null));
    assert_eq!(manager.context().pending_flushes(), 1);
}

#[tokio::test]
async fn test_repeated_writes_flush_once() {
    let (_temp_dir, manager) = boot_temp().await;
    let file = manager
        .create_or_get_file(&path("static://score.int"))
        .unwrap();
    let (op, _) = file.operate_as::<i64>(None).unwrap();
    op.write(7).unwrap();
    op.write(7).unwrap();
    op.dirty().unwrap();

    let report = manager.flush().unwrap();
    assert_eq!(report.flushed, 1);
    assert_eq!(report.failed, 0);
    assert_eq!(file.to_json()["data"], json!(7));

    // nothing left to do
    assert_eq!(manager.flush().unwrap().flushed, 0);

    // dirty again after a flush is a fresh registration
    op.write(8).unwrap();
    assert_eq!(manager.refresh().unwrap().flushed, 1);
    assert_eq!(file.to_json()["data"], json!(8));
}

#[tokio::test]
async fn test_null_write_empties_and_cancels_flush() {
    let (_temp_dir, manager) = boot_temp().await;
    let file = manager
        .create_or_get_file(&path("static://maybe.str"))
        .unwrap();
    let (op, _) = file.operate_as::<String>(None).unwrap();
    op.write("pending".to_string()).unwrap();
    op.write_opt(None).unwrap();

    assert!(file.is_empty());
    assert_eq!(manager.context().pending_flushes(), 0);
    assert_eq!(manager.flush().unwrap().flushed, 0);
    assert_eq!(
        file.to_json(),
        json!({"type": "str", "empty": true, "data": null})
    );
    assert_eq!(op.read().unwrap(), "");
}

#[tokio::test]
async fn test_delete_cascades_without_orphans() {
    let (_temp_dir, manager) = boot_temp().await;
    let top = manager
        .create_or_get_folder(&path("static://top"))
        .unwrap();
    let deep_file = manager
        .create_or_get_file(&path("static://top/mid/leaf/value.int"))
        .unwrap();
    let side_file = manager
        .create_or_get_file(&path("static://top/side.bool"))
        .unwrap();
    let keep = manager
        .create_or_get_file(&path("static://keep.int"))
        .unwrap();
    let mid = manager.folder(&path("static://top/mid")).unwrap().unwrap();
    let leaf = manager
        .folder(&path("static://top/mid/leaf"))
        .unwrap()
        .unwrap();
    let (op, _) = deep_file.operate_as::<i64>(None).unwrap();
    op.write(1).unwrap();

    let root = manager.root_folder(&path("static://")).unwrap();
    assert!(root.delete_folder("top").unwrap());

    for removed in [&top, &mid, &leaf] {
        assert!(removed.is_removed());
    }
    assert!(deep_file.is_removed());
    assert!(side_file.is_removed());
    assert!(!keep.is_removed());
    assert_eq!(manager.context().pending_flushes(), 0);

    let snapshot = manager.static_container().unwrap().root_json().unwrap();
    assert_eq!(snapshot["folders"], json!({}));
    assert_eq!(snapshot["files"].as_object().unwrap().len(), 1);
    assert!(!manager
        .folder_exists(&path("static://top/mid"))
        .unwrap());
    assert!(matches!(
        leaf.create_or_get_file("x", "int"),
        Err(FsError::Removed(_))
    ));
}

#[tokio::test]
async fn test_path_shape_is_checked() {
    let (_temp_dir, manager) = boot_temp().await;
    assert!(matches!(
        manager.create_or_get_file(&path("static://dir")),
        Err(FsError::Path(PathError::NotAFilePath(_)))
    ));
    assert!(matches!(
        manager.create_or_get_folder(&path("static://dir/file.int")),
        Err(FsError::Path(PathError::NotAFolderPath(_)))
    ));
}

#[tokio::test]
async fn test_unregistered_tag_is_rejected() {
    let (_temp_dir, manager) = boot_temp().await;
    assert!(matches!(
        manager.create_or_get_file(&path("static://x.nonexistent_tag")),
        Err(FsError::NoMatchingTypeBinder(_))
    ));
    assert!(!manager.file_exists(&path("static://x.nonexistent_tag")).unwrap());
}

#[tokio::test]
async fn test_runtime_binder_registration() {
    #[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
    struct Inventory {
        items: Vec<String>,
    }

    let (_temp_dir, manager) = boot_temp().await;
    let binder = manager.add_binder::<Inventory>("inventory").unwrap();
    assert!(binder.is_some());
    assert!(manager.add_binder::<Inventory>("int").unwrap().is_none());

    let file = manager
        .create_or_get_file(&path("static://bag.inventory"))
        .unwrap();
    assert!(file.object_type_name().ends_with("Inventory"));
    let (op, _) = file.operate_as::<Inventory>(None).unwrap();
    op.write(Inventory {
        items: vec!["rope".to_string()],
    })
    .unwrap();
    manager.flush().unwrap();
    assert_eq!(file.to_json()["data"], json!({"items": ["rope"]}));
}
