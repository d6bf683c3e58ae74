//! Integration tests for boot and shutdown

use super::test_utils::{boot_in, boot_temp, path};
use jsonfs::{FsContext, FsError};

#[tokio::test]
async fn test_shutdown_persists_static_and_stops() {
    let (temp_dir, manager) = boot_temp().await;
    let file = manager
        .create_or_get_file(&path("static://settings/volume.float"))
        .unwrap();
    let (op, _) = file.operate_as::<f64>(None).unwrap();
    op.write(0.75).unwrap();
    let root = manager.root_folder(&path("static://")).unwrap();

    manager.shutdown().await;

    assert!(!manager.is_started());
    assert!(temp_dir.path().join("SaveData_Global.json").exists());
    assert!(root.is_removed());
    assert!(file.is_removed());
    assert!(matches!(
        manager.create_or_get_file(&path("static://again.int")),
        Err(FsError::NotBooted)
    ));
    assert!(matches!(
        root.create_or_get_folder("late"),
        Err(FsError::NotBooted)
    ));

    let restarted = boot_in(temp_dir.path()).await;
    let reloaded = restarted
        .file(&path("static://settings/volume.float"))
        .unwrap()
        .unwrap();
    let (op, _) = reloaded.operate_as::<f64>(None).unwrap();
    assert_eq!(op.read().unwrap(), 0.75);
}

#[tokio::test]
async fn test_shutdown_is_idempotent() {
    let (_temp_dir, manager) = boot_temp().await;
    manager.new_container().await.unwrap();
    manager.shutdown().await;
    manager.shutdown().await;
    assert!(!manager.is_started());
    assert!(!manager.has_active_current_container());
}

#[tokio::test]
async fn test_shutdown_disposes_tickets() {
    let (_temp_dir, manager) = boot_temp().await;
    let ticket = manager.create_disk_ticket().unwrap().unwrap();
    let static_ticket = manager.static_disk_ticket().unwrap();

    manager.shutdown().await;
    assert!(ticket.is_disposed());
    assert!(static_ticket.is_disposed());
    assert!(matches!(
        manager.get_all_disk_tickets(),
        Err(FsError::NotBooted)
    ));
}

#[tokio::test]
async fn test_rescan_replaces_containers_and_tickets() {
    let (_temp_dir, manager) = boot_temp().await;
    let old_ticket = manager.create_disk_ticket().unwrap().unwrap();
    let old_static = manager.static_container().unwrap();
    let current = manager.new_container().await.unwrap();

    manager.scan_disk().await.unwrap();

    assert!(old_ticket.is_disposed());
    assert!(old_static.is_disposed());
    assert!(current.is_disposed());
    assert!(!manager.has_active_current_container());
    assert!(!manager.static_container().unwrap().is_disposed());
    // the unwritten ticket had no file, so nothing is rediscovered
    assert!(manager.get_all_disk_tickets().unwrap().is_empty());
}

#[test]
fn test_fresh_context_is_not_started() {
    let ctx = FsContext::new();
    assert!(!ctx.is_started());
    assert!(matches!(ctx.ensure_started(), Err(FsError::NotBooted)));
    assert_eq!(ctx.pending_flushes(), 0);
}
