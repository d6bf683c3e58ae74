//! Integration tests for disk ticket allocation and scanning

use super::test_utils::{boot_in, config_in};
use jsonfs::{default_binders, Manager, ManagerConfig};
use std::collections::BTreeSet;
use std::fs;
use tempfile::TempDir;

async fn boot_with_slots(dir: &std::path::Path, max_slots: u32) -> Manager {
    let config = ManagerConfig {
        max_slots,
        ..config_in(dir)
    };
    Manager::boot(config, default_binders()).await.unwrap()
}

#[tokio::test]
async fn test_slot_allocation_is_exhaustive() {
    let temp_dir = TempDir::new().unwrap();
    let manager = boot_with_slots(temp_dir.path(), 3).await;

    let mut ids = BTreeSet::new();
    let mut exhausted = 0;
    for _ in 0..5 {
        match manager.create_disk_ticket().unwrap() {
            Some(ticket) => assert!(ids.insert(ticket.id())),
            None => exhausted += 1,
        }
    }
    assert_eq!(ids, BTreeSet::from([0, 1, 2]));
    assert_eq!(exhausted, 2);
    assert_eq!(manager.get_all_disk_tickets().unwrap().len(), 3);
}

#[tokio::test]
async fn test_deleted_slot_is_reused() {
    let temp_dir = TempDir::new().unwrap();
    let manager = boot_with_slots(temp_dir.path(), 2).await;
    manager.new_container().await.unwrap();

    let first = manager.create_disk_ticket().unwrap().unwrap();
    let second = manager.create_disk_ticket().unwrap().unwrap();
    assert!(manager.create_disk_ticket().unwrap().is_none());

    manager.write_current(&first, "").await.unwrap();
    assert!(first.file_path().exists());

    assert!(manager.delete_disk_ticket(&first).unwrap());
    assert!(first.is_disposed());
    assert!(!first.file_path().exists());

    let reused = manager.create_disk_ticket().unwrap().unwrap();
    assert_eq!(reused.id(), 0);
    assert_eq!(second.id(), 1);
}

#[tokio::test]
async fn test_static_ticket_can_not_be_deleted() {
    let temp_dir = TempDir::new().unwrap();
    let manager = boot_in(temp_dir.path()).await;
    manager.write_static().await.unwrap();

    let ticket = manager.static_disk_ticket().unwrap();
    assert!(ticket.is_static());
    assert!(!manager.delete_disk_ticket(&ticket).unwrap());
    assert!(ticket.file_path().exists());
    assert!(!ticket.is_disposed());
}

#[tokio::test]
async fn test_scan_picks_up_matching_files_only() {
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path();
    fs::write(dir.join("SaveData_4.json"), r#"{"Description": "four"}"#).unwrap();
    fs::write(dir.join("SaveData_1.json"), r#"{"Description": "one"}"#).unwrap();
    fs::write(dir.join("SaveData_2.json.tmp"), "{}").unwrap();
    fs::write(dir.join("notes.txt"), "hello").unwrap();
    fs::write(dir.join("SaveData_7.json"), "garbage").unwrap();
    fs::create_dir(dir.join("SaveData_9.json")).unwrap();

    let manager = boot_in(dir).await;
    let tickets = manager.get_all_disk_tickets().unwrap();
    let found: Vec<(i64, String)> = tickets
        .iter()
        .map(|t| (t.id(), t.description()))
        .collect();
    assert_eq!(
        found,
        vec![(1, "one".to_string()), (4, "four".to_string())]
    );

    // free ids are allocated around the scanned ones
    assert_eq!(manager.create_disk_ticket().unwrap().unwrap().id(), 0);
    assert_eq!(manager.create_disk_ticket().unwrap().unwrap().id(), 2);
}

#[tokio::test]
async fn test_unreadable_save_file_keeps_its_slot() {
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path();
    let broken = r#"{"Description": "precious", "FS": ["#;
    fs::write(dir.join("SaveData_0.json"), broken).unwrap();
    fs::write(dir.join("SaveData_2.json"), r#"{"Description": "two"}"#).unwrap();

    let manager = boot_in(dir).await;
    assert_eq!(manager.get_all_disk_tickets().unwrap().len(), 1);

    manager.new_container().await.unwrap();
    let first = manager.create_disk_ticket().unwrap().unwrap();
    let second = manager.create_disk_ticket().unwrap().unwrap();
    assert_eq!(first.id(), 1);
    assert_eq!(second.id(), 3);

    manager.write_current(&first, "new").await.unwrap();
    manager.write_current(&second, "newer").await.unwrap();
    assert_eq!(
        fs::read_to_string(dir.join("SaveData_0.json")).unwrap(),
        broken
    );
}

#[tokio::test]
async fn test_scan_ignores_slots_beyond_limit() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(temp_dir.path().join("SaveData_5.json"), "{}").unwrap();
    let manager = boot_with_slots(temp_dir.path(), 2).await;
    assert!(manager.get_all_disk_tickets().unwrap().is_empty());
}

#[tokio::test]
async fn test_tickets_live_under_save_subdir() {
    let temp_dir = TempDir::new().unwrap();
    let config = ManagerConfig {
        save_root: temp_dir.path().to_path_buf(),
        save_subdir: "profiles/main".to_string(),
        ..ManagerConfig::default()
    };
    let manager = Manager::boot(config, default_binders()).await.unwrap();
    manager.write_static().await.unwrap();
    assert!(temp_dir
        .path()
        .join("profiles/main/SaveData_Global.json")
        .exists());
}
