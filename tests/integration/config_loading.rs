//! Integration tests for layered configuration feeding a manager

use jsonfs::{default_binders, ConfigLoader, FsError, Manager, ManagerConfig};
use tempfile::TempDir;

fn write_config(dir: &std::path::Path, save_root: &std::path::Path, extra: &str) -> std::path::PathBuf {
    let config_file = dir.join("jsonfs.toml");
    std::fs::write(
        &config_file,
        format!(
            "save_root = {:?}\nsave_subdir = \"slots\"\n{}",
            save_root.to_string_lossy(),
            extra
        ),
    )
    .unwrap();
    config_file
}

#[tokio::test]
async fn test_file_config_drives_manager() {
    let temp_dir = TempDir::new().unwrap();
    let config_file = write_config(
        temp_dir.path(),
        temp_dir.path(),
        r#"
max_slots = 2
pretty = true

[naming]
global_name = "World"
prefix = "Slot"
"#,
    );

    let config = ConfigLoader::load_from_file(&config_file).unwrap();
    assert_eq!(config.max_slots, 2);
    assert_eq!(config.naming.prefix, "Slot");
    assert_eq!(config.naming.postfix, "");
    assert_eq!(config.naming.extension, "json");
    assert_eq!(config.save_dir(), temp_dir.path().join("slots"));

    let manager = Manager::boot(config, default_binders()).await.unwrap();
    manager.new_container().await.unwrap();
    let first = manager.create_disk_ticket().unwrap().unwrap();
    manager.create_disk_ticket().unwrap().unwrap();
    assert!(manager.create_disk_ticket().unwrap().is_none());

    manager.write_current(&first, "first").await.unwrap();
    manager.write_static().await.unwrap();

    let slot_file = temp_dir.path().join("slots/Slot0.json");
    let contents = std::fs::read_to_string(&slot_file).unwrap();
    assert!(contents.contains('\n'));
    assert!(contents.contains("\"Description\": \"first\""));
    assert!(temp_dir.path().join("slots/World.json").exists());
}

#[test]
fn test_missing_file_is_reported() {
    let temp_dir = TempDir::new().unwrap();
    let result = ConfigLoader::load_from_file(&temp_dir.path().join("absent.toml"));
    assert!(matches!(result, Err(FsError::Config(_))));
}

#[test]
fn test_invalid_values_fail_validation() {
    let temp_dir = TempDir::new().unwrap();
    let config_file = write_config(temp_dir.path(), temp_dir.path(), "workers = 0\n");

    match ConfigLoader::load_from_file(&config_file) {
        Err(FsError::Config(msg)) => assert!(msg.contains("Workers")),
        other => panic!("expected a validation error, got {:?}", other.map(|_| ())),
    }
}

#[tokio::test]
async fn test_invalid_config_refuses_to_boot() {
    let temp_dir = TempDir::new().unwrap();
    let mut config = ManagerConfig::with_save_dir(temp_dir.path());
    config.naming.extension = String::new();

    let result = Manager::boot(config, default_binders()).await;
    assert!(matches!(result, Err(FsError::Config(_))));
    assert!(std::fs::read_dir(temp_dir.path()).unwrap().next().is_none());
}
