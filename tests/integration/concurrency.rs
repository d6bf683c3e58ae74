//! Integration tests for concurrent access to one manager

use super::test_utils::{boot_temp, path};
use std::collections::HashSet;
use std::sync::Arc;

const FILES_PER_WORKER: usize = 50;

/// Two workers filling disjoint folders lose nothing
#[tokio::test]
async fn test_concurrent_distinct_subtree_mutation() {
    let (_temp_dir, manager) = boot_temp().await;
    let left = manager
        .create_or_get_folder(&path("static://left"))
        .unwrap();
    let right = manager
        .create_or_get_folder(&path("static://right"))
        .unwrap();

    std::thread::scope(|scope| {
        for folder in [&left, &right] {
            scope.spawn(move || {
                for i in 0..FILES_PER_WORKER {
                    let file = folder
                        .create_or_get_file(&format!("item{}", i), "int")
                        .unwrap();
                    let (op, _) = file.operate_as::<i64>(None).unwrap();
                    op.write(i as i64).unwrap();
                }
            });
        }
    });

    let report = manager.flush().unwrap();
    assert_eq!(report.flushed, 2 * FILES_PER_WORKER);

    let snapshot = manager.static_container().unwrap().root_json().unwrap();
    for side in ["left", "right"] {
        let files = snapshot["folders"][side]["files"].as_object().unwrap();
        assert_eq!(files.len(), FILES_PER_WORKER);
        for i in 0..FILES_PER_WORKER {
            assert_eq!(files[&format!("item{}.int", i)]["data"], i as i64);
        }
    }
}

/// Racing creators under one folder still end up with a single file
#[tokio::test]
async fn test_concurrent_create_or_get_same_file() {
    let (_temp_dir, manager) = boot_temp().await;
    let folder = manager
        .create_or_get_folder(&path("static://shared"))
        .unwrap();

    let files: Vec<_> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| scope.spawn(|| folder.create_or_get_file("counter", "int").unwrap()))
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    for file in &files[1..] {
        assert!(Arc::ptr_eq(file, &files[0]));
    }
    assert_eq!(folder.files().unwrap().len(), 1);
}

/// Parallel slot reservations never hand out the same id
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_ticket_allocation() {
    let (_temp_dir, manager) = boot_temp().await;
    let manager = Arc::new(manager);

    let mut tasks = Vec::new();
    for _ in 0..16 {
        let manager = manager.clone();
        tasks.push(tokio::spawn(async move {
            manager.create_disk_ticket().unwrap().unwrap().id()
        }));
    }

    let mut ids = HashSet::new();
    for task in tasks {
        assert!(ids.insert(task.await.unwrap()));
    }
    assert_eq!(ids, (0..16).collect::<HashSet<i64>>());
}

/// Writes made while a flush runs are kept for the next flush
#[tokio::test]
async fn test_writes_during_flush_are_not_lost() {
    let (_temp_dir, manager) = boot_temp().await;
    let folder = manager
        .create_or_get_folder(&path("static://busy"))
        .unwrap();
    let ops: Vec<_> = (0..20)
        .map(|i| {
            folder
                .create_or_get_file(&format!("n{}", i), "int")
                .unwrap()
                .operate_as::<i64>(None)
                .unwrap()
                .0
        })
        .collect();

    std::thread::scope(|scope| {
        scope.spawn(|| {
            for round in 0..10 {
                for op in &ops {
                    op.write(round).unwrap();
                }
            }
        });
        scope.spawn(|| {
            for _ in 0..10 {
                manager.flush().unwrap();
            }
        });
    });
    manager.flush().unwrap();

    for op in &ops {
        assert!(!op.is_dirty());
        assert_eq!(op.file().to_json()["data"], 9);
    }
}
