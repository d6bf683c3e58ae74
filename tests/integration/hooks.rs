//! Integration tests for lifecycle hooks

use super::test_utils::{config_in, path};
use async_trait::async_trait;
use jsonfs::{FsError, HookTiming, LifecycleHook, Manager, Result};
use parking_lot::Mutex;
use std::sync::Arc;
use tempfile::TempDir;

#[derive(Default)]
struct RecordingHook {
    seen: Mutex<Vec<HookTiming>>,
}

impl RecordingHook {
    fn seen(&self) -> Vec<HookTiming> {
        self.seen.lock().clone()
    }
}

#[async_trait]
impl LifecycleHook for RecordingHook {
    async fn on_timing(&self, timing: HookTiming) -> Result<()> {
        tokio::task::yield_now().await;
        self.seen.lock().push(timing);
        Ok(())
    }
}

struct FailingHook {
    on: HookTiming,
}

#[async_trait]
impl LifecycleHook for FailingHook {
    async fn on_timing(&self, timing: HookTiming) -> Result<()> {
        if timing == self.on {
            Err(FsError::Hook(format!("refusing {:?}", timing)))
        } else {
            Ok(())
        }
    }
}

#[tokio::test]
async fn test_hooks_fire_at_each_timing() {
    let temp_dir = TempDir::new().unwrap();
    let hook = Arc::new(RecordingHook::default());
    let manager = Manager::builder(config_in(temp_dir.path()))
        .hook(hook.clone())
        .boot()
        .await
        .unwrap();
    assert_eq!(hook.seen(), vec![HookTiming::AfterReadStatic]);

    manager.new_container().await.unwrap();
    let ticket = manager.create_disk_ticket().unwrap().unwrap();
    manager.write_current(&ticket, "").await.unwrap();
    manager.use_container(&ticket).await.unwrap();
    manager.write_static().await.unwrap();

    assert_eq!(
        hook.seen(),
        vec![
            HookTiming::AfterReadStatic,
            HookTiming::AfterNew,
            HookTiming::BeforeWriteCurrent,
            HookTiming::AfterReadCurrent,
            HookTiming::BeforeWriteStatic,
        ]
    );
}

#[tokio::test]
async fn test_hook_runs_before_the_write() {
    struct WritingHook {
        file: Arc<Mutex<Option<Arc<jsonfs::File>>>>,
    }

    #[async_trait]
    impl LifecycleHook for WritingHook {
        async fn on_timing(&self, timing: HookTiming) -> Result<()> {
            if timing == HookTiming::BeforeWriteStatic {
                if let Some(file) = self.file.lock().clone() {
                    let (op, _) = file.operate_as::<i64>(None)?;
                    op.write(99)?;
                }
            }
            Ok(())
        }
    }

    let temp_dir = TempDir::new().unwrap();
    let slot = Arc::new(Mutex::new(None));
    let manager = Manager::builder(config_in(temp_dir.path()))
        .hook(Arc::new(WritingHook { file: slot.clone() }))
        .boot()
        .await
        .unwrap();
    let file = manager
        .create_or_get_file(&path("static://saved_by_hook.int"))
        .unwrap();
    *slot.lock() = Some(file);

    manager.write_static().await.unwrap();
    let stored = manager.static_disk_ticket().unwrap().document().fs.unwrap();
    assert_eq!(stored["files"]["saved_by_hook.int"]["data"], 99);
}

#[tokio::test]
async fn test_failing_hook_aborts_operation() {
    let temp_dir = TempDir::new().unwrap();
    let manager = Manager::builder(config_in(temp_dir.path()))
        .boot()
        .await
        .unwrap();
    manager.register_hook(Arc::new(FailingHook {
        on: HookTiming::BeforeWriteStatic,
    }));

    let result = manager.write_static().await;
    assert!(matches!(result, Err(FsError::Hook(_))));
    assert!(!temp_dir.path().join("SaveData_Global.json").exists());
}

#[tokio::test]
async fn test_failing_boot_hook_fails_boot() {
    let temp_dir = TempDir::new().unwrap();
    let result = Manager::builder(config_in(temp_dir.path()))
        .hook(Arc::new(FailingHook {
            on: HookTiming::AfterReadStatic,
        }))
        .boot()
        .await;
    assert!(matches!(result, Err(FsError::Hook(_))));
}
