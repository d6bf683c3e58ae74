//! Manager
//!
//! Owns one filesystem session: the shared [`FsContext`], the disk tickets
//! found in the save directory, the static container and at most one current
//! container. Disk scans, container construction/disposal and ticket writes
//! run on a bounded blocking worker pool; tree navigation stays synchronous.

use crate::binder::{default_binders, FileValue, TypeBinder};
use crate::config::ManagerConfig;
use crate::container::Container;
use crate::context::{FlushReport, FsContext};
use crate::disk::{DiskTicket, STATIC_TICKET_ID};
use crate::error::{FsError, Result, StorageError};
use crate::fs::{File, Folder};
use crate::naming::{NamingRule, PatternNamingRule};
use crate::path::{Path, CURRENT_CONTAINER, STATIC_CONTAINER};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

/// Points in the manager lifecycle where hooks run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookTiming {
    BeforeWriteStatic,
    BeforeWriteCurrent,
    AfterReadStatic,
    AfterReadCurrent,
    AfterNew,
}

/// Host callback awaited at each [`HookTiming`]
///
/// Hooks run in registration order. An error aborts the operation that
/// triggered it.
#[async_trait]
pub trait LifecycleHook: Send + Sync {
    async fn on_timing(&self, timing: HookTiming) -> Result<()>;
}

#[derive(Default)]
struct ActiveContainers {
    static_container: Option<Arc<Container>>,
    current: Option<Arc<Container>>,
}

#[derive(Default)]
struct DiskState {
    scanned: bool,
    static_ticket: Option<Arc<DiskTicket>>,
    tickets: BTreeMap<u32, Arc<DiskTicket>>,
    /// Slot ids taken by a live ticket or by a save file the scan could not load
    used: BTreeSet<u32>,
}

/// Result of one save directory scan
struct DiskScan {
    static_ticket: Arc<DiskTicket>,
    tickets: BTreeMap<u32, Arc<DiskTicket>>,
    used: BTreeSet<u32>,
}

/// Configures and boots a [`Manager`]
pub struct ManagerBuilder {
    config: ManagerConfig,
    binders: Vec<TypeBinder>,
    naming: Option<Arc<dyn NamingRule>>,
    hooks: Vec<Arc<dyn LifecycleHook>>,
}

impl ManagerBuilder {
    pub fn new(config: ManagerConfig) -> Self {
        Self {
            config,
            binders: default_binders(),
            naming: None,
            hooks: Vec::new(),
        }
    }

    /// Replace the type binder declarations (defaults to [`default_binders`]).
    pub fn binders<I>(mut self, binders: I) -> Self
    where
        I: IntoIterator<Item = TypeBinder>,
    {
        self.binders = binders.into_iter().collect();
        self
    }

    /// Add one declaration on top of the current list.
    pub fn binder(mut self, binder: TypeBinder) -> Self {
        self.binders.push(binder);
        self
    }

    pub fn naming(mut self, naming: Arc<dyn NamingRule>) -> Self {
        self.naming = Some(naming);
        self
    }

    pub fn hook(mut self, hook: Arc<dyn LifecycleHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    /// Scan the binders, then the save directory, then load the static container.
    pub async fn boot(self) -> Result<Manager> {
        let config = self.config.validated()?;
        let naming: Arc<dyn NamingRule> = match self.naming {
            Some(naming) => naming,
            None => Arc::new(PatternNamingRule::new(config.naming.clone())?),
        };

        let ctx = FsContext::new();
        let binder_count = ctx.registry().scan(self.binders)?;

        let manager = Manager {
            ctx,
            workers: Arc::new(Semaphore::new(config.workers)),
            config,
            naming,
            containers: RwLock::new(ActiveContainers::default()),
            disk: Mutex::new(DiskState::default()),
            hooks: RwLock::new(self.hooks),
        };

        manager.ctx.set_started(true);
        if let Err(e) = manager.scan_disk().await {
            manager.ctx.set_started(false);
            return Err(e);
        }

        info!(
            save_dir = %manager.config.save_dir().display(),
            binders = binder_count,
            "Manager booted"
        );
        Ok(manager)
    }
}

/// Filesystem session orchestrator
pub struct Manager {
    ctx: Arc<FsContext>,
    config: ManagerConfig,
    naming: Arc<dyn NamingRule>,
    workers: Arc<Semaphore>,
    containers: RwLock<ActiveContainers>,
    disk: Mutex<DiskState>,
    hooks: RwLock<Vec<Arc<dyn LifecycleHook>>>,
}

impl Manager {
    pub fn builder(config: ManagerConfig) -> ManagerBuilder {
        ManagerBuilder::new(config)
    }

    /// Boot with the given binder declarations and the default naming rule.
    pub async fn boot<I>(config: ManagerConfig, binders: I) -> Result<Manager>
    where
        I: IntoIterator<Item = TypeBinder>,
    {
        ManagerBuilder::new(config).binders(binders).boot().await
    }

    pub fn context(&self) -> &Arc<FsContext> {
        &self.ctx
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    pub fn is_started(&self) -> bool {
        self.ctx.is_started()
    }

    pub fn register_hook(&self, hook: Arc<dyn LifecycleHook>) {
        self.hooks.write().push(hook);
    }

    // Type binders

    pub fn binders(&self) -> Result<Vec<Arc<TypeBinder>>> {
        self.ctx.ensure_started()?;
        self.ctx
            .registry()
            .binders::<fn(&TypeBinder) -> bool>(None)
    }

    pub fn add_binder<T: FileValue>(&self, tag: &str) -> Result<Option<Arc<TypeBinder>>> {
        self.ctx.ensure_started()?;
        self.ctx.registry().add_binder::<T>(tag)
    }

    // Disk

    /// Rescan the save directory.
    ///
    /// Replaces every ticket, reloads the static container from the static
    /// document and drops the current container.
    pub async fn scan_disk(&self) -> Result<()> {
        self.ctx.ensure_started()?;
        let dir = self.config.save_dir();
        let naming = self.naming.clone();
        let pretty = self.config.pretty;
        let limit = self.config.slot_limit();
        let scan = self
            .offload(move || scan_directory(&dir, naming.as_ref(), pretty, limit))
            .await?;

        let ctx = self.ctx.clone();
        let static_ticket = scan.static_ticket.clone();
        let static_container = self
            .offload(move || static_ticket.construct(&ctx).map(Arc::new))
            .await?;

        let slot_count = scan.tickets.len();
        let previous_disk = std::mem::replace(
            &mut *self.disk.lock(),
            DiskState {
                scanned: true,
                static_ticket: Some(scan.static_ticket),
                tickets: scan.tickets,
                used: scan.used,
            },
        );
        let (previous_static, previous_current) = {
            let mut containers = self.containers.write();
            (
                containers.static_container.replace(static_container),
                containers.current.take(),
            )
        };

        for ticket in previous_disk
            .static_ticket
            .into_iter()
            .chain(previous_disk.tickets.into_values())
        {
            ticket.dispose();
        }
        self.dispose_container(previous_static).await?;
        self.dispose_container(previous_current).await?;

        info!(
            save_dir = %self.config.save_dir().display(),
            slots = slot_count,
            "Save directory scanned"
        );
        self.fire(HookTiming::AfterReadStatic).await
    }

    pub fn static_disk_ticket(&self) -> Result<Arc<DiskTicket>> {
        self.ensure_scanned()?;
        self.disk
            .lock()
            .static_ticket
            .clone()
            .ok_or(FsError::NotScanned)
    }

    /// Live slot tickets ordered by id.
    pub fn get_all_disk_tickets(&self) -> Result<Vec<Arc<DiskTicket>>> {
        self.ensure_scanned()?;
        Ok(self
            .disk
            .lock()
            .tickets
            .values()
            .filter(|t| !t.is_disposed())
            .cloned()
            .collect())
    }

    /// Reserve the lowest free slot id.
    ///
    /// Ids of save files the scan skipped stay reserved so their files are
    /// never overwritten. Returns `Ok(None)` once every id below the slot
    /// limit is taken.
    pub fn create_disk_ticket(&self) -> Result<Option<Arc<DiskTicket>>> {
        self.ensure_scanned()?;
        let mut disk = self.disk.lock();
        let Some(id) = (0..self.config.slot_limit()).find(|id| !disk.used.contains(id))
        else {
            debug!(limit = self.config.slot_limit(), "No free disk ticket slot");
            return Ok(None);
        };

        let file_path = self
            .config
            .save_dir()
            .join(self.naming.slot_file_name(id));
        let ticket = Arc::new(DiskTicket::fresh(
            i64::from(id),
            file_path,
            self.config.pretty,
        ));
        disk.used.insert(id);
        disk.tickets.insert(id, ticket.clone());
        info!(ticket = id, "Disk ticket created");
        Ok(Some(ticket))
    }

    /// Delete a slot ticket and its file. The static ticket is never deleted.
    pub fn delete_disk_ticket(&self, ticket: &Arc<DiskTicket>) -> Result<bool> {
        self.ensure_scanned()?;
        let mut disk = self.disk.lock();
        if !ticket.delete(true)? {
            return Ok(false);
        }
        if let Ok(id) = u32::try_from(ticket.id()) {
            if disk
                .tickets
                .get(&id)
                .is_some_and(|known| Arc::ptr_eq(known, ticket))
            {
                disk.tickets.remove(&id);
                disk.used.remove(&id);
            }
        }
        Ok(true)
    }

    // Containers

    pub fn static_container(&self) -> Result<Arc<Container>> {
        self.ensure_scanned()?;
        self.containers
            .read()
            .static_container
            .clone()
            .ok_or(FsError::NotScanned)
    }

    pub fn current_container(&self) -> Result<Option<Arc<Container>>> {
        self.ensure_scanned()?;
        Ok(self.containers.read().current.clone())
    }

    pub fn has_active_current_container(&self) -> bool {
        self.containers.read().current.is_some()
    }

    /// Load `ticket` as the current container, disposing the previous one.
    ///
    /// Returns `Ok(None)` for the static ticket or a disposed ticket.
    pub async fn use_container(&self, ticket: &Arc<DiskTicket>) -> Result<Option<Arc<Container>>> {
        self.ensure_scanned()?;
        if ticket.is_static() || ticket.is_disposed() {
            return Ok(None);
        }

        let ctx = self.ctx.clone();
        let source = ticket.clone();
        let container = self
            .offload(move || source.construct(&ctx).map(Arc::new))
            .await?;
        let previous = self.containers.write().current.replace(container.clone());
        self.dispose_container(previous).await?;

        info!(ticket = ticket.id(), "Current container loaded");
        self.fire(HookTiming::AfterReadCurrent).await?;
        Ok(Some(container))
    }

    /// Start an empty current container, disposing the previous one.
    pub async fn new_container(&self) -> Result<Arc<Container>> {
        self.ensure_scanned()?;
        let ctx = self.ctx.clone();
        let container = self
            .offload(move || Ok(Arc::new(Container::new_empty(&ctx, Path::current_root()))))
            .await?;
        let previous = self.containers.write().current.replace(container.clone());
        self.dispose_container(previous).await?;

        info!("New current container");
        self.fire(HookTiming::AfterNew).await?;
        Ok(container)
    }

    /// Dispose the current container. Returns `false` if there was none.
    pub async fn destroy_current_container(&self) -> Result<bool> {
        self.ensure_scanned()?;
        let previous = self.containers.write().current.take();
        let existed = previous.is_some();
        self.dispose_container(previous).await?;
        Ok(existed)
    }

    // Persistence

    /// Serialize every dirty file into its document node.
    pub fn flush(&self) -> Result<FlushReport> {
        self.ctx.ensure_started()?;
        Ok(self.ctx.flush())
    }

    pub fn refresh(&self) -> Result<FlushReport> {
        self.flush()
    }

    /// Flush and persist the static container to the static ticket.
    pub async fn write_static(&self) -> Result<()> {
        self.ensure_scanned()?;
        self.fire(HookTiming::BeforeWriteStatic).await?;
        let ticket = self.static_disk_ticket()?;
        let container = self.static_container()?;
        self.write_ticket(ticket, container, String::new()).await
    }

    /// Flush and persist the current container into a slot ticket.
    pub async fn write_current(&self, ticket: &Arc<DiskTicket>, description: &str) -> Result<()> {
        self.ensure_scanned()?;
        if ticket.is_static() {
            return Err(FsError::InvalidName(
                "the static ticket can not hold the current container".to_string(),
            ));
        }
        let container = self.current_container()?.ok_or(FsError::NoCurrentContainer)?;
        self.fire(HookTiming::BeforeWriteCurrent).await?;
        self.write_ticket(ticket.clone(), container, description.to_string())
            .await
    }

    // Paths

    /// Root folder of the container `path` names.
    pub fn root_folder(&self, path: &Path) -> Result<Arc<Folder>> {
        self.ensure_scanned()?;
        match path.container_name() {
            STATIC_CONTAINER => self.static_container()?.root(),
            CURRENT_CONTAINER => self
                .current_container()?
                .ok_or(FsError::NoCurrentContainer)?
                .root(),
            other => Err(FsError::UnknownContainer(other.to_string())),
        }
    }

    pub fn folder(&self, path: &Path) -> Result<Option<Arc<Folder>>> {
        Folder::get_at(&self.root_folder(path)?, path)
    }

    pub fn create_or_get_folder(&self, path: &Path) -> Result<Arc<Folder>> {
        Folder::create_or_get_at(&self.root_folder(path)?, path)
    }

    pub fn folder_exists(&self, path: &Path) -> Result<bool> {
        Folder::exists_at(&self.root_folder(path)?, path)
    }

    pub fn file(&self, path: &Path) -> Result<Option<Arc<File>>> {
        File::get_at(&self.root_folder(path)?, path)
    }

    pub fn create_or_get_file(&self, path: &Path) -> Result<Arc<File>> {
        File::create_or_get_at(&self.root_folder(path)?, path)
    }

    pub fn file_exists(&self, path: &Path) -> Result<bool> {
        File::exists_at(&self.root_folder(path)?, path)
    }

    // Shutdown

    /// Write the static container, dispose everything and stop.
    ///
    /// Failures are logged, never returned.
    pub async fn shutdown(&self) {
        if !self.ctx.is_started() {
            return;
        }
        if let Err(e) = self.write_static().await {
            error!(error = %e, "Failed to write static container during shutdown");
        }
        if let Err(e) = self.destroy_current_container().await {
            warn!(error = %e, "Failed to dispose current container during shutdown");
        }

        let static_container = self.containers.write().static_container.take();
        if let Err(e) = self.dispose_container(static_container).await {
            warn!(error = %e, "Failed to dispose static container during shutdown");
        }
        let disk = std::mem::take(&mut *self.disk.lock());
        for ticket in disk.static_ticket.into_iter().chain(disk.tickets.into_values()) {
            ticket.dispose();
        }

        self.ctx.set_started(false);
        self.workers.close();
        info!("Manager shut down");
    }

    // Internals

    fn ensure_scanned(&self) -> Result<()> {
        self.ctx.ensure_started()?;
        if self.disk.lock().scanned {
            Ok(())
        } else {
            Err(FsError::NotScanned)
        }
    }

    /// Run blocking work on the worker pool.
    async fn offload<F, R>(&self, job: F) -> Result<R>
    where
        F: FnOnce() -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        let _permit = self
            .workers
            .acquire()
            .await
            .map_err(|_| FsError::Worker("Worker pool closed".to_string()))?;
        tokio::task::spawn_blocking(job).await?
    }

    async fn dispose_container(&self, container: Option<Arc<Container>>) -> Result<()> {
        let Some(container) = container else {
            return Ok(());
        };
        self.offload(move || {
            container.dispose();
            Ok(())
        })
        .await
    }

    async fn write_ticket(
        &self,
        ticket: Arc<DiskTicket>,
        container: Arc<Container>,
        description: String,
    ) -> Result<()> {
        let ctx = self.ctx.clone();
        self.offload(move || {
            ctx.flush();
            ticket.write(&container, &description)
        })
        .await
    }

    async fn fire(&self, timing: HookTiming) -> Result<()> {
        let hooks: Vec<Arc<dyn LifecycleHook>> = self.hooks.read().clone();
        for hook in hooks {
            hook.on_timing(timing).await?;
        }
        debug!(?timing, "Lifecycle hooks completed");
        Ok(())
    }
}

fn scan_directory(
    dir: &std::path::Path,
    naming: &dyn NamingRule,
    pretty: bool,
    limit: u32,
) -> Result<DiskScan> {
    std::fs::create_dir_all(dir).map_err(StorageError::from)?;
    let global_name = naming.global_file_name();
    let mut static_ticket = None;
    let mut tickets = BTreeMap::new();
    let mut used = BTreeSet::new();

    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "Skipping unreadable save directory entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(name) = entry.file_name().to_str() else {
            continue;
        };

        if name == global_name {
            let ticket = DiskTicket::open(STATIC_TICKET_ID, entry.path().to_path_buf(), pretty)?;
            static_ticket = Some(Arc::new(ticket));
        } else if let Some(id) = naming.match_slot_id(name) {
            used.insert(id);
            if id >= limit {
                warn!(file = name, limit, "Save file is beyond the slot limit");
                continue;
            }
            match DiskTicket::open(i64::from(id), entry.path().to_path_buf(), pretty) {
                Ok(ticket) => {
                    tickets.insert(id, Arc::new(ticket));
                }
                Err(e) => warn!(file = name, error = %e, "Skipping unreadable save file"),
            }
        }
    }

    let static_ticket = match static_ticket {
        Some(ticket) => ticket,
        None => Arc::new(DiskTicket::fresh(
            STATIC_TICKET_ID,
            dir.join(&global_name),
            pretty,
        )),
    };
    Ok(DiskScan {
        static_ticket,
        tickets,
        used,
    })
}
