//! Site storage backends and the remote-first persistence chain

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::error::StorageError;
use crate::site::{Site, SiteId, SiteSummary};

/// A durable home for site snapshots, keyed by site id.
///
/// Every operation may fail; callers decide whether a failure is fatal.
#[async_trait]
pub trait SiteBackend: Send + Sync {
    /// Insert or replace the site with the same id
    async fn upsert(&self, site: &Site) -> Result<(), StorageError>;

    /// Fetch a site, `None` if it does not exist
    async fn select(&self, id: &SiteId) -> Result<Option<Site>, StorageError>;

    /// Remove a site; missing ids are not an error
    async fn delete(&self, id: &SiteId) -> Result<(), StorageError>;

    /// All stored sites, in no particular order
    async fn list(&self) -> Result<Vec<Site>, StorageError>;

    /// Backend name for logs
    fn name(&self) -> &'static str;
}

/// Local fallback: one JSON file holding every site as an array.
///
/// The whole collection is read and rewritten on each mutation.
pub struct LocalStore {
    /// Path of the collection file
    path: PathBuf,
    /// Serializes read-modify-write cycles
    lock: Mutex<()>,
}

impl LocalStore {
    /// Store the collection at `<dir>/<namespace>.json`
    pub fn new(dir: impl AsRef<Path>, namespace: &str) -> Self {
        Self {
            path: dir.as_ref().join(format!("{}.json", namespace)),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_all(&self) -> Result<Vec<Site>, StorageError> {
        let json = match fs::read_to_string(&self.path).await {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        if json.trim().is_empty() {
            return Ok(Vec::new());
        }

        match serde_json::from_str(&json) {
            Ok(sites) => Ok(sites),
            Err(e) => {
                let aside = self.quarantine().await?;
                warn!(
                    path = %self.path.display(),
                    moved_to = %aside.display(),
                    error = %e,
                    "Local site collection is corrupt, starting a fresh one"
                );
                Ok(Vec::new())
            }
        }
    }

    /// Move an unreadable collection out of the way
    async fn quarantine(&self) -> Result<PathBuf, StorageError> {
        let stamp = chrono::Utc::now().format("%Y%m%d%H%M%S%f");
        let aside = self.path.with_extension(format!("json.corrupt-{}", stamp));
        fs::rename(&self.path, &aside).await?;
        Ok(aside)
    }

    async fn write_all(&self, sites: &[Site]) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let json = serde_json::to_string_pretty(sites)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, &json).await?;
        fs::rename(&tmp, &self.path).await?;

        debug!(
            path = %self.path.display(),
            sites = sites.len(),
            size = json.len(),
            "Wrote local site collection"
        );
        Ok(())
    }
}

#[async_trait]
impl SiteBackend for LocalStore {
    async fn upsert(&self, site: &Site) -> Result<(), StorageError> {
        let _guard = self.lock.lock().await;
        let mut sites = self.read_all().await?;

        match sites.iter_mut().find(|s| s.id == site.id) {
            Some(existing) => *existing = site.clone(),
            None => sites.push(site.clone()),
        }

        self.write_all(&sites).await
    }

    async fn select(&self, id: &SiteId) -> Result<Option<Site>, StorageError> {
        let _guard = self.lock.lock().await;
        let sites = self.read_all().await?;
        Ok(sites.into_iter().find(|s| &s.id == id))
    }

    async fn delete(&self, id: &SiteId) -> Result<(), StorageError> {
        let _guard = self.lock.lock().await;
        let mut sites = self.read_all().await?;
        let before = sites.len();
        sites.retain(|s| &s.id != id);

        if sites.len() != before {
            self.write_all(&sites).await?;
        }
        Ok(())
    }

    async fn list(&self) -> Result<Vec<Site>, StorageError> {
        let _guard = self.lock.lock().await;
        self.read_all().await
    }

    fn name(&self) -> &'static str {
        "local"
    }
}

/// Where a save landed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveTarget {
    /// Remote store accepted the snapshot
    Remote,
    /// Remote unavailable or not configured; only the local copy was written
    LocalOnly,
}

/// Remote-preferred persistence with a local fallback.
///
/// The remote store is tried first. Its failures are logged and never
/// surfaced; the local collection mirrors every save and delete so the
/// editor keeps working offline.
pub struct SiteStore {
    remote: Option<Arc<dyn SiteBackend>>,
    local: LocalStore,
}

impl SiteStore {
    /// Store backed by the local collection only
    pub fn local_only(local: LocalStore) -> Self {
        Self { remote: None, local }
    }

    /// Store that prefers `remote` and falls back to `local`
    pub fn with_remote(remote: Arc<dyn SiteBackend>, local: LocalStore) -> Self {
        Self {
            remote: Some(remote),
            local,
        }
    }

    /// Build an empty site for a template. No I/O.
    pub fn create_default(template_id: &str, title: &str) -> Site {
        Site::new(template_id, title)
    }

    /// Persist a complete snapshot
    pub async fn save(&self, site: &Site) -> Result<SaveTarget, StorageError> {
        let mut target = SaveTarget::LocalOnly;

        if let Some(remote) = &self.remote {
            match remote.upsert(site).await {
                Ok(()) => target = SaveTarget::Remote,
                Err(e) => warn!(
                    site_id = %site.id,
                    backend = remote.name(),
                    error = %e,
                    "Remote save failed, falling back to local storage"
                ),
            }
        }

        if let Err(e) = self.local.upsert(site).await {
            if target == SaveTarget::Remote {
                warn!(site_id = %site.id, error = %e, "Local mirror write failed");
            } else {
                error!(site_id = %site.id, error = %e, "Save failed on every store");
                return Err(e);
            }
        }

        info!(site_id = %site.id, saved_to = ?target, "Saved site");
        Ok(target)
    }

    /// Load a site, `None` when no store has it.
    ///
    /// When both stores hold the site, the remote copy is used only if its
    /// `updated_at` is strictly later. The local collection mirrors every
    /// save, so saves made while the remote was unreachable are not
    /// shadowed by an older remote row.
    pub async fn load(&self, id: &SiteId) -> Result<Option<Site>, StorageError> {
        let mut remote_site = None;
        if let Some(remote) = &self.remote {
            match remote.select(id).await {
                Ok(site) => remote_site = site,
                Err(e) => warn!(
                    site_id = %id,
                    backend = remote.name(),
                    error = %e,
                    "Remote load failed, falling back to local storage"
                ),
            }
        }

        let local_site = match self.local.select(id).await {
            Ok(site) => site,
            Err(e) if remote_site.is_some() => {
                warn!(site_id = %id, error = %e, "Local read failed, using remote copy");
                None
            }
            Err(e) => return Err(e),
        };

        let site = match (remote_site, local_site) {
            (Some(remote), Some(local)) if local.updated_at >= remote.updated_at => {
                if local != remote {
                    debug!(site_id = %id, "Remote copy is stale, using local");
                }
                Some(local)
            }
            (Some(remote), _) => Some(remote),
            (None, local) => local,
        };

        if site.is_some() {
            debug!(site_id = %id, "Loaded site");
        }
        Ok(site)
    }

    /// Delete a site everywhere; unknown ids are fine
    pub async fn delete(&self, id: &SiteId) -> Result<(), StorageError> {
        if let Some(remote) = &self.remote {
            if let Err(e) = remote.delete(id).await {
                warn!(
                    site_id = %id,
                    backend = remote.name(),
                    error = %e,
                    "Remote delete failed, removing local copy only"
                );
            }
        }

        self.local.delete(id).await?;
        info!(site_id = %id, "Deleted site");
        Ok(())
    }

    /// Dashboard listing, most recently edited first
    pub async fn list(&self) -> Result<Vec<SiteSummary>, StorageError> {
        let sites = match &self.remote {
            Some(remote) => match remote.list().await {
                Ok(sites) => sites,
                Err(e) => {
                    warn!(backend = remote.name(), error = %e, "Remote list failed, using local storage");
                    self.local.list().await?
                }
            },
            None => self.local.list().await?,
        };

        let mut summaries: Vec<_> = sites.iter().map(Site::to_summary).collect();
        summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(summaries)
    }

    pub fn has_remote(&self) -> bool {
        self.remote.is_some()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use parking_lot::RwLock;
    use serde_json::json;
    use tempfile::tempdir;

    /// In-memory remote that can be switched offline
    #[derive(Default)]
    pub(crate) struct MemoryBackend {
        pub sites: RwLock<HashMap<SiteId, Site>>,
        pub offline: RwLock<bool>,
        upsert_count: AtomicUsize,
    }

    impl MemoryBackend {
        pub fn offline() -> Self {
            let backend = Self::default();
            *backend.offline.write() = true;
            backend
        }

        /// Successful upserts so far
        pub fn upserts(&self) -> usize {
            self.upsert_count.load(Ordering::SeqCst)
        }

        fn check(&self) -> Result<(), StorageError> {
            if *self.offline.read() {
                Err(StorageError::Remote {
                    status: 503,
                    body: "offline".to_string(),
                })
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl SiteBackend for MemoryBackend {
        async fn upsert(&self, site: &Site) -> Result<(), StorageError> {
            self.check()?;
            self.sites.write().insert(site.id.clone(), site.clone());
            self.upsert_count.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn select(&self, id: &SiteId) -> Result<Option<Site>, StorageError> {
            self.check()?;
            Ok(self.sites.read().get(id).cloned())
        }

        async fn delete(&self, id: &SiteId) -> Result<(), StorageError> {
            self.check()?;
            self.sites.write().remove(id);
            Ok(())
        }

        async fn list(&self) -> Result<Vec<Site>, StorageError> {
            self.check()?;
            Ok(self.sites.read().values().cloned().collect())
        }

        fn name(&self) -> &'static str {
            "memory"
        }
    }

    fn sample_site() -> Site {
        let mut site = SiteStore::create_default("restaurant", "Luigi's");
        site.content = json!({"hero": {"headline": "Best pizza"}});
        site
    }

    // === LocalStore Tests ===

    #[tokio::test]
    async fn test_local_missing_file_is_empty() {
        let dir = tempdir().unwrap();
        let local = LocalStore::new(dir.path(), "sites");

        assert!(local.list().await.unwrap().is_empty());
        assert!(local.select(&SiteId::new()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_local_upsert_replaces_by_id() {
        let dir = tempdir().unwrap();
        let local = LocalStore::new(dir.path(), "sites");
        let mut site = sample_site();

        local.upsert(&site).await.unwrap();
        site.title = "Luigi's Trattoria".to_string();
        local.upsert(&site).await.unwrap();
        local.upsert(&sample_site()).await.unwrap();

        let all = local.list().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(local.select(&site.id).await.unwrap(), Some(site));
    }

    #[tokio::test]
    async fn test_local_single_namespaced_file() {
        let dir = tempdir().unwrap();
        let local = LocalStore::new(dir.path().join("nested"), "my_sites");
        local.upsert(&sample_site()).await.unwrap();
        local.upsert(&sample_site()).await.unwrap();

        let path = dir.path().join("nested").join("my_sites.json");
        assert_eq!(local.path(), path.as_path());

        let raw = std::fs::read_to_string(path).unwrap();
        let parsed: Vec<Site> = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed.len(), 2);
    }

    #[tokio::test]
    async fn test_local_corrupt_file_is_moved_aside() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("sites.json"), "{not json").unwrap();
        let local = LocalStore::new(dir.path(), "sites");

        assert!(local.list().await.unwrap().is_empty());

        let quarantined: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().contains(".corrupt-"))
            .collect();
        assert_eq!(quarantined.len(), 1);
        assert_eq!(
            std::fs::read_to_string(quarantined[0].path()).unwrap(),
            "{not json"
        );
    }

    #[tokio::test]
    async fn test_save_recovers_from_corrupt_collection() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("sites.json"), "[{\"id\":").unwrap();
        let store = SiteStore::local_only(LocalStore::new(dir.path(), "sites"));
        let site = sample_site();

        assert_eq!(store.save(&site).await.unwrap(), SaveTarget::LocalOnly);
        assert_eq!(store.load(&site.id).await.unwrap(), Some(site));
    }

    // === SiteStore Tests ===

    #[tokio::test]
    async fn test_save_load_roundtrip_local_only() {
        let dir = tempdir().unwrap();
        let store = SiteStore::local_only(LocalStore::new(dir.path(), "sites"));
        let site = sample_site();

        assert_eq!(store.save(&site).await.unwrap(), SaveTarget::LocalOnly);
        assert_eq!(store.load(&site.id).await.unwrap(), Some(site));
        assert!(!store.has_remote());
    }

    #[tokio::test]
    async fn test_save_prefers_remote_and_mirrors_locally() {
        let dir = tempdir().unwrap();
        let remote = Arc::new(MemoryBackend::default());
        let store = SiteStore::with_remote(remote.clone(), LocalStore::new(dir.path(), "sites"));
        let site = sample_site();

        assert_eq!(store.save(&site).await.unwrap(), SaveTarget::Remote);
        assert_eq!(remote.sites.read().get(&site.id), Some(&site));
        assert_eq!(store.load(&site.id).await.unwrap(), Some(site.clone()));

        let local = LocalStore::new(dir.path(), "sites");
        assert_eq!(local.select(&site.id).await.unwrap(), Some(site));
    }

    #[tokio::test]
    async fn test_save_falls_back_when_remote_offline() {
        let dir = tempdir().unwrap();
        let remote = Arc::new(MemoryBackend::offline());
        let store = SiteStore::with_remote(remote.clone(), LocalStore::new(dir.path(), "sites"));
        let site = sample_site();

        assert_eq!(store.save(&site).await.unwrap(), SaveTarget::LocalOnly);
        assert!(remote.sites.read().is_empty());
        assert_eq!(store.load(&site.id).await.unwrap(), Some(site));
    }

    #[tokio::test]
    async fn test_load_checks_local_on_remote_miss() {
        let dir = tempdir().unwrap();
        let remote = Arc::new(MemoryBackend::offline());
        let store = SiteStore::with_remote(remote.clone(), LocalStore::new(dir.path(), "sites"));
        let site = sample_site();
        store.save(&site).await.unwrap();

        *remote.offline.write() = false;
        assert_eq!(store.load(&site.id).await.unwrap(), Some(site));
    }

    #[tokio::test]
    async fn test_offline_save_not_shadowed_by_older_remote_copy() {
        let dir = tempdir().unwrap();
        let remote = Arc::new(MemoryBackend::default());
        let store = SiteStore::with_remote(remote.clone(), LocalStore::new(dir.path(), "sites"));

        let mut site = sample_site();
        site.title = "v1".to_string();
        assert_eq!(store.save(&site).await.unwrap(), SaveTarget::Remote);

        *remote.offline.write() = true;
        site.title = "v2".to_string();
        assert_eq!(store.save(&site).await.unwrap(), SaveTarget::LocalOnly);

        *remote.offline.write() = false;
        assert_eq!(store.load(&site.id).await.unwrap(), Some(site));
    }

    #[tokio::test]
    async fn test_newer_remote_copy_wins() {
        let dir = tempdir().unwrap();
        let remote = Arc::new(MemoryBackend::default());
        let store = SiteStore::with_remote(remote.clone(), LocalStore::new(dir.path(), "sites"));
        let site = sample_site();
        store.save(&site).await.unwrap();

        // Another device saved a later version remotely
        let mut newer = site.clone();
        newer.title = "From elsewhere".to_string();
        newer.updated_at = site.updated_at + chrono::Duration::seconds(5);
        remote.sites.write().insert(newer.id.clone(), newer.clone());

        assert_eq!(store.load(&site.id).await.unwrap(), Some(newer));
    }

    #[tokio::test]
    async fn test_load_unknown_is_none() {
        let dir = tempdir().unwrap();
        let store = SiteStore::with_remote(
            Arc::new(MemoryBackend::default()),
            LocalStore::new(dir.path(), "sites"),
        );

        assert!(store.load(&SiteId::from("nope")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_then_load_is_none() {
        let dir = tempdir().unwrap();
        let remote = Arc::new(MemoryBackend::default());
        let store = SiteStore::with_remote(remote.clone(), LocalStore::new(dir.path(), "sites"));
        let site = sample_site();
        store.save(&site).await.unwrap();

        store.delete(&site.id).await.unwrap();

        assert!(store.load(&site.id).await.unwrap().is_none());
        assert!(remote.sites.read().is_empty());
    }

    #[tokio::test]
    async fn test_delete_with_remote_offline_removes_local() {
        let dir = tempdir().unwrap();
        let remote = Arc::new(MemoryBackend::offline());
        let store = SiteStore::with_remote(remote, LocalStore::new(dir.path(), "sites"));
        let site = sample_site();
        store.save(&site).await.unwrap();

        store.delete(&site.id).await.unwrap();
        store.delete(&site.id).await.unwrap();

        assert!(store.load(&site.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_fails_when_every_store_fails() {
        let dir = tempdir().unwrap();
        // A regular file where the collection directory should be
        let blocker = dir.path().join("blocked");
        std::fs::write(&blocker, "").unwrap();

        let store = SiteStore::with_remote(
            Arc::new(MemoryBackend::offline()),
            LocalStore::new(&blocker, "sites"),
        );

        assert!(store.save(&sample_site()).await.is_err());
    }

    #[tokio::test]
    async fn test_save_succeeds_remotely_when_local_fails() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("blocked");
        std::fs::write(&blocker, "").unwrap();

        let store = SiteStore::with_remote(
            Arc::new(MemoryBackend::default()),
            LocalStore::new(&blocker, "sites"),
        );

        assert_eq!(store.save(&sample_site()).await.unwrap(), SaveTarget::Remote);
    }

    #[tokio::test]
    async fn test_list_newest_first() {
        let dir = tempdir().unwrap();
        let store = SiteStore::local_only(LocalStore::new(dir.path(), "sites"));

        let mut older = sample_site();
        older.updated_at = older.updated_at - chrono::Duration::hours(1);
        let newer = sample_site();
        store.save(&older).await.unwrap();
        store.save(&newer).await.unwrap();

        let list = store.list().await.unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].id, newer.id);
        assert_eq!(list[1].id, older.id);
    }

    #[tokio::test]
    async fn test_list_falls_back_to_local() {
        let dir = tempdir().unwrap();
        let store = SiteStore::with_remote(
            Arc::new(MemoryBackend::offline()),
            LocalStore::new(dir.path(), "sites"),
        );
        store.save(&sample_site()).await.unwrap();

        assert_eq!(store.list().await.unwrap().len(), 1);
    }
}
