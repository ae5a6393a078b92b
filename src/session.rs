//! Editor session - wires edits into history and persistence

use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::diff::SiteDiff;
use crate::error::{SessionError, StorageError};
use crate::history::{HistoryStack, DEFAULT_MAX_HISTORY};
use crate::remote::{RemoteConfig, SupabaseBackend};
use crate::site::{Site, SiteId, SiteUpdate};
use crate::storage::{LocalStore, SaveTarget, SiteStore};

/// Configuration for an editor session
#[derive(Debug, Clone)]
pub struct EditorConfig {
    /// Maximum number of undo steps
    pub max_history: usize,
    /// Debounce before an edit is saved automatically, `None` disables autosave
    pub autosave: Option<Duration>,
    /// Directory of the local fallback collection
    pub local_dir: PathBuf,
    /// Name of the local collection
    pub namespace: String,
    /// Remote store, local-only when absent
    pub remote: Option<RemoteConfig>,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            max_history: DEFAULT_MAX_HISTORY,
            autosave: Some(Duration::from_millis(1500)),
            local_dir: PathBuf::from(".trellis"),
            namespace: "trellis_sites".to_string(),
            remote: None,
        }
    }
}

impl EditorConfig {
    /// Defaults plus the remote store from the environment, if configured
    pub fn from_env() -> Self {
        Self {
            remote: RemoteConfig::from_env(),
            ..Default::default()
        }
    }

    /// Build the persistence chain described by this config
    pub fn build_store(&self) -> Result<SiteStore, StorageError> {
        let local = LocalStore::new(&self.local_dir, &self.namespace);

        match &self.remote {
            Some(remote) => {
                let backend = SupabaseBackend::new(remote.clone())?;
                Ok(SiteStore::with_remote(Arc::new(backend), local))
            }
            None => Ok(SiteStore::local_only(local)),
        }
    }
}

/// Lifecycle of an editor session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Loading,
    Ready,
    Saving,
    Publishing,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Loading => "loading",
            SessionState::Ready => "ready",
            SessionState::Saving => "saving",
            SessionState::Publishing => "publishing",
        };
        f.write_str(name)
    }
}

/// Transient message for the UI after a save or publish
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Saved(SaveTarget),
    Published { address: String },
    Failed(String),
}

impl Notice {
    pub fn is_error(&self) -> bool {
        matches!(self, Notice::Failed(_))
    }
}

struct Inner {
    config: EditorConfig,
    store: Arc<SiteStore>,
    history: RwLock<HistoryStack>,
    state: RwLock<SessionState>,
    /// Set while a save or publish request is outstanding
    in_flight: AtomicBool,
    notice: RwLock<Option<Notice>>,
    /// Bumped on every change; autosave only fires for the latest one
    generation: AtomicU64,
}

/// Editing session for a single site.
///
/// Cloning yields another handle to the same session.
#[derive(Clone)]
pub struct EditorSession {
    inner: Arc<Inner>,
}

impl EditorSession {
    /// Create a session in the `Loading` state
    pub fn new(config: EditorConfig, store: Arc<SiteStore>) -> Self {
        let history = HistoryStack::new(config.max_history);

        Self {
            inner: Arc::new(Inner {
                config,
                store,
                history: RwLock::new(history),
                state: RwLock::new(SessionState::Loading),
                in_flight: AtomicBool::new(false),
                notice: RwLock::new(None),
                generation: AtomicU64::new(0),
            }),
        }
    }

    /// Load an existing site and become ready
    pub async fn open(&self, id: &SiteId) -> Result<Site, SessionError> {
        self.expect_state(&[SessionState::Loading], "open a site")?;

        let site = self
            .inner
            .store
            .load(id)
            .await?
            .ok_or_else(|| SessionError::NotFound(id.clone()))?;

        self.begin(site.clone());
        info!(site_id = %id, title = %site.title, "Opened site");
        Ok(site)
    }

    /// Start editing a fresh site built from a template
    pub fn start(&self, template_id: &str, title: &str) -> Result<Site, SessionError> {
        self.expect_state(&[SessionState::Loading], "start a site")?;

        let site = SiteStore::create_default(template_id, title);
        self.begin(site.clone());
        info!(site_id = %site.id, template = template_id, "Started new site");
        Ok(site)
    }

    /// Drop history and return to `Loading`
    pub fn close(&self) {
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
        self.inner.history.write().clear_history();
        *self.inner.state.write() = SessionState::Loading;
        debug!("Closed editor session");
    }

    /// Merge a partial update into the current site.
    ///
    /// Returns `false` when the update changed nothing.
    pub fn apply_edit(&self, update: SiteUpdate) -> Result<bool, SessionError> {
        self.expect_state(&[SessionState::Ready, SessionState::Saving], "edit")?;

        {
            let mut history = self.inner.history.write();
            let present = history.present().ok_or(SessionError::NoSite)?;

            let mut next = present.merged(&update);
            let diff = SiteDiff::between(present, &next);
            if diff.is_empty() {
                return Ok(false);
            }

            next.updated_at = Utc::now();
            debug!(
                site_id = %next.id,
                fields = ?diff.fields,
                added = ?diff.added,
                modified = ?diff.modified,
                removed = ?diff.removed,
                "Applied edit"
            );
            history.set_present(next);
        }

        self.schedule_autosave();
        Ok(true)
    }

    /// Step back one edit; `None` when there is nothing to undo
    pub fn undo(&self) -> Result<Option<Site>, SessionError> {
        self.expect_state(&[SessionState::Ready], "undo")?;

        let restored = self.inner.history.write().undo();
        if restored.is_some() {
            self.schedule_autosave();
        }
        Ok(restored)
    }

    /// Re-apply an undone edit; `None` when there is nothing to redo
    pub fn redo(&self) -> Result<Option<Site>, SessionError> {
        self.expect_state(&[SessionState::Ready], "redo")?;

        let restored = self.inner.history.write().redo();
        if restored.is_some() {
            self.schedule_autosave();
        }
        Ok(restored)
    }

    /// Persist the current site
    pub async fn save(&self) -> Result<SaveTarget, SessionError> {
        let _guard = self.acquire(SessionState::Saving, "save")?;
        let site = self.site().ok_or(SessionError::NoSite)?;

        match self.inner.store.save(&site).await {
            Ok(target) => {
                self.notify(Notice::Saved(target));
                Ok(target)
            }
            Err(e) => {
                self.notify(Notice::Failed(format!("Could not save: {}", e)));
                Err(e.into())
            }
        }
    }

    /// Mark the site published, optionally on a custom domain, and persist it.
    ///
    /// Publishing an already published site updates it in place.
    pub async fn publish(&self, domain: Option<String>) -> Result<Site, SessionError> {
        let _guard = self.acquire(SessionState::Publishing, "publish")?;

        let (site, changed) = {
            let history = self.inner.history.read();
            let present = history.present().ok_or(SessionError::NoSite)?;

            let update = SiteUpdate {
                published: Some(true),
                custom_domain: domain.as_deref().map(normalize_domain).map(Some),
                ..Default::default()
            };
            let mut next = present.merged(&update);
            let changed = !SiteDiff::between(present, &next).is_empty();
            if changed {
                next.updated_at = Utc::now();
            }
            (next, changed)
        };

        // History only records the publish once it is persisted
        match self.inner.store.save(&site).await {
            Ok(target) => {
                if changed {
                    let mut history = self.inner.history.write();
                    if history.present().is_some() {
                        history.set_present(site.clone());
                    }
                }
                info!(site_id = %site.id, address = %site.address(), saved_to = ?target, "Published site");
                self.notify(Notice::Published {
                    address: site.address(),
                });
                Ok(site)
            }
            Err(e) => {
                self.notify(Notice::Failed(format!("Could not publish: {}", e)));
                Err(e.into())
            }
        }
    }

    /// Current site snapshot
    pub fn site(&self) -> Option<Site> {
        self.inner.history.read().present().cloned()
    }

    pub fn state(&self) -> SessionState {
        *self.inner.state.read()
    }

    pub fn is_saving(&self) -> bool {
        self.inner.in_flight.load(Ordering::SeqCst)
    }

    pub fn can_undo(&self) -> bool {
        self.inner.history.read().can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.inner.history.read().can_redo()
    }

    /// Take the pending notice, if any
    pub fn take_notice(&self) -> Option<Notice> {
        self.inner.notice.write().take()
    }

    pub fn store(&self) -> &Arc<SiteStore> {
        &self.inner.store
    }

    pub fn config(&self) -> &EditorConfig {
        &self.inner.config
    }

    // === Private Methods ===

    fn begin(&self, site: Site) {
        let mut history = self.inner.history.write();
        history.clear_history();
        history.set_present(site);
        *self.inner.state.write() = SessionState::Ready;
    }

    fn expect_state(&self, allowed: &[SessionState], action: &'static str) -> Result<(), SessionError> {
        let state = self.state();
        if allowed.contains(&state) {
            Ok(())
        } else {
            Err(SessionError::NotReady { state, action })
        }
    }

    fn acquire(&self, busy: SessionState, action: &'static str) -> Result<InFlight<'_>, SessionError> {
        if self
            .inner
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(SessionError::SaveInProgress);
        }

        let mut state = self.inner.state.write();
        if *state != SessionState::Ready {
            self.inner.in_flight.store(false, Ordering::SeqCst);
            return Err(SessionError::NotReady {
                state: *state,
                action,
            });
        }
        *state = busy;

        Ok(InFlight {
            inner: &self.inner,
            busy,
        })
    }

    fn notify(&self, notice: Notice) {
        *self.inner.notice.write() = Some(notice);
    }

    fn schedule_autosave(&self) {
        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;

        let Some(delay) = self.inner.config.autosave else {
            return;
        };
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            debug!("No async runtime, skipping autosave");
            return;
        };

        let session = self.clone();
        handle.spawn(async move {
            loop {
                tokio::time::sleep(delay).await;

                if session.inner.generation.load(Ordering::SeqCst) != generation {
                    return;
                }

                match session.save().await {
                    Ok(target) => debug!(saved_to = ?target, "Autosaved site"),
                    // Busy with another save or publish: wait for it and try again
                    Err(SessionError::SaveInProgress)
                    | Err(SessionError::NotReady {
                        state: SessionState::Saving | SessionState::Publishing,
                        ..
                    }) => {
                        debug!("Session busy, retrying autosave");
                        continue;
                    }
                    Err(SessionError::NotReady { .. }) => debug!("Autosave dropped, session closed"),
                    Err(e) => warn!(error = %e, "Autosave failed"),
                }
                return;
            }
        });
    }
}

/// Clears the in-flight flag and returns to `Ready` when dropped
struct InFlight<'a> {
    inner: &'a Inner,
    busy: SessionState,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let mut state = self.inner.state.write();
        if *state == self.busy {
            *state = SessionState::Ready;
        }
        self.inner.in_flight.store(false, Ordering::SeqCst);
    }
}

fn normalize_domain(domain: &str) -> String {
    let domain = domain.trim().to_lowercase();
    let domain = domain
        .strip_prefix("https://")
        .or_else(|| domain.strip_prefix("http://"))
        .unwrap_or(&domain);
    domain.trim_end_matches('/').to_string()
}
