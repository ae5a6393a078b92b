//! # Trellis
//!
//! Editing core for a no-code website builder.
//!
//! This crate provides:
//! - Linear undo/redo over immutable site snapshots
//! - Remote-first persistence with a local fallback
//! - An editor session with debounced autosave and publishing
//! - Visitor analytics aggregation
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────┐
//! │                  EditorSession                   │
//! │  ┌────────────────────────────────────────────┐  │
//! │  │               HistoryStack                 │  │
//! │  │   past [S0, S1] → present S2 → future []   │  │
//! │  └────────────────────────────────────────────┘  │
//! │                      │ save / publish            │
//! │                      ▼                           │
//! │  ┌────────────────────────────────────────────┐  │
//! │  │                SiteStore                   │  │
//! │  │   SupabaseBackend ──(on failure)──▶ Local  │  │
//! │  └────────────────────────────────────────────┘  │
//! └──────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use trellis::{EditorConfig, EditorSession, SiteUpdate};
//!
//! let config = EditorConfig::from_env();
//! let store = Arc::new(config.build_store()?);
//! let session = EditorSession::new(config, store);
//!
//! session.start("restaurant", "Luigi's Pizza")?;
//! session.apply_edit(SiteUpdate::title("Luigi's Trattoria"))?;
//! session.undo()?;
//!
//! session.save().await?;
//! session.publish(Some("luigis.example".to_string())).await?;
//! ```

pub mod site;
pub mod diff;
pub mod history;
pub mod storage;
pub mod remote;
pub mod session;
pub mod analytics;
pub mod error;

pub use site::{
    slugify, ColorScheme, FontScheme, LayoutSettings, SeoSettings, SettingsUpdate, Site, SiteId,
    SiteSettings, SiteSummary, SiteUpdate,
};
pub use diff::{SiteDiff, SiteField};
pub use history::{HistoryStack, DEFAULT_MAX_HISTORY};
pub use storage::{LocalStore, SaveTarget, SiteBackend, SiteStore};
pub use remote::{RemoteConfig, SupabaseBackend};
pub use session::{EditorConfig, EditorSession, Notice, SessionState};
pub use analytics::{AnalyticsEvent, EventKind, EventLog, SiteMetrics};
pub use error::{SessionError, StorageError};
