//! Visitor analytics: raw events and derived per-site metrics

use std::collections::{BTreeMap, HashMap, VecDeque};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::site::SiteId;

/// Default number of buffered events
pub const DEFAULT_EVENT_CAPACITY: usize = 10_000;

/// Kind of visitor interaction
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    PageView,
    Click,
    FormSubmit,
    Custom(String),
}

/// A single raw event reported by a published site
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsEvent {
    pub site_id: SiteId,
    /// Anonymous per-browser identifier
    pub visitor_id: String,
    pub kind: EventKind,
    pub path: String,
    pub referrer: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl AnalyticsEvent {
    pub fn page_view(site_id: SiteId, visitor_id: &str, path: &str) -> Self {
        Self::new(site_id, visitor_id, EventKind::PageView, path)
    }

    pub fn new(site_id: SiteId, visitor_id: &str, kind: EventKind, path: &str) -> Self {
        Self {
            site_id,
            visitor_id: visitor_id.to_string(),
            kind,
            path: path.to_string(),
            referrer: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_referrer(mut self, referrer: &str) -> Self {
        self.referrer = Some(referrer.to_string());
        self
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

/// Bounded in-memory event buffer, oldest events evicted first
pub struct EventLog {
    events: VecDeque<AnalyticsEvent>,
    capacity: usize,
}

impl EventLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            events: VecDeque::new(),
            capacity,
        }
    }

    /// Record an event
    pub fn record(&mut self, event: AnalyticsEvent) {
        if self.capacity == 0 {
            return;
        }
        if self.events.len() == self.capacity {
            self.events.pop_front();
        }
        self.events.push_back(event);
    }

    /// Events belonging to one site, oldest first
    pub fn events_for(&self, site_id: &SiteId) -> Vec<&AnalyticsEvent> {
        self.events.iter().filter(|e| &e.site_id == site_id).collect()
    }

    /// Remove and return every buffered event
    pub fn drain(&mut self) -> Vec<AnalyticsEvent> {
        self.events.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Metrics for one site from the buffered events
    pub fn metrics_for(&self, site_id: &SiteId) -> SiteMetrics {
        SiteMetrics::aggregate(site_id, self.events_for(site_id))
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

/// Metrics derived from raw events for one site
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteMetrics {
    pub site_id: SiteId,

    /// Total page views
    pub page_views: usize,

    /// Distinct visitors with any event
    pub unique_visitors: usize,

    /// Total clicks
    pub clicks: usize,

    /// Total form submissions
    pub form_submissions: usize,

    /// Custom events by name
    pub custom_events: BTreeMap<String, usize>,

    /// Visitors who submitted a form / unique visitors
    pub conversion_rate: f64,

    /// Visitors with exactly one page view and nothing else / visitors with a page view
    pub bounce_rate: f64,

    /// Most viewed paths, highest count first
    pub top_paths: Vec<(String, usize)>,

    /// Most common referrers, highest count first
    pub top_referrers: Vec<(String, usize)>,

    /// Page views per UTC day, oldest first
    pub daily_views: Vec<(NaiveDate, usize)>,
}

/// Entries kept in the top-N lists
const TOP_N: usize = 10;

impl SiteMetrics {
    /// Aggregate events. Events for other sites are ignored.
    pub fn aggregate<'a, I>(site_id: &SiteId, events: I) -> Self
    where
        I: IntoIterator<Item = &'a AnalyticsEvent>,
    {
        let mut page_views = 0;
        let mut clicks = 0;
        let mut form_submissions = 0;
        let mut custom_events: BTreeMap<String, usize> = BTreeMap::new();
        let mut visitors: HashMap<&str, VisitorActivity> = HashMap::new();
        let mut paths: HashMap<&str, usize> = HashMap::new();
        let mut referrers: HashMap<&str, usize> = HashMap::new();
        let mut daily: BTreeMap<NaiveDate, usize> = BTreeMap::new();

        for event in events.into_iter().filter(|e| &e.site_id == site_id) {
            let activity = visitors.entry(event.visitor_id.as_str()).or_default();

            match &event.kind {
                EventKind::PageView => {
                    page_views += 1;
                    activity.page_views += 1;
                    *paths.entry(event.path.as_str()).or_default() += 1;
                    *daily.entry(event.timestamp.date_naive()).or_default() += 1;
                    if let Some(referrer) = event.referrer.as_deref().filter(|r| !r.is_empty()) {
                        *referrers.entry(referrer).or_default() += 1;
                    }
                }
                EventKind::Click => {
                    clicks += 1;
                    activity.interactions += 1;
                }
                EventKind::FormSubmit => {
                    form_submissions += 1;
                    activity.interactions += 1;
                    activity.converted = true;
                }
                EventKind::Custom(name) => {
                    *custom_events.entry(name.clone()).or_default() += 1;
                    activity.interactions += 1;
                }
            }
        }

        let unique_visitors = visitors.len();
        let converted = visitors.values().filter(|v| v.converted).count();
        let viewers = visitors.values().filter(|v| v.page_views > 0).count();
        let bounced = visitors
            .values()
            .filter(|v| v.page_views == 1 && v.interactions == 0)
            .count();

        debug!(
            site_id = %site_id,
            page_views,
            unique_visitors,
            "Aggregated site metrics"
        );

        Self {
            site_id: site_id.clone(),
            page_views,
            unique_visitors,
            clicks,
            form_submissions,
            custom_events,
            conversion_rate: ratio(converted, unique_visitors),
            bounce_rate: ratio(bounced, viewers),
            top_paths: top_n(paths),
            top_referrers: top_n(referrers),
            daily_views: daily.into_iter().collect(),
        }
    }

    /// Average page views per visitor
    pub fn views_per_visitor(&self) -> f64 {
        ratio(self.page_views, self.unique_visitors)
    }
}

#[derive(Default)]
struct VisitorActivity {
    page_views: usize,
    interactions: usize,
    converted: bool,
}

fn ratio(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}

fn top_n(counts: HashMap<&str, usize>) -> Vec<(String, usize)> {
    let mut entries: Vec<_> = counts
        .into_iter()
        .map(|(name, count)| (name.to_string(), count))
        .collect();
    entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    entries.truncate(TOP_N);
    entries
}
