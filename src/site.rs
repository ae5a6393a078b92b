//! Site snapshot data structures

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Unique site identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SiteId(String);

impl SiteId {
    /// Generate a fresh random identifier
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SiteId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SiteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for SiteId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for SiteId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// A complete snapshot of a site at one point in time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Site {
    /// Unique identifier, never changes after creation
    pub id: SiteId,
    /// Template the site was created from
    pub template_id: String,
    /// Display title
    pub title: String,
    /// URL-safe slug
    pub slug: String,
    /// Page sections keyed by section name
    pub content: Value,
    /// Design and metadata settings
    pub settings: SiteSettings,
    /// Whether the site is live
    pub published: bool,
    /// Custom domain attached on publish
    pub custom_domain: Option<String>,
    /// When the site was created
    pub created_at: DateTime<Utc>,
    /// When the site was last edited
    pub updated_at: DateTime<Utc>,
}

impl Site {
    /// Build an empty site for a template
    pub fn new(template_id: impl Into<String>, title: impl Into<String>) -> Self {
        let template_id = template_id.into();
        let title = title.into();
        let now = Utc::now();

        Self {
            id: SiteId::new(),
            slug: slugify(&title),
            settings: SiteSettings::for_template(&template_id),
            template_id,
            title,
            content: Value::Object(Map::new()),
            published: false,
            custom_domain: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply a partial update, returning the merged snapshot.
    ///
    /// Top-level fields are replaced when present. Settings are merged
    /// per family, and content is merged per section (a `null` section
    /// removes it). Timestamps are left untouched.
    pub fn merged(&self, update: &SiteUpdate) -> Site {
        let mut next = self.clone();

        if let Some(template_id) = &update.template_id {
            next.template_id = template_id.clone();
        }
        if let Some(title) = &update.title {
            next.title = title.clone();
        }
        if let Some(slug) = &update.slug {
            next.slug = slugify(slug);
        }
        if let Some(content) = &update.content {
            next.content = merge_content(&next.content, content);
        }
        if let Some(settings) = &update.settings {
            next.settings.apply(settings);
        }
        if let Some(published) = update.published {
            next.published = published;
        }
        if let Some(domain) = &update.custom_domain {
            next.custom_domain = domain.clone();
        }

        next
    }

    /// Short dashboard view of this site
    pub fn to_summary(&self) -> SiteSummary {
        SiteSummary {
            id: self.id.clone(),
            title: self.title.clone(),
            slug: self.slug.clone(),
            template_id: self.template_id.clone(),
            published: self.published,
            custom_domain: self.custom_domain.clone(),
            updated_at: self.updated_at,
        }
    }

    /// Public address: custom domain when attached, otherwise the slug path
    pub fn address(&self) -> String {
        match &self.custom_domain {
            Some(domain) => format!("https://{}", domain),
            None => format!("/s/{}", self.slug),
        }
    }
}

/// Dashboard listing entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteSummary {
    pub id: SiteId,
    pub title: String,
    pub slug: String,
    pub template_id: String,
    pub published: bool,
    pub custom_domain: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// Settings grouped into independently editable families
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SiteSettings {
    pub colors: ColorScheme,
    pub fonts: FontScheme,
    pub seo: SeoSettings,
    pub layout: LayoutSettings,
}

impl SiteSettings {
    /// Default settings for a template
    pub fn for_template(template_id: &str) -> Self {
        let (colors, fonts) = match template_id {
            "restaurant" => (
                ColorScheme::new("#b45309", "#78350f", "#f59e0b", "#fffbeb", "#1c1917"),
                FontScheme::new("Playfair Display", "Lato"),
            ),
            "portfolio" => (
                ColorScheme::new("#111827", "#374151", "#6366f1", "#ffffff", "#111827"),
                FontScheme::new("Space Grotesk", "Inter"),
            ),
            "wedding" => (
                ColorScheme::new("#be185d", "#9d174d", "#f9a8d4", "#fdf2f8", "#3f3f46"),
                FontScheme::new("Cormorant Garamond", "Montserrat"),
            ),
            "startup" => (
                ColorScheme::new("#7c3aed", "#4c1d95", "#22d3ee", "#0f172a", "#f8fafc"),
                FontScheme::new("Poppins", "Inter"),
            ),
            _ => (ColorScheme::default(), FontScheme::default()),
        };

        Self {
            colors,
            fonts,
            seo: SeoSettings::default(),
            layout: LayoutSettings::default(),
        }
    }

    fn apply(&mut self, update: &SettingsUpdate) {
        if let Some(colors) = &update.colors {
            self.colors = colors.clone();
        }
        if let Some(fonts) = &update.fonts {
            self.fonts = fonts.clone();
        }
        if let Some(seo) = &update.seo {
            self.seo = seo.clone();
        }
        if let Some(layout) = &update.layout {
            self.layout = layout.clone();
        }
    }
}

/// Color palette
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColorScheme {
    pub primary: String,
    pub secondary: String,
    pub accent: String,
    pub background: String,
    pub text: String,
}

impl ColorScheme {
    pub fn new(primary: &str, secondary: &str, accent: &str, background: &str, text: &str) -> Self {
        Self {
            primary: primary.to_string(),
            secondary: secondary.to_string(),
            accent: accent.to_string(),
            background: background.to_string(),
            text: text.to_string(),
        }
    }
}

impl Default for ColorScheme {
    fn default() -> Self {
        Self::new("#2563eb", "#1e40af", "#f97316", "#ffffff", "#111827")
    }
}

/// Heading and body typefaces
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FontScheme {
    pub heading: String,
    pub body: String,
}

impl FontScheme {
    pub fn new(heading: &str, body: &str) -> Self {
        Self {
            heading: heading.to_string(),
            body: body.to_string(),
        }
    }
}

impl Default for FontScheme {
    fn default() -> Self {
        Self::new("Inter", "Inter")
    }
}

/// Search engine metadata
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SeoSettings {
    pub title: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    pub og_image: Option<String>,
}

/// Section ordering on the page
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LayoutSettings {
    #[serde(default)]
    pub sections: Vec<String>,
}

/// Partial update applied by the editor
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SiteUpdate {
    pub template_id: Option<String>,
    pub title: Option<String>,
    pub slug: Option<String>,
    pub content: Option<Value>,
    pub settings: Option<SettingsUpdate>,
    pub published: Option<bool>,
    /// `Some(None)` (JSON `null`) detaches the domain, absent leaves it alone
    #[serde(
        default,
        deserialize_with = "present_or_null",
        skip_serializing_if = "Option::is_none"
    )]
    pub custom_domain: Option<Option<String>>,
}

impl SiteUpdate {
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Default::default()
        }
    }

    pub fn content(content: Value) -> Self {
        Self {
            content: Some(content),
            ..Default::default()
        }
    }

    pub fn settings(settings: SettingsUpdate) -> Self {
        Self {
            settings: Some(settings),
            ..Default::default()
        }
    }
}

/// Per-family settings update; absent families are left alone
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SettingsUpdate {
    pub colors: Option<ColorScheme>,
    pub fonts: Option<FontScheme>,
    pub seo: Option<SeoSettings>,
    pub layout: Option<LayoutSettings>,
}

/// Turn arbitrary text into a lowercase `[a-z0-9-]+` slug
pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());

    for c in input.chars().flat_map(char::to_lowercase) {
        if c.is_ascii_alphanumeric() {
            slug.push(c);
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }

    while slug.ends_with('-') {
        slug.pop();
    }

    if slug.is_empty() {
        "site".to_string()
    } else {
        slug
    }
}

/// Distinguishes an explicit `null` from a missing field
fn present_or_null<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

fn merge_content(current: &Value, patch: &Value) -> Value {
    match (current, patch) {
        (Value::Object(base), Value::Object(changes)) => {
            let mut merged = base.clone();
            for (section, value) in changes {
                if value.is_null() {
                    merged.remove(section);
                } else {
                    merged.insert(section.clone(), value.clone());
                }
            }
            Value::Object(merged)
        }
        _ => patch.clone(),
    }
}
