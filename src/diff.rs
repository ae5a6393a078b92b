//! Structural diff between two site snapshots

use serde_json::Value;

use crate::site::Site;

/// Top-level fields that can differ between snapshots
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SiteField {
    TemplateId,
    Title,
    Slug,
    Colors,
    Fonts,
    Seo,
    Layout,
    Published,
    CustomDomain,
}

/// Diff between two snapshots of the same site
#[derive(Debug, Clone, Default)]
pub struct SiteDiff {
    /// Changed fields outside of content
    pub fields: Vec<SiteField>,
    /// Content sections that were added
    pub added: Vec<String>,
    /// Content sections that were modified
    pub modified: Vec<String>,
    /// Content sections that were removed
    pub removed: Vec<String>,
}

impl SiteDiff {
    /// Compare two snapshots. Timestamps and id are ignored.
    pub fn between(old: &Site, new: &Site) -> Self {
        let mut fields = Vec::new();

        let checks = [
            (SiteField::TemplateId, old.template_id != new.template_id),
            (SiteField::Title, old.title != new.title),
            (SiteField::Slug, old.slug != new.slug),
            (SiteField::Colors, old.settings.colors != new.settings.colors),
            (SiteField::Fonts, old.settings.fonts != new.settings.fonts),
            (SiteField::Seo, old.settings.seo != new.settings.seo),
            (SiteField::Layout, old.settings.layout != new.settings.layout),
            (SiteField::Published, old.published != new.published),
            (SiteField::CustomDomain, old.custom_domain != new.custom_domain),
        ];
        for (field, changed) in checks {
            if changed {
                fields.push(field);
            }
        }

        let mut diff = Self {
            fields,
            ..Default::default()
        };
        diff.compare_content(&old.content, &new.content);
        diff
    }

    fn compare_content(&mut self, old: &Value, new: &Value) {
        match (old, new) {
            (Value::Object(old), Value::Object(new)) => {
                for (section, new_value) in new {
                    match old.get(section) {
                        None => self.added.push(section.clone()),
                        Some(old_value) if old_value != new_value => {
                            self.modified.push(section.clone());
                        }
                        _ => {}
                    }
                }

                for section in old.keys() {
                    if !new.contains_key(section) {
                        self.removed.push(section.clone());
                    }
                }
            }
            (old, new) if old != new => self.modified.push(String::new()),
            _ => {}
        }
    }

    /// Check if diff is empty
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
            && self.added.is_empty()
            && self.modified.is_empty()
            && self.removed.is_empty()
    }

    /// Total number of changed fields and sections
    pub fn total_changes(&self) -> usize {
        self.fields.len() + self.added.len() + self.modified.len() + self.removed.len()
    }
}
