//! Maps generation inputs to cache directories.

use std::path::PathBuf;

use slug::slugify;
use tracing::debug;

use crate::domain::entities::{DocumentSettings, EntryRecord, FormDefinition};

use super::config::CacheConfig;
use super::error::CacheError;
use super::fingerprint::{Fingerprint, GenerationInput, RendererFreshness};
use super::keys::{AddressContext, CacheKey};

const SOURCE: &str = "cache::address";

/// Where the artifact for one (form, entry, settings) triple lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheLocation {
    pub key: CacheKey,
    pub directory: PathBuf,
    pub artifact: PathBuf,
}

impl CacheLocation {
    pub fn fingerprint(&self) -> &Fingerprint {
        self.key.fingerprint()
    }
}

/// Computes cache locations. Holds no state beyond its configuration, so any
/// component can build one and agree on the same paths.
#[derive(Debug, Clone)]
pub struct CacheAddresser {
    config: CacheConfig,
    context: AddressContext,
}

impl CacheAddresser {
    pub fn new(config: CacheConfig, context: AddressContext) -> Self {
        Self { config, context }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn context(&self) -> AddressContext {
        self.context
    }

    /// Base directory of the current site.
    pub fn site_root(&self) -> PathBuf {
        self.config.site_root(self.context.site_id)
    }

    /// Resolve the cache location. Does not touch the directory itself.
    pub fn path_for(
        &self,
        form: &FormDefinition,
        entry: &EntryRecord,
        settings: &DocumentSettings,
    ) -> Result<CacheLocation, CacheError> {
        let renderer = RendererFreshness::observe(&self.config, &settings.template);
        let input = GenerationInput::new(&self.context, form, entry, settings, renderer)?;
        let fingerprint = input.fingerprint()?;

        let key = CacheKey::new(
            self.context.site_id,
            form.id,
            entry.id,
            &settings.id,
            fingerprint,
        );
        let directory = self.site_root().join(key.dir_name());
        let artifact = directory.join(self.artifact_name(settings));

        debug!(
            target = SOURCE,
            op = "path_for",
            form_id = form.id,
            entry_id = entry.id,
            settings_id = %settings.id,
            cache_key = %key,
            template_modified_ns = ?renderer.template_modified_ns,
            config_modified_ns = ?renderer.config_modified_ns,
            "Resolved cache location"
        );

        Ok(CacheLocation {
            key,
            directory,
            artifact,
        })
    }

    /// Prefix of every directory belonging to one entry of this site.
    pub fn entry_prefix(&self, form_id: u64, entry_id: u64) -> String {
        CacheKey::entry_prefix(self.context.site_id, form_id, entry_id)
    }

    /// Prefix of every directory belonging to one document of one entry.
    pub fn settings_prefix(&self, form_id: u64, entry_id: u64, settings_id: &str) -> String {
        CacheKey::settings_prefix(self.context.site_id, form_id, entry_id, settings_id)
    }

    fn artifact_name(&self, settings: &DocumentSettings) -> String {
        let mut stem = slugify(&settings.filename);
        if stem.is_empty() {
            stem = slugify(&settings.id);
        }
        if stem.is_empty() {
            stem = "document".to_string();
        }
        format!("{stem}.{}", self.config.artifact_extension)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn form() -> FormDefinition {
        serde_json::from_value(json!({
            "id": 3,
            "title": "Order",
            "fields": [{"id": "1", "type": "text", "label": "Name"}],
            "documents": [{"id": "inv", "template": "invoice", "filename": "Invoice {entry}"}]
        }))
        .expect("form")
    }

    fn entry() -> EntryRecord {
        serde_json::from_value(json!({"id": 12, "form_id": 3, "1": "Ada"})).expect("entry")
    }

    #[test]
    fn location_lives_under_site_root() {
        let addresser = CacheAddresser::new(
            CacheConfig::default()
                .with_root("/var/folio")
                .with_templates_dir("/nonexistent"),
            AddressContext::new(1, 0),
        );
        let form = form();
        let settings = form.document("inv").expect("document");

        let location = addresser
            .path_for(&form, &entry(), settings)
            .expect("location");

        assert_eq!(location.directory.parent(), Some(addresser.site_root().as_path()));
        assert!(location.key.dir_name().starts_with("1-3-12-inv-"));
        assert_eq!(
            location.artifact,
            location.directory.join("invoice-entry.pdf")
        );
        assert!(!location.directory.exists());
    }

    #[test]
    fn user_context_is_part_of_the_fingerprint() {
        let config = CacheConfig::default().with_templates_dir("/nonexistent");
        let form = form();
        let settings = form.document("inv").expect("document");

        let a = CacheAddresser::new(config.clone(), AddressContext::new(1, 5))
            .path_for(&form, &entry(), settings)
            .expect("location");
        let b = CacheAddresser::new(config, AddressContext::new(1, 6))
            .path_for(&form, &entry(), settings)
            .expect("location");

        assert_ne!(a.fingerprint(), b.fingerprint());
    }
}
