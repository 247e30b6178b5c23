//! Cache addressing configuration.
//!
//! Built once from the resolved [`crate::config::Settings`] and handed to the
//! addresser; nothing here is global.

use std::path::{Path, PathBuf};

const DEFAULT_CACHE_ROOT: &str = "cache";
const DEFAULT_ARTIFACT_EXTENSION: &str = "pdf";
const DEFAULT_TEMPLATES_DIR: &str = "templates";
const DEFAULT_TEMPLATE_EXTENSION: &str = "html";
const TEMPLATE_CONFIG_DIR: &str = "config";
const TEMPLATE_CONFIG_EXTENSION: &str = "toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Directory holding one sub-directory per site.
    pub root: PathBuf,
    /// Extension given to generated artifacts.
    pub artifact_extension: String,
    /// Directory holding renderer templates.
    pub templates_dir: PathBuf,
    /// Extension of template code files.
    pub template_extension: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from(DEFAULT_CACHE_ROOT),
            artifact_extension: DEFAULT_ARTIFACT_EXTENSION.to_string(),
            templates_dir: PathBuf::from(DEFAULT_TEMPLATES_DIR),
            template_extension: DEFAULT_TEMPLATE_EXTENSION.to_string(),
        }
    }
}

impl From<&crate::config::Settings> for CacheConfig {
    fn from(settings: &crate::config::Settings) -> Self {
        Self {
            root: settings.cache.root.clone(),
            artifact_extension: settings.cache.artifact_extension.clone(),
            templates_dir: settings.templates.directory.clone(),
            template_extension: settings.templates.code_extension.clone(),
        }
    }
}

impl CacheConfig {
    /// Base directory for one site.
    pub fn site_root(&self, site_id: u64) -> PathBuf {
        self.root.join(site_id.to_string())
    }

    /// Code file of a template.
    pub fn template_path(&self, template: &str) -> PathBuf {
        self.templates_dir
            .join(format!("{template}.{}", self.template_extension))
    }

    /// Optional configuration file of a template.
    pub fn template_config_path(&self, template: &str) -> PathBuf {
        self.templates_dir
            .join(TEMPLATE_CONFIG_DIR)
            .join(format!("{template}.{TEMPLATE_CONFIG_EXTENSION}"))
    }

    pub fn with_root(mut self, root: impl AsRef<Path>) -> Self {
        self.root = root.as_ref().to_path_buf();
        self
    }

    pub fn with_templates_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.templates_dir = dir.as_ref().to_path_buf();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values() {
        let config = CacheConfig::default();
        assert_eq!(config.root, PathBuf::from("cache"));
        assert_eq!(config.artifact_extension, "pdf");
        assert_eq!(config.template_extension, "html");
    }

    #[test]
    fn template_paths_follow_layout() {
        let config = CacheConfig::default().with_templates_dir("/srv/templates");
        assert_eq!(
            config.template_path("invoice"),
            PathBuf::from("/srv/templates/invoice.html")
        );
        assert_eq!(
            config.template_config_path("invoice"),
            PathBuf::from("/srv/templates/config/invoice.toml")
        );
    }

    #[test]
    fn site_root_is_per_site() {
        let config = CacheConfig::default().with_root("/var/folio");
        assert_eq!(config.site_root(2), PathBuf::from("/var/folio/2"));
    }
}
