//! Cache key definitions.
//!
//! A [`CacheKey`] names one cache directory: a readable prefix made of the
//! site, form, entry and settings identifiers, followed by the fingerprint.
//! Operators can find everything belonging to an entry by the prefix alone.

use std::fmt;

use slug::slugify;

use super::fingerprint::Fingerprint;

/// Site and user the current process generates artifacts for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AddressContext {
    pub site_id: u64,
    pub user_id: u64,
}

impl AddressContext {
    pub fn new(site_id: u64, user_id: u64) -> Self {
        Self { site_id, user_id }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    site_id: u64,
    form_id: u64,
    entry_id: u64,
    settings_id: String,
    fingerprint: Fingerprint,
}

impl CacheKey {
    pub fn new(
        site_id: u64,
        form_id: u64,
        entry_id: u64,
        settings_id: &str,
        fingerprint: Fingerprint,
    ) -> Self {
        Self {
            site_id,
            form_id,
            entry_id,
            settings_id: settings_component(settings_id),
            fingerprint,
        }
    }

    /// Prefix shared by every key of one entry, trailing separator included.
    pub fn entry_prefix(site_id: u64, form_id: u64, entry_id: u64) -> String {
        format!("{site_id}-{form_id}-{entry_id}-")
    }

    /// Prefix shared by every key of one document of one entry.
    pub fn settings_prefix(site_id: u64, form_id: u64, entry_id: u64, settings_id: &str) -> String {
        format!(
            "{}{}-",
            Self::entry_prefix(site_id, form_id, entry_id),
            settings_component(settings_id)
        )
    }

    /// Whether `dir_name` is `prefix` followed by nothing but a fingerprint.
    pub fn is_keyed_by(dir_name: &str, prefix: &str) -> bool {
        dir_name.strip_prefix(prefix).is_some_and(is_fingerprint)
    }

    /// Whether `dir_name` is a cache directory of the entry behind `entry_prefix`,
    /// for any settings object.
    pub fn belongs_to_entry(dir_name: &str, entry_prefix: &str) -> bool {
        dir_name
            .strip_prefix(entry_prefix)
            .and_then(|rest| rest.rsplit_once('-'))
            .is_some_and(|(settings, fingerprint)| {
                !settings.is_empty() && is_fingerprint(fingerprint)
            })
    }

    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    /// Directory name for this key.
    pub fn dir_name(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}-{}",
            Self::entry_prefix(self.site_id, self.form_id, self.entry_id),
            self.settings_id,
            self.fingerprint
        )
    }
}

fn is_fingerprint(candidate: &str) -> bool {
    candidate.len() == Fingerprint::LEN && candidate.bytes().all(|byte| byte.is_ascii_hexdigit())
}

fn settings_component(settings_id: &str) -> String {
    let slug = slugify(settings_id);
    if slug.is_empty() {
        "settings".to_string()
    } else {
        slug
    }
}
