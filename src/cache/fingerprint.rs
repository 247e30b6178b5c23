//! Deterministic fingerprints over generation inputs.
//!
//! A fingerprint is SHA-256 over the canonical JSON of a [`GenerationInput`]:
//! object keys sorted recursively, no whitespace. The form is taken through
//! [`FormDefinition::canonical`] and the entry loses its volatile
//! administrative fields first, so neither lazy attribute access nor
//! read/starred toggles change the result.

use std::fmt::{self, Write as _};
use std::fs;
use std::path::Path;
use std::time::UNIX_EPOCH;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::domain::entities::{DocumentSettings, EntryRecord, FormDefinition};

use super::config::CacheConfig;
use super::error::CacheError;
use super::keys::AddressContext;

/// Entry fields that carry administrative state rather than submitted data.
pub const VOLATILE_ENTRY_FIELDS: &[&str] = &[
    "is_read",
    "is_starred",
    "is_approved",
    "status",
    "source_url",
    "date_updated",
];

/// Hex-encoded SHA-256 digest.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub const LEN: usize = 64;

    pub fn of_bytes(bytes: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        Self(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Modification times of the active template, in nanoseconds since the epoch.
///
/// Editing a template or its configuration file changes these, which changes
/// every fingerprint that uses the template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct RendererFreshness {
    pub template_modified_ns: Option<u64>,
    pub config_modified_ns: Option<u64>,
}

impl RendererFreshness {
    pub fn observe(config: &CacheConfig, template: &str) -> Self {
        Self {
            template_modified_ns: modified_ns(&config.template_path(template)),
            config_modified_ns: modified_ns(&config.template_config_path(template)),
        }
    }
}

fn modified_ns(path: &Path) -> Option<u64> {
    let modified = fs::metadata(path).ok()?.modified().ok()?;
    let since_epoch = modified.duration_since(UNIX_EPOCH).ok()?;
    Some(u64::try_from(since_epoch.as_nanos()).unwrap_or(u64::MAX))
}

/// Everything a generated artifact depends on.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationInput {
    pub site_id: u64,
    pub user_id: u64,
    pub form: Value,
    pub entry: Value,
    pub settings: Value,
    pub renderer: RendererFreshness,
}

impl GenerationInput {
    pub fn new(
        context: &AddressContext,
        form: &FormDefinition,
        entry: &EntryRecord,
        settings: &DocumentSettings,
        renderer: RendererFreshness,
    ) -> Result<Self, CacheError> {
        Ok(Self {
            site_id: context.site_id,
            user_id: context.user_id,
            form: form.canonical()?,
            entry: sanitize_entry(entry)?,
            settings: serde_json::to_value(settings)?,
            renderer,
        })
    }

    pub fn fingerprint(&self) -> Result<Fingerprint, CacheError> {
        let value = serde_json::to_value(self)?;
        Ok(Fingerprint::of_bytes(canonical_json(&value).as_bytes()))
    }
}

/// Entry as JSON without its volatile fields.
pub fn sanitize_entry(entry: &EntryRecord) -> Result<Value, serde_json::Error> {
    let mut value = serde_json::to_value(entry)?;
    if let Value::Object(map) = &mut value {
        for field in VOLATILE_ENTRY_FIELDS {
            map.remove(*field);
        }
    }
    Ok(value)
}

/// Compact JSON with object keys sorted at every level.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Array(items) => {
            out.push('[');
            for (index, item) in items.iter().enumerate() {
                if index > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (index, key) in keys.into_iter().enumerate() {
                if index > 0 {
                    out.push(',');
                }
                // Display on a string Value yields its quoted, escaped form.
                let _ = write!(out, "{}:", Value::String(key.clone()));
                write_canonical(&map[key], out);
            }
            out.push('}');
        }
        scalar => {
            let _ = write!(out, "{scalar}");
        }
    }
}
