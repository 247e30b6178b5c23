//! Content-addressed artifact cache.
//!
//! Generated documents live in directories named after a deterministic
//! fingerprint of everything that went into them:
//!
//! ```text
//! <root>/<site_id>/<site>-<form>-<entry>-<settings>-<fingerprint>/<artifact>
//! ```
//!
//! Any component can recompute the location from the form, entry and
//! document settings, so generate and dispatch tasks coordinate through the
//! path alone. Directories are created by generation and removed only by
//! explicit reclamation; there is no time-based eviction.

mod address;
mod config;
mod error;
mod fingerprint;
mod keys;
mod lock;

pub use address::{CacheAddresser, CacheLocation};
pub use config::CacheConfig;
pub use error::CacheError;
pub use fingerprint::{
    Fingerprint, GenerationInput, RendererFreshness, VOLATILE_ENTRY_FIELDS, canonical_json,
    sanitize_entry,
};
pub use keys::{AddressContext, CacheKey};
pub use lock::{GenerationGuard, GenerationLocks};

pub(crate) use lock::mutex_lock;
