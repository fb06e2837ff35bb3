//! Credential storage and runtime settings for larder.
//!
//! This crate is the single source of truth for upstream POS credentials.
//!
//! # Contract
//! - Credentials live in a key=value file **outside** the main data store so
//!   a token refresh survives process restarts without touching the database.
//! - Callers load once per operation via [`CredentialStore::load`] and pass
//!   the typed [`Credentials`] down; never scatter file reads across crates.
//! - `Debug` impls **redact** secret values. Error messages reference the
//!   key NAME, never the value.
//! - [`CredentialStore::save`] rewrites the file atomically (temp + rename)
//!   so a crash mid-refresh cannot leave a half-written credential set.

use anyhow::{bail, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

pub const KEY_CLIENT_ID: &str = "CLIENT_ID";
pub const KEY_CLIENT_SECRET: &str = "CLIENT_SECRET";
pub const KEY_RESTAURANT_ID: &str = "RESTAURANT_ID";
pub const KEY_MANAGEMENT_GROUP_ID: &str = "MANAGEMENT_GROUP_ID";
pub const KEY_ACCESS_TOKEN: &str = "ACCESS_TOKEN";

/// Recognised keys, in the order they are written back to disk.
const KNOWN_KEYS: &[&str] = &[
    KEY_CLIENT_ID,
    KEY_CLIENT_SECRET,
    KEY_RESTAURANT_ID,
    KEY_MANAGEMENT_GROUP_ID,
    KEY_ACCESS_TOKEN,
];

// ---------------------------------------------------------------------------
// Credentials
// ---------------------------------------------------------------------------

/// One upstream POS credential set.
///
/// `access_token` is the only field mutated at runtime (replaced on refresh);
/// everything else is operator-provisioned.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
    /// Restaurant (tenant) external id sent on every order/menu request.
    pub restaurant_id: String,
    /// Management-group fallback used when no per-restaurant id is set.
    pub management_group_id: Option<String>,
    pub access_token: Option<String>,
}

impl Credentials {
    /// Effective tenant id: the restaurant id, falling back to the
    /// management-group id. `None` means the set is unusable for sync.
    pub fn tenant_id(&self) -> Option<&str> {
        if !self.restaurant_id.is_empty() {
            return Some(&self.restaurant_id);
        }
        self.management_group_id.as_deref().filter(|s| !s.is_empty())
    }

    /// `true` when both halves of the client credential pair are present.
    pub fn can_refresh(&self) -> bool {
        !self.client_id.is_empty() && !self.client_secret.is_empty()
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print the secret or token; the id fields are not sensitive.
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &redact(!self.client_secret.is_empty()))
            .field("restaurant_id", &self.restaurant_id)
            .field("management_group_id", &self.management_group_id)
            .field("access_token", &redact(self.access_token.is_some()))
            .finish()
    }
}

fn redact(present: bool) -> &'static str {
    if present {
        "<REDACTED>"
    } else {
        "<unset>"
    }
}

// ---------------------------------------------------------------------------
// CredentialStore
// ---------------------------------------------------------------------------

/// File-backed credential store.
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load credentials from disk.
    ///
    /// A missing file yields an empty (default) set rather than an error —
    /// first-run provisioning writes the file via [`save`][Self::save].
    /// Unknown keys and malformed lines are ignored.
    pub fn load(&self) -> Result<Credentials> {
        if !self.path.exists() {
            return Ok(Credentials::default());
        }
        let raw = fs::read_to_string(&self.path)
            .with_context(|| format!("read credentials file {}", self.path.display()))?;
        Ok(parse_credentials(&raw))
    }

    /// Atomically rewrite the credential file.
    ///
    /// Writes to a sibling temp file and renames over the target so readers
    /// never observe a partial file. Empty fields are omitted.
    pub fn save(&self, creds: &Credentials) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create credentials dir {}", parent.display()))?;
        }

        let body = render_credentials(creds);
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, body)
            .with_context(|| format!("write credentials temp file {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("replace credentials file {}", self.path.display()))?;
        Ok(())
    }
}

fn parse_credentials(raw: &str) -> Credentials {
    let mut creds = Credentials::default();
    for line in raw.lines() {
        let line = line.trim();
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        if !KNOWN_KEYS.contains(&key) {
            continue;
        }
        let value = value.trim().to_string();
        match key {
            KEY_CLIENT_ID => creds.client_id = value,
            KEY_CLIENT_SECRET => creds.client_secret = value,
            KEY_RESTAURANT_ID => creds.restaurant_id = value,
            KEY_MANAGEMENT_GROUP_ID => {
                creds.management_group_id = Some(value).filter(|s| !s.is_empty())
            }
            KEY_ACCESS_TOKEN => creds.access_token = Some(value).filter(|s| !s.is_empty()),
            _ => unreachable!("key filtered above"),
        }
    }
    creds
}

fn render_credentials(creds: &Credentials) -> String {
    let mut out = String::new();
    let mut push = |key: &str, value: &str| {
        if !value.is_empty() {
            out.push_str(key);
            out.push('=');
            out.push_str(value);
            out.push('\n');
        }
    };
    push(KEY_CLIENT_ID, &creds.client_id);
    push(KEY_CLIENT_SECRET, &creds.client_secret);
    push(KEY_RESTAURANT_ID, &creds.restaurant_id);
    push(
        KEY_MANAGEMENT_GROUP_ID,
        creds.management_group_id.as_deref().unwrap_or(""),
    );
    push(KEY_ACCESS_TOKEN, creds.access_token.as_deref().unwrap_or(""));
    out
}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

pub const ENV_DB_URL: &str = "LARDER_DATABASE_URL";
pub const ENV_POS_BASE_URL: &str = "LARDER_POS_BASE_URL";
pub const ENV_CREDENTIALS_PATH: &str = "LARDER_CREDENTIALS_PATH";
pub const ENV_BIND_ADDR: &str = "LARDER_ADDR";

/// Process-level settings resolved from the environment once at startup and
/// passed down explicitly — no ambient globals.
#[derive(Debug, Clone)]
pub struct Settings {
    /// SQLite URL, e.g. `sqlite://data/larder.db`.
    pub database_url: String,
    /// Upstream POS API base URL.
    pub pos_base_url: String,
    /// Path of the key=value credential file.
    pub credentials_path: PathBuf,
}

impl Settings {
    /// Resolve settings from the environment.
    ///
    /// The database URL is required; the POS base URL and credential path
    /// have deployment defaults.
    pub fn from_env() -> Result<Self> {
        let database_url = match std::env::var(ENV_DB_URL) {
            Ok(v) if !v.trim().is_empty() => v,
            _ => bail!("missing env var {ENV_DB_URL}"),
        };
        let pos_base_url = std::env::var(ENV_POS_BASE_URL)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| "https://api.pos.example.com".to_string());
        let credentials_path = std::env::var(ENV_CREDENTIALS_PATH)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("data/pos_credentials.txt"));

        Ok(Self {
            database_url,
            pos_base_url,
            credentials_path,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
