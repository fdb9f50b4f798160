//! # Offline Configuration Module
//!
//! Everything one offline controller instance needs, passed in explicitly.
//!
//! ## Overview
//!
//! [`OfflineConfig`] is built with [`OfflineConfigBuilder`] and validated
//! fail-fast: a config that builds is a config the controller can run with.
//! It carries the cache naming scheme, the application shell manifest, the
//! routing predicates, lifecycle flags, and the host bridges.
//!
//! ## Required Dependencies
//!
//! - `HttpClient` - network fetches (desktop default: reqwest)
//! - `CacheStorage` - the versioned cache store (desktop default: in-memory)
//!
//! ## Optional Dependencies
//!
//! - `ClientControl` - required when `skip_waiting` or `claim_clients` is set
//! - `NetworkMonitor` - lets the sync trigger watch for reconnection
//!
//! When the `desktop-shims` feature is enabled, defaults for the required
//! bridges are injected automatically if not provided.
//!
//! ## Namespace Versioning
//!
//! The current namespace is `"{cache_prefix}-{version}"`. Without an explicit
//! version, the version is derived from a SHA-256 digest of the manifest and
//! the routing policy, so changing either yields a new namespace and the old
//! one is pruned on the next activation.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::OfflineConfig;
//!
//! let config = OfflineConfig::builder()
//!     .origin("https://app.example")
//!     .cache_prefix("ledger-shell")
//!     .manifest(["/", "/index.html", "/app.js", "/offline.html"])
//!     .offline_fallback("/offline.html")
//!     .claim_clients(true)
//!     .client_control(Arc::new(MyClientControl))
//!     .build()?;
//!
//! assert!(config.namespace().starts_with("ledger-shell-"));
//! ```

use crate::error::{Error, Result};
use bridge_traits::{CacheStorage, ClientControl, HttpClient, NetworkMonitor};
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::Arc;
use url::Url;

pub const DEFAULT_CACHE_PREFIX: &str = "offline-shell";
pub const DEFAULT_API_PREFIX: &str = "/api/";
pub const DEFAULT_SYNC_TAG: &str = "sync-data";
pub const DEFAULT_PROVISION_CONCURRENCY: usize = 4;
const MAX_PROVISION_CONCURRENCY: usize = 64;
const DERIVED_VERSION_LEN: usize = 12;

/// Configuration of one offline controller instance.
///
/// Immutable once built; a new version means a new config and a new
/// controller.
#[derive(Clone)]
pub struct OfflineConfig {
    /// Prefix shared by every namespace this application owns
    pub cache_prefix: String,

    /// Version tag, explicit or derived from the manifest and policy
    pub version: String,

    /// Application origin; relative URLs are resolved against it
    pub origin: Url,

    /// Normalized application shell entries, in manifest order, deduplicated
    pub manifest: Vec<Url>,

    /// Path prefixes routed network-first
    pub api_prefixes: Vec<String>,

    /// Normalized fallback document, always one of the manifest entries
    pub offline_fallback: Option<Url>,

    /// Ask the host to activate this version without waiting for old clients
    pub skip_waiting: bool,

    /// Take over open clients immediately on activation
    pub claim_clients: bool,

    /// Tags that fire the sync procedure
    pub sync_tags: Vec<String>,

    /// Store successful API responses so they can be served offline
    pub cache_api_responses: bool,

    /// Maximum manifest fetches in flight during provisioning
    pub provision_concurrency: usize,

    pub http_client: Arc<dyn HttpClient>,

    pub cache_storage: Arc<dyn CacheStorage>,

    pub client_control: Option<Arc<dyn ClientControl>>,

    pub network_monitor: Option<Arc<dyn NetworkMonitor>>,
}

impl fmt::Debug for OfflineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OfflineConfig")
            .field("namespace", &self.namespace())
            .field("origin", &self.origin.as_str())
            .field("manifest_entries", &self.manifest.len())
            .field("api_prefixes", &self.api_prefixes)
            .field(
                "offline_fallback",
                &self.offline_fallback.as_ref().map(Url::as_str),
            )
            .field("skip_waiting", &self.skip_waiting)
            .field("claim_clients", &self.claim_clients)
            .field("sync_tags", &self.sync_tags)
            .field("cache_api_responses", &self.cache_api_responses)
            .field("provision_concurrency", &self.provision_concurrency)
            .field("http_client", &"HttpClient { ... }")
            .field("cache_storage", &"CacheStorage { ... }")
            .field(
                "client_control",
                &self.client_control.as_ref().map(|_| "ClientControl { ... }"),
            )
            .field(
                "network_monitor",
                &self
                    .network_monitor
                    .as_ref()
                    .map(|_| "NetworkMonitor { ... }"),
            )
            .finish()
    }
}

impl OfflineConfig {
    pub fn builder() -> OfflineConfigBuilder {
        OfflineConfigBuilder::default()
    }

    /// Name of the namespace this instance reads and writes.
    pub fn namespace(&self) -> String {
        format!("{}-{}", self.cache_prefix, self.version)
    }

    /// Resolve `raw` against the origin and drop its fragment.
    pub fn resolve_url(&self, raw: &str) -> Result<Url> {
        resolve_against(&self.origin, raw)
    }

    /// Re-checks every invariant enforced by the builder.
    ///
    /// Useful after mutating a cloned config by hand.
    pub fn validate(&self) -> Result<()> {
        validate_prefix(&self.cache_prefix)?;
        validate_version(&self.version)?;
        validate_origin(&self.origin)?;

        if self.manifest.is_empty() {
            return Err(Error::Config(
                "Manifest is empty. The application shell needs at least one entry.".to_string(),
            ));
        }

        if let Some(fallback) = &self.offline_fallback {
            if !self.manifest.contains(fallback) {
                return Err(Error::Config(format!(
                    "Offline fallback {} is not a manifest entry. \
                     Add it to the manifest so it is provisioned.",
                    fallback
                )));
            }
        }

        for prefix in &self.api_prefixes {
            if !prefix.starts_with('/') {
                return Err(Error::Config(format!(
                    "API prefix {:?} must be an absolute path starting with '/'",
                    prefix
                )));
            }
        }

        if self.sync_tags.iter().any(|tag| tag.trim().is_empty()) {
            return Err(Error::Config("Sync tags cannot be empty".to_string()));
        }

        if self.provision_concurrency == 0 {
            return Err(Error::Config(
                "Provision concurrency must be greater than 0".to_string(),
            ));
        }

        if self.provision_concurrency > MAX_PROVISION_CONCURRENCY {
            return Err(Error::Config(format!(
                "Provision concurrency exceeds maximum of {}",
                MAX_PROVISION_CONCURRENCY
            )));
        }

        if self.client_control.is_none() && (self.skip_waiting || self.claim_clients) {
            return Err(Error::capability_missing(
                "ClientControl",
                "skip_waiting and claim_clients need a ClientControl implementation. \
                 Disable both flags or inject one.",
            ));
        }

        Ok(())
    }
}

/// Builder for [`OfflineConfig`].
#[derive(Default)]
pub struct OfflineConfigBuilder {
    cache_prefix: Option<String>,
    version: Option<String>,
    origin: Option<String>,
    manifest: Vec<String>,
    api_prefixes: Vec<String>,
    offline_fallback: Option<String>,
    skip_waiting: bool,
    claim_clients: bool,
    sync_tags: Vec<String>,
    cache_api_responses: bool,
    provision_concurrency: Option<usize>,
    http_client: Option<Arc<dyn HttpClient>>,
    cache_storage: Option<Arc<dyn CacheStorage>>,
    client_control: Option<Arc<dyn ClientControl>>,
    network_monitor: Option<Arc<dyn NetworkMonitor>>,
}

impl OfflineConfigBuilder {
    /// Namespace prefix. Default: `"offline-shell"`.
    pub fn cache_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.cache_prefix = Some(prefix.into());
        self
    }

    /// Pin the version tag instead of deriving it.
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Application origin, e.g. `"https://app.example"`. Required.
    pub fn origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    /// Append one manifest entry (absolute, or relative to the origin).
    pub fn manifest_entry(mut self, entry: impl Into<String>) -> Self {
        self.manifest.push(entry.into());
        self
    }

    /// Append several manifest entries, keeping their order.
    pub fn manifest<I, S>(mut self, entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.manifest.extend(entries.into_iter().map(Into::into));
        self
    }

    /// Add a network-first path prefix. Default when none is set: `"/api/"`.
    pub fn api_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.api_prefixes.push(prefix.into());
        self
    }

    /// Document served when a navigation or API request cannot reach the
    /// network. Must also be a manifest entry.
    pub fn offline_fallback(mut self, entry: impl Into<String>) -> Self {
        self.offline_fallback = Some(entry.into());
        self
    }

    /// Default: false. Requires a `ClientControl`.
    pub fn skip_waiting(mut self, enabled: bool) -> Self {
        self.skip_waiting = enabled;
        self
    }

    /// Default: false. Requires a `ClientControl`.
    pub fn claim_clients(mut self, enabled: bool) -> Self {
        self.claim_clients = enabled;
        self
    }

    /// Add a recognized sync tag. Default when none is set: `"sync-data"`.
    pub fn sync_tag(mut self, tag: impl Into<String>) -> Self {
        self.sync_tags.push(tag.into());
        self
    }

    /// Default: false.
    pub fn cache_api_responses(mut self, enabled: bool) -> Self {
        self.cache_api_responses = enabled;
        self
    }

    /// Default: 4.
    pub fn provision_concurrency(mut self, limit: usize) -> Self {
        self.provision_concurrency = Some(limit);
        self
    }

    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    pub fn cache_storage(mut self, storage: Arc<dyn CacheStorage>) -> Self {
        self.cache_storage = Some(storage);
        self
    }

    pub fn client_control(mut self, control: Arc<dyn ClientControl>) -> Self {
        self.client_control = Some(control);
        self
    }

    pub fn network_monitor(mut self, monitor: Arc<dyn NetworkMonitor>) -> Self {
        self.network_monitor = Some(monitor);
        self
    }

    /// Builds and validates the configuration.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] for missing or malformed values
    /// - [`Error::CapabilityMissing`] when a required bridge is absent and no
    ///   default is available
    pub fn build(self) -> Result<OfflineConfig> {
        let raw_origin = self.origin.ok_or_else(|| {
            Error::Config("Origin is required. Use .origin() to set it.".to_string())
        })?;
        let origin = Url::parse(&raw_origin)
            .map_err(|e| Error::Config(format!("Invalid origin {:?}: {}", raw_origin, e)))?;
        validate_origin(&origin)?;

        let mut manifest: Vec<Url> = Vec::with_capacity(self.manifest.len());
        for entry in &self.manifest {
            let url = resolve_against(&origin, entry)?;
            if !manifest.contains(&url) {
                manifest.push(url);
            }
        }

        let offline_fallback = self
            .offline_fallback
            .as_deref()
            .map(|entry| resolve_against(&origin, entry))
            .transpose()?;

        let api_prefixes = if self.api_prefixes.is_empty() {
            vec![DEFAULT_API_PREFIX.to_string()]
        } else {
            self.api_prefixes
        };

        let sync_tags = if self.sync_tags.is_empty() {
            vec![DEFAULT_SYNC_TAG.to_string()]
        } else {
            self.sync_tags
        };

        let version = match self.version {
            Some(version) => version,
            None => derive_version(
                &manifest,
                &api_prefixes,
                offline_fallback.as_ref(),
                self.cache_api_responses,
            ),
        };

        let http_client = match self.http_client {
            Some(client) => client,
            None => provide_default_http_client(&origin)?,
        };

        let cache_storage = match self.cache_storage {
            Some(storage) => storage,
            None => provide_default_cache_storage()?,
        };

        let config = OfflineConfig {
            cache_prefix: self
                .cache_prefix
                .unwrap_or_else(|| DEFAULT_CACHE_PREFIX.to_string()),
            version,
            origin,
            manifest,
            api_prefixes,
            offline_fallback,
            skip_waiting: self.skip_waiting,
            claim_clients: self.claim_clients,
            sync_tags,
            cache_api_responses: self.cache_api_responses,
            provision_concurrency: self
                .provision_concurrency
                .unwrap_or(DEFAULT_PROVISION_CONCURRENCY),
            http_client,
            cache_storage,
            client_control: self.client_control,
            network_monitor: self.network_monitor,
        };

        config.validate()?;

        Ok(config)
    }
}

fn resolve_against(origin: &Url, raw: &str) -> Result<Url> {
    let mut url = origin
        .join(raw.trim())
        .map_err(|e| Error::Config(format!("Invalid URL {:?}: {}", raw, e)))?;
    url.set_fragment(None);
    Ok(url)
}

fn validate_origin(origin: &Url) -> Result<()> {
    if !matches!(origin.scheme(), "http" | "https") || origin.host().is_none() {
        return Err(Error::Config(format!(
            "Origin {} must be an absolute http(s) URL",
            origin
        )));
    }
    Ok(())
}

fn validate_prefix(prefix: &str) -> Result<()> {
    if prefix.is_empty() {
        return Err(Error::Config("Cache prefix cannot be empty".to_string()));
    }
    if !prefix
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        || prefix.starts_with('.')
    {
        return Err(Error::Config(format!(
            "Cache prefix {:?} may only contain ASCII letters, digits, '-', '_' and '.'",
            prefix
        )));
    }
    Ok(())
}

fn validate_version(version: &str) -> Result<()> {
    if version.is_empty() {
        return Err(Error::Config("Version cannot be empty".to_string()));
    }
    if version.contains(['/', '\\']) {
        return Err(Error::Config(format!(
            "Version {:?} cannot contain path separators",
            version
        )));
    }
    Ok(())
}

/// Hex digest prefix over everything that changes what the cache holds or
/// how it is routed.
fn derive_version(
    manifest: &[Url],
    api_prefixes: &[String],
    offline_fallback: Option<&Url>,
    cache_api_responses: bool,
) -> String {
    let mut hasher = Sha256::new();
    for entry in manifest {
        hasher.update(b"manifest\0");
        hasher.update(entry.as_str().as_bytes());
        hasher.update(b"\n");
    }
    for prefix in api_prefixes {
        hasher.update(b"api\0");
        hasher.update(prefix.as_bytes());
        hasher.update(b"\n");
    }
    if let Some(fallback) = offline_fallback {
        hasher.update(b"fallback\0");
        hasher.update(fallback.as_str().as_bytes());
        hasher.update(b"\n");
    }
    hasher.update(b"cache-api\0");
    hasher.update([u8::from(cache_api_responses)]);

    let digest = hex::encode(hasher.finalize());
    digest[..DERIVED_VERSION_LEN].to_string()
}

#[cfg(feature = "desktop-shims")]
fn provide_default_http_client(origin: &Url) -> Result<Arc<dyn HttpClient>> {
    use bridge_desktop::ReqwestHttpClient;

    let client: Arc<dyn HttpClient> =
        Arc::new(ReqwestHttpClient::new().with_origin(origin.clone()));
    Ok(client)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_http_client(_origin: &Url) -> Result<Arc<dyn HttpClient>> {
    Err(Error::capability_missing(
        "HttpClient",
        "HttpClient implementation is required for network fetches. \
         Desktop: enable the 'desktop-shims' feature to use the default ReqwestHttpClient. \
         Browser hosts: inject a fetch()-backed client.",
    ))
}

#[cfg(feature = "desktop-shims")]
fn provide_default_cache_storage() -> Result<Arc<dyn CacheStorage>> {
    use bridge_desktop::MemoryCacheStorage;

    let storage: Arc<dyn CacheStorage> = Arc::new(MemoryCacheStorage::new());
    Ok(storage)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_cache_storage() -> Result<Arc<dyn CacheStorage>> {
    Err(Error::capability_missing(
        "CacheStorage",
        "CacheStorage implementation is required for the offline cache. \
         Desktop: enable the 'desktop-shims' feature to use the default MemoryCacheStorage, \
         or inject FsCacheStorage for persistence. \
         Browser hosts: inject a Cache Storage API adapter.",
    ))
}
