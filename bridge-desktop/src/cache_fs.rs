//! Filesystem cache storage
//!
//! Layout: `<root>/<namespace>/<sha256(key)>.json`. Each file holds one
//! entry with its body base64-encoded. A namespace directory carries a
//! `.namespace` marker; other directories under `root` are left alone. Writes go to a temporary sibling file
//! that is renamed into place, so readers never observe a partial entry.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use bridge_traits::{
    cache_storage::{Cache, CacheKey, CacheStorage},
    error::{BridgeError, Result},
    http::{HttpMethod, HttpResponse, ResponseType},
    time::{Clock, SystemClock},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

const ENTRY_EXT: &str = "json";
const NAMESPACE_MARKER: &str = ".namespace";

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// On-disk form of one cache entry.
#[derive(Debug, Serialize, Deserialize)]
struct StoredEntry {
    method: HttpMethod,
    url: String,
    status: u16,
    headers: HashMap<String, String>,
    response_type: ResponseType,
    stored_at: DateTime<Utc>,
    body: String,
}

impl StoredEntry {
    fn into_parts(self) -> Result<(CacheKey, HttpResponse)> {
        let body = STANDARD
            .decode(self.body.as_bytes())
            .map_err(|e| BridgeError::Storage(format!("Corrupt entry body: {e}")))?;
        Ok((
            CacheKey::new(self.method, self.url),
            HttpResponse {
                status: self.status,
                headers: self.headers,
                body: body.into(),
                response_type: self.response_type,
            },
        ))
    }
}

fn entry_file_name(key: &CacheKey) -> String {
    let digest = Sha256::digest(key.to_string().as_bytes());
    format!("{}.{ENTRY_EXT}", hex::encode(digest))
}

fn validate_namespace(namespace: &str) -> Result<()> {
    let valid = !namespace.is_empty()
        && namespace != "."
        && namespace != ".."
        && !namespace.contains(['/', '\\'])
        && !namespace.starts_with('.');
    if valid {
        Ok(())
    } else {
        Err(BridgeError::Storage(format!(
            "Invalid namespace name: {namespace:?}"
        )))
    }
}

async fn is_namespace_dir(dir: &Path) -> Result<bool> {
    match tokio::fs::metadata(dir.join(NAMESPACE_MARKER)).await {
        Ok(meta) => Ok(meta.is_file()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

async fn read_entry(path: &Path) -> Result<Option<StoredEntry>> {
    match tokio::fs::read(path).await {
        Ok(bytes) => serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| BridgeError::Storage(format!("Corrupt entry {}: {e}", path.display()))),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// One namespace directory.
struct FsCache {
    dir: PathBuf,
    clock: Arc<dyn Clock>,
}

#[async_trait]
impl Cache for FsCache {
    async fn get(&self, key: &CacheKey) -> Result<Option<HttpResponse>> {
        let path = self.dir.join(entry_file_name(key));
        match read_entry(&path).await? {
            Some(entry) => entry.into_parts().map(|(_, response)| Some(response)),
            None => Ok(None),
        }
    }

    async fn put(&self, key: CacheKey, response: HttpResponse) -> Result<()> {
        let file_name = entry_file_name(&key);
        let entry = StoredEntry {
            method: key.method,
            url: key.url,
            status: response.status,
            headers: response.headers,
            response_type: response.response_type,
            stored_at: self.clock.now(),
            body: STANDARD.encode(&response.body),
        };
        let bytes = serde_json::to_vec(&entry)
            .map_err(|e| BridgeError::Storage(format!("Failed to encode entry: {e}")))?;

        let n = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
        let temp = self
            .dir
            .join(format!(".{file_name}.{}.{n}.tmp", std::process::id()));
        let target = self.dir.join(&file_name);

        tokio::fs::write(&temp, &bytes).await?;
        if let Err(e) = tokio::fs::rename(&temp, &target).await {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(e.into());
        }

        debug!(file = %file_name, bytes = bytes.len(), "Stored cache entry");
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<CacheKey>> {
        let mut keys = Vec::new();
        let mut dir = match tokio::fs::read_dir(&self.dir).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(keys),
            Err(e) => return Err(e.into()),
        };

        while let Some(item) = dir.next_entry().await? {
            let path = item.path();
            let is_entry = path.extension().and_then(|ext| ext.to_str()) == Some(ENTRY_EXT)
                && !item.file_name().to_string_lossy().starts_with('.');
            if !is_entry {
                continue;
            }
            match read_entry(&path).await {
                Ok(Some(entry)) => keys.push(CacheKey::new(entry.method, entry.url)),
                Ok(None) => {}
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable entry"),
            }
        }

        keys.sort();
        Ok(keys)
    }

    async fn delete(&self, key: &CacheKey) -> Result<bool> {
        match tokio::fs::remove_file(self.dir.join(entry_file_name(key))).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

/// [`CacheStorage`] persisting every namespace as a directory under `root`.
pub struct FsCacheStorage {
    root: PathBuf,
    clock: Arc<dyn Clock>,
}

impl FsCacheStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            clock: Arc::new(SystemClock),
        }
    }

    /// Storage under the platform cache directory, e.g.
    /// `~/.cache/offline-shell` on Linux.
    pub fn default_location() -> Result<Self> {
        let base = dirs::cache_dir().ok_or_else(|| {
            BridgeError::NotAvailable("No platform cache directory".to_string())
        })?;
        Ok(Self::new(base.join("offline-shell")))
    }

    /// Use `clock` to stamp stored entries.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn namespace_dir(&self, namespace: &str) -> Result<PathBuf> {
        validate_namespace(namespace)?;
        Ok(self.root.join(namespace))
    }
}

#[async_trait]
impl CacheStorage for FsCacheStorage {
    async fn open(&self, namespace: &str) -> Result<Arc<dyn Cache>> {
        let dir = self.namespace_dir(namespace)?;
        tokio::fs::create_dir_all(&dir).await?;
        if !is_namespace_dir(&dir).await? {
            tokio::fs::write(dir.join(NAMESPACE_MARKER), namespace.as_bytes()).await?;
        }
        Ok(Arc::new(FsCache {
            dir,
            clock: self.clock.clone(),
        }))
    }

    async fn has(&self, namespace: &str) -> Result<bool> {
        let dir = self.namespace_dir(namespace)?;
        is_namespace_dir(&dir).await
    }

    async fn keys(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        let mut dir = match tokio::fs::read_dir(&self.root).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(names),
            Err(e) => return Err(e.into()),
        };

        while let Some(item) = dir.next_entry().await? {
            if !item.file_type().await?.is_dir() {
                continue;
            }
            let Ok(name) = item.file_name().into_string() else {
                continue;
            };
            if validate_namespace(&name).is_ok() && is_namespace_dir(&item.path()).await? {
                names.push(name);
            }
        }

        names.sort();
        Ok(names)
    }

    async fn delete(&self, namespace: &str) -> Result<bool> {
        let dir = self.namespace_dir(namespace)?;
        if !is_namespace_dir(&dir).await? {
            return Ok(false);
        }
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
