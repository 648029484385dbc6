//! Content-addressed blob files under `{root}/<hash[0..2]>/<hash>`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use sha2::{Digest, Sha256};
use tracing::{debug, error};

use cortex_types::BlobError;

/// Filesystem blob store addressed by sha-256.
///
/// Identical bytes produce identical hashes, so writes deduplicate and
/// concurrent writers of the same content are idempotent (tmp file +
/// rename; last writer wins with identical bytes). Every operation is
/// bounded by the configured timeout.
///
/// # Example
///
/// ```no_run
/// use cortex_blob::BlobStore;
///
/// # async fn run() -> Result<(), cortex_types::BlobError> {
/// let store = BlobStore::new(".lg-blobs");
/// let hash = store.put(b"state bytes").await?;
/// assert_eq!(store.get(&hash).await?, b"state bytes");
/// # Ok(())
/// # }
/// ```
pub struct BlobStore {
    root: PathBuf,
    timeout: Duration,
}

impl BlobStore {
    /// Create a store rooted at `root`. Directories are created lazily on
    /// first write.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            timeout: Duration::from_secs(30),
        }
    }

    /// Override the per-operation timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The sha-256 hex digest used as a blob's address.
    #[must_use]
    pub fn hash_of(bytes: &[u8]) -> String {
        hex::encode(Sha256::digest(bytes))
    }

    fn path_for(&self, hash: &str) -> PathBuf {
        self.root.join(&hash[..2]).join(hash)
    }

    /// Store bytes, returning their hash. A no-op when the blob already
    /// exists.
    pub async fn put(&self, bytes: &[u8]) -> Result<String, BlobError> {
        let hash = Self::hash_of(bytes);
        let path = self.path_for(&hash);
        let fut = async {
            if tokio::fs::try_exists(&path).await.unwrap_or(false) {
                return Ok(hash.clone());
            }
            let dir = path.parent().ok_or_else(|| {
                BlobError::Io(std::io::Error::other("blob path has no parent"))
            })?;
            tokio::fs::create_dir_all(dir).await?;
            let tmp = path.with_extension(format!("tmp.{}", std::process::id()));
            tokio::fs::write(&tmp, bytes).await?;
            tokio::fs::rename(&tmp, &path).await?;
            debug!(hash = %hash, size = bytes.len(), "wrote blob");
            Ok(hash.clone())
        };
        self.bounded(fut).await
    }

    /// Fetch a blob by hash, verifying content integrity.
    pub async fn get(&self, hash: &str) -> Result<Vec<u8>, BlobError> {
        if !valid_hash(hash) {
            return Err(BlobError::Missing(hash.to_string()));
        }
        let path = self.path_for(hash);
        let fut = async {
            let bytes = match tokio::fs::read(&path).await {
                Ok(bytes) => bytes,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    return Err(BlobError::Missing(hash.to_string()));
                }
                Err(e) => return Err(BlobError::Io(e)),
            };
            if Self::hash_of(&bytes) != hash {
                error!(hash = %hash, "blob content does not match its address");
                return Err(BlobError::Corrupt(hash.to_string()));
            }
            Ok(bytes)
        };
        self.bounded(fut).await
    }

    /// Whether a blob exists, without reading it.
    pub async fn contains(&self, hash: &str) -> bool {
        valid_hash(hash) && tokio::fs::try_exists(self.path_for(hash)).await.unwrap_or(false)
    }

    async fn bounded<T>(
        &self,
        fut: impl Future<Output = Result<T, BlobError>>,
    ) -> Result<T, BlobError> {
        tokio::time::timeout(self.timeout, fut)
            .await
            .map_err(|_| BlobError::Timeout(self.timeout))?
    }
}

fn valid_hash(hash: &str) -> bool {
    hash.len() == 64 && hash.bytes().all(|b| b.is_ascii_hexdigit())
}
