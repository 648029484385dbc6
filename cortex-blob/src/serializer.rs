//! The redacting checkpoint serializer and its lazy reader.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Map, Value, json};
use tokio::sync::Mutex;
use tracing::debug;

use cortex_types::{BlobError, CheckpointError, SerializerConfig};

use crate::store::BlobStore;

/// Checkpoint magic header.
const MAGIC: [u8; 4] = *b"CXCP";
/// Current checkpoint format version.
const VERSION: u8 = 1;

/// Whether a value is a blob handle: an object with exactly the keys
/// `blob`, `type`, `size`, a 64-hex-char address, and a known type tag.
#[must_use]
pub fn is_handle(value: &Value) -> bool {
    let Value::Object(map) = value else {
        return false;
    };
    if map.len() != 3 {
        return false;
    }
    let (Some(Value::String(hash)), Some(Value::String(ty)), Some(size)) =
        (map.get("blob"), map.get("type"), map.get("size"))
    else {
        return false;
    };
    hash.len() == 64
        && hash.bytes().all(|b| b.is_ascii_hexdigit())
        && matches!(ty.as_str(), "text" | "bytes" | "array")
        && size.is_u64()
}

/// Serializes state snapshots, externalizing oversize leaves.
///
/// Emitted bytes are a fixed magic header, one version byte, then JSON.
/// Strings above the configured byte size become `text` handles, arrays
/// above the length cap become `array` handles, and objects above the
/// key cap become `bytes` handles over their JSON encoding. A blob write
/// failure aborts the checkpoint before any handle referencing missing
/// data is emitted.
pub struct CheckpointSerializer {
    store: Arc<BlobStore>,
    cfg: SerializerConfig,
}

impl CheckpointSerializer {
    /// Create a serializer over a blob store.
    #[must_use]
    pub fn new(store: Arc<BlobStore>, cfg: SerializerConfig) -> Self {
        Self { store, cfg }
    }

    /// Create a serializer whose store lives at the configured blob
    /// directory with the configured operation timeout.
    #[must_use]
    pub fn from_config(cfg: SerializerConfig) -> Self {
        let store = Arc::new(BlobStore::new(&cfg.blob_dir).with_timeout(cfg.op_timeout));
        Self { store, cfg }
    }

    /// The underlying blob store.
    #[must_use]
    pub fn store(&self) -> &Arc<BlobStore> {
        &self.store
    }

    /// Serialize a state value to checkpoint bytes, writing blobs for
    /// oversize leaves.
    pub async fn serialize(&self, state: &Value) -> Result<Vec<u8>, CheckpointError> {
        let redacted = self.redact(state).await?;
        let mut out = MAGIC.to_vec();
        out.push(VERSION);
        serde_json::to_writer(&mut out, &redacted)
            .map_err(|e| CheckpointError::Serialization(e.to_string()))?;
        Ok(out)
    }

    /// Read checkpoint bytes back into a lazily-resolving state view.
    pub async fn deserialize(&self, bytes: &[u8]) -> Result<LazyState, CheckpointError> {
        if bytes.len() < 5 || bytes[..4] != MAGIC {
            return Err(CheckpointError::BadHeader);
        }
        if bytes[4] != VERSION {
            return Err(CheckpointError::UnsupportedVersion(bytes[4]));
        }
        let root: Value = serde_json::from_slice(&bytes[5..])
            .map_err(|e| CheckpointError::Serialization(e.to_string()))?;
        Ok(LazyState {
            root,
            store: Arc::clone(&self.store),
            resolved: Mutex::new(HashMap::new()),
        })
    }

    async fn redact(&self, value: &Value) -> Result<Value, CheckpointError> {
        match value {
            Value::String(s) if s.len() > self.cfg.max_string_bytes => {
                self.externalize(s.as_bytes(), "text").await
            }
            Value::Array(items) if items.len() > self.cfg.max_array_len => {
                let bytes = serde_json::to_vec(items)
                    .map_err(|e| CheckpointError::Serialization(e.to_string()))?;
                self.externalize(&bytes, "array").await
            }
            Value::Object(map) if map.len() > self.cfg.max_object_keys => {
                let bytes = serde_json::to_vec(map)
                    .map_err(|e| CheckpointError::Serialization(e.to_string()))?;
                self.externalize(&bytes, "bytes").await
            }
            Value::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(Box::pin(self.redact(item)).await?);
                }
                Ok(Value::Array(out))
            }
            Value::Object(map) => {
                let mut out = Map::with_capacity(map.len());
                for (key, item) in map {
                    out.insert(key.clone(), Box::pin(self.redact(item)).await?);
                }
                Ok(Value::Object(out))
            }
            other => Ok(other.clone()),
        }
    }

    async fn externalize(&self, bytes: &[u8], ty: &str) -> Result<Value, CheckpointError> {
        let hash = self.store.put(bytes).await?;
        debug!(hash = %hash, ty, size = bytes.len(), "externalized oversize leaf");
        Ok(json!({ "blob": hash, "type": ty, "size": bytes.len() }))
    }
}

/// A deserialized checkpoint that fetches blob handles on first access.
///
/// Resolved blobs are cached by hash, so repeated reads hit the
/// filesystem once. A missing or corrupt blob surfaces as an error to
/// the caller; it never panics.
pub struct LazyState {
    root: Value,
    store: Arc<BlobStore>,
    resolved: Mutex<HashMap<String, Value>>,
}

impl LazyState {
    /// The structural state with handles left in place.
    #[must_use]
    pub fn raw(&self) -> &Value {
        &self.root
    }

    /// Resolve the value at a JSON pointer (e.g. `/notes` or
    /// `/files/3/content`), fetching any handles along the path.
    pub async fn get(&self, pointer: &str) -> Result<Value, CheckpointError> {
        let mut current = self.root.clone();
        if !pointer.is_empty() {
            for segment in pointer.trim_start_matches('/').split('/') {
                if is_handle(&current) {
                    current = self.fetch(&current).await?;
                }
                current = index(&current, segment).ok_or_else(|| {
                    CheckpointError::Serialization(format!("no value at pointer {pointer}"))
                })?;
            }
        }
        if is_handle(&current) {
            current = self.fetch(&current).await?;
        }
        Ok(current)
    }

    /// Resolve every handle in the checkpoint eagerly.
    pub async fn hydrate(&self) -> Result<Value, CheckpointError> {
        self.hydrate_value(&self.root).await
    }

    async fn hydrate_value(&self, value: &Value) -> Result<Value, CheckpointError> {
        if is_handle(value) {
            return self.fetch(value).await;
        }
        match value {
            Value::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(Box::pin(self.hydrate_value(item)).await?);
                }
                Ok(Value::Array(out))
            }
            Value::Object(map) => {
                let mut out = Map::with_capacity(map.len());
                for (key, item) in map {
                    out.insert(key.clone(), Box::pin(self.hydrate_value(item)).await?);
                }
                Ok(Value::Object(out))
            }
            other => Ok(other.clone()),
        }
    }

    async fn fetch(&self, handle: &Value) -> Result<Value, CheckpointError> {
        let hash = handle["blob"].as_str().unwrap_or_default().to_string();
        let ty = handle["type"].as_str().unwrap_or_default().to_string();

        if let Some(cached) = self.resolved.lock().await.get(&hash) {
            return Ok(cached.clone());
        }

        let bytes = self.store.get(&hash).await?;
        let value = match ty.as_str() {
            "text" => Value::String(String::from_utf8(bytes).map_err(|e| {
                CheckpointError::Blob(BlobError::Corrupt(format!("{hash}: {e}")))
            })?),
            "array" | "bytes" => serde_json::from_slice(&bytes)
                .map_err(|e| CheckpointError::Serialization(e.to_string()))?,
            other => {
                return Err(CheckpointError::Serialization(format!(
                    "unknown handle type {other}"
                )));
            }
        };
        self.resolved.lock().await.insert(hash, value.clone());
        Ok(value)
    }
}

fn index(value: &Value, segment: &str) -> Option<Value> {
    match value {
        Value::Object(map) => map.get(segment).cloned(),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i).cloned()),
        _ => None,
    }
}
