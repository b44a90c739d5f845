//! Small JSON records stored next to Zarr arrays.
//!
//! Completion markers and prepared-range ledgers are kept as plain keys in
//! the same store as the arrays they describe, so they travel with the data
//! and never require re-reading array contents.

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;
use zarrs_storage::{
    ListableStorageTraits, ReadableStorageTraits, StoreKey, StorePrefix, WritableStorageTraits,
};

use crate::error::{CommonError, CommonResult};

fn store_key(key: &str) -> CommonResult<StoreKey> {
    StoreKey::new(key).map_err(|e| CommonError::InvalidKey {
        key: key.to_string(),
        message: e.to_string(),
    })
}

/// Read and deserialize a record. Returns `None` if the key does not exist.
pub fn read_record<S, T>(storage: &S, key: &str) -> CommonResult<Option<T>>
where
    S: ReadableStorageTraits + ?Sized,
    T: DeserializeOwned,
{
    let store_key = store_key(key)?;
    let Some(bytes) = storage
        .get(&store_key)
        .map_err(|e| CommonError::storage(e.to_string()))?
    else {
        return Ok(None);
    };

    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|e| CommonError::CorruptRecord {
            key: key.to_string(),
            message: e.to_string(),
        })
}

/// Whether a key is present in the store.
pub fn key_exists<S>(storage: &S, key: &str) -> CommonResult<bool>
where
    S: ReadableStorageTraits + ?Sized,
{
    let store_key = store_key(key)?;
    storage
        .get(&store_key)
        .map(|bytes| bytes.is_some())
        .map_err(|e| CommonError::storage(e.to_string()))
}

/// Serialize and write a record, replacing any previous value.
pub fn write_record<S, T>(storage: &S, key: &str, record: &T) -> CommonResult<()>
where
    S: WritableStorageTraits + ?Sized,
    T: Serialize,
{
    let store_key = store_key(key)?;
    let json = serde_json::to_vec_pretty(record).map_err(|e| CommonError::CorruptRecord {
        key: key.to_string(),
        message: e.to_string(),
    })?;

    storage
        .set(&store_key, Bytes::from(json))
        .map_err(|e| CommonError::storage(e.to_string()))
}

/// Remove a record if present.
pub fn erase_record<S>(storage: &S, key: &str) -> CommonResult<()>
where
    S: WritableStorageTraits + ?Sized,
{
    let store_key = store_key(key)?;
    storage
        .erase(&store_key)
        .map_err(|e| CommonError::storage(e.to_string()))?;
    Ok(())
}

/// List record keys below a prefix (the prefix must end with `/`).
pub fn list_records<S>(storage: &S, prefix: &str) -> CommonResult<Vec<String>>
where
    S: ListableStorageTraits + ?Sized,
{
    let store_prefix = StorePrefix::new(prefix).map_err(|e| CommonError::InvalidKey {
        key: prefix.to_string(),
        message: e.to_string(),
    })?;

    let mut keys: Vec<String> = storage
        .list_prefix(&store_prefix)
        .map_err(|e| CommonError::storage(e.to_string()))?
        .iter()
        .map(|key| key.as_str().to_string())
        .collect();
    keys.sort();
    Ok(keys)
}
