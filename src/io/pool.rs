//! Elite-pool persistence: versioned JSON save and lenient load.

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::compute::Candidate;
use crate::schema::{POOL_FORMAT_VERSION, PoolEntry, PoolError, PoolFile};

/// Write the elite pool to a JSON pool file. Exact float round trip is
/// guaranteed by the shortest-representation encoding.
///
/// The document goes to a sibling temp file first and is renamed into
/// place, so a failed write leaves any existing pool at `path` untouched.
pub fn save_pool(path: impl AsRef<Path>, pool: &[Candidate]) -> Result<(), PoolError> {
    let path = path.as_ref();
    let file = PoolFile {
        version: POOL_FORMAT_VERSION,
        parents: pool.iter().map(Candidate::to_pool_entry).collect(),
    };
    let json = serde_json::to_string_pretty(&file)?;

    let tmp = path.with_extension("tmp");
    fs::write(&tmp, json)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

/// Mirror of `PoolFile` that defers per-candidate decoding, so one
/// malformed entry does not discard the rest.
#[derive(Deserialize)]
struct RawPoolFile {
    version: u32,
    parents: Vec<serde_json::Value>,
}

/// Load a pool file, skipping malformed candidates with a logged index.
///
/// A wrong version or an unreadable document is an error; a bad entry
/// inside an otherwise valid document is not.
pub fn load_pool(path: impl AsRef<Path>) -> Result<Vec<Candidate>, PoolError> {
    let text = fs::read_to_string(path)?;
    let raw: RawPoolFile = serde_json::from_str(&text)?;

    if raw.version != POOL_FORMAT_VERSION {
        return Err(PoolError::Version { found: raw.version });
    }

    let mut pool = Vec::with_capacity(raw.parents.len());
    for (index, value) in raw.parents.into_iter().enumerate() {
        let candidate = serde_json::from_value::<PoolEntry>(value)
            .map_err(PoolError::from)
            .and_then(Candidate::from_pool_entry);
        match candidate {
            Ok(c) => pool.push(c),
            Err(e) => log::warn!("skipping malformed candidate {}: {}", index, e),
        }
    }
    Ok(pool)
}
