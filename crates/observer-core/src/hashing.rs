//! Content identifiers for files and buffers.
//!
//! Identifiers are `sha256:<hex>` strings. Sentinels share the same
//! namespace: [`ContentId::absent`] for a file that does not exist,
//! [`ContentId::not_applicable`] for artifact references that carry no
//! hashable content, and [`ContentId::unreadable`] for a path that exists but
//! could not be read.

use std::fmt;
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::domain::Result;

const PREFIX: &str = "sha256:";
const ABSENT: &str = "sha256:empty";
const NOT_APPLICABLE: &str = "sha256:n/a";
const UNREADABLE: &str = "sha256:unreadable";
const CHUNK_SIZE: usize = 8192;

/// Prefixed SHA-256 content identifier.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentId(String);

impl ContentId {
    /// Identifier of a file that does not exist.
    pub fn absent() -> Self {
        Self(ABSENT.to_string())
    }

    /// Identifier for references with nothing to hash.
    pub fn not_applicable() -> Self {
        Self(NOT_APPLICABLE.to_string())
    }

    /// Identifier of a path that exists but could not be read.
    pub fn unreadable() -> Self {
        Self(UNREADABLE.to_string())
    }

    fn from_hasher(hasher: Sha256) -> Self {
        Self(format!("{PREFIX}{}", hex::encode(hasher.finalize())))
    }

    pub fn is_absent(&self) -> bool {
        self.0 == ABSENT
    }

    pub fn is_unreadable(&self) -> bool {
        self.0 == UNREADABLE
    }

    /// True for a real digest, false for any sentinel.
    pub fn is_digest(&self) -> bool {
        !matches!(self.0.as_str(), ABSENT | NOT_APPLICABLE | UNREADABLE)
            && self.0.starts_with(PREFIX)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentId({})", self.0.chars().take(19).collect::<String>())
    }
}

/// Hash an in-memory buffer. Never fails; the empty buffer hashes normally.
pub fn hash_bytes(data: &[u8]) -> ContentId {
    let mut hasher = Sha256::new();
    hasher.update(data);
    ContentId::from_hasher(hasher)
}

/// Stream a file through SHA-256 in fixed-size chunks.
///
/// A missing file yields [`ContentId::absent`] rather than an error. Any
/// other I/O failure (permissions, reading a directory) is returned.
pub fn hash_file(path: &Path) -> Result<ContentId> {
    let mut file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(ContentId::absent()),
        Err(e) => return Err(e.into()),
    };

    let mut hasher = Sha256::new();
    let mut buf = [0u8; CHUNK_SIZE];
    loop {
        let n = match file.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };
        hasher.update(&buf[..n]);
    }
    Ok(ContentId::from_hasher(hasher))
}
