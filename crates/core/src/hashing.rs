//! Content hashing for photo integrity, dedup, and manifests.
//!
//! Every stored artifact carries a SHA-256 hex digest (the "strong"
//! hash, used for addressing and integrity) and an MD5 hex digest (the
//! "legacy" hash, kept only for comparison against pre-migration
//! records, never consulted for dedup decisions).

use chrono::Utc;
use md5::Md5;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::CoreError;
use crate::types::{DbId, Timestamp};

/// Strong + legacy digest of one buffer, with its size and hash time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HashBundle {
    pub strong: String,
    pub legacy: String,
    pub size: usize,
    pub hashed_at: Timestamp,
}

/// Hashes and sizes for one photo and its three derivatives, as
/// recorded in a protocol manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileManifestEntry {
    pub photo_id: DbId,
    pub hashes: EntryHashes,
    pub sizes: EntrySizes,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryHashes {
    pub original: String,
    pub thumb: String,
    pub gallery: String,
    pub pdf: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct EntrySizes {
    pub original: u64,
    pub thumb: u64,
    pub gallery: u64,
    pub pdf: u64,
}

/// Reject empty input before touching a hasher.
///
/// An empty buffer is always a caller bug (a failed download or a
/// truncated upload), and its digest would still dedup-collide with
/// every other empty buffer.
fn ensure_readable(data: &[u8]) -> Result<(), CoreError> {
    if data.is_empty() {
        return Err(CoreError::Hashing("cannot hash an empty buffer".into()));
    }
    Ok(())
}

/// Compute the strong (SHA-256) hex digest of the given bytes.
pub fn strong_hash_hex(data: &[u8]) -> Result<String, CoreError> {
    ensure_readable(data)?;
    let hash = Sha256::digest(data);
    Ok(format!("{hash:x}"))
}

/// Compute the legacy (MD5) hex digest of the given bytes.
///
/// Comparison-only: allows matching records written by the pre-V2
/// system. Never used for dedup or addressing.
pub fn legacy_hash_hex(data: &[u8]) -> Result<String, CoreError> {
    ensure_readable(data)?;
    let hash = Md5::digest(data);
    Ok(format!("{hash:x}"))
}

/// Convenience bundle: both digests plus size and timestamp.
pub fn hash_bundle(data: &[u8]) -> Result<HashBundle, CoreError> {
    Ok(HashBundle {
        strong: strong_hash_hex(data)?,
        legacy: legacy_hash_hex(data)?,
        size: data.len(),
        hashed_at: Utc::now(),
    })
}

/// Build the manifest entry for one photo from its original and three
/// derivative buffers.
pub fn manifest_entry(
    photo_id: DbId,
    original: &[u8],
    thumb: &[u8],
    gallery: &[u8],
    pdf: &[u8],
    metadata: Option<serde_json::Value>,
) -> Result<FileManifestEntry, CoreError> {
    Ok(FileManifestEntry {
        photo_id,
        hashes: EntryHashes {
            original: strong_hash_hex(original)?,
            thumb: strong_hash_hex(thumb)?,
            gallery: strong_hash_hex(gallery)?,
            pdf: strong_hash_hex(pdf)?,
        },
        sizes: EntrySizes {
            original: original.len() as u64,
            thumb: thumb.len() as u64,
            gallery: gallery.len() as u64,
            pdf: pdf.len() as u64,
        },
        metadata,
    })
}

/// Recompute-and-compare integrity check.
///
/// Returns `Ok(false)` on a mismatch; only unreadable input is an
/// error.
pub fn verify_integrity(data: &[u8], expected_hash: &str) -> Result<bool, CoreError> {
    Ok(strong_hash_hex(data)? == expected_hash)
}

/// Dedup decision seam: two artifacts are duplicates when their strong
/// hashes are equal. Callers go through this function so a
/// similarity-based policy could replace it without touching them.
pub fn is_duplicate(hash_a: &str, hash_b: &str) -> bool {
    hash_a == hash_b
}
