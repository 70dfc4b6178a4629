//! Protocol photo manifests.
//!
//! A manifest is the self-describing JSON summary of everything the
//! pipeline produced for one protocol: per-photo hashes and sizes for
//! all renditions, plus aggregate totals. The stored object key embeds
//! a prefix of the manifest's own content hash, so a manifest can never
//! silently diverge from the object it was written as.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::hashing::{self, FileManifestEntry};
use crate::types::{DbId, ProtocolType, Timestamp};

/// Schema version written into every manifest.
pub const MANIFEST_VERSION: &str = "2.0";

/// Hex characters of the manifest's own hash embedded in its key.
pub const KEY_HASH_LEN: usize = 16;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhotoManifest {
    pub version: String,
    pub protocol_id: DbId,
    pub protocol_type: ProtocolType,
    pub generated_at: Timestamp,
    pub photos: Vec<FileManifestEntry>,
    pub summary: ManifestSummary,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestSummary {
    pub total_photos: usize,
    pub total_original_size: u64,
    pub total_derivative_size: u64,
    /// Fraction of storage saved versus keeping three full-size copies
    /// (one per rendition) of every original.
    pub compression_ratio: f64,
}

/// A manifest serialized for storage, together with its content hash.
#[derive(Debug, Clone)]
pub struct EncodedManifest {
    pub bytes: Vec<u8>,
    /// Full SHA-256 of `bytes`.
    pub hash: String,
    /// First [`KEY_HASH_LEN`] characters of `hash`, used in the key.
    pub short_hash: String,
}

/// Assemble a manifest from per-photo entries.
pub fn build(
    protocol_id: DbId,
    protocol_type: ProtocolType,
    generated_at: Timestamp,
    photos: Vec<FileManifestEntry>,
) -> PhotoManifest {
    let total_original_size: u64 = photos.iter().map(|p| p.sizes.original).sum();
    let total_derivative_size: u64 = photos
        .iter()
        .map(|p| p.sizes.thumb + p.sizes.gallery + p.sizes.pdf)
        .sum();

    PhotoManifest {
        version: MANIFEST_VERSION.to_string(),
        protocol_id,
        protocol_type,
        generated_at,
        summary: ManifestSummary {
            total_photos: photos.len(),
            total_original_size,
            total_derivative_size,
            compression_ratio: compression_ratio(total_original_size, total_derivative_size),
        },
        photos,
    }
}

/// Storage-savings ratio against a three-copy baseline.
///
/// `(3 * original - derivatives) / (3 * original)`, defined as `0.0`
/// when there are no original bytes at all. A negative value means the
/// renditions outgrew the baseline; it is reported as-is.
pub fn compression_ratio(total_original: u64, total_derivative: u64) -> f64 {
    let baseline = total_original as f64 * 3.0;
    if baseline == 0.0 {
        return 0.0;
    }
    (baseline - total_derivative as f64) / baseline
}

/// Serialize a manifest and hash the exact bytes that will be stored.
pub fn encode(manifest: &PhotoManifest) -> Result<EncodedManifest, CoreError> {
    let bytes = serde_json::to_vec_pretty(manifest)
        .map_err(|e| CoreError::Internal(format!("manifest serialization failed: {e}")))?;
    let hash = hashing::strong_hash_hex(&bytes)?;
    let short_hash = hash[..KEY_HASH_LEN].to_string();
    Ok(EncodedManifest {
        bytes,
        hash,
        short_hash,
    })
}
