//! Storage key layout.
//!
//! Everything belonging to a protocol lives under `protocols/{id}/`,
//! which makes protocol-wide listing and deletion a prefix operation.

use fleetdoc_core::types::{DbId, DerivativeKind, ProtocolType};

/// `protocols/{id}/` is the prefix owning every object of a protocol.
pub fn protocol_prefix(protocol_id: DbId) -> String {
    format!("protocols/{protocol_id}/")
}

/// Uploaded original, kept byte-exact.
pub fn original_key(protocol_id: DbId, photo_id: DbId, extension: &str) -> String {
    format!("protocols/{protocol_id}/photos/original/{photo_id}.{extension}")
}

/// One generated rendition of a photo.
pub fn derivative_key(protocol_id: DbId, photo_id: DbId, kind: DerivativeKind) -> String {
    format!(
        "protocols/{protocol_id}/photos/{}/{photo_id}.{}",
        kind.as_str(),
        kind.extension()
    )
}

/// A rendered protocol document, timestamped so regenerations never
/// clobber an issued PDF.
pub fn pdf_key(protocol_id: DbId, protocol_type: ProtocolType, timestamp_ms: i64) -> String {
    format!(
        "protocols/{protocol_id}/pdf/{}_protocol_{timestamp_ms}.pdf",
        protocol_type.as_str()
    )
}

/// A legacy PDF carried over by migration, content-addressed by the
/// first 16 hex chars of its hash.
pub fn migrated_pdf_key(protocol_id: DbId, hash16: &str) -> String {
    format!("protocols/{protocol_id}/pdf/migrated_{hash16}.pdf")
}

/// Photo manifest, content-addressed by a prefix of its own hash.
pub fn manifest_key(protocol_id: DbId, hash16: &str) -> String {
    format!("protocols/{protocol_id}/manifests/manifest_{hash16}.json")
}

/// Content type inferred from a key's extension.
pub fn mime_from_key(key: &str) -> &'static str {
    match key.rsplit('.').next() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        Some("pdf") => "application/pdf",
        Some("json") => "application/json",
        _ => "application/octet-stream",
    }
}

/// Recover the storage key from a public URL. Works for any URL whose
/// path contains the `protocols/` root, and passes bare keys through.
pub fn key_from_url(url: &str) -> Option<String> {
    if let Some(idx) = url.find("protocols/") {
        return Some(url[idx..].to_string());
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_scoped_under_protocol_prefix() {
        let prefix = protocol_prefix(7);
        for key in [
            original_key(7, 3, "jpg"),
            derivative_key(7, 3, DerivativeKind::Thumb),
            pdf_key(7, ProtocolType::Handover, 1700000000000),
            migrated_pdf_key(7, "0123456789abcdef"),
            manifest_key(7, "0123456789abcdef"),
        ] {
            assert!(key.starts_with(&prefix), "{key} not under {prefix}");
        }
    }

    #[test]
    fn derivative_keys_carry_kind_and_extension() {
        assert_eq!(
            derivative_key(1, 2, DerivativeKind::Thumb),
            "protocols/1/photos/thumb/2.webp"
        );
        assert_eq!(
            derivative_key(1, 2, DerivativeKind::Gallery),
            "protocols/1/photos/gallery/2.jpg"
        );
        assert_eq!(
            derivative_key(1, 2, DerivativeKind::Pdf),
            "protocols/1/photos/pdf/2.jpg"
        );
    }

    #[test]
    fn mime_lookup() {
        assert_eq!(mime_from_key("protocols/1/photos/thumb/2.webp"), "image/webp");
        assert_eq!(mime_from_key("a/b.pdf"), "application/pdf");
        assert_eq!(mime_from_key("noext"), "application/octet-stream");
    }

    #[test]
    fn key_from_url_strips_host() {
        assert_eq!(
            key_from_url("https://cdn.example.com/protocols/9/photos/gallery/4.jpg").as_deref(),
            Some("protocols/9/photos/gallery/4.jpg")
        );
        assert_eq!(
            key_from_url("protocols/9/pdf/handover_protocol_1.pdf").as_deref(),
            Some("protocols/9/pdf/handover_protocol_1.pdf")
        );
        assert_eq!(key_from_url("https://example.com/other/path.jpg"), None);
    }
}
