//! Shared type aliases used across all fleetdoc crates.

/// Database serial id (queue jobs, processing jobs).
pub type DbId = i64;

/// UTC timestamp used for all persisted times.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Protocol kind: a vehicle is either handed over or returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProtocolType {
    Handover,
    Return,
}

impl ProtocolType {
    pub fn as_str(self) -> &'static str {
        match self {
            ProtocolType::Handover => "handover",
            ProtocolType::Return => "return",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "handover" => Some(ProtocolType::Handover),
            "return" => Some(ProtocolType::Return),
            _ => None,
        }
    }
}

impl std::fmt::Display for ProtocolType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The three derivative renditions produced for every uploaded photo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DerivativeKind {
    Thumb,
    Gallery,
    Pdf,
}

impl DerivativeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            DerivativeKind::Thumb => "thumb",
            DerivativeKind::Gallery => "gallery",
            DerivativeKind::Pdf => "pdf",
        }
    }

    /// File extension of the encoded derivative.
    pub fn extension(self) -> &'static str {
        match self {
            DerivativeKind::Thumb => "webp",
            DerivativeKind::Gallery | DerivativeKind::Pdf => "jpg",
        }
    }

    /// MIME type of the encoded derivative.
    pub fn content_type(self) -> &'static str {
        match self {
            DerivativeKind::Thumb => "image/webp",
            DerivativeKind::Gallery | DerivativeKind::Pdf => "image/jpeg",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protocol_type_round_trips() {
        assert_eq!(ProtocolType::from_str("handover"), Some(ProtocolType::Handover));
        assert_eq!(ProtocolType::from_str("return"), Some(ProtocolType::Return));
        assert_eq!(ProtocolType::from_str("other"), None);
        assert_eq!(ProtocolType::Handover.as_str(), "handover");
    }

    #[test]
    fn derivative_kind_encodings() {
        assert_eq!(DerivativeKind::Thumb.extension(), "webp");
        assert_eq!(DerivativeKind::Gallery.content_type(), "image/jpeg");
        assert_eq!(DerivativeKind::Pdf.as_str(), "pdf");
    }
}
