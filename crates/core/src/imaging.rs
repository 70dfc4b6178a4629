//! Image derivative generation.
//!
//! Every accepted photo yields exactly three renditions:
//!
//! - `thumb`:   150x150 bounded WebP for UI lists
//! - `gallery`: 1280px-wide JPEG (q85) for display
//! - `pdf`:     960px-wide JPEG (q80) for document embedding, kept
//!   smaller than gallery so protocol PDFs stay bounded in size
//!
//! The profile is process-wide configuration, not per-call: given the
//! same input and profile the dimensions and target format of each
//! derivative are always the same.

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::codecs::webp::WebPEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::hashing;

/// Images smaller than this on either axis are rejected outright.
pub const MIN_DIMENSION: u32 = 50;

/// Process-wide derivative profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DerivativeProfile {
    /// Bounding box for the thumbnail (both axes).
    pub thumb_size: u32,
    /// Maximum width of the gallery rendition.
    pub gallery_width: u32,
    /// JPEG quality for the gallery rendition.
    pub gallery_quality: u8,
    /// Maximum width of the PDF-embeddable rendition.
    pub pdf_width: u32,
    /// JPEG quality for the PDF-embeddable rendition.
    pub pdf_quality: u8,
}

impl Default for DerivativeProfile {
    fn default() -> Self {
        Self {
            thumb_size: 150,
            gallery_width: 1280,
            gallery_quality: 85,
            pdf_width: 960,
            pdf_quality: 80,
        }
    }
}

/// Decoded metadata of a validated image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageInfo {
    pub width: u32,
    pub height: u32,
    pub format: String,
}

/// Byte sizes of the original and each derivative.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DerivativeSizes {
    pub original: u64,
    pub thumb: u64,
    pub gallery: u64,
    pub pdf: u64,
}

/// The full output of derivative generation.
#[derive(Debug, Clone)]
pub struct DerivativeSet {
    pub thumb: Vec<u8>,
    pub gallery: Vec<u8>,
    pub pdf: Vec<u8>,
    /// Strong hash of the *original* buffer.
    pub hash: String,
    pub info: ImageInfo,
    pub sizes: DerivativeSizes,
}

/// Storage savings of the three derivatives versus three copies of the
/// original. Telemetry only, never used to gate processing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Savings {
    pub total_savings: i64,
    pub savings_percentage: f64,
    pub breakdown: SavingsBreakdown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavingsBreakdown {
    pub thumb: i64,
    pub gallery: i64,
    pub pdf: i64,
}

/// Validate an uploaded buffer as a processable image.
///
/// Rejects empty buffers, undecodable data, and images under
/// [`MIN_DIMENSION`] on either axis. Never produces derivatives for
/// invalid input.
pub fn validate(data: &[u8]) -> Result<ImageInfo, CoreError> {
    if data.is_empty() {
        return Err(CoreError::Imaging("empty image buffer".into()));
    }

    let format = image::guess_format(data)
        .map_err(|_| CoreError::Imaging("buffer is not a recognized image format".into()))?;

    let img = image::load_from_memory(data)
        .map_err(|e| CoreError::Imaging(format!("image decode failed: {e}")))?;

    let (width, height) = img.dimensions();
    if width < MIN_DIMENSION || height < MIN_DIMENSION {
        return Err(CoreError::Imaging(format!(
            "image dimensions {width}x{height} below minimum {MIN_DIMENSION}x{MIN_DIMENSION}"
        )));
    }

    Ok(ImageInfo {
        width,
        height,
        format: format!("{format:?}").to_lowercase(),
    })
}

/// Generate the three fixed-profile derivatives for a validated image.
pub fn generate_derivatives(
    data: &[u8],
    profile: &DerivativeProfile,
) -> Result<DerivativeSet, CoreError> {
    let info = validate(data)?;
    let hash = hashing::strong_hash_hex(data)?;

    let img = image::load_from_memory(data)
        .map_err(|e| CoreError::Imaging(format!("image decode failed: {e}")))?;

    let thumb = encode_webp(&img.thumbnail(profile.thumb_size, profile.thumb_size))?;
    let gallery = encode_jpeg(
        &fit_width(&img, profile.gallery_width),
        profile.gallery_quality,
    )?;
    let pdf = encode_jpeg(&fit_width(&img, profile.pdf_width), profile.pdf_quality)?;

    let sizes = DerivativeSizes {
        original: data.len() as u64,
        thumb: thumb.len() as u64,
        gallery: gallery.len() as u64,
        pdf: pdf.len() as u64,
    };

    Ok(DerivativeSet {
        thumb,
        gallery,
        pdf,
        hash,
        info,
        sizes,
    })
}

/// Compare the combined derivative size against three copies of the
/// original. The three-copies base mirrors the manifest summary math.
pub fn calculate_savings(sizes: &DerivativeSizes) -> Savings {
    let original = sizes.original as i64;
    let baseline = original * 3;
    let derivatives = (sizes.thumb + sizes.gallery + sizes.pdf) as i64;
    let total_savings = baseline - derivatives;

    let savings_percentage = if baseline > 0 {
        (total_savings as f64 / baseline as f64) * 100.0
    } else {
        0.0
    };

    Savings {
        total_savings,
        savings_percentage,
        breakdown: SavingsBreakdown {
            thumb: original - sizes.thumb as i64,
            gallery: original - sizes.gallery as i64,
            pdf: original - sizes.pdf as i64,
        },
    }
}

/// Downscale to at most `max_width`, preserving aspect ratio. Images
/// already narrower are passed through untouched (no upscaling).
fn fit_width(img: &DynamicImage, max_width: u32) -> DynamicImage {
    let (w, h) = img.dimensions();
    if w <= max_width {
        return img.clone();
    }
    let target_height = ((h as u64 * max_width as u64) / w as u64).max(1) as u32;
    img.resize(max_width, target_height, FilterType::Lanczos3)
}

fn encode_jpeg(img: &DynamicImage, quality: u8) -> Result<Vec<u8>, CoreError> {
    // JPEG has no alpha channel; flatten first.
    let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
    let mut out = Cursor::new(Vec::new());
    let encoder = JpegEncoder::new_with_quality(&mut out, quality);
    rgb.write_with_encoder(encoder)
        .map_err(|e| CoreError::Imaging(format!("jpeg encode failed: {e}")))?;
    Ok(out.into_inner())
}

fn encode_webp(img: &DynamicImage) -> Result<Vec<u8>, CoreError> {
    let rgba = DynamicImage::ImageRgba8(img.to_rgba8());
    let mut out = Cursor::new(Vec::new());
    let encoder = WebPEncoder::new_lossless(&mut out);
    rgba.write_with_encoder(encoder)
        .map_err(|e| CoreError::Imaging(format!("webp encode failed: {e}")))?;
    Ok(out.into_inner())
}
