//! Reference media normalization
//!
//! Decodes data-URI reference images, downsizes anything larger than
//! 1024 pixels on a side, and re-encodes oversized images as JPEG.
//! A reference that cannot be decoded is skipped, never fatal.

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::GenericImageView;
use std::io::Cursor;

const MAX_REFERENCE_DIM: u32 = 1024;
const JPEG_QUALITY: u8 = 85;

#[derive(Debug, Clone)]
pub struct NormalizedReference {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

impl NormalizedReference {
    pub fn to_data_uri(&self) -> String {
        use base64::Engine as _;
        format!(
            "data:{};base64,{}",
            self.mime_type,
            base64::engine::general_purpose::STANDARD.encode(&self.bytes)
        )
    }
}

/// Split a data URI into its declared MIME type and base64 payload,
/// without decoding. `None` for anything that is not a `data:` URI.
pub fn split_data_uri(data_uri: &str) -> Option<(&str, &str)> {
    let (header, payload) = data_uri.split_once(',')?;
    let mime_type = header
        .strip_prefix("data:")?
        .split(';')
        .next()
        .filter(|m| !m.is_empty())?;
    Some((mime_type, payload))
}

/// Decode and normalize one data-URI reference image.
///
/// Returns `None` for anything that is not a decodable `data:` URI; callers
/// treat that as "skip this reference".
pub fn normalize_reference(data_uri: &str) -> Option<NormalizedReference> {
    if !data_uri.starts_with("data:") {
        return None;
    }

    match decode_and_resize(data_uri) {
        Ok(reference) => Some(reference),
        Err(e) => {
            tracing::warn!("Skipping undecodable reference image: {}", e);
            None
        }
    }
}

fn decode_and_resize(data_uri: &str) -> crate::Result<NormalizedReference> {
    let (mime_type, payload) = split_data_uri(data_uri)
        .ok_or_else(|| crate::Error::Generation("malformed data URI".to_string()))?;
    let mime_type = mime_type.to_string();

    use base64::Engine as _;
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(payload.trim())
        .map_err(|e| crate::Error::Generation(format!("invalid base64 payload: {}", e)))?;

    let img = image::load_from_memory(&bytes)?;
    let (width, height) = img.dimensions();

    if width <= MAX_REFERENCE_DIM && height <= MAX_REFERENCE_DIM {
        return Ok(NormalizedReference { bytes, mime_type });
    }

    // `resize` preserves aspect ratio and fits within the bounding box.
    let resized = img.resize(MAX_REFERENCE_DIM, MAX_REFERENCE_DIM, FilterType::Lanczos3);
    // JPEG has no alpha or palette channel; flatten to RGB8 first.
    let rgb = resized.to_rgb8();

    let mut out = Vec::new();
    let mut cursor = Cursor::new(&mut out);
    let encoder = JpegEncoder::new_with_quality(&mut cursor, JPEG_QUALITY);
    rgb.write_with_encoder(encoder)?;

    Ok(NormalizedReference {
        bytes: out,
        mime_type: "image/jpeg".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::ImageFormat;

    fn png_data_uri(width: u32, height: u32) -> (String, Vec<u8>) {
        let img = image::RgbaImage::from_pixel(width, height, image::Rgba([0, 128, 255, 255]));
        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();

        use base64::Engine as _;
        let b64 = base64::engine::general_purpose::STANDARD.encode(&bytes);
        (format!("data:image/png;base64,{}", b64), bytes)
    }

    #[test]
    fn test_split_data_uri_extracts_mime_and_payload() {
        assert_eq!(
            split_data_uri("data:image/png;base64,QUJD"),
            Some(("image/png", "QUJD"))
        );
        assert_eq!(split_data_uri("https://example.com/a.png"), None);
        assert_eq!(split_data_uri("data:;base64,QUJD"), None);
    }

    #[test]
    fn test_non_data_uri_returns_none() {
        assert!(normalize_reference("https://example.com/image.png").is_none());
        assert!(normalize_reference("").is_none());
        assert!(normalize_reference("just some text").is_none());
    }

    #[test]
    fn test_invalid_base64_returns_none() {
        assert!(normalize_reference("data:image/png;base64,!!!not-base64!!!").is_none());
    }

    #[test]
    fn test_undecodable_image_returns_none() {
        use base64::Engine as _;
        let b64 = base64::engine::general_purpose::STANDARD.encode(b"not an image");
        assert!(normalize_reference(&format!("data:image/png;base64,{}", b64)).is_none());
    }

    #[test]
    fn test_small_image_passes_through_unchanged() {
        let (uri, original_bytes) = png_data_uri(64, 48);
        let normalized = normalize_reference(&uri).unwrap();
        assert_eq!(normalized.bytes, original_bytes);
        assert_eq!(normalized.mime_type, "image/png");
    }

    #[test]
    fn test_boundary_1024_passes_through() {
        let (uri, original_bytes) = png_data_uri(1024, 512);
        let normalized = normalize_reference(&uri).unwrap();
        assert_eq!(normalized.bytes, original_bytes);
        assert_eq!(normalized.mime_type, "image/png");
    }

    #[test]
    fn test_oversized_image_is_downsized_to_jpeg() {
        let (uri, _) = png_data_uri(2048, 1024);
        let normalized = normalize_reference(&uri).unwrap();
        assert_eq!(normalized.mime_type, "image/jpeg");

        let img = image::load_from_memory(&normalized.bytes).unwrap();
        assert!(img.width() <= 1024);
        assert!(img.height() <= 1024);
        // 2:1 aspect ratio preserved within rounding
        assert_eq!(img.width(), 1024);
        assert_eq!(img.height(), 512);
    }

    #[test]
    fn test_tall_image_preserves_aspect_ratio() {
        let (uri, _) = png_data_uri(600, 3000);
        let normalized = normalize_reference(&uri).unwrap();

        let img = image::load_from_memory(&normalized.bytes).unwrap();
        assert_eq!(img.height(), 1024);
        let ratio = img.width() as f64 / img.height() as f64;
        assert!((ratio - 0.2).abs() < 0.01);
    }
}
