//! Image files to `data:` URLs for profile pictures, and back.

use std::fs;
use std::path::Path;

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use image::{GenericImageView, ImageFormat};
use thiserror::Error;

pub const MAX_IMAGE_BYTES: u64 = 5 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum PhotoError {
    #[error("Image must be smaller than 5MB.")]
    TooLarge { size: u64 },
    #[error("Please select an image file.")]
    NotAnImage,
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid data URL: {0}")]
    InvalidDataUrl(String),
}

fn mime_type(format: ImageFormat) -> Option<&'static str> {
    match format {
        ImageFormat::Png => Some("image/png"),
        ImageFormat::Jpeg => Some("image/jpeg"),
        ImageFormat::Gif => Some("image/gif"),
        ImageFormat::WebP => Some("image/webp"),
        ImageFormat::Bmp => Some("image/bmp"),
        ImageFormat::Ico => Some("image/x-icon"),
        ImageFormat::Tiff => Some("image/tiff"),
        ImageFormat::Avif => Some("image/avif"),
        _ => None,
    }
}

/// Read an image file into a `data:<mime>;base64,` URL.
pub fn load_data_url(path: &Path) -> Result<String, PhotoError> {
    let read_err = |source| PhotoError::Read {
        path: path.display().to_string(),
        source,
    };
    let size = fs::metadata(path).map_err(read_err)?.len();
    if size > MAX_IMAGE_BYTES {
        return Err(PhotoError::TooLarge { size });
    }
    let bytes = fs::read(path).map_err(read_err)?;
    encode_data_url(&bytes)
}

pub fn encode_data_url(bytes: &[u8]) -> Result<String, PhotoError> {
    if bytes.len() as u64 > MAX_IMAGE_BYTES {
        return Err(PhotoError::TooLarge {
            size: bytes.len() as u64,
        });
    }
    let format = image::guess_format(bytes).map_err(|_| PhotoError::NotAnImage)?;
    let mime = mime_type(format).ok_or(PhotoError::NotAnImage)?;
    Ok(format!("data:{};base64,{}", mime, BASE64_STANDARD.encode(bytes)))
}

/// Mime type and payload of a base64 `data:` URL.
pub fn parse_data_url(value: &str) -> Result<(String, Vec<u8>), PhotoError> {
    let rest = value
        .trim()
        .strip_prefix("data:")
        .ok_or_else(|| PhotoError::InvalidDataUrl("missing data: prefix".into()))?;
    let (meta, payload) = rest
        .split_once(',')
        .ok_or_else(|| PhotoError::InvalidDataUrl("missing payload".into()))?;

    let mut segments = meta.split(';');
    let mime = segments.next().unwrap_or("").to_string();
    if !segments.any(|segment| segment.eq_ignore_ascii_case("base64")) {
        return Err(PhotoError::InvalidDataUrl("not base64 encoded".into()));
    }
    let bytes = BASE64_STANDARD
        .decode(payload.trim())
        .map_err(|err| PhotoError::InvalidDataUrl(err.to_string()))?;
    Ok((mime, bytes))
}

/// One-line description of a stored picture for the detail pane.
pub fn describe(picture: &str) -> String {
    let picture = picture.trim();
    if picture.is_empty() {
        return "none".to_string();
    }
    if !picture.starts_with("data:") {
        return picture.to_string();
    }
    match parse_data_url(picture) {
        Ok((mime, bytes)) => {
            let kib = (bytes.len() as f64 / 1024.0).ceil() as u64;
            match image::load_from_memory(&bytes) {
                Ok(img) => {
                    let (w, h) = img.dimensions();
                    format!("embedded {} ({}x{}, {} KiB)", mime, w, h, kib)
                }
                Err(_) => format!("embedded {} ({} KiB)", mime, kib),
            }
        }
        Err(err) => format!("unreadable picture: {}", err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};
    use std::io::Cursor;
    use tempfile::tempdir;

    fn tiny_png() -> Vec<u8> {
        let img: ImageBuffer<Rgb<u8>, Vec<u8>> = ImageBuffer::from_pixel(3, 2, Rgb([200, 10, 10]));
        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes
    }

    #[test]
    fn png_file_becomes_data_url() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("avatar.png");
        fs::write(&path, tiny_png()).unwrap();

        let url = load_data_url(&path).unwrap();
        assert!(url.starts_with("data:image/png;base64,"));
        assert_eq!(describe(&url), "embedded image/png (3x2, 1 KiB)");
    }

    #[test]
    fn text_file_is_rejected() {
        let err = encode_data_url(b"just some notes").unwrap_err();
        assert!(matches!(err, PhotoError::NotAnImage));
    }

    #[test]
    fn oversized_file_is_rejected_before_reading() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("huge.png");
        let file = fs::File::create(&path).unwrap();
        file.set_len(MAX_IMAGE_BYTES + 1).unwrap();

        let err = load_data_url(&path).unwrap_err();
        assert!(matches!(err, PhotoError::TooLarge { .. }));
        assert_eq!(err.to_string(), "Image must be smaller than 5MB.");
    }

    #[test]
    fn data_url_round_trips_payload() {
        let png = tiny_png();
        let url = encode_data_url(&png).unwrap();
        let (mime, bytes) = parse_data_url(&url).unwrap();
        assert_eq!(mime, "image/png");
        assert_eq!(bytes, png);
    }

    #[test]
    fn plain_urls_are_described_verbatim() {
        assert_eq!(describe(""), "none");
        assert_eq!(describe("https://example.com/a.png"), "https://example.com/a.png");
        assert!(describe("data:text/plain,hello").starts_with("unreadable picture"));
    }
}
