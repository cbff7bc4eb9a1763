//! Image payloads for classification uploads

use base64::{engine::general_purpose, Engine as _};
use reqwest::multipart::Part;
use std::io::Cursor;
use std::path::Path;
use tokio::fs;
use tracing::debug;

use crate::config::mime_for_extension;
use crate::error::{Result, VisionError};

const FALLBACK_MIME: &str = "application/octet-stream";

/// An image ready to be sent as the file part of a multipart request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageUpload {
    bytes: Vec<u8>,
    file_name: String,
    mime_type: String,
}

/// Pick a MIME type from the image signature, then the file extension
fn detect_mime(bytes: &[u8], file_name: &str) -> String {
    if let Ok(format) = image::guess_format(bytes) {
        return format.to_mime_type().to_string();
    }

    Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .and_then(mime_for_extension)
        .unwrap_or(FALLBACK_MIME)
        .to_string()
}

impl ImageUpload {
    /// Wrap raw image bytes
    pub fn from_bytes(bytes: impl Into<Vec<u8>>, file_name: impl Into<String>) -> Result<Self> {
        let bytes = bytes.into();
        let file_name = file_name.into();

        if bytes.is_empty() {
            return Err(VisionError::InvalidInput(format!(
                "image '{}' is empty",
                file_name
            )));
        }

        let mime_type = detect_mime(&bytes, &file_name);
        debug!(
            file_name = %file_name,
            mime_type = %mime_type,
            size = bytes.len(),
            "Prepared image upload"
        );

        Ok(Self {
            bytes,
            file_name,
            mime_type,
        })
    }

    /// Read an image file from disk
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_string());

        Self::from_bytes(bytes, file_name)
    }

    /// Decode base64 text, either bare or as a `data:image/...;base64,` URL
    pub fn from_base64(data: &str, file_name: impl Into<String>) -> Result<Self> {
        let data = data.trim();
        let (declared_mime, payload) = match data.strip_prefix("data:") {
            Some(rest) => {
                let (header, payload) = rest.split_once(',').ok_or_else(|| {
                    VisionError::InvalidInput("data URL has no payload".to_string())
                })?;
                if !header.ends_with(";base64") {
                    return Err(VisionError::InvalidInput(
                        "only base64 data URLs are supported".to_string(),
                    ));
                }
                let mime = header.trim_end_matches(";base64");
                (Some(mime.to_string()).filter(|m| !m.is_empty()), payload)
            }
            None => (None, data),
        };

        let bytes = general_purpose::STANDARD.decode(payload)?;
        let upload = Self::from_bytes(bytes, file_name)?;

        Ok(match declared_mime {
            Some(mime) if upload.mime_type == FALLBACK_MIME => upload.with_mime_type(mime),
            _ => upload,
        })
    }

    /// Override the detected MIME type
    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = mime_type.into();
        self
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Whether the payload looks like an image the server will accept
    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }

    /// Read the pixel dimensions from the image header without decoding the whole image
    pub fn dimensions(&self) -> Result<(u32, u32)> {
        let reader = image::ImageReader::new(Cursor::new(&self.bytes)).with_guessed_format()?;
        Ok(reader.into_dimensions()?)
    }

    /// Convert into a multipart file part
    pub(crate) fn into_part(self) -> Result<Part> {
        Ok(Part::bytes(self.bytes)
            .file_name(self.file_name)
            .mime_str(&self.mime_type)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img: ImageBuffer<Rgb<u8>, Vec<u8>> =
            ImageBuffer::from_pixel(width, height, Rgb([200, 10, 10]));
        let mut buffer = Vec::new();
        img.write_to(&mut Cursor::new(&mut buffer), image::ImageFormat::Png)
            .unwrap();
        buffer
    }

    #[test]
    fn test_mime_from_signature() {
        let upload = ImageUpload::from_bytes(png_bytes(2, 2), "photo.bin").unwrap();
        assert_eq!(upload.mime_type(), "image/png");
        assert!(upload.is_image());
    }

    #[test]
    fn test_mime_from_extension() {
        let upload = ImageUpload::from_bytes(b"not really a jpeg".to_vec(), "cat.JPG").unwrap();
        assert_eq!(upload.mime_type(), "image/jpeg");
    }

    #[test]
    fn test_unknown_mime_falls_back() {
        let upload = ImageUpload::from_bytes(b"plain text".to_vec(), "notes.txt").unwrap();
        assert_eq!(upload.mime_type(), FALLBACK_MIME);
        assert!(!upload.is_image());
    }

    #[test]
    fn test_empty_bytes_rejected() {
        let err = ImageUpload::from_bytes(Vec::new(), "empty.png").unwrap_err();
        assert!(matches!(err, VisionError::InvalidInput(_)));
    }

    #[test]
    fn test_dimensions() {
        let upload = ImageUpload::from_bytes(png_bytes(4, 3), "a.png").unwrap();
        assert_eq!(upload.dimensions().unwrap(), (4, 3));
    }

    #[test]
    fn test_from_data_url() {
        let encoded = general_purpose::STANDARD.encode(png_bytes(1, 1));
        let url = format!("data:image/png;base64,{}", encoded);
        let upload = ImageUpload::from_base64(&url, "pasted.png").unwrap();
        assert_eq!(upload.mime_type(), "image/png");
        assert_eq!(upload.dimensions().unwrap(), (1, 1));
    }

    #[test]
    fn test_data_url_mime_used_when_unsniffable() {
        let encoded = general_purpose::STANDARD.encode(b"opaque");
        let url = format!("data:image/heic;base64,{}", encoded);
        let upload = ImageUpload::from_base64(&url, "clip").unwrap();
        assert_eq!(upload.mime_type(), "image/heic");
    }

    #[test]
    fn test_bad_base64() {
        let err = ImageUpload::from_base64("!!!not base64!!!", "x.png").unwrap_err();
        assert!(matches!(err, VisionError::Base64Decode(_)));
    }

    #[tokio::test]
    async fn test_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample.png");
        std::fs::write(&path, png_bytes(3, 5)).unwrap();

        let upload = ImageUpload::from_path(&path).await.unwrap();
        assert_eq!(upload.file_name(), "sample.png");
        assert_eq!(upload.dimensions().unwrap(), (3, 5));
    }
}
