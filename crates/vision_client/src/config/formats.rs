//! Image file extension to MIME type mapping

use phf::phf_map;

/// MIME types for the image formats the service accepts (JPEG, PNG, GIF, BMP, TIFF) plus WebP
pub static IMAGE_MIME_TYPES: phf::Map<&'static str, &'static str> = phf_map! {
    "jpg" => "image/jpeg",
    "jpeg" => "image/jpeg",
    "jpe" => "image/jpeg",
    "png" => "image/png",
    "gif" => "image/gif",
    "bmp" => "image/bmp",
    "tif" => "image/tiff",
    "tiff" => "image/tiff",
    "webp" => "image/webp",
};

/// Look up the MIME type for a file extension (case-insensitive)
pub fn mime_for_extension(ext: &str) -> Option<&'static str> {
    IMAGE_MIME_TYPES.get(ext.to_ascii_lowercase().as_str()).copied()
}

/// List all recognised file extensions
pub fn supported_extensions() -> Vec<&'static str> {
    IMAGE_MIME_TYPES.keys().copied().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mime_lookup() {
        assert_eq!(mime_for_extension("jpg"), Some("image/jpeg"));
        assert_eq!(mime_for_extension("PNG"), Some("image/png"));
        assert_eq!(mime_for_extension("txt"), None);
    }

    #[test]
    fn test_supported_extensions() {
        let exts = supported_extensions();
        assert!(exts.contains(&"tiff"));
        assert!(exts.contains(&"gif"));
    }
}
