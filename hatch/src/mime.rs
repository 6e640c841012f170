//! MIME types.

/// Project archives.
pub const ZIP: &str = "application/zip";

/// Still images after re-encoding.
pub const WEBP: &str = "image/webp";

/// Animated images after re-encoding.
pub const GIF: &str = "image/gif";

pub const PNG: &str = "image/png";

pub const JPEG: &str = "image/jpeg";

pub const BMP: &str = "image/bmp";

/// Fallback for anything we can't identify.
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Returns whether a MIME type names an image we can decode.
///
/// Other `image/*` types like TIFF or AVIF are not accepted.
pub fn is_image(mime: &str) -> bool {
    matches!(mime, PNG | JPEG | GIF | BMP | WEBP)
}

/// Returns the file extension to use for downloads of a MIME type.
pub fn download_extension(mime: &str) -> Option<&'static str> {
    match mime {
        GIF => Some("gif"),
        WEBP => Some("webp"),
        ZIP => Some("sb3"),
        _ => None,
    }
}
