//! Image transcoding.
//!
//! Uploaded images are decoded, oriented, scaled down and re-encoded.
//! Decoding drops every kind of metadata, so nothing from the original
//! file except the pixels survives. Animated GIFs stay animated GIFs;
//! everything else becomes a lossy WebP.
//!
//! Everything here is CPU-bound and blocking.

use std::fs::File;
use std::io::{BufReader, Cursor};
use std::path::{Path, PathBuf};

use image::codecs::gif::{GifDecoder, GifEncoder, Repeat};
use image::imageops::FilterType;
use image::{
    AnimationDecoder, DynamicImage, Frame, ImageDecoder, ImageError, ImageFormat, ImageReader,
};

use crate::error::{ServerError, ServerResult};
use hatch::mime;

/// WebP quality of re-encoded images.
const WEBP_QUALITY: f32 = 90.0;

/// A re-encoded image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedImage {
    pub path: PathBuf,
    pub mime: &'static str,
    pub width: u32,
    pub height: u32,
}

/// Returns the dimensions an image is scaled to.
///
/// If the smaller axis exceeds `cap`, the image is scaled so the smaller
/// axis equals `cap`, preserving the aspect ratio.
pub fn target_dimensions(width: u32, height: u32, cap: u32) -> (u32, u32) {
    let (short, long) = if width <= height {
        (width, height)
    } else {
        (height, width)
    };

    if short <= cap {
        return (width, height);
    }

    let scaled = ((long as u64 * cap as u64 + short as u64 / 2) / short as u64).max(1) as u32;

    if width <= height {
        (cap, scaled)
    } else {
        (scaled, cap)
    }
}

/// Re-encodes an image into `output_dir`.
pub fn process_image(input: &Path, output_dir: &Path, cap: u32) -> ServerResult<ProcessedImage> {
    let format = ImageReader::open(input)
        .and_then(|r| r.with_guessed_format())
        .map_err(ServerError::scratch_error)?
        .format();

    if format == Some(ImageFormat::Gif) {
        let file = File::open(input).map_err(ServerError::scratch_error)?;
        let frames = GifDecoder::new(BufReader::new(file))
            .and_then(|d| d.into_frames().collect_frames())
            .map_err(image_error)?;

        if frames.len() > 1 {
            return encode_animated(frames, output_dir, cap);
        }
    }

    let mut decoder = ImageReader::open(input)
        .and_then(|r| r.with_guessed_format())
        .map_err(ServerError::scratch_error)?
        .into_decoder()
        .map_err(image_error)?;

    let orientation = decoder.orientation().map_err(image_error)?;
    let mut image = DynamicImage::from_decoder(decoder).map_err(image_error)?;
    image.apply_orientation(orientation);

    encode_still(image, output_dir, cap)
}

fn encode_still(image: DynamicImage, output_dir: &Path, cap: u32) -> ServerResult<ProcessedImage> {
    let (width, height) = target_dimensions(image.width(), image.height(), cap);
    let image = if (width, height) != (image.width(), image.height()) {
        image.resize_exact(width, height, FilterType::Lanczos3)
    } else {
        image
    };

    let rgba = image.to_rgba8();
    let encoded = webp::Encoder::from_rgba(&rgba, width, height).encode(WEBP_QUALITY);

    let path = output_dir.join("final.webp");
    std::fs::write(&path, &*encoded).map_err(ServerError::scratch_error)?;

    Ok(ProcessedImage {
        path,
        mime: mime::WEBP,
        width,
        height,
    })
}

fn encode_animated(
    frames: Vec<Frame>,
    output_dir: &Path,
    cap: u32,
) -> ServerResult<ProcessedImage> {
    let (orig_width, orig_height) = frames[0].buffer().dimensions();
    let (width, height) = target_dimensions(orig_width, orig_height, cap);

    let frames = frames.into_iter().map(|frame| {
        if (width, height) == (orig_width, orig_height) {
            return frame;
        }

        let delay = frame.delay();
        let buffer =
            image::imageops::resize(frame.buffer(), width, height, FilterType::Lanczos3);
        Frame::from_parts(buffer, 0, 0, delay)
    });

    let mut encoded = Cursor::new(Vec::new());
    {
        let mut encoder = GifEncoder::new(&mut encoded);
        encoder.set_repeat(Repeat::Infinite).map_err(image_error)?;
        encoder.encode_frames(frames).map_err(image_error)?;
    }

    let path = output_dir.join("final.gif");
    std::fs::write(&path, encoded.into_inner()).map_err(ServerError::scratch_error)?;

    Ok(ProcessedImage {
        path,
        mime: mime::GIF,
        width,
        height,
    })
}

fn image_error(e: ImageError) -> ServerError {
    match e {
        ImageError::IoError(e) => ServerError::scratch_error(e),
        e => ServerError::request_error(e),
    }
}
