//! Cover art and companion image optimization.

use std::io::Cursor;
use std::sync::Arc;

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};
use tracing::{debug, warn};

const JPEG_QUALITY: u8 = 85;

/// Encoding of an optimized image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageOutput {
    /// Re-encode in whatever format the input was.
    SameFormat,
    /// Always JPEG, for files with a fixed `.jpg` name such as posters.
    Jpeg,
}

/// Shrinks images to fit within bounds. Never fails: on any internal error
/// the input comes back unchanged.
#[async_trait::async_trait]
pub trait ImageOptimizer: Send + Sync {
    async fn optimize(
        &self,
        bytes: Vec<u8>,
        max_width: u32,
        max_height: u32,
        output: ImageOutput,
    ) -> Vec<u8>;
}

/// `image`-crate optimizer. Decoding and encoding run on the blocking pool.
#[derive(Debug, Default, Clone, Copy)]
pub struct ResizingOptimizer;

#[async_trait::async_trait]
impl ImageOptimizer for ResizingOptimizer {
    async fn optimize(
        &self,
        bytes: Vec<u8>,
        max_width: u32,
        max_height: u32,
        output: ImageOutput,
    ) -> Vec<u8> {
        let input = Arc::new(bytes);
        let shared = input.clone();
        let result =
            tokio::task::spawn_blocking(move || shrink(&shared, max_width, max_height, output))
                .await;

        match result {
            Ok(Ok(out)) => return out,
            Ok(Err(e)) => warn!(error = %e, "image optimization failed, keeping original"),
            Err(e) => warn!(error = %e, "image optimization task failed, keeping original"),
        }
        Arc::try_unwrap(input).unwrap_or_else(|shared| shared.as_ref().clone())
    }
}

/// Decode, fit within `max_width` x `max_height` keeping the aspect ratio,
/// and re-encode as `output` asks. Never enlarges. JPEG output uses
/// quality 85.
pub fn shrink(
    data: &[u8],
    max_width: u32,
    max_height: u32,
    output: ImageOutput,
) -> image::ImageResult<Vec<u8>> {
    let format = image::guess_format(data)?;
    let img = image::load_from_memory_with_format(data, format)?;

    let img = if img.width() > max_width || img.height() > max_height {
        debug!(
            from_width = img.width(),
            from_height = img.height(),
            max_width,
            max_height,
            "resizing image"
        );
        img.resize(max_width, max_height, FilterType::Lanczos3)
    } else {
        img
    };

    let target = match output {
        ImageOutput::SameFormat => format,
        ImageOutput::Jpeg => ImageFormat::Jpeg,
    };
    let mut buf = Cursor::new(Vec::new());
    match target {
        ImageFormat::Jpeg => {
            let encoder = JpegEncoder::new_with_quality(&mut buf, JPEG_QUALITY);
            DynamicImage::ImageRgb8(img.to_rgb8()).write_with_encoder(encoder)?;
        }
        other => img.write_to(&mut buf, other)?,
    }
    Ok(buf.into_inner())
}
