use super::GalleryError;
use image::codecs::png::PngDecoder;
use image::codecs::webp::WebPDecoder;
use image::{ImageFormat, ImageReader, imageops::FilterType};
use std::io::Cursor;
use tracing::{debug, warn};

pub(crate) const FALLBACK_EXTENSION: &str = "jpg";

/// File extension derived from the image content, never from a file name.
pub fn extension_for(bytes: &[u8]) -> String {
    match image::guess_format(bytes) {
        Ok(format) => format
            .extensions_str()
            .first()
            .map(|ext| ext.to_string())
            .unwrap_or_else(|| FALLBACK_EXTENSION.to_string()),
        Err(e) => {
            warn!(
                "Could not determine image format ({}), defaulting to .{}",
                e, FALLBACK_EXTENSION
            );
            FALLBACK_EXTENSION.to_string()
        }
    }
}

/// GIFs are always treated as animated; PNG and WebP are inspected.
pub fn is_animated(bytes: &[u8], format: ImageFormat) -> bool {
    match format {
        ImageFormat::Gif => true,
        ImageFormat::Png => PngDecoder::new(Cursor::new(bytes))
            .and_then(|decoder| decoder.is_apng())
            .unwrap_or(false),
        ImageFormat::WebP => WebPDecoder::new(Cursor::new(bytes))
            .map(|decoder| decoder.has_animation())
            .unwrap_or(false),
        _ => false,
    }
}

/// Whether `compress_image` would downscale these bytes.
pub fn needs_compression(bytes: &[u8], max_size: u32) -> bool {
    let Ok(format) = image::guess_format(bytes) else {
        return false;
    };
    if is_animated(bytes, format) {
        return false;
    }

    let dimensions = ImageReader::with_format(Cursor::new(bytes), format).into_dimensions();
    match dimensions {
        Ok((width, height)) => width > max_size || height > max_size,
        Err(e) => {
            debug!("Could not read image dimensions: {}", e);
            false
        }
    }
}

/// Downscale a still raster image so neither side exceeds `max_size`,
/// re-encoding in its original format. Returns `None` when the image is
/// animated, unrecognised or already small enough.
pub fn compress_image(bytes: &[u8], max_size: u32) -> Result<Option<Vec<u8>>, GalleryError> {
    if !needs_compression(bytes, max_size) {
        return Ok(None);
    }

    let format = image::guess_format(bytes)?;
    let img = image::load_from_memory_with_format(bytes, format)?;
    let resized = img.resize(max_size, max_size, FilterType::Lanczos3);

    let mut output = Cursor::new(Vec::new());
    resized.write_to(&mut output, format)?;

    debug!(
        "Compressed {:?} image from {}x{} to {}x{}",
        format,
        img.width(),
        img.height(),
        resized.width(),
        resized.height()
    );

    Ok(Some(output.into_inner()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageBuffer, Rgb};

    fn encode(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
        let img = ImageBuffer::from_fn(width, height, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, 128u8])
        });
        let mut out = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img).write_to(&mut out, format).unwrap();
        out.into_inner()
    }

    #[test]
    fn test_extension_from_content() {
        assert_eq!(extension_for(&encode(4, 4, ImageFormat::Png)), "png");
        assert_eq!(extension_for(&encode(4, 4, ImageFormat::Jpeg)), "jpg");
        assert_eq!(extension_for(&encode(4, 4, ImageFormat::Gif)), "gif");
        assert_eq!(extension_for(b"definitely not an image"), "jpg");
    }

    #[test]
    fn test_small_image_is_left_alone() {
        let bytes = encode(100, 80, ImageFormat::Png);
        assert!(!needs_compression(&bytes, 512));
        assert!(compress_image(&bytes, 512).unwrap().is_none());
    }

    #[test]
    fn test_large_image_is_downscaled_with_aspect_ratio() {
        let bytes = encode(1024, 256, ImageFormat::Png);
        assert!(needs_compression(&bytes, 512));

        let compressed = compress_image(&bytes, 512).unwrap().unwrap();
        let img = image::load_from_memory(&compressed).unwrap();
        assert_eq!(img.width(), 512);
        assert_eq!(img.height(), 128);
        assert_eq!(image::guess_format(&compressed).unwrap(), ImageFormat::Png);
    }

    #[test]
    fn test_gif_is_exempt() {
        let bytes = encode(520, 520, ImageFormat::Gif);
        assert!(is_animated(&bytes, ImageFormat::Gif));
        assert!(!needs_compression(&bytes, 512));
        assert!(compress_image(&bytes, 512).unwrap().is_none());
    }

    #[test]
    fn test_garbage_is_not_compressed() {
        assert!(!needs_compression(b"garbage", 512));
        assert!(compress_image(b"garbage", 512).unwrap().is_none());
    }
}
