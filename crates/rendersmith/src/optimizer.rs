//! Image optimisation
//!
//! Re-encodes the lossless PNG exported by the canvas runtime into the
//! transport format the caller asked for. Stateless; one optimizer can be
//! shared by any number of concurrent render paths.

use crate::result::{RenderError, RenderResult};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{DynamicImage, RgbImage, RgbaImage};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Cursor;
use std::str::FromStr;

/// Default output quality
pub const DEFAULT_QUALITY: u8 = 90;

/// Output image format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    /// Lossless PNG
    #[default]
    Png,
    /// Lossy JPEG
    Jpeg,
}

impl ImageFormat {
    /// MIME type for HTTP responses
    #[must_use]
    pub const fn content_type(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
        }
    }

    /// Lowercase name used on the wire
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpeg",
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImageFormat {
    type Err = RenderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "png" => Ok(Self::Png),
            "jpeg" | "jpg" => Ok(Self::Jpeg),
            other => Err(RenderError::invalid_input(
                "format",
                format!("unsupported format '{other}', expected 'png' or 'jpeg'"),
            )),
        }
    }
}

/// Map a 1-100 quality onto PNG compression effort.
fn png_compression(quality: u8) -> CompressionType {
    match quality {
        90..=u8::MAX => CompressionType::Best,
        50..=89 => CompressionType::Default,
        _ => CompressionType::Fast,
    }
}

/// Blend a colour channel over a white background
fn over_white(channel: u8, alpha: u8) -> u8 {
    let a = u16::from(alpha);
    ((u16::from(channel) * a + 255 * (255 - a)) / 255) as u8
}

/// Drop the alpha channel by compositing onto white
fn flatten(rgba: &RgbaImage) -> RgbImage {
    RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let [r, g, b, a] = rgba.get_pixel(x, y).0;
        image::Rgb([over_white(r, a), over_white(g, a), over_white(b, a)])
    })
}

/// Stateless compressor from rendered pixels to a transport-ready image
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageOptimizer;

impl ImageOptimizer {
    /// Create a new optimizer
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Re-encode `pixels` (any format the `image` crate can decode) as `format`.
    pub fn optimize(&self, pixels: &[u8], format: ImageFormat, quality: u8) -> RenderResult<Vec<u8>> {
        let decoded = image::load_from_memory(pixels)
            .map_err(|e| RenderError::image_processing(format!("decode failed: {e}")))?;
        self.encode(&decoded, format, quality)
    }

    /// Encode an already-decoded image
    pub fn encode(
        &self,
        image: &DynamicImage,
        format: ImageFormat,
        quality: u8,
    ) -> RenderResult<Vec<u8>> {
        let quality = quality.clamp(1, 100);
        let mut out = Cursor::new(Vec::new());

        match format {
            ImageFormat::Png => {
                let encoder = PngEncoder::new_with_quality(
                    &mut out,
                    png_compression(quality),
                    FilterType::Adaptive,
                );
                image
                    .write_with_encoder(encoder)
                    .map_err(|e| RenderError::image_processing(format!("png encode failed: {e}")))?;
            }
            ImageFormat::Jpeg => {
                let rgb = flatten(&image.to_rgba8());
                let encoder = JpegEncoder::new_with_quality(&mut out, quality);
                rgb.write_with_encoder(encoder).map_err(|e| {
                    RenderError::image_processing(format!("jpeg encode failed: {e}"))
                })?;
            }
        }

        Ok(out.into_inner())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use image::Rgba;

    const PNG_MAGIC: [u8; 8] = [137, 80, 78, 71, 13, 10, 26, 10];
    const JPEG_MAGIC: [u8; 3] = [0xFF, 0xD8, 0xFF];

    fn solid_png(width: u32, height: u32, color: [u8; 4]) -> Vec<u8> {
        let img = RgbaImage::from_pixel(width, height, Rgba(color));
        let mut out = Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(img)
            .write_to(&mut out, image::ImageFormat::Png)
            .unwrap();
        out.into_inner()
    }

    #[test]
    fn test_png_output() {
        let out = ImageOptimizer::new()
            .optimize(&solid_png(20, 10, [255, 0, 0, 255]), ImageFormat::Png, 90)
            .unwrap();
        assert_eq!(&out[0..8], &PNG_MAGIC);

        let decoded = image::load_from_memory(&out).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (20, 10));
    }

    #[test]
    fn test_jpeg_output() {
        let out = ImageOptimizer::new()
            .optimize(&solid_png(16, 16, [0, 128, 255, 255]), ImageFormat::Jpeg, 75)
            .unwrap();
        assert_eq!(&out[0..3], &JPEG_MAGIC);
    }

    #[test]
    fn test_jpeg_flattens_transparency_to_white() {
        let out = ImageOptimizer::new()
            .optimize(&solid_png(8, 8, [0, 0, 0, 0]), ImageFormat::Jpeg, 100)
            .unwrap();
        let decoded = image::load_from_memory(&out).unwrap().to_rgb8();
        let px = decoded.get_pixel(4, 4).0;
        assert!(px.iter().all(|c| *c > 245), "expected white, got {px:?}");
    }

    #[test]
    fn test_garbage_input_is_processing_error() {
        let err = ImageOptimizer::new()
            .optimize(b"not an image", ImageFormat::Png, 90)
            .unwrap_err();
        assert!(matches!(err, RenderError::ImageProcessing { .. }));
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("png".parse::<ImageFormat>().unwrap(), ImageFormat::Png);
        assert_eq!("JPEG".parse::<ImageFormat>().unwrap(), ImageFormat::Jpeg);
        assert_eq!("jpg".parse::<ImageFormat>().unwrap(), ImageFormat::Jpeg);
        assert!("webp".parse::<ImageFormat>().is_err());
    }

    #[test]
    fn test_format_serde_lowercase() {
        assert_eq!(serde_json::to_string(&ImageFormat::Jpeg).unwrap(), "\"jpeg\"");
        let f: ImageFormat = serde_json::from_str("\"png\"").unwrap();
        assert_eq!(f, ImageFormat::Png);
        assert_eq!(ImageFormat::Jpeg.content_type(), "image/jpeg");
    }

    #[test]
    fn test_png_compression_mapping() {
        assert_eq!(png_compression(100), CompressionType::Best);
        assert_eq!(png_compression(60), CompressionType::Default);
        assert_eq!(png_compression(10), CompressionType::Fast);
    }

    #[test]
    fn test_over_white() {
        assert_eq!(over_white(0, 0), 255);
        assert_eq!(over_white(0, 255), 0);
        assert_eq!(over_white(200, 255), 200);
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn prop_output_matches_requested_format(
                width in 1u32..48,
                height in 1u32..48,
                quality in 1u8..=100,
                jpeg in any::<bool>(),
            ) {
                let format = if jpeg { ImageFormat::Jpeg } else { ImageFormat::Png };
                let out = ImageOptimizer::new()
                    .optimize(&solid_png(width, height, [10, 20, 30, 255]), format, quality)
                    .unwrap();

                prop_assert!(!out.is_empty());
                let guessed = image::guess_format(&out).unwrap();
                let expected = match format {
                    ImageFormat::Png => image::ImageFormat::Png,
                    ImageFormat::Jpeg => image::ImageFormat::Jpeg,
                };
                prop_assert_eq!(guessed, expected);
            }
        }
    }
}
