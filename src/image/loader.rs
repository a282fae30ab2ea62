use crate::image::normalizer::INPUT_SIZE;
use crate::utils::error::DigitError;
use crate::Result;
use base64::Engine;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, ImageReader, Rgb, RgbImage};
use std::io::Cursor;

/// Caps applied to an uploaded image before it is decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageLimits {
    /// Encoded size in bytes
    pub max_bytes: usize,
    /// Largest accepted width or height in pixels
    pub max_dimension: u32,
}

impl ImageLimits {
    pub const DEFAULT_MAX_BYTES: usize = 10 * 1024 * 1024;
    pub const DEFAULT_MAX_DIMENSION: u32 = 4096;
}

impl Default for ImageLimits {
    fn default() -> Self {
        Self {
            max_bytes: Self::DEFAULT_MAX_BYTES,
            max_dimension: Self::DEFAULT_MAX_DIMENSION,
        }
    }
}

pub struct ImageLoader;

impl ImageLoader {
    /// Decode a base64 string, with or without a `data:image/...;base64,` prefix.
    pub fn from_base64(base64_data: &str, limits: ImageLimits) -> Result<DynamicImage> {
        let trimmed = base64_data.trim();
        let base64_clean = match trimmed.strip_prefix("data:") {
            Some(rest) => rest.split_once(',').map(|(_, data)| data).unwrap_or(rest),
            None => trimmed,
        };

        let image_bytes = base64::engine::general_purpose::STANDARD
            .decode(base64_clean)
            .map_err(|e| DigitError::InvalidImage(format!("invalid base64 data: {}", e)))?;

        Self::from_bytes(&image_bytes, limits)
    }

    /// Decode an encoded image. Pixel dimensions are read from the header and
    /// checked before any pixel data is allocated.
    pub fn from_bytes(bytes: &[u8], limits: ImageLimits) -> Result<DynamicImage> {
        if bytes.is_empty() {
            return Err(DigitError::InvalidImage("image data is empty".to_string()));
        }

        if bytes.len() > limits.max_bytes {
            return Err(DigitError::FileTooLarge(bytes.len(), limits.max_bytes));
        }

        let format = Self::detect_format(bytes)
            .ok_or_else(|| DigitError::InvalidImage("unrecognized image format".to_string()))?;
        if !Self::is_supported_format(format) {
            return Err(DigitError::UnsupportedFormat(format!("{:?}", format)));
        }

        let (width, height) = ImageReader::with_format(Cursor::new(bytes), format)
            .into_dimensions()
            .map_err(|e| DigitError::InvalidImage(e.to_string()))?;
        Self::validate_dimensions(width, height, limits.max_dimension)?;

        image::load_from_memory_with_format(bytes, format)
            .map_err(|e| DigitError::InvalidImage(e.to_string()))
    }

    pub fn validate_dimensions(width: u32, height: u32, max_dimension: u32) -> Result<()> {
        if width == 0 || height == 0 {
            return Err(DigitError::InvalidImage(format!(
                "image has no pixels: {}x{}",
                width, height
            )));
        }

        if width > max_dimension || height > max_dimension {
            return Err(DigitError::InvalidImage(format!(
                "image too large: {}x{}, maximum {}x{}",
                width, height, max_dimension, max_dimension
            )));
        }

        Ok(())
    }

    pub fn detect_format(bytes: &[u8]) -> Option<ImageFormat> {
        image::guess_format(bytes).ok()
    }

    pub fn is_supported_format(format: ImageFormat) -> bool {
        matches!(
            format,
            ImageFormat::Png
                | ImageFormat::Jpeg
                | ImageFormat::Gif
                | ImageFormat::Bmp
                | ImageFormat::Tiff
                | ImageFormat::WebP
        )
    }

    /// Multipart parts may omit the content type; when present it must be `image/*`.
    pub fn check_content_type(content_type: Option<&str>) -> Result<()> {
        match content_type {
            Some(ct) if !ct.starts_with("image/") && ct != "application/octet-stream" => {
                Err(DigitError::UnsupportedFormat(ct.to_string()))
            }
            _ => Ok(()),
        }
    }

    /// 28x28 PNG on a white background, base64 encoded.
    pub fn thumbnail_png_base64(image: &DynamicImage) -> Result<String> {
        let small = image
            .resize_exact(INPUT_SIZE, INPUT_SIZE, FilterType::Triangle)
            .to_rgba8();

        let flattened = RgbImage::from_fn(INPUT_SIZE, INPUT_SIZE, |x, y| {
            let [r, g, b, a] = small.get_pixel(x, y).0;
            let alpha = a as f32 / 255.0;
            let over_white = |c: u8| (c as f32 * alpha + 255.0 * (1.0 - alpha)).round() as u8;
            Rgb([over_white(r), over_white(g), over_white(b)])
        });

        let mut png = Vec::new();
        DynamicImage::ImageRgb8(flattened)
            .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .map_err(|e| DigitError::Internal(format!("failed to encode thumbnail: {}", e)))?;

        Ok(base64::engine::general_purpose::STANDARD.encode(png))
    }
}
