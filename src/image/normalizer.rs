use crate::utils::error::DigitError;
use crate::Result;
use image::imageops::{self, FilterType};
use image::{ColorType, DynamicImage, GenericImageView, ImageBuffer, Luma};
use ndarray::{Array4, ArrayView4};
use std::str::FromStr;

/// Side length of the classifier input.
pub const INPUT_SIZE: u32 = 28;

const LUMA_R: f32 = 0.299;
const LUMA_G: f32 = 0.587;
const LUMA_B: f32 = 0.114;

// Triangle is convex, so resampling never leaves [0, 1].
const RESIZE_FILTER: FilterType = FilterType::Triangle;

/// Larger sources are shrunk in their own pixel format before the f32 plane is built.
const PRESHRINK_SIDE: u32 = 256;

type GrayPlane = ImageBuffer<Luma<f32>, Vec<f32>>;

/// How a non-square input reaches 28x28.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResizePolicy {
    /// Center on a black square canvas, then resize. Keeps the aspect ratio.
    #[default]
    Letterbox,
    /// Resize straight to 28x28.
    Direct,
}

impl ResizePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResizePolicy::Letterbox => "letterbox",
            ResizePolicy::Direct => "direct",
        }
    }
}

impl FromStr for ResizePolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "letterbox" => Ok(ResizePolicy::Letterbox),
            "direct" => Ok(ResizePolicy::Direct),
            other => Err(format!(
                "unknown resize policy '{}', expected 'letterbox' or 'direct'",
                other
            )),
        }
    }
}

impl std::fmt::Display for ResizePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `[1, 1, 28, 28]` NCHW float tensor with every value in `[0, 1]`.
///
/// Only [`ImageNormalizer`] builds one, so the shape and range always hold.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedTensor(Array4<f32>);

impl NormalizedTensor {
    pub const SHAPE: [usize; 4] = [1, 1, INPUT_SIZE as usize, INPUT_SIZE as usize];

    pub fn view(&self) -> ArrayView4<'_, f32> {
        self.0.view()
    }

    /// Value at row `y`, column `x`.
    pub fn get(&self, y: usize, x: usize) -> Option<f32> {
        self.0.get([0, 0, y, x]).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = f32> + '_ {
        self.0.iter().copied()
    }

    pub fn into_array(self) -> Array4<f32> {
        self.0
    }
}

/// Turns an arbitrary decoded image into classifier input.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageNormalizer {
    policy: ResizePolicy,
    invert: bool,
}

impl ImageNormalizer {
    pub fn new(policy: ResizePolicy) -> Self {
        Self {
            policy,
            invert: false,
        }
    }

    /// Flip luminance for dark-on-light drawings.
    pub fn with_invert(mut self, invert: bool) -> Self {
        self.invert = invert;
        self
    }

    pub fn normalize(&self, image: &DynamicImage) -> Result<NormalizedTensor> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(DigitError::InvalidImage(format!(
                "image has no pixels: {}x{}",
                width, height
            )));
        }

        let plane = if width.max(height) > PRESHRINK_SIDE {
            luminance_plane(&image.resize(PRESHRINK_SIDE, PRESHRINK_SIDE, RESIZE_FILTER))
        } else {
            luminance_plane(image)
        };
        let resized = match self.policy {
            ResizePolicy::Letterbox => letterbox(&plane),
            ResizePolicy::Direct => imageops::resize(&plane, INPUT_SIZE, INPUT_SIZE, RESIZE_FILTER),
        };

        let size = INPUT_SIZE as usize;
        let invert = self.invert;
        let tensor = Array4::from_shape_fn((1, 1, size, size), |(_, _, y, x)| {
            let value = resized.get_pixel(x as u32, y as u32).0[0].clamp(0.0, 1.0);
            if invert {
                1.0 - value
            } else {
                value
            }
        });

        tracing::trace!(
            "Normalized {}x{} image with policy={}, invert={}",
            width,
            height,
            self.policy,
            self.invert
        );

        Ok(NormalizedTensor(tensor))
    }
}

/// Per-pixel luminance in `[0, 1]`, alpha composited over black.
fn luminance_plane(image: &DynamicImage) -> GrayPlane {
    let (width, height) = image.dimensions();

    match image.color() {
        ColorType::L8 | ColorType::La8 | ColorType::L16 | ColorType::La16 => {
            let gray = image.to_luma_alpha32f();
            ImageBuffer::from_fn(width, height, |x, y| {
                let [value, alpha] = gray.get_pixel(x, y).0;
                Luma([value * alpha])
            })
        }
        _ => {
            let rgba = image.to_rgba32f();
            ImageBuffer::from_fn(width, height, |x, y| {
                let [r, g, b, alpha] = rgba.get_pixel(x, y).0;
                Luma([(LUMA_R * r + LUMA_G * g + LUMA_B * b) * alpha])
            })
        }
    }
}

fn letterbox(plane: &GrayPlane) -> GrayPlane {
    let (width, height) = plane.dimensions();
    let side = width.max(height);

    let mut canvas = GrayPlane::new(side, side);
    imageops::replace(
        &mut canvas,
        plane,
        i64::from((side - width) / 2),
        i64::from((side - height) / 2),
    );

    imageops::resize(&canvas, INPUT_SIZE, INPUT_SIZE, RESIZE_FILTER)
}
