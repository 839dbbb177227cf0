//! Image Preprocessor Implementation

use std::borrow::Cow;
use std::io::Cursor;

use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageReader, RgbImage};
use ndarray::Array4;
use tracing::{debug, info};

use crate::{ImageTensor, PreprocessConfig, PreprocessError};

/// Resampling filter; Triangle is antialiased bilinear
const RESIZE_FILTER: FilterType = FilterType::Triangle;

/// Turns encoded image bytes into normalized NCHW tensors.
///
/// Steps, in order: decode, force RGB, resize to the exact target size
/// (aspect ratio is not kept), scale to [0, 1], normalize per channel,
/// lay out as `[1, 3, H, W]`.
#[derive(Debug, Clone)]
pub struct ImagePreprocessor {
    config: PreprocessConfig,
    /// Normalized value for every (channel, byte) pair
    lut: [[f32; 256]; 3],
}

impl Default for ImagePreprocessor {
    fn default() -> Self {
        Self::new(PreprocessConfig::default())
    }
}

impl ImagePreprocessor {
    /// Create a preprocessor with the given configuration
    pub fn new(config: PreprocessConfig) -> Self {
        info!(
            "Creating image preprocessor: {}x{}, mean={:?}, std={:?}",
            config.width, config.height, config.mean, config.std
        );

        let mut lut = [[0.0f32; 256]; 3];
        for (c, table) in lut.iter_mut().enumerate() {
            for (v, slot) in table.iter_mut().enumerate() {
                *slot = (v as f32 / 255.0 - config.mean[c]) / config.std[c];
            }
        }

        Self { config, lut }
    }

    /// Configuration in use
    pub fn config(&self) -> &PreprocessConfig {
        &self.config
    }

    /// Decode and preprocess raw image bytes
    pub fn process(&self, bytes: &[u8]) -> Result<ImageTensor, PreprocessError> {
        let image = decode(bytes)?;
        debug!(
            "Decoded {}x{} image ({:?})",
            image.width(),
            image.height(),
            image.color()
        );
        Ok(self.process_image(&image))
    }

    /// Preprocess an already decoded image
    pub fn process_image(&self, image: &DynamicImage) -> ImageTensor {
        let (width, height) = (self.config.width, self.config.height);

        let rgb: Cow<'_, RgbImage> = match image {
            DynamicImage::ImageRgb8(rgb) => Cow::Borrowed(rgb),
            other => Cow::Owned(other.to_rgb8()),
        };

        let resized: Cow<'_, RgbImage> = if rgb.dimensions() == (width, height) {
            rgb
        } else {
            Cow::Owned(imageops::resize(&*rgb, width, height, RESIZE_FILTER))
        };

        let mut data = Array4::<f32>::zeros((1, 3, height as usize, width as usize));
        for (x, y, pixel) in resized.enumerate_pixels() {
            let (x, y) = (x as usize, y as usize);
            data[[0, 0, y, x]] = self.lut[0][pixel[0] as usize];
            data[[0, 1, y, x]] = self.lut[1][pixel[1] as usize];
            data[[0, 2, y, x]] = self.lut[2][pixel[2] as usize];
        }

        ImageTensor::from_array(data)
    }
}

/// Decode bytes in any supported container format
pub fn decode(bytes: &[u8]) -> Result<DynamicImage, PreprocessError> {
    if bytes.is_empty() {
        return Err(PreprocessError::Empty);
    }

    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(image::ImageError::from)?;

    if reader.format().is_none() {
        return Err(PreprocessError::UnknownFormat);
    }

    Ok(reader.decode()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{IMAGENET_MEAN, IMAGENET_STD};
    use image::{GrayImage, ImageFormat, Luma, Rgb, Rgba, RgbaImage};
    use proptest::prelude::*;

    fn encode(image: DynamicImage, format: ImageFormat) -> Vec<u8> {
        let mut buf = Vec::new();
        image.write_to(&mut Cursor::new(&mut buf), format).unwrap();
        buf
    }

    fn norm(value: u8, channel: usize) -> f32 {
        (value as f32 / 255.0 - IMAGENET_MEAN[channel]) / IMAGENET_STD[channel]
    }

    #[test]
    fn test_output_shape_for_any_input_size() {
        let pre = ImagePreprocessor::default();
        for (w, h) in [(1, 1), (17, 300), (640, 480), (224, 224)] {
            let img = RgbImage::from_fn(w, h, |x, y| Rgb([(x % 256) as u8, (y % 256) as u8, 7]));
            let bytes = encode(DynamicImage::ImageRgb8(img), ImageFormat::Png);

            let tensor = pre.process(&bytes).unwrap();
            assert_eq!(tensor.shape(), [1, 3, 224, 224]);
            assert!(tensor.is_finite());
        }
    }

    #[test]
    fn test_deterministic_output() {
        let pre = ImagePreprocessor::default();
        let img = RgbImage::from_fn(333, 251, |x, y| {
            Rgb([(x * 7 % 256) as u8, (y * 3 % 256) as u8, ((x + y) % 256) as u8])
        });
        let bytes = encode(DynamicImage::ImageRgb8(img), ImageFormat::Jpeg);

        let a = pre.process(&bytes).unwrap();
        let b = pre.process(&bytes).unwrap();
        let bits = |t: &ImageTensor| t.as_slice().iter().map(|v| v.to_bits()).collect::<Vec<_>>();
        assert_eq!(bits(&a), bits(&b));
    }

    #[test]
    fn test_per_channel_normalization() {
        let pre = ImagePreprocessor::default();
        let img = RgbImage::from_pixel(224, 224, Rgb([255, 0, 128]));
        let tensor = pre.process(&encode(DynamicImage::ImageRgb8(img), ImageFormat::Png)).unwrap();
        let view = tensor.view();

        assert_eq!(view[[0, 0, 100, 100]], norm(255, 0));
        assert_eq!(view[[0, 1, 0, 223]], norm(0, 1));
        assert_eq!(view[[0, 2, 223, 0]], norm(128, 2));
        assert!((view[[0, 0, 5, 5]] - 2.2489).abs() < 1e-3);
        assert!((view[[0, 1, 5, 5]] + 2.0357).abs() < 1e-3);
    }

    #[test]
    fn test_channel_first_layout() {
        // top half red, bottom half blue; checks rows map to H and columns to W
        let img = RgbImage::from_fn(224, 224, |_, y| {
            if y < 112 {
                Rgb([255, 0, 0])
            } else {
                Rgb([0, 0, 255])
            }
        });
        let tensor = ImagePreprocessor::default().process_image(&DynamicImage::ImageRgb8(img));
        let view = tensor.view();

        assert_eq!(view[[0, 0, 0, 200]], norm(255, 0));
        assert_eq!(view[[0, 2, 0, 200]], norm(0, 2));
        assert_eq!(view[[0, 0, 223, 10]], norm(0, 0));
        assert_eq!(view[[0, 2, 223, 10]], norm(255, 2));

        // flat offset of (c=2, y=223, x=10) in a contiguous CHW buffer
        let plane = 224 * 224;
        assert_eq!(tensor.as_slice()[2 * plane + 223 * 224 + 10], norm(255, 2));
    }

    #[test]
    fn test_grayscale_expanded_to_three_channels() {
        let img = GrayImage::from_pixel(224, 224, Luma([128]));
        let tensor = ImagePreprocessor::default().process_image(&DynamicImage::ImageLuma8(img));
        let view = tensor.view();

        for c in 0..3 {
            assert_eq!(view[[0, c, 50, 50]], norm(128, c));
        }
    }

    #[test]
    fn test_alpha_is_dropped() {
        let img = RgbaImage::from_pixel(224, 224, Rgba([10, 20, 30, 0]));
        let bytes = encode(DynamicImage::ImageRgba8(img), ImageFormat::Png);
        let tensor = ImagePreprocessor::default().process(&bytes).unwrap();
        let view = tensor.view();

        assert_eq!(view[[0, 0, 1, 1]], norm(10, 0));
        assert_eq!(view[[0, 1, 1, 1]], norm(20, 1));
        assert_eq!(view[[0, 2, 1, 1]], norm(30, 2));
    }

    #[test]
    fn test_aspect_ratio_not_preserved() {
        // a 4:1 strip still fills the whole output, no letterbox padding
        let img = RgbImage::from_pixel(896, 224, Rgb([0, 255, 0]));
        let tensor = ImagePreprocessor::default().process_image(&DynamicImage::ImageRgb8(img));
        let view = tensor.view();

        for (y, x) in [(0, 0), (0, 223), (223, 0), (223, 223), (112, 112)] {
            assert!((view[[0, 1, y, x]] - norm(255, 1)).abs() < 0.05);
        }
    }

    #[test]
    fn test_custom_size() {
        let pre = ImagePreprocessor::new(PreprocessConfig::with_size(32, 16));
        let img = RgbImage::from_pixel(100, 100, Rgb([1, 2, 3]));
        let tensor = pre.process_image(&DynamicImage::ImageRgb8(img));
        assert_eq!(tensor.shape(), [1, 3, 16, 32]);
        assert_eq!(tensor.shape(), pre.config().tensor_shape());
    }

    #[test]
    fn test_empty_input() {
        let err = ImagePreprocessor::default().process(&[]).unwrap_err();
        assert!(matches!(err, PreprocessError::Empty));
    }

    #[test]
    fn test_unrecognized_bytes() {
        let err = ImagePreprocessor::default()
            .process(b"definitely not an image")
            .unwrap_err();
        assert!(matches!(err, PreprocessError::UnknownFormat));
    }

    #[test]
    fn test_truncated_image() {
        let img = RgbImage::from_pixel(64, 64, Rgb([9, 9, 9]));
        let bytes = encode(DynamicImage::ImageRgb8(img), ImageFormat::Png);
        let err = ImagePreprocessor::default()
            .process(&bytes[..bytes.len() / 2])
            .unwrap_err();
        assert!(matches!(err, PreprocessError::Decode(_)));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        #[test]
        fn prop_any_decodable_image_gives_finite_fixed_tensor(
            width in 1u32..160,
            height in 1u32..160,
            seed in any::<[u8; 3]>(),
            jpeg in any::<bool>(),
        ) {
            let img = RgbImage::from_fn(width, height, |x, y| {
                Rgb([
                    seed[0].wrapping_add((x * 13) as u8),
                    seed[1].wrapping_add((y * 7) as u8),
                    seed[2] ^ ((x + y) as u8),
                ])
            });
            let format = if jpeg { ImageFormat::Jpeg } else { ImageFormat::Png };
            let bytes = encode(DynamicImage::ImageRgb8(img), format);

            let pre = ImagePreprocessor::default();
            let first = pre.process(&bytes).unwrap();
            prop_assert_eq!(first.shape(), [1, 3, 224, 224]);
            prop_assert!(first.is_finite());

            let second = pre.process(&bytes).unwrap();
            let same = first
                .as_slice()
                .iter()
                .zip(second.as_slice())
                .all(|(a, b)| a.to_bits() == b.to_bits());
            prop_assert!(same);
        }
    }
}
