use crate::{config::TensorLayout, error::PredictionError};
use image::{imageops::FilterType, DynamicImage, ImageFormat, RgbImage};
use ndarray::{Array, Array4};

pub const ACCEPTED_FORMATS: [ImageFormat; 2] = [ImageFormat::Png, ImageFormat::Jpeg];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputSpec {
    pub size: u32,
    pub layout: TensorLayout,
}

impl InputSpec {
    pub fn shape(&self) -> (usize, usize, usize, usize) {
        let size = self.size as usize;
        match self.layout {
            TensorLayout::Nhwc => (1, size, size, 3),
            TensorLayout::Nchw => (1, 3, size, size),
        }
    }
}

pub fn decode_image(image_data: &[u8]) -> Result<DynamicImage, PredictionError> {
    if image_data.is_empty() {
        return Err(PredictionError::EmptyImage);
    }

    let image_reader = image::ImageReader::new(std::io::Cursor::new(image_data))
        .with_guessed_format()
        .map_err(|e| PredictionError::Decode(image::ImageError::IoError(e)))?;

    match image_reader.format() {
        Some(format) if ACCEPTED_FORMATS.contains(&format) => {}
        Some(format) => {
            return Err(PredictionError::UnsupportedFormat(format!("{:?}", format)));
        }
        None => return Err(PredictionError::UnsupportedFormat("unknown".to_string())),
    }

    Ok(image_reader.decode()?)
}

/// Decodes `image_data` and turns it into a batch of one normalized image.
pub fn transform_image(image_data: &[u8], spec: InputSpec) -> Result<Array4<f32>, PredictionError> {
    let original_img = decode_image(image_data)?;
    let rgb = original_img.to_rgb8();
    let resized = image::imageops::resize(&rgb, spec.size, spec.size, FilterType::CatmullRom);

    Ok(image_to_tensor(&resized, spec.layout))
}

pub fn image_to_tensor(img: &RgbImage, layout: TensorLayout) -> Array4<f32> {
    let (width, height) = img.dimensions();
    let (w, h) = (width as usize, height as usize);

    let mut input = match layout {
        TensorLayout::Nhwc => Array::zeros((1, h, w, 3)),
        TensorLayout::Nchw => Array::zeros((1, 3, h, w)),
    };

    for (x, y, pixel) in img.enumerate_pixels() {
        let (x, y) = (x as usize, y as usize);
        for (c, value) in pixel.0.iter().enumerate() {
            let value = (*value as f32) / 255.;
            match layout {
                TensorLayout::Nhwc => input[[0, y, x, c]] = value,
                TensorLayout::Nchw => input[[0, c, y, x]] = value,
            }
        }
    }

    input
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb, Rgba};
    use std::io::Cursor;

    fn encode(img: DynamicImage, format: ImageFormat) -> Vec<u8> {
        let mut cursor = Cursor::new(Vec::new());
        img.write_to(&mut cursor, format).unwrap();
        cursor.into_inner()
    }

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 0.01
    }

    const INPUT_224: InputSpec = InputSpec {
        size: 224,
        layout: TensorLayout::Nhwc,
    };

    #[test]
    fn test_transform_image_nhwc() {
        let img = ImageBuffer::<Rgb<u8>, Vec<u8>>::from_pixel(100, 60, Rgb([255, 0, 51]));
        let image_data = encode(DynamicImage::from(img), ImageFormat::Png);

        let input = transform_image(&image_data, INPUT_224).unwrap();

        assert_eq!(input.shape(), &[1, 224, 224, 3]);
        assert!(close(input[[0, 10, 10, 0]], 1.0));
        assert!(close(input[[0, 10, 10, 1]], 0.0));
        assert!(close(input[[0, 200, 150, 2]], 0.2));
    }

    #[test]
    fn test_transform_image_nchw() {
        let img = ImageBuffer::<Rgb<u8>, Vec<u8>>::from_pixel(32, 32, Rgb([0, 255, 0]));
        let image_data = encode(DynamicImage::from(img), ImageFormat::Png);
        let nchw = InputSpec {
            size: 16,
            layout: TensorLayout::Nchw,
        };

        let input = transform_image(&image_data, nchw).unwrap();

        assert_eq!(input.shape(), &[1, 3, 16, 16]);
        assert_eq!(nchw.shape(), (1, 3, 16, 16));
        assert!(close(input[[0, 1, 5, 5]], 1.0));
        assert!(close(input[[0, 0, 5, 5]], 0.0));
    }

    #[test]
    fn test_values_stay_in_unit_range() {
        let img = ImageBuffer::from_fn(50, 50, |x, y| Rgb([(x * 5) as u8, (y * 5) as u8, 255]));
        let image_data = encode(DynamicImage::from(img), ImageFormat::Jpeg);

        let input = transform_image(&image_data, INPUT_224).unwrap();

        assert!(input.iter().all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn test_alpha_channel_is_dropped() {
        let img = ImageBuffer::<Rgba<u8>, Vec<u8>>::from_pixel(8, 8, Rgba([0, 0, 255, 0]));
        let image_data = encode(DynamicImage::from(img), ImageFormat::Png);

        let input = transform_image(&image_data, INPUT_224).unwrap();

        assert_eq!(input.shape(), &[1, 224, 224, 3]);
        assert!(close(input[[0, 0, 0, 2]], 1.0));
    }

    #[test]
    fn test_rejects_empty_input() {
        let err = transform_image(&[], INPUT_224).unwrap_err();
        assert!(matches!(err, PredictionError::EmptyImage));
        assert!(err.is_client_error());
    }

    #[test]
    fn test_rejects_garbage() {
        let err = transform_image(b"definitely not a picture", INPUT_224).unwrap_err();
        assert!(matches!(err, PredictionError::UnsupportedFormat(_)));
    }

    #[test]
    fn test_rejects_other_formats() {
        let img = ImageBuffer::<Rgb<u8>, Vec<u8>>::from_pixel(4, 4, Rgb([1, 2, 3]));
        let image_data = encode(DynamicImage::from(img), ImageFormat::Bmp);

        let err = transform_image(&image_data, INPUT_224).unwrap_err();
        assert!(matches!(err, PredictionError::UnsupportedFormat(_)));
    }

    #[test]
    fn test_truncated_png_is_a_decode_error() {
        let img = ImageBuffer::<Rgb<u8>, Vec<u8>>::from_pixel(64, 64, Rgb([9, 9, 9]));
        let mut image_data = encode(DynamicImage::from(img), ImageFormat::Png);
        image_data.truncate(40);

        let err = transform_image(&image_data, INPUT_224).unwrap_err();
        assert!(matches!(err, PredictionError::Decode(_)));
        assert!(err.is_client_error());
    }
}
