// --- Файл: src/vision.rs ---

//! Преобразование изображений в нормализованные тензоры CHW.

use crate::error::{DataError, Result};
use image::imageops::{self, FilterType};
use image::{DynamicImage, RgbImage};
use ndarray::Array3;
use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Средние и стд. отклонения, на которых обучался CLIP.
pub const CLIP_MEAN: [f32; 3] = [0.481_454_66, 0.457_827_5, 0.408_210_73];
pub const CLIP_STD: [f32; 3] = [0.268_629_54, 0.261_302_58, 0.275_777_11];

/// Преобразование изображения в тензор `[3, H, W]`.
pub trait ImageTransform: Send + Sync {
    fn apply(&self, image: DynamicImage, rng: &mut StdRng) -> Result<Array3<f32>>;
}

/// Открывает изображение с диска и приводит к RGB.
pub fn load_rgb(path: &Path) -> Result<DynamicImage> {
    let image = image::open(path).map_err(|source| DataError::Image {
        path: path.display().to_string(),
        source,
    })?;
    Ok(DynamicImage::ImageRgb8(image.to_rgb8()))
}

/// Декодирует изображение из байтов (PNG/JPEG) и приводит к RGB.
pub fn decode_rgb(bytes: &[u8], origin: &str) -> Result<DynamicImage> {
    let image = image::load_from_memory(bytes).map_err(|source| DataError::Image {
        path: origin.to_string(),
        source,
    })?;
    Ok(DynamicImage::ImageRgb8(image.to_rgb8()))
}

/// Преобразование в стиле CLIP.
///
/// - обучение: random resized crop (доля площади `scale`, соотношение сторон 3/4..4/3)
/// - оценка: ресайз короткой стороны до `image_size` и центральный кроп
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClipImageTransform {
    pub image_size: u32,
    pub is_train: bool,
    pub mean: [f32; 3],
    pub std: [f32; 3],
    pub scale: (f32, f32),
}

impl ClipImageTransform {
    pub fn new(image_size: u32, is_train: bool) -> Self {
        Self {
            image_size,
            is_train,
            mean: CLIP_MEAN,
            std: CLIP_STD,
            scale: (0.9, 1.0),
        }
    }

    /// Задает нормализацию; `mean = 0, std = 1` оставляет значения в `[0, 1]`.
    pub fn with_normalization(mut self, mean: [f32; 3], std: [f32; 3]) -> Self {
        self.mean = mean;
        self.std = std;
        self
    }

    /// Выбирает окно кропа `(x, y, w, h)` по схеме RandomResizedCrop.
    fn random_crop_box(&self, width: u32, height: u32, rng: &mut StdRng) -> (u32, u32, u32, u32) {
        let area = (width * height) as f32;
        let (log_lo, log_hi) = ((3.0_f32 / 4.0).ln(), (4.0_f32 / 3.0).ln());

        for _ in 0..10 {
            let target_area = area * rng.random_range(self.scale.0..=self.scale.1);
            let aspect = rng.random_range(log_lo..=log_hi).exp();
            let w = (target_area * aspect).sqrt().round() as u32;
            let h = (target_area / aspect).sqrt().round() as u32;
            if w > 0 && h > 0 && w <= width && h <= height {
                let x = rng.random_range(0..=width - w);
                let y = rng.random_range(0..=height - h);
                return (x, y, w, h);
            }
        }

        // запасной вариант - центральный кроп
        let side = width.min(height);
        ((width - side) / 2, (height - side) / 2, side, side)
    }

    fn resize_and_center_crop(&self, rgb: &RgbImage) -> RgbImage {
        let size = self.image_size;
        let (w, h) = rgb.dimensions();
        let (nw, nh) = if w <= h {
            (size, ((h as f32) * size as f32 / w as f32).round().max(size as f32) as u32)
        } else {
            (((w as f32) * size as f32 / h as f32).round().max(size as f32) as u32, size)
        };
        let resized = imageops::resize(rgb, nw, nh, FilterType::CatmullRom);
        imageops::crop_imm(&resized, (nw - size) / 2, (nh - size) / 2, size, size).to_image()
    }

    fn to_tensor(&self, rgb: &RgbImage) -> Array3<f32> {
        let (w, h) = rgb.dimensions();
        Array3::from_shape_fn((3, h as usize, w as usize), |(c, y, x)| {
            let v = rgb.get_pixel(x as u32, y as u32).0[c] as f32 / 255.0;
            (v - self.mean[c]) / self.std[c]
        })
    }
}

impl ImageTransform for ClipImageTransform {
    fn apply(&self, image: DynamicImage, rng: &mut StdRng) -> Result<Array3<f32>> {
        let rgb = image.to_rgb8();
        let (width, height) = rgb.dimensions();
        if width == 0 || height == 0 || self.image_size == 0 {
            return Err(DataError::InvalidArgument(format!(
                "cannot transform a {width}x{height} image to {}",
                self.image_size
            )));
        }

        let out = if self.is_train {
            let (lo, hi) = self.scale;
            if lo.is_nan() || hi.is_nan() || lo < 0.0 || lo > hi {
                return Err(DataError::InvalidArgument(format!(
                    "crop scale must satisfy 0 <= low <= high, got ({lo}, {hi})"
                )));
            }
            let (x, y, w, h) = self.random_crop_box(width, height, rng);
            let crop = imageops::crop_imm(&rgb, x, y, w, h).to_image();
            imageops::resize(&crop, self.image_size, self.image_size, FilterType::CatmullRom)
        } else {
            self.resize_and_center_crop(&rgb)
        };

        Ok(self.to_tensor(&out))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;
    use rand::SeedableRng;

    fn gradient(w: u32, h: u32) -> DynamicImage {
        let img = RgbImage::from_fn(w, h, |x, y| Rgb([(x % 256) as u8, (y % 256) as u8, 128]));
        DynamicImage::ImageRgb8(img)
    }

    #[test]
    fn test_eval_transform_shape() {
        let mut rng = StdRng::seed_from_u64(0);
        let t = ClipImageTransform::new(32, false);
        let out = t.apply(gradient(64, 48), &mut rng).unwrap();
        assert_eq!(out.shape(), &[3, 32, 32]);
    }

    #[test]
    fn test_train_transform_shape() {
        let mut rng = StdRng::seed_from_u64(1);
        let t = ClipImageTransform::new(24, true);
        for _ in 0..5 {
            let out = t.apply(gradient(50, 70), &mut rng).unwrap();
            assert_eq!(out.shape(), &[3, 24, 24]);
        }
    }

    #[test]
    fn test_reversed_crop_scale_is_rejected() {
        let mut rng = StdRng::seed_from_u64(4);
        let mut t = ClipImageTransform::new(16, true);
        t.scale = (1.0, 0.9);
        assert!(matches!(
            t.apply(gradient(20, 20), &mut rng),
            Err(DataError::InvalidArgument(_))
        ));

        t.scale = (1.0, 1.0);
        assert_eq!(t.apply(gradient(20, 20), &mut rng).unwrap().shape(), &[3, 16, 16]);
    }

    #[test]
    fn test_identity_normalization_range() {
        let mut rng = StdRng::seed_from_u64(2);
        let t = ClipImageTransform::new(16, false).with_normalization([0.0; 3], [1.0; 3]);
        let out = t.apply(gradient(16, 16), &mut rng).unwrap();
        assert!(out.iter().all(|&v| (0.0..=1.0).contains(&v)));
        assert!((out[[2, 0, 0]] - 128.0 / 255.0).abs() < 1e-6);
    }

    #[test]
    fn test_decode_png_bytes() {
        let mut bytes = Vec::new();
        gradient(8, 8)
            .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        let img = decode_rgb(&bytes, "memory").unwrap();
        assert_eq!(img.width(), 8);
        assert!(decode_rgb(b"not an image", "memory").is_err());
    }
}
