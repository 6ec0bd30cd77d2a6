// --- Файл: src/pointcloud/augment.rs ---

//! Аугментации облаков точек.
//!
//! Все функции работают с батчем формы `[B, N, C]` (C >= 3) и сохраняют его
//! форму. Случайные величины тянутся из переданного генератора, поэтому
//! при фиксированном seed результат воспроизводим.

use crate::error::{DataError, Result};
use ndarray::{array, s, Array2, Array3, ArrayViewMut2, Axis};
use rand::Rng;
use rand_distr::{Distribution, StandardNormal};
use serde::{Deserialize, Serialize};

fn check_batch(batch: &Array3<f32>) -> Result<()> {
    if batch.shape()[2] < 3 {
        return Err(DataError::shape("[B, N, C>=3]", batch.shape()));
    }
    Ok(())
}

/// Умножает xyz (и нормали, если есть) каждой точки справа на матрицу `r`.
fn rotate_cloud(mut cloud: ArrayViewMut2<f32>, r: &Array2<f32>) {
    let xyz = cloud.slice(s![.., 0..3]).dot(r);
    cloud.slice_mut(s![.., 0..3]).assign(&xyz);
    if cloud.ncols() >= 6 {
        let normals = cloud.slice(s![.., 3..6]).dot(r);
        cloud.slice_mut(s![.., 3..6]).assign(&normals);
    }
}

/// Случайно "выбрасывает" точки, заменяя их первой точкой облака.
///
/// Для каждого облака доля выброса равна `U[0, 1) * max_dropout_ratio`.
pub fn random_point_dropout<R: Rng + ?Sized>(
    mut batch: Array3<f32>,
    max_dropout_ratio: f32,
    rng: &mut R,
) -> Result<Array3<f32>> {
    check_batch(&batch)?;
    if batch.shape()[1] == 0 {
        return Ok(batch);
    }
    for mut cloud in batch.axis_iter_mut(Axis(0)) {
        let dropout_ratio = rng.random::<f32>() * max_dropout_ratio;
        let first = cloud.row(0).to_owned();
        for mut point in cloud.rows_mut() {
            if rng.random::<f32>() <= dropout_ratio {
                point.assign(&first);
            }
        }
    }
    Ok(batch)
}

/// Масштабирует каждое облако на случайный коэффициент из `[low, high]`.
///
/// При `low == high` коэффициент постоянный.
pub fn random_scale_point_cloud<R: Rng + ?Sized>(
    mut batch: Array3<f32>,
    scale_low: f32,
    scale_high: f32,
    rng: &mut R,
) -> Result<Array3<f32>> {
    check_batch(&batch)?;
    if scale_low.is_nan() || scale_high.is_nan() || scale_low > scale_high {
        return Err(DataError::InvalidArgument(format!(
            "scale_low ({scale_low}) must not exceed scale_high ({scale_high})"
        )));
    }
    for mut cloud in batch.axis_iter_mut(Axis(0)) {
        let scale = rng.random_range(scale_low..=scale_high);
        cloud.mapv_inplace(|v| v * scale);
    }
    Ok(batch)
}

/// Сдвигает xyz каждого облака на случайный вектор из `[-range, range)^3`.
pub fn shift_point_cloud<R: Rng + ?Sized>(
    mut batch: Array3<f32>,
    shift_range: f32,
    rng: &mut R,
) -> Result<Array3<f32>> {
    check_batch(&batch)?;
    if shift_range <= 0.0 {
        return Ok(batch);
    }
    for mut cloud in batch.axis_iter_mut(Axis(0)) {
        let shift = array![
            rng.random_range(-shift_range..shift_range),
            rng.random_range(-shift_range..shift_range),
            rng.random_range(-shift_range..shift_range),
        ];
        let mut xyz = cloud.slice_mut(s![.., 0..3]);
        xyz += &shift;
    }
    Ok(batch)
}

/// Добавляет к каждой координате гауссов шум `sigma * N(0, 1)`, обрезанный до `[-clip, clip]`.
pub fn jitter_point_cloud<R: Rng + ?Sized>(
    mut batch: Array3<f32>,
    sigma: f32,
    clip: f32,
    rng: &mut R,
) -> Result<Array3<f32>> {
    check_batch(&batch)?;
    if clip <= 0.0 {
        return Err(DataError::InvalidArgument(format!(
            "jitter clip must be positive, got {clip}"
        )));
    }
    for v in batch.iter_mut() {
        let noise: f32 = StandardNormal.sample(rng);
        *v += (sigma * noise).clamp(-clip, clip);
    }
    Ok(batch)
}

/// Поворот вокруг вертикальной оси (y) на случайный угол из `[0, 2π)`.
pub fn rotate_point_cloud<R: Rng + ?Sized>(
    mut batch: Array3<f32>,
    rng: &mut R,
) -> Result<Array3<f32>> {
    check_batch(&batch)?;
    for cloud in batch.axis_iter_mut(Axis(0)) {
        let angle = rng.random::<f32>() * 2.0 * std::f32::consts::PI;
        rotate_cloud(cloud, &up_axis_rotation(angle));
    }
    Ok(batch)
}

/// Малые случайные повороты по трем осям: `R = Rz * Ry * Rx`.
///
/// Углы - `angle_sigma * N(0, 1)`, обрезанные до `[-angle_clip, angle_clip]`.
pub fn rotate_perturbation_point_cloud<R: Rng + ?Sized>(
    mut batch: Array3<f32>,
    angle_sigma: f32,
    angle_clip: f32,
    rng: &mut R,
) -> Result<Array3<f32>> {
    check_batch(&batch)?;
    if angle_clip.is_nan() || angle_clip < 0.0 {
        return Err(DataError::InvalidArgument(format!(
            "angle clip must be non-negative, got {angle_clip}"
        )));
    }
    for cloud in batch.axis_iter_mut(Axis(0)) {
        let mut angles = [0.0_f32; 3];
        for a in angles.iter_mut() {
            let n: f32 = StandardNormal.sample(rng);
            *a = (angle_sigma * n).clamp(-angle_clip, angle_clip);
        }
        rotate_cloud(cloud, &euler_rotation(angles));
    }
    Ok(batch)
}

/// Матрица поворота вокруг оси y.
pub fn up_axis_rotation(angle: f32) -> Array2<f32> {
    let (s, c) = angle.sin_cos();
    array![[c, 0.0, s], [0.0, 1.0, 0.0], [-s, 0.0, c]]
}

/// Матрица `Rz * Ry * Rx` для углов `[ax, ay, az]`.
pub fn euler_rotation(angles: [f32; 3]) -> Array2<f32> {
    let (sx, cx) = angles[0].sin_cos();
    let (sy, cy) = angles[1].sin_cos();
    let (sz, cz) = angles[2].sin_cos();
    let rx = array![[1.0, 0.0, 0.0], [0.0, cx, -sx], [0.0, sx, cx]];
    let ry = array![[cy, 0.0, sy], [0.0, 1.0, 0.0], [-sy, 0.0, cy]];
    let rz = array![[cz, -sz, 0.0], [sz, cz, 0.0], [0.0, 0.0, 1.0]];
    rz.dot(&ry.dot(&rx))
}

/// Параметры цепочки аугментаций для одиночного облака.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PointCloudAugment {
    pub max_dropout_ratio: f32,
    pub scale_low: f32,
    pub scale_high: f32,
    pub shift_range: f32,
    pub angle_sigma: f32,
    pub angle_clip: f32,
    /// Поворот вокруг вертикальной оси
    pub rotate: bool,
    /// `(sigma, clip)` для jitter; в обучении по умолчанию выключен
    pub jitter: Option<(f32, f32)>,
}

impl Default for PointCloudAugment {
    fn default() -> Self {
        Self {
            max_dropout_ratio: 0.875,
            scale_low: 0.8,
            scale_high: 1.25,
            shift_range: 0.1,
            angle_sigma: 0.06,
            angle_clip: 0.18,
            rotate: true,
            jitter: None,
        }
    }
}

impl PointCloudAugment {
    /// Применяет dropout -> scale -> shift -> [jitter] -> perturbation -> rotate к облаку `[N, C]`.
    pub fn apply<R: Rng + ?Sized>(&self, pc: Array2<f32>, rng: &mut R) -> Result<Array2<f32>> {
        let mut batch = pc.insert_axis(Axis(0));
        batch = random_point_dropout(batch, self.max_dropout_ratio, rng)?;
        batch = random_scale_point_cloud(batch, self.scale_low, self.scale_high, rng)?;
        batch = shift_point_cloud(batch, self.shift_range, rng)?;
        if let Some((sigma, clip)) = self.jitter {
            batch = jitter_point_cloud(batch, sigma, clip, rng)?;
        }
        batch = rotate_perturbation_point_cloud(batch, self.angle_sigma, self.angle_clip, rng)?;
        if self.rotate {
            batch = rotate_point_cloud(batch, rng)?;
        }
        Ok(batch.index_axis_move(Axis(0), 0))
    }
}
