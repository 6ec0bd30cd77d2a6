// --- Файл: src/pointcloud/geometry.rs ---

//! Геометрические операции над одиночным облаком точек формы `[N, C]`.
//!
//! Первые три столбца всегда трактуются как координаты xyz, остальные
//! (нормали, высота) переносятся вместе с точкой.

use crate::error::{DataError, Result};
use ndarray::{concatenate, s, Array1, Array2, ArrayView2, Axis};
use rand::seq::SliceRandom;
use rand::Rng;

fn check_xyz(pc: &ArrayView2<f32>) -> Result<()> {
    if pc.ncols() < 3 {
        return Err(DataError::shape("[N, C>=3]", pc.shape()));
    }
    Ok(())
}

/// Центрирует облако в начале координат и масштабирует в единичную сферу.
///
/// Центроид считается как среднее по точкам, делитель - максимальное
/// евклидово расстояние от центроида. Вырожденное облако (все точки
/// совпадают) возвращается только центрированным.
pub fn pc_normalize(pc: &ArrayView2<f32>) -> Result<Array2<f32>> {
    let centroid = pc
        .mean_axis(Axis(0))
        .ok_or_else(|| DataError::shape("[N>0, C]", pc.shape()))?;
    let centered = pc - &centroid;

    let max_radius = centered
        .rows()
        .into_iter()
        .map(|row| row.dot(&row).sqrt())
        .fold(0.0_f32, f32::max);

    if max_radius > 0.0 {
        Ok(centered / max_radius)
    } else {
        Ok(centered)
    }
}

/// Нормализует только xyz-столбцы, оставляя нормали и прочие каналы как есть.
pub fn pc_normalize_xyz(pc: &ArrayView2<f32>) -> Result<Array2<f32>> {
    check_xyz(pc)?;
    let xyz = pc_normalize(&pc.slice(s![.., 0..3]))?;
    let mut out = pc.to_owned();
    out.slice_mut(s![.., 0..3]).assign(&xyz);
    Ok(out)
}

/// Индексы точек, выбранных farthest point sampling, начиная с `start`.
///
/// На каждом шаге выбирается точка с наибольшим расстоянием до уже
/// выбранного множества. Если `npoint > N`, после исчерпания точек все
/// расстояния нулевые и выбор повторяет индекс 0.
pub fn farthest_point_indices(
    points: &ArrayView2<f32>,
    npoint: usize,
    start: usize,
) -> Result<Vec<usize>> {
    check_xyz(points)?;
    let n = points.nrows();
    if n == 0 {
        return Err(DataError::shape("[N>0, C]", points.shape()));
    }
    if start >= n {
        return Err(DataError::IndexOutOfRange { index: start, len: n });
    }

    let xyz = points.slice(s![.., 0..3]);
    let mut distance = Array1::<f32>::from_elem(n, 1e10);
    let mut centroids = Vec::with_capacity(npoint);
    let mut farthest = start;

    for _ in 0..npoint {
        centroids.push(farthest);
        let centroid = xyz.row(farthest);

        for (i, row) in xyz.rows().into_iter().enumerate() {
            let diff = &row - &centroid;
            let dist = diff.dot(&diff);
            if dist < distance[i] {
                distance[i] = dist;
            }
        }

        // argmax берет первый максимум, как и в numpy
        farthest = distance
            .iter()
            .enumerate()
            .fold((0, f32::NEG_INFINITY), |(best_i, best), (i, &d)| {
                if d > best {
                    (i, d)
                } else {
                    (best_i, best)
                }
            })
            .0;
    }

    Ok(centroids)
}

/// Farthest point sampling со случайной стартовой точкой.
///
/// Возвращает ровно `npoint` строк со всеми столбцами исходного облака.
pub fn farthest_point_sample<R: Rng + ?Sized>(
    points: &ArrayView2<f32>,
    npoint: usize,
    rng: &mut R,
) -> Result<Array2<f32>> {
    if points.nrows() == 0 {
        return Err(DataError::shape("[N>0, C]", points.shape()));
    }
    let start = rng.random_range(0..points.nrows());
    let indices = farthest_point_indices(points, npoint, start)?;
    Ok(points.select(Axis(0), &indices))
}

/// Случайная выборка `num` точек из первых `num` строк облака.
pub fn random_sample<R: Rng + ?Sized>(
    pc: &ArrayView2<f32>,
    num: usize,
    rng: &mut R,
) -> Result<Array2<f32>> {
    if pc.nrows() < num {
        return Err(DataError::shape(format!("[N>={}, C]", num), pc.shape()));
    }
    let mut permutation: Vec<usize> = (0..num).collect();
    permutation.shuffle(rng);
    Ok(pc.select(Axis(0), &permutation))
}

/// Перемешивает порядок точек.
pub fn shuffle_points<R: Rng + ?Sized>(pc: &ArrayView2<f32>, rng: &mut R) -> Array2<f32> {
    let mut idx: Vec<usize> = (0..pc.nrows()).collect();
    idx.shuffle(rng);
    pc.select(Axis(0), &idx)
}

/// Добавляет столбец высоты: `pc[:, g] - min(pc[:, g])`.
pub fn append_height(pc: &ArrayView2<f32>, gravity_dim: usize) -> Result<Array2<f32>> {
    if gravity_dim >= pc.ncols() || pc.nrows() == 0 {
        return Err(DataError::shape(
            format!("[N>0, C>{}]", gravity_dim),
            pc.shape(),
        ));
    }
    let axis = pc.slice(s![.., gravity_dim..gravity_dim + 1]);
    let min = axis.iter().cloned().fold(f32::INFINITY, f32::min);
    let height = axis.mapv(|v| v - min);
    concatenate(Axis(1), &[pc.view(), height.view()])
        .map_err(|e| DataError::InvalidArgument(e.to_string()))
}
