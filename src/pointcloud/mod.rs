// --- Файл: src/pointcloud/mod.rs ---

//! # Облака точек
//!
//! Геометрия, аугментации и чтение облаков точек.
//!
//! - [`geometry`]: нормализация, farthest point sampling, выборки, столбец высоты
//! - [`augment`]: dropout, масштаб, сдвиг, jitter, повороты и их цепочка
//! - [`io`]: чтение `.npy` и текстовых файлов ModelNet

pub mod augment;
pub mod geometry;
pub mod io;

pub use augment::{
    jitter_point_cloud, random_point_dropout, random_scale_point_cloud,
    rotate_perturbation_point_cloud, rotate_point_cloud, shift_point_cloud, PointCloudAugment,
};
pub use geometry::{
    append_height, farthest_point_indices, farthest_point_sample, pc_normalize,
    pc_normalize_xyz, random_sample, shuffle_points,
};
pub use io::load_point_cloud;
