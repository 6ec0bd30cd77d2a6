// --- Файл: src/pointcloud/io.rs ---

//! Чтение облаков точек с диска по расширению файла.

use crate::error::{DataError, Result};
use ndarray::{Array2, ArrayD, Ix2};
use ndarray_npy::ReadNpyExt;
use std::fs::File;
use std::path::Path;

/// Загружает облако `[N, C]` из `.npy` или `.txt` файла.
pub fn load_point_cloud(path: &Path) -> Result<Array2<f32>> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    match ext.as_str() {
        "npy" => load_npy(path),
        "txt" => load_txt(path),
        other => Err(DataError::InvalidArgument(format!(
            "unsupported point cloud extension: .{other} ({})",
            path.display()
        ))),
    }
}

/// Читает `.npy` с элементами f32 или f64.
pub fn load_npy(path: &Path) -> Result<Array2<f32>> {
    let open = || File::open(path).map_err(|e| DataError::io(path, e));

    let array: ArrayD<f32> = match ArrayD::<f32>::read_npy(open()?) {
        Ok(a) => a,
        Err(ndarray_npy::ReadNpyError::WrongDescriptor(_)) => {
            ArrayD::<f64>::read_npy(open()?)
                .map_err(|source| DataError::Npy {
                    path: path.to_path_buf(),
                    source,
                })?
                .mapv(|v| v as f32)
        }
        Err(source) => {
            return Err(DataError::Npy {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    let shape = array.shape().to_vec();
    array
        .into_dimensionality::<Ix2>()
        .map_err(|_| DataError::shape("[N, C]", &shape))
}

/// Читает текстовый формат ModelNet: строка на точку, значения через запятую.
pub fn load_txt(path: &Path) -> Result<Array2<f32>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|source| DataError::Csv {
            path: path.to_path_buf(),
            source,
        })?;

    let mut values = Vec::new();
    let mut cols = 0;
    let mut rows = 0;
    for (i, record) in reader.records().enumerate() {
        let record = record.map_err(|source| DataError::Csv {
            path: path.to_path_buf(),
            source,
        })?;
        if i == 0 {
            cols = record.len();
        } else if record.len() != cols {
            return Err(DataError::InvalidArgument(format!(
                "{}: row {i} has {} values, expected {cols}",
                path.display(),
                record.len()
            )));
        }
        for field in record.iter() {
            let v: f32 = field.parse().map_err(|_| {
                DataError::InvalidArgument(format!(
                    "{}: row {i}: cannot parse '{field}' as float",
                    path.display()
                ))
            })?;
            values.push(v);
        }
        rows += 1;
    }

    Array2::from_shape_vec((rows, cols), values)
        .map_err(|e| DataError::InvalidArgument(e.to_string()))
}
