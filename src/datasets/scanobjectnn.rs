// --- Файл: src/datasets/scanobjectnn.rs ---

//! ScanObjectNN: реальные сканы объектов, только тестовые сплиты.

use crate::data::dataset::check_index;
use crate::data::{Dataset, Sample};
use crate::error::{DataError, Result};
use crate::pointcloud::pc_normalize;
use crate::text::CaptionTokenizer;
use ndarray::{Array3, Axis};
use rand::rngs::StdRng;
use std::sync::Arc;

const LOGGER: &str = "ScanObjectNN";

pub const TEST_SET_NAME: &str = "test_objectdataset_augmented25rot.h5";

pub const SPLITS: [&str; 5] = [
    "main_split_nobg",
    "split1_nobg",
    "split2_nobg",
    "split3_nobg",
    "split4_nobg",
];

pub const SEMANTIC_CLASSES: [&str; 15] = [
    "bag", "bed", "bin", "box", "cabinets", "chair", "desk", "display", "door", "pillow", "shelf",
    "sink", "sofa", "table", "toilet",
];

pub struct ScanObjectNN {
    /// `[M, N, 3]`
    data: Array3<f32>,
    labels: Vec<usize>,
    tokenizer: Arc<dyn CaptionTokenizer>,
}

impl ScanObjectNN {
    /// Датасет из уже загруженных облаков `[M, N, 3]` и меток.
    pub fn from_arrays(
        data: Array3<f32>,
        labels: Vec<usize>,
        tokenizer: Arc<dyn CaptionTokenizer>,
    ) -> Result<Self> {
        if data.len_of(Axis(0)) != labels.len() {
            return Err(DataError::InvalidArgument(format!(
                "{} clouds but {} labels",
                data.len_of(Axis(0)),
                labels.len()
            )));
        }
        if let Some(&bad) = labels.iter().find(|&&l| l >= SEMANTIC_CLASSES.len()) {
            return Err(DataError::IndexOutOfRange {
                index: bad,
                len: SEMANTIC_CLASSES.len(),
            });
        }
        Ok(Self {
            data,
            labels,
            tokenizer,
        })
    }

    /// Читает и склеивает все пять сплитов из `root/<split>/TEST_SET_NAME`.
    #[cfg(feature = "hdf5")]
    pub fn open(root: &std::path::Path, tokenizer: Arc<dyn CaptionTokenizer>) -> Result<Self> {
        let mut clouds = Vec::new();
        let mut labels = Vec::new();
        for split in SPLITS {
            let path = root.join(split).join(TEST_SET_NAME);
            let (data, label) = read_h5_split(&path)?;
            log::info!(
                target: LOGGER,
                "discovered {} entries from {}/{}",
                data.len_of(Axis(0)),
                root.display(),
                split
            );
            clouds.push(data);
            labels.extend(label);
        }
        let views: Vec<_> = clouds.iter().map(|c| c.view()).collect();
        let data = ndarray::concatenate(Axis(0), &views)
            .map_err(|e| DataError::InvalidArgument(e.to_string()))?;
        Self::from_arrays(data, labels, tokenizer)
    }

    pub fn label(&self, index: usize) -> Option<usize> {
        self.labels.get(index).copied()
    }
}

#[cfg(feature = "hdf5")]
fn read_h5_split(path: &std::path::Path) -> Result<(Array3<f32>, Vec<usize>)> {
    let h5_err = |e: hdf5::Error| DataError::Storage(format!("{}: {e}", path.display()));

    let file = hdf5::File::open(path).map_err(h5_err)?;
    let data = file.dataset("data").map_err(h5_err)?;
    let shape = data.shape();
    let raw: Vec<f32> = data.read_raw().map_err(h5_err)?;
    let data = match shape.as_slice() {
        &[m, n, c] => Array3::from_shape_vec((m, n, c), raw)
            .map_err(|e| DataError::InvalidArgument(e.to_string()))?,
        other => return Err(DataError::shape("[M, N, 3]", other)),
    };

    let raw_labels: Vec<i64> = file
        .dataset("label")
        .and_then(|d| d.read_raw())
        .map_err(h5_err)?;
    let labels = raw_labels
        .into_iter()
        .map(|l| {
            usize::try_from(l)
                .map_err(|_| DataError::InvalidArgument(format!("negative label {l}")))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok((data, labels))
}

impl Dataset for ScanObjectNN {
    fn len(&self) -> usize {
        self.labels.len()
    }

    fn name(&self) -> &str {
        LOGGER
    }

    fn get_with_rng(&self, index: usize, _rng: &mut StdRng) -> Result<Sample> {
        check_index(index, self.len())?;
        let label = self.labels[index];
        let class_name = SEMANTIC_CLASSES[label];

        let points = pc_normalize(&self.data.index_axis(Axis(0), index))?;
        let caption = self.tokenizer.tokenize(class_name)?;

        Ok(Sample::new()
            .with("pc", points)
            .with("caption", caption)
            .with("label", label as i64)
            .with("class_name", class_name))
    }
}
