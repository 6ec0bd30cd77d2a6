// --- Файл: src/datasets/modelnet.rs ---

//! ModelNet10/40: облака точек с метками классов.

use super::Split;
use crate::data::dataset::check_index;
use crate::data::{Dataset, Sample};
use crate::error::{DataError, Result};
use crate::pointcloud::geometry::{
    append_height, farthest_point_sample, pc_normalize_xyz, shuffle_points,
};
use crate::pointcloud::io::load_txt;
use log::info;
use ndarray::{s, Array2};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

const LOGGER: &str = "ModelNet";

/// Число точек в полном предобработанном кэше.
pub const FULL_CACHE_POINTS: usize = 8192;

/// Параметры ModelNet.
#[derive(Debug, Clone)]
pub struct ModelNetConfig {
    pub root: PathBuf,
    pub npoints: usize,
    pub use_normals: bool,
    /// 10 или 40
    pub num_category: usize,
    pub subset: Split,
    pub use_height: bool,
    /// Читать предобработанный кэш вместо сырых `.txt`
    pub process_data: bool,
    /// Сэмплировать FPS (иначе первые `npoints` точек)
    pub uniform: bool,
    /// Строить кэш из сырых файлов, если его нет
    pub generate_from_raw: bool,
}

impl ModelNetConfig {
    pub fn new(root: impl Into<PathBuf>, npoints: usize, subset: Split) -> Self {
        Self {
            root: root.into(),
            npoints,
            use_normals: false,
            num_category: 40,
            subset,
            use_height: false,
            process_data: true,
            uniform: true,
            generate_from_raw: false,
        }
    }

    /// Путь к кэшу `modelnet{C}_{split}_{N}pts[_fps].dat`.
    pub fn cache_path(&self, npoints: usize) -> PathBuf {
        let suffix = if self.uniform { "_fps" } else { "" };
        self.root.join(format!(
            "modelnet{}_{}_{}pts{}.dat",
            self.num_category, self.subset, npoints, suffix
        ))
    }

    /// Полный кэш `modelnet{C}_{split}_8192pts_fps.dat`; всегда с FPS.
    pub fn full_cache_path(&self) -> PathBuf {
        self.root.join(format!(
            "modelnet{}_{}_{}pts_fps.dat",
            self.num_category, self.subset, FULL_CACHE_POINTS
        ))
    }
}

/// Содержимое кэша: облака и метки в порядке списка сплита.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessedSplit {
    pub points: Vec<Array2<f32>>,
    pub labels: Vec<i32>,
}

impl ProcessedSplit {
    /// Читает кэш; число облаков обязано совпадать с числом меток.
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| DataError::io(path, e))?;
        let split: Self = bincode::deserialize_from(BufReader::new(file))?;
        if split.points.len() != split.labels.len() {
            return Err(DataError::Config(format!(
                "{}: {} point clouds but {} labels",
                path.display(),
                split.points.len(),
                split.labels.len()
            )));
        }
        Ok(split)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let file = File::create(path).map_err(|e| DataError::io(path, e))?;
        bincode::serialize_into(BufWriter::new(file), self)?;
        Ok(())
    }
}

fn read_lines(path: &Path) -> Result<Vec<String>> {
    let text = std::fs::read_to_string(path).map_err(|e| DataError::io(path, e))?;
    Ok(text
        .lines()
        .map(|l| l.trim_end().to_string())
        .filter(|l| !l.is_empty())
        .collect())
}

/// Имя класса из id формы: `night_stand_0001` -> `night_stand`.
fn shape_class(shape_id: &str) -> &str {
    shape_id.rsplit_once('_').map(|(name, _)| name).unwrap_or(shape_id)
}

pub struct ModelNet {
    config: ModelNetConfig,
    shape_names: Vec<String>,
    classes: HashMap<String, usize>,
    /// (класс, путь к сырому файлу)
    datapath: Vec<(String, PathBuf)>,
    cache: Option<ProcessedSplit>,
}

impl ModelNet {
    pub fn new(config: ModelNetConfig) -> Result<Self> {
        if config.num_category != 10 && config.num_category != 40 {
            return Err(DataError::Config(format!(
                "ModelNet supports 10 or 40 categories, got {}",
                config.num_category
            )));
        }
        let prefix = format!("modelnet{}", config.num_category);
        let shape_names = read_lines(&config.root.join(format!("{prefix}_shape_names.txt")))?;
        let classes = shape_names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect();

        let shape_ids = read_lines(&config.root.join(format!("{prefix}_{}.txt", config.subset)))?;
        let datapath: Vec<(String, PathBuf)> = shape_ids
            .iter()
            .map(|id| {
                let class = shape_class(id).to_string();
                let path = config.root.join(&class).join(format!("{id}.txt"));
                (class, path)
            })
            .collect();
        info!(target: LOGGER, "The size of {} data is {}", config.subset, datapath.len());

        let mut dataset = Self {
            config,
            shape_names,
            classes,
            datapath,
            cache: None,
        };
        if dataset.config.process_data {
            dataset.cache = Some(dataset.load_or_build_cache()?);
        }
        Ok(dataset)
    }

    fn load_or_build_cache(&self) -> Result<ProcessedSplit> {
        let save_path = self.config.cache_path(self.config.npoints);
        if save_path.exists() {
            info!(target: LOGGER, "Load processed data from {}...", save_path.display());
            return ProcessedSplit::load(&save_path);
        }

        if self.config.generate_from_raw {
            info!(
                target: LOGGER,
                "Processing data {} (only running in the first time)...",
                save_path.display()
            );
            let processed = self.process_raw()?;
            processed.save(&save_path)?;
            return Ok(processed);
        }

        let full_path = self.config.full_cache_path();
        info!(
            target: LOGGER,
            "No {}-point cache found, loading {} and sampling {} points on access",
            self.config.npoints,
            full_path.display(),
            self.config.npoints
        );
        ProcessedSplit::load(&full_path)
    }

    fn class_label(&self, class: &str) -> Result<usize> {
        self.classes
            .get(class)
            .copied()
            .ok_or_else(|| DataError::Config(format!("unknown ModelNet class '{class}'")))
    }

    /// Читает сырой файл и сокращает его до `npoints` точек.
    fn load_raw(&self, index: usize, rng: &mut StdRng) -> Result<(Array2<f32>, usize)> {
        let (class, path) = &self.datapath[index];
        let label = self.class_label(class)?;
        let points = load_txt(path)?;
        let points = if self.config.uniform {
            farthest_point_sample(&points.view(), self.config.npoints, rng)?
        } else {
            let n = self.config.npoints.min(points.nrows());
            points.slice(s![0..n, ..]).to_owned()
        };
        Ok((points, label))
    }

    fn process_raw(&self) -> Result<ProcessedSplit> {
        let processed = (0..self.datapath.len())
            .into_par_iter()
            .map(|index| {
                let mut rng = StdRng::seed_from_u64(index as u64);
                self.load_raw(index, &mut rng)
            })
            .collect::<Result<Vec<_>>>()?;
        info!(
            target: LOGGER,
            "uniformly sampled out {} points for {} shapes",
            self.config.npoints,
            processed.len()
        );

        let (points, labels) = processed
            .into_iter()
            .map(|(p, l)| (p, l as i32))
            .unzip();
        Ok(ProcessedSplit { points, labels })
    }

    pub fn shape_names(&self) -> &[String] {
        &self.shape_names
    }

    pub fn config(&self) -> &ModelNetConfig {
        &self.config
    }
}

impl Dataset for ModelNet {
    fn len(&self) -> usize {
        match &self.cache {
            Some(cache) => cache.labels.len(),
            None => self.datapath.len(),
        }
    }

    fn name(&self) -> &str {
        LOGGER
    }

    fn get_with_rng(&self, index: usize, rng: &mut StdRng) -> Result<Sample> {
        check_index(index, self.len())?;

        let (mut points, label) = match &self.cache {
            Some(cache) => {
                let label = usize::try_from(cache.labels[index]).map_err(|_| {
                    DataError::Config(format!("negative label at {index}"))
                })?;
                let points = cache.points.get(index).ok_or(DataError::IndexOutOfRange {
                    index,
                    len: cache.points.len(),
                })?;
                (points.clone(), label)
            }
            None => self.load_raw(index, rng)?,
        };

        if self.config.npoints < points.nrows() {
            points = farthest_point_sample(&points.view(), self.config.npoints, rng)?;
        }
        points = pc_normalize_xyz(&points.view())?;
        if !self.config.use_normals {
            points = points.slice(s![.., 0..3]).to_owned();
        }
        if self.config.use_height {
            points = append_height(&points.view(), 1)?;
        }
        if self.config.subset == Split::Train {
            points = shuffle_points(&points.view(), rng);
        }

        let class_name = self
            .shape_names
            .get(label)
            .ok_or(DataError::IndexOutOfRange {
                index: label,
                len: self.shape_names.len(),
            })?
            .clone();

        Ok(Sample::new()
            .with("pc", points)
            .with("label", label as i64)
            .with("class_name", class_name))
    }
}
