// --- Файл: src/datasets/shapenet.rs ---

//! ShapeNet-55: облако точек, рендер и подпись по названию синсета.

use super::Split;
use crate::data::dataset::check_index;
use crate::data::{Dataset, Sample};
use crate::error::{DataError, Result};
use crate::pointcloud::{
    append_height, farthest_point_sample, load_point_cloud, pc_normalize, random_sample,
    PointCloudAugment,
};
use crate::text::{random_caption, split_names, CaptionTokenizer, PromptTemplates};
use crate::vision::{load_rgb, ImageTransform};
use log::{info, warn};
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::Rng;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const LOGGER: &str = "ShapeNet-55";

/// Суффиксы рендеров: цветной и карта глубины.
pub const IMAGE_KINDS: [&str; 2] = ["", "_depth0001"];

/// Углы поворота камеры, для которых есть рендеры.
pub fn rotation_degrees() -> impl Iterator<Item = u32> {
    (0..360).step_by(12)
}

/// Параметры ShapeNet-55.
#[derive(Debug, Clone)]
pub struct ShapeNetConfig {
    /// Директория с `taxonomy.json` и списками `{subset}.txt`
    pub data_root: PathBuf,
    /// Директория с файлами облаков
    pub pc_path: PathBuf,
    /// Директория с рендерами
    pub image_path: PathBuf,
    /// Путь к `templates.json`
    pub templates_path: PathBuf,
    /// Имя набора шаблонов в `templates.json`
    pub prompt: String,
    pub subset: Split,
    pub npoints: usize,
    /// Добавить `test.txt` перед списком сплита
    pub whole: bool,
    pub use_height: bool,
    /// Сколько раз брать другой случайный индекс, если рендер не читается
    pub max_retries: usize,
}

#[derive(Debug, Clone, Deserialize)]
struct TaxonomyEntry {
    #[serde(rename = "synsetId")]
    synset_id: String,
    name: String,
}

/// Строка списка: `02691156-1a04e3eab45ca15dd86060f189eb133.npy`.
#[derive(Debug, Clone, PartialEq)]
pub struct ShapeEntry {
    pub taxonomy_id: String,
    pub model_id: String,
    pub file_path: String,
}

impl ShapeEntry {
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        let taxonomy_id = line.split('-').next().unwrap_or(line);
        let rest = line.get(taxonomy_id.len() + 1..).unwrap_or("");
        let model_id = rest.split('.').next().unwrap_or(rest);
        Some(Self {
            taxonomy_id: taxonomy_id.to_string(),
            model_id: model_id.to_string(),
            file_path: line.to_string(),
        })
    }

    /// `{root}/{tax}-{model}/{tax}-{model}_r_{deg:03}{kind}.png`
    pub fn image_path(&self, root: &Path, degree: u32, kind: &str) -> PathBuf {
        let stem = format!("{}-{}", self.taxonomy_id, self.model_id);
        root.join(&stem)
            .join(format!("{stem}_r_{degree:03}{kind}.png"))
    }
}

fn read_list(path: &Path) -> Result<Vec<ShapeEntry>> {
    info!(target: LOGGER, "[DATASET] Open file {}", path.display());
    let text = std::fs::read_to_string(path).map_err(|e| DataError::io(path, e))?;
    Ok(text.lines().filter_map(ShapeEntry::parse).collect())
}

pub struct ShapeNet {
    config: ShapeNetConfig,
    file_list: Vec<ShapeEntry>,
    synset_names: HashMap<String, Vec<String>>,
    templates: Vec<String>,
    tokenizer: Arc<dyn CaptionTokenizer>,
    transform: Arc<dyn ImageTransform>,
    augment: Option<PointCloudAugment>,
}

impl ShapeNet {
    pub fn new(
        config: ShapeNetConfig,
        tokenizer: Arc<dyn CaptionTokenizer>,
        transform: Arc<dyn ImageTransform>,
    ) -> Result<Self> {
        let taxonomy_path = config.data_root.join("taxonomy.json");
        let text = std::fs::read_to_string(&taxonomy_path)
            .map_err(|e| DataError::io(&taxonomy_path, e))?;
        let taxonomy: Vec<TaxonomyEntry> =
            serde_json::from_str(&text).map_err(|source| DataError::Json {
                path: taxonomy_path.clone(),
                source,
            })?;
        let synset_names = taxonomy
            .into_iter()
            .map(|entry| (entry.synset_id, split_names(&entry.name)))
            .collect();

        let templates = PromptTemplates::from_file(&config.templates_path)?
            .get(&config.prompt)?
            .to_vec();

        info!(target: LOGGER, "[DATASET] sample out {} points", config.npoints);
        let mut file_list = Vec::new();
        if config.whole {
            file_list.extend(read_list(&config.data_root.join("test.txt"))?);
        }
        file_list.extend(read_list(
            &config.data_root.join(format!("{}.txt", config.subset)),
        )?);
        info!(target: LOGGER, "[DATASET] {} instances were loaded", file_list.len());

        Ok(Self {
            config,
            file_list,
            synset_names,
            templates,
            tokenizer,
            transform,
            augment: Some(PointCloudAugment::default()),
        })
    }

    pub fn with_augment(mut self, augment: Option<PointCloudAugment>) -> Self {
        self.augment = augment;
        self
    }

    pub fn entries(&self) -> &[ShapeEntry] {
        &self.file_list
    }

    fn load_points(&self, entry: &ShapeEntry, rng: &mut StdRng) -> Result<Array2<f32>> {
        let raw = load_point_cloud(&self.config.pc_path.join(&entry.file_path))?;
        let sampled = if self.config.npoints < raw.nrows() {
            farthest_point_sample(&raw.view(), self.config.npoints, rng)?
        } else {
            random_sample(&raw.view(), self.config.npoints, rng)?
        };

        let mut points = pc_normalize(&sampled.view())?;
        if let Some(augment) = &self.augment {
            points = augment.apply(points, rng)?;
        }
        if self.config.use_height {
            points = append_height(&points.view(), 1)?;
        }
        Ok(points)
    }

    fn caption(&self, entry: &ShapeEntry, rng: &mut StdRng) -> Result<String> {
        let names = self.synset_names.get(&entry.taxonomy_id).ok_or_else(|| {
            DataError::Config(format!("synset {} is not in taxonomy.json", entry.taxonomy_id))
        })?;
        random_caption(names, &self.templates, rng)
    }

    fn pick_image(&self, entry: &ShapeEntry, rng: &mut StdRng) -> PathBuf {
        let degrees: Vec<u32> = rotation_degrees().collect();
        let degree = degrees.choose(rng).copied().unwrap_or(0);
        let kind = IMAGE_KINDS.choose(rng).copied().unwrap_or("");
        entry.image_path(&self.config.image_path, degree, kind)
    }
}

impl Dataset for ShapeNet {
    fn len(&self) -> usize {
        self.file_list.len()
    }

    fn name(&self) -> &str {
        LOGGER
    }

    fn get_with_rng(&self, index: usize, rng: &mut StdRng) -> Result<Sample> {
        check_index(index, self.len())?;

        let mut idx = index;
        for _ in 0..=self.config.max_retries {
            let entry = &self.file_list[idx];
            let points = self.load_points(entry, rng)?;
            let caption = self.tokenizer.tokenize(&self.caption(entry, rng)?)?;

            let image_path = self.pick_image(entry, rng);
            match load_rgb(&image_path).and_then(|image| self.transform.apply(image, rng)) {
                Ok(image) => {
                    return Ok(Sample::new()
                        .with("taxonomy_id", entry.taxonomy_id.as_str())
                        .with("model_id", entry.model_id.as_str())
                        .with("caption", caption)
                        .with("pc", points)
                        .with("image", image));
                }
                Err(e) => {
                    warn!(
                        target: LOGGER,
                        "image is corrupted: {} ({e})",
                        image_path.display()
                    );
                    idx = rng.random_range(0..self.file_list.len());
                }
            }
        }

        Err(DataError::RetriesExhausted {
            index,
            attempts: self.config.max_retries + 1,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_entry() {
        let entry = ShapeEntry::parse("02691156-1a04e3eab45ca15dd86060f189eb133.npy\n").unwrap();
        assert_eq!(entry.taxonomy_id, "02691156");
        assert_eq!(entry.model_id, "1a04e3eab45ca15dd86060f189eb133");
        assert_eq!(entry.file_path, "02691156-1a04e3eab45ca15dd86060f189eb133.npy");
        assert!(ShapeEntry::parse("   ").is_none());
    }

    #[test]
    fn test_image_path_format() {
        let entry = ShapeEntry::parse("03001627-abc.npy").unwrap();
        let path = entry.image_path(Path::new("/renders"), 12, "_depth0001");
        assert_eq!(
            path,
            PathBuf::from("/renders/03001627-abc/03001627-abc_r_012_depth0001.png")
        );
    }

    #[test]
    fn test_rotation_degrees() {
        let degrees: Vec<u32> = rotation_degrees().collect();
        assert_eq!(degrees.len(), 30);
        assert_eq!(degrees.first(), Some(&0));
        assert_eq!(degrees.last(), Some(&348));
    }
}
