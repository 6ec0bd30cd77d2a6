// --- Файл: src/datasets/mod.rs ---

//! # Датасеты 3D
//!
//! Адаптеры четырех наборов данных и сборка датасета по имени из каталога.
//!
//! - [`ModelNet`]: ModelNet10/40, облако + метка класса
//! - [`Objaverse`]: облако + рендер + подпись из бакетов ключ-значение
//! - [`ScanObjectNN`]: реальные сканы, облако + токенизированное имя класса
//! - [`ShapeNet`]: облако + рендер + подпись по шаблону
//!
//! ## Пример
//!
//! ```rust,ignore
//! let dataset = build_3d_dataset(&args, DatasetType::Train, &DataPaths::from_env(), tokenizer, transform)?;
//! let loader = DataLoader::new(dataset, 32).shuffle(true);
//! ```

pub mod modelnet;
pub mod objaverse;
pub mod scanobjectnn;
pub mod shapenet;

pub use modelnet::{ModelNet, ModelNetConfig};
pub use objaverse::Objaverse;
pub use scanobjectnn::ScanObjectNN;
pub use shapenet::{ShapeNet, ShapeNetConfig};

use crate::config::{cfg_from_yaml_file, merge_new_config, DataPaths, DatasetConfig};
use crate::data::Dataset;
use crate::error::{DataError, Result};
use crate::text::CaptionTokenizer;
use crate::vision::ImageTransform;
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Сколько раз ShapeNet пробует другой индекс при нечитаемом рендере.
pub const DEFAULT_MAX_RETRIES: usize = 10;

/// Сплит датасета.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Split {
    Train,
    Test,
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Split::Train => write!(f, "train"),
            Split::Test => write!(f, "test"),
        }
    }
}

impl FromStr for Split {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "train" => Ok(Split::Train),
            "test" => Ok(Split::Test),
            other => Err(DataError::Config(format!("unknown split '{other}'"))),
        }
    }
}

/// Для чего строится датасет.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatasetType {
    Train,
    Val,
}

/// Датасеты из каталога.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DatasetKind {
    ShapeNet,
    ModelNet40,
    Objaverse,
    ScanObjectNN,
}

/// Запись каталога: файл конфигурации и сплиты.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogEntry {
    /// YAML в директории метаданных
    pub config_file: &'static str,
    pub train: Option<Split>,
    pub test: Split,
    /// Какой сплит используется при сборке
    pub usage: Split,
}

impl CatalogEntry {
    pub fn split(&self) -> Split {
        match self.usage {
            Split::Train => self.train.unwrap_or(self.test),
            Split::Test => self.test,
        }
    }
}

impl DatasetKind {
    pub const ALL: [DatasetKind; 4] = [
        DatasetKind::ShapeNet,
        DatasetKind::ModelNet40,
        DatasetKind::Objaverse,
        DatasetKind::ScanObjectNN,
    ];

    pub fn catalog(self) -> CatalogEntry {
        match self {
            DatasetKind::ShapeNet => CatalogEntry {
                config_file: "ShapeNet-55.yaml",
                train: Some(Split::Train),
                test: Split::Test,
                usage: Split::Train,
            },
            DatasetKind::ModelNet40 => CatalogEntry {
                config_file: "ModelNet40.yaml",
                train: Some(Split::Train),
                test: Split::Test,
                usage: Split::Test,
            },
            DatasetKind::Objaverse => CatalogEntry {
                config_file: "Objverse.yaml",
                train: Some(Split::Train),
                test: Split::Test,
                usage: Split::Train,
            },
            DatasetKind::ScanObjectNN => CatalogEntry {
                config_file: "ScanObjectNN.yaml",
                train: None,
                test: Split::Test,
                usage: Split::Test,
            },
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DatasetKind::ShapeNet => "shapenet",
            DatasetKind::ModelNet40 => "modelnet40",
            DatasetKind::Objaverse => "objverse",
            DatasetKind::ScanObjectNN => "scanobjectnn",
        }
    }
}

impl fmt::Display for DatasetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DatasetKind {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "shapenet" => Ok(DatasetKind::ShapeNet),
            "modelnet40" => Ok(DatasetKind::ModelNet40),
            "objverse" | "objaverse" => Ok(DatasetKind::Objaverse),
            "scanobjectnn" => Ok(DatasetKind::ScanObjectNN),
            other => Err(DataError::Config(format!("unknown dataset '{other}'"))),
        }
    }
}

/// Параметры запуска, влияющие на сборку датасетов.
#[derive(Debug, Clone)]
pub struct DataArgs {
    pub train_data: DatasetKind,
    pub val_data: DatasetKind,
    pub train_data_prompt: String,
    pub val_data_prompt: String,
    pub pc_npoints: usize,
}

fn key(name: &str) -> Value {
    Value::String(name.to_string())
}

/// Поднимает содержимое `_base_` на верхний уровень; остальные ключи его перекрывают.
fn flatten_base(mut mapping: Mapping) -> Result<Mapping> {
    match mapping.remove("_base_") {
        Some(Value::Mapping(mut base)) => {
            merge_new_config(&mut base, mapping)?;
            Ok(base)
        }
        _ => Ok(mapping),
    }
}

/// Конфигурация датасета из каталога с подставленными параметрами запуска.
pub fn load_dataset_config(
    args: &DataArgs,
    kind: DatasetKind,
    paths: &DataPaths,
) -> Result<DatasetConfig> {
    let entry = kind.catalog();
    let mut mapping = flatten_base(cfg_from_yaml_file(
        &paths.meta_data_dir.join(entry.config_file),
    )?)?;

    let mut runtime = Mapping::new();
    runtime.insert(key("train_data_prompt"), key(&args.train_data_prompt));
    runtime.insert(key("val_data_prompt"), key(&args.val_data_prompt));
    runtime.insert(key("use_height"), Value::Bool(false));
    runtime.insert(key("npoints"), Value::from(args.pc_npoints as u64));
    runtime.insert(key("subset"), key(&entry.split().to_string()));
    runtime.insert(key("whole"), Value::Bool(true));
    merge_new_config(&mut mapping, runtime)?;

    DatasetConfig::from_mapping(mapping)
}

/// Собирает датасет для обучения или валидации по каталогу.
pub fn build_3d_dataset(
    args: &DataArgs,
    dataset_type: DatasetType,
    paths: &DataPaths,
    tokenizer: Arc<dyn CaptionTokenizer>,
    transform: Arc<dyn ImageTransform>,
) -> Result<Box<dyn Dataset>> {
    let kind = match dataset_type {
        DatasetType::Train => args.train_data,
        DatasetType::Val => args.val_data,
    };
    let config = load_dataset_config(args, kind, paths)?;
    build_dataset_from_config(&config, paths, tokenizer, transform)
}

/// Создает адаптер, указанный в `NAME`.
pub fn build_dataset_from_config(
    config: &DatasetConfig,
    paths: &DataPaths,
    tokenizer: Arc<dyn CaptionTokenizer>,
    transform: Arc<dyn ImageTransform>,
) -> Result<Box<dyn Dataset>> {
    let subset: Split = config.subset()?.parse()?;

    match config.name.as_str() {
        "ModelNet" => {
            let mut modelnet = ModelNetConfig::new(
                paths.pc_data_dir.join(config.require_data_path()?),
                config.num_points()?,
                subset,
            );
            modelnet.use_normals = config.use_normals;
            modelnet.num_category = config.num_category;
            modelnet.use_height = config.use_height;
            Ok(Box::new(ModelNet::new(modelnet)?))
        }
        "ShapeNet" => {
            let require = |value: &Option<std::path::PathBuf>, key: &str| {
                value.clone().ok_or_else(|| {
                    DataError::Config(format!("{}: {key} is not set", config.name))
                })
            };
            let prompt = config
                .train_data_prompt
                .clone()
                .ok_or_else(|| DataError::Config("ShapeNet: train_data_prompt is not set".into()))?;
            let shapenet = ShapeNetConfig {
                data_root: paths.pc_data_dir.join(config.require_data_path()?),
                pc_path: paths.pc_data_dir.join(require(&config.pc_path, "PC_PATH")?),
                image_path: paths.pc_data_dir.join(require(&config.image_path, "IMAGE_PATH")?),
                templates_path: paths.meta_data_dir.join("templates.json"),
                prompt,
                subset,
                npoints: config.num_points()?,
                whole: config.whole,
                use_height: config.use_height,
                max_retries: DEFAULT_MAX_RETRIES,
            };
            Ok(Box::new(ShapeNet::new(shapenet, tokenizer, transform)?))
        }
        "Objverse" | "Objaverse" => {
            let root = config
                .data_path
                .as_ref()
                .map(|p| paths.pc_data_dir.join(p))
                .unwrap_or_else(|| paths.objaverse_data_dir.clone());
            open_objaverse(&root, tokenizer, transform)
        }
        "ScanObjectNN" => {
            let root = paths.pc_data_dir.join(config.require_data_path()?);
            open_scanobjectnn(&root, tokenizer)
        }
        other => Err(DataError::Config(format!("unknown dataset NAME '{other}'"))),
    }
}

#[cfg(feature = "lmdb")]
fn open_objaverse(
    root: &std::path::Path,
    tokenizer: Arc<dyn CaptionTokenizer>,
    transform: Arc<dyn ImageTransform>,
) -> Result<Box<dyn Dataset>> {
    Ok(Box::new(Objaverse::open(root, tokenizer, transform)?))
}

#[cfg(not(feature = "lmdb"))]
fn open_objaverse(
    root: &std::path::Path,
    _tokenizer: Arc<dyn CaptionTokenizer>,
    _transform: Arc<dyn ImageTransform>,
) -> Result<Box<dyn Dataset>> {
    Err(DataError::Config(format!(
        "{}: Objaverse buckets need the `lmdb` feature",
        root.display()
    )))
}

#[cfg(feature = "hdf5")]
fn open_scanobjectnn(
    root: &std::path::Path,
    tokenizer: Arc<dyn CaptionTokenizer>,
) -> Result<Box<dyn Dataset>> {
    Ok(Box::new(ScanObjectNN::open(root, tokenizer)?))
}

#[cfg(not(feature = "hdf5"))]
fn open_scanobjectnn(
    root: &std::path::Path,
    _tokenizer: Arc<dyn CaptionTokenizer>,
) -> Result<Box<dyn Dataset>> {
    Err(DataError::Config(format!(
        "{}: ScanObjectNN files need the `hdf5` feature",
        root.display()
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_usage() {
        assert_eq!(DatasetKind::ShapeNet.catalog().split(), Split::Train);
        assert_eq!(DatasetKind::ModelNet40.catalog().split(), Split::Test);
        assert_eq!(DatasetKind::Objaverse.catalog().split(), Split::Train);
        assert_eq!(DatasetKind::ScanObjectNN.catalog().split(), Split::Test);
        assert!(DatasetKind::ScanObjectNN.catalog().train.is_none());
    }

    #[test]
    fn test_kind_names() {
        for kind in DatasetKind::ALL {
            assert_eq!(kind.as_str().parse::<DatasetKind>().unwrap(), kind);
        }
        assert_eq!("Objaverse".parse::<DatasetKind>().unwrap(), DatasetKind::Objaverse);
        assert!("kitti".parse::<DatasetKind>().is_err());
        assert!("val".parse::<Split>().is_err());
    }

    #[test]
    fn test_flatten_base() {
        let mapping: Mapping =
            serde_yaml::from_str("_base_:\n  NAME: ModelNet\n  N_POINTS: 8192\nN_POINTS: 1024\n")
                .unwrap();
        let flat = flatten_base(mapping).unwrap();
        assert_eq!(flat["NAME"].as_str(), Some("ModelNet"));
        assert_eq!(flat["N_POINTS"].as_u64(), Some(1024));
        assert!(flat.get("_base_").is_none());
    }

    #[test]
    fn test_load_dataset_config_injects_runtime_keys() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("ModelNet40.yaml"),
            "NAME: ModelNet\nDATA_PATH: modelnet40_normal_resampled\nN_POINTS: 8192\nNUM_CATEGORY: 40\nUSE_NORMALS: false\n",
        )
        .unwrap();
        let paths = DataPaths {
            pc_data_dir: dir.path().to_path_buf(),
            meta_data_dir: dir.path().to_path_buf(),
            objaverse_data_dir: dir.path().to_path_buf(),
        };
        let args = DataArgs {
            train_data: DatasetKind::ShapeNet,
            val_data: DatasetKind::ModelNet40,
            train_data_prompt: "shapenet_64".into(),
            val_data_prompt: "modelnet40_64".into(),
            pc_npoints: 2048,
        };

        let config = load_dataset_config(&args, DatasetKind::ModelNet40, &paths).unwrap();
        assert_eq!(config.name, "ModelNet");
        assert_eq!(config.num_points().unwrap(), 2048);
        assert_eq!(config.subset().unwrap(), "test");
        assert!(config.whole);
        assert!(!config.use_height);
        assert_eq!(config.val_data_prompt.as_deref(), Some("modelnet40_64"));
    }
}
