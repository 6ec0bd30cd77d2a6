// --- Файл: src/config/mod.rs ---

//! Конфигурация датасетов.
//!
//! - [`merge`]: слияние YAML с `_base_`
//! - [`DataPaths`]: корневые директории данных (переменные окружения)
//! - [`DatasetConfig`]: типизированное представление слитой конфигурации

pub mod merge;

pub use merge::{cfg_from_yaml_file, merge_new_config};

use crate::error::{DataError, Result};
use serde::{Deserialize, Serialize};
use serde_yaml::Mapping;
use std::path::PathBuf;

/// Корневые директории данных.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataPaths {
    /// Корень всех облаков точек (`PC_DATA_DIR`)
    pub pc_data_dir: PathBuf,
    /// YAML-конфиги датасетов и `templates.json` (`PC_META_DATA_DIR`)
    pub meta_data_dir: PathBuf,
    /// Бакеты Objaverse, если `DATA_PATH` не задан (`OBJAVERSE_DATA_DIR`)
    pub objaverse_data_dir: PathBuf,
}

impl Default for DataPaths {
    fn default() -> Self {
        Self {
            pc_data_dir: PathBuf::from("data/pc"),
            meta_data_dir: PathBuf::from("data/pc_meta"),
            objaverse_data_dir: PathBuf::from("data/objaverse"),
        }
    }
}

impl DataPaths {
    /// Читает пути из окружения, для отсутствующих переменных берет значения по умолчанию.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let var = |name: &str, fallback: PathBuf| {
            std::env::var_os(name).map(PathBuf::from).unwrap_or(fallback)
        };
        Self {
            pc_data_dir: var("PC_DATA_DIR", defaults.pc_data_dir),
            meta_data_dir: var("PC_META_DATA_DIR", defaults.meta_data_dir),
            objaverse_data_dir: var("OBJAVERSE_DATA_DIR", defaults.objaverse_data_dir),
        }
    }
}

/// Конфигурация одного датасета после слияния YAML и параметров запуска.
///
/// Ключи в верхнем регистре приходят из YAML, в нижнем - подставляются при сборке.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetConfig {
    #[serde(rename = "NAME")]
    pub name: String,
    #[serde(rename = "DATA_PATH", default)]
    pub data_path: Option<PathBuf>,
    #[serde(rename = "PC_PATH", default)]
    pub pc_path: Option<PathBuf>,
    #[serde(rename = "IMAGE_PATH", default)]
    pub image_path: Option<PathBuf>,
    #[serde(rename = "N_POINTS", default)]
    pub n_points: Option<usize>,
    #[serde(rename = "NUM_CATEGORY", default = "default_num_category")]
    pub num_category: usize,
    #[serde(rename = "USE_NORMALS", default)]
    pub use_normals: bool,

    #[serde(default)]
    pub subset: Option<String>,
    #[serde(default)]
    pub whole: bool,
    #[serde(default)]
    pub npoints: Option<usize>,
    #[serde(default)]
    pub use_height: bool,
    #[serde(default)]
    pub train_data_prompt: Option<String>,
    #[serde(default)]
    pub val_data_prompt: Option<String>,
}

fn default_num_category() -> usize {
    40
}

impl DatasetConfig {
    /// Типизирует слитую конфигурацию.
    pub fn from_mapping(mapping: Mapping) -> Result<Self> {
        serde_yaml::from_value(serde_yaml::Value::Mapping(mapping))
            .map_err(|e| DataError::Config(e.to_string()))
    }

    /// Число точек: параметр запуска важнее `N_POINTS` из YAML.
    pub fn num_points(&self) -> Result<usize> {
        self.npoints
            .or(self.n_points)
            .ok_or_else(|| DataError::Config(format!("{}: npoints is not set", self.name)))
    }

    pub fn subset(&self) -> Result<&str> {
        self.subset
            .as_deref()
            .ok_or_else(|| DataError::Config(format!("{}: subset is not set", self.name)))
    }

    pub fn require_data_path(&self) -> Result<&PathBuf> {
        self.data_path
            .as_ref()
            .ok_or_else(|| DataError::Config(format!("{}: DATA_PATH is not set", self.name)))
    }
}
