//! # RustyCLIP3D: мультимодальные данные для контрастного обучения
//!
//! Загрузка троек (облако точек, изображение, подпись) из ShapeNet-55,
//! Objaverse, ModelNet40 и ScanObjectNN, аугментации облаков и сборка батчей.
//!
//! ## Пример
//!
//! ```no_run
//! use std::sync::Arc;
//! use rustyclip3d::config::DataPaths;
//! use rustyclip3d::data::DataLoader;
//! use rustyclip3d::datasets::{build_3d_dataset, DataArgs, DatasetKind, DatasetType};
//! use rustyclip3d::text::ClipTokenizer;
//! use rustyclip3d::vision::ClipImageTransform;
//!
//! # fn main() -> rustyclip3d::Result<()> {
//! let args = DataArgs {
//!     train_data: DatasetKind::ShapeNet,
//!     val_data: DatasetKind::ModelNet40,
//!     train_data_prompt: "shapenet_64".into(),
//!     val_data_prompt: "modelnet40_64".into(),
//!     pc_npoints: 8192,
//! };
//! let tokenizer = Arc::new(ClipTokenizer::from_file("tokenizer.json".as_ref())?);
//! let transform = Arc::new(ClipImageTransform::new(224, true));
//! let dataset = build_3d_dataset(&args, DatasetType::Train, &DataPaths::from_env(), tokenizer, transform)?;
//!
//! let loader = DataLoader::new(dataset, 32).shuffle(true).seed(0);
//! for batch in loader.iter() {
//!     let batch = batch?;
//!     let _pc = batch.tensor("pc"); // [32, 8192, 3]
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod data;
pub mod datasets;
pub mod error;
pub mod pointcloud;
pub mod storage;
pub mod text;
pub mod vision;

pub use error::{DataError, Result};
