// --- Файл: src/data/mod.rs ---

//! # Data Loading Module
//!
//! PyTorch-style Dataset и DataLoader для мультимодальных примеров.
//!
//! ## Key Components
//!
//! - [`Dataset`]: источник примеров по индексу
//! - [`Sample`] / [`Value`]: пример как словарь разнородных полей
//! - [`collate`]: сборка примеров в батч с ведущей осью батча
//! - [`DataLoader`]: итератор по батчам с перемешиванием и параллельной загрузкой
//! - [`Sampler`]: стратегии выбора индексов
//!
//! ## Example
//!
//! ```ignore
//! use rustyclip3d::data::DataLoader;
//!
//! let loader = DataLoader::new(dataset, 32).shuffle(true).seed(0);
//! for batch in loader.iter() {
//!     let batch = batch?;
//!     let pc = batch.tensor("pc").unwrap(); // [32, N, 3]
//! }
//! ```

pub mod collate;
pub mod dataloader;
pub mod dataset;
pub mod sample;
pub mod sampler;

pub use collate::{collate, collate_samples, CollateFn, DefaultCollate};
pub use dataloader::{Batch, DataLoader};
pub use dataset::{Dataset, SubsetDataset};
pub use sample::{Sample, Value};
pub use sampler::{BatchSampler, RandomSampler, Sampler, SequentialSampler};
