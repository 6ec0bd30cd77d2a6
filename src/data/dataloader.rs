// --- Файл: src/data/dataloader.rs ---

//! DataLoader - итератор по батчам данных.

use super::collate::{CollateFn, DefaultCollate};
use super::dataset::Dataset;
use super::sample::{Sample, Value};
use super::sampler::{BatchSampler, RandomSampler, Sampler, SequentialSampler};
use crate::error::{DataError, Result};
use log::warn;
use ndarray::ArrayD;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use std::collections::BTreeMap;

/// Собранный батч: поля и индексы образцов, из которых он построен.
#[derive(Debug, Clone)]
pub struct Batch {
    pub fields: BTreeMap<String, Value>,
    /// Индексы образцов, попавших в батч (без отброшенных)
    pub indices: Vec<usize>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// f32-тензор поля (например `pc` формы `[B, N, C]`).
    pub fn tensor(&self, key: &str) -> Option<&ArrayD<f32>> {
        self.get(key).and_then(Value::as_tensor)
    }

    /// i64-тензор поля (например `caption` формы `[B, L]`).
    pub fn long_tensor(&self, key: &str) -> Option<&ArrayD<i64>> {
        self.get(key).and_then(Value::as_long_tensor)
    }
}

/// DataLoader - удобный интерфейс для итерации по датасету батчами.
///
/// # Пример
///
/// ```rust,ignore
/// let loader = DataLoader::new(dataset, 32)
///     .shuffle(true)
///     .seed(0)
///     .skip_failed(true);
///
/// for batch in loader.iter() {
///     let batch = batch?;
///     println!("pc: {:?}", batch.tensor("pc").map(|t| t.shape()));
/// }
/// ```
pub struct DataLoader<D: Dataset> {
    dataset: D,
    batch_size: usize,
    shuffle: bool,
    drop_last: bool,
    seed: Option<u64>,
    epoch: u64,
    parallel: bool,
    skip_failed: bool,
    collate_fn: Box<dyn CollateFn>,
}

impl<D: Dataset> DataLoader<D> {
    /// Создает новый DataLoader.
    ///
    /// # Аргументы
    ///
    /// * `dataset` - Датасет для загрузки
    /// * `batch_size` - Размер батча
    pub fn new(dataset: D, batch_size: usize) -> Self {
        Self {
            dataset,
            batch_size: batch_size.max(1),
            shuffle: false,
            drop_last: false,
            seed: None,
            epoch: 0,
            parallel: false,
            skip_failed: false,
            collate_fn: Box::new(DefaultCollate),
        }
    }

    /// Включает/выключает перемешивание данных.
    pub fn shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
        self
    }

    /// Устанавливает, нужно ли отбрасывать последний неполный батч.
    pub fn drop_last(mut self, drop_last: bool) -> Self {
        self.drop_last = drop_last;
        self
    }

    /// Устанавливает seed: порядок и аугментации становятся воспроизводимыми.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Загружать примеры батча параллельно (rayon).
    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Пропускать примеры, которые не удалось загрузить, вместо ошибки батча.
    pub fn skip_failed(mut self, skip: bool) -> Self {
        self.skip_failed = skip;
        self
    }

    /// Устанавливает функцию сборки батча.
    pub fn collate_fn<C: CollateFn + 'static>(mut self, collate_fn: C) -> Self {
        self.collate_fn = Box::new(collate_fn);
        self
    }

    /// Устанавливает номер эпохи (влияет на порядок и seed примеров).
    pub fn set_epoch(&mut self, epoch: u64) {
        self.epoch = epoch;
    }

    /// Возвращает количество батчей за эпоху.
    pub fn num_batches(&self) -> usize {
        BatchSampler::num_batches(self.dataset.len(), self.batch_size, self.drop_last)
    }

    /// Возвращает размер датасета.
    pub fn len(&self) -> usize {
        self.dataset.len()
    }

    /// Проверяет, пуст ли датасет.
    pub fn is_empty(&self) -> bool {
        self.dataset.is_empty()
    }

    /// Возвращает размер батча.
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Возвращает ссылку на датасет.
    pub fn dataset(&self) -> &D {
        &self.dataset
    }

    /// Создает итератор по батчам текущей эпохи.
    pub fn iter(&self) -> DataLoaderIterator<'_, D> {
        let n = self.dataset.len();
        let sampler: Box<dyn Sampler> = match (self.shuffle, self.seed) {
            (true, Some(seed)) => Box::new(RandomSampler::with_seed(n, seed)),
            (true, None) => Box::new(RandomSampler::new(n)),
            (false, _) => Box::new(SequentialSampler::new(n)),
        };

        DataLoaderIterator {
            loader: self,
            batches: BatchSampler::new(sampler.as_ref(), self.epoch, self.batch_size, self.drop_last),
        }
    }

    /// Генератор для конкретного образца: при заданном seed зависит от (seed, эпоха, индекс).
    fn sample_rng(&self, index: usize) -> StdRng {
        match self.seed {
            Some(seed) => {
                let mixed = seed
                    ^ self.epoch.rotate_left(32)
                    ^ (index as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15);
                StdRng::seed_from_u64(mixed)
            }
            None => StdRng::from_rng(&mut rand::rng()),
        }
    }

    fn load_one(&self, index: usize) -> Result<Sample> {
        let mut rng = self.sample_rng(index);
        self.dataset.get_with_rng(index, &mut rng)
    }

    /// Загружает и собирает батч по списку индексов.
    pub fn load_batch(&self, indices: &[usize]) -> Result<Batch> {
        let loaded: Vec<(usize, Result<Sample>)> = if self.parallel {
            indices
                .par_iter()
                .map(|&i| (i, self.load_one(i)))
                .collect()
        } else {
            indices.iter().map(|&i| (i, self.load_one(i))).collect()
        };

        let mut samples = Vec::with_capacity(loaded.len());
        let mut kept = Vec::with_capacity(loaded.len());
        for (index, result) in loaded {
            match result {
                Ok(sample) => {
                    samples.push(sample);
                    kept.push(index);
                }
                Err(e) if self.skip_failed => {
                    warn!(
                        target: "DataLoader",
                        "dropping sample {index} from {}: {e}",
                        self.dataset.name()
                    );
                }
                Err(e) => return Err(e),
            }
        }

        if samples.is_empty() {
            return Err(DataError::Collate(format!(
                "all {} samples of the batch failed to load",
                indices.len()
            )));
        }

        Ok(Batch {
            fields: self.collate_fn.collate(samples)?,
            indices: kept,
        })
    }
}

/// Итератор по батчам данных.
pub struct DataLoaderIterator<'a, D: Dataset> {
    loader: &'a DataLoader<D>,
    batches: BatchSampler,
}

impl<'a, D: Dataset> Iterator for DataLoaderIterator<'a, D> {
    type Item = Result<Batch>;

    fn next(&mut self) -> Option<Self::Item> {
        let indices = self.batches.next()?;
        Some(self.loader.load_batch(&indices))
    }
}
