// --- Файл: src/data/dataset.rs ---

//! Определение трейта Dataset.

use super::sample::Sample;
use crate::error::{DataError, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;

/// Трейт для источников данных.
///
/// Каждый датасет должен уметь:
/// - Возвращать количество элементов
/// - Строить пример по индексу, используя переданный генератор случайных чисел
pub trait Dataset: Send + Sync {
    /// Возвращает количество элементов в датасете.
    fn len(&self) -> usize;

    /// Проверяет, пуст ли датасет.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Короткое имя датасета для логов.
    fn name(&self) -> &str;

    /// Строит пример по индексу.
    ///
    /// Вся случайность (аугментации, выбор изображения и подписи) берется из `rng`.
    fn get_with_rng(&self, index: usize, rng: &mut StdRng) -> Result<Sample>;

    /// Строит пример по индексу со случайным seed.
    fn get(&self, index: usize) -> Result<Sample> {
        let mut rng = StdRng::from_rng(&mut rand::rng());
        self.get_with_rng(index, &mut rng)
    }
}

impl<D: Dataset + ?Sized> Dataset for Box<D> {
    fn len(&self) -> usize {
        (**self).len()
    }

    fn name(&self) -> &str {
        (**self).name()
    }

    fn get_with_rng(&self, index: usize, rng: &mut StdRng) -> Result<Sample> {
        (**self).get_with_rng(index, rng)
    }
}

impl<D: Dataset + ?Sized> Dataset for Arc<D> {
    fn len(&self) -> usize {
        (**self).len()
    }

    fn name(&self) -> &str {
        (**self).name()
    }

    fn get_with_rng(&self, index: usize, rng: &mut StdRng) -> Result<Sample> {
        (**self).get_with_rng(index, rng)
    }
}

/// Проверка индекса, общая для всех адаптеров.
pub(crate) fn check_index(index: usize, len: usize) -> Result<()> {
    if index >= len {
        return Err(DataError::IndexOutOfRange { index, len });
    }
    Ok(())
}

/// Датасет с подмножеством индексов.
pub struct SubsetDataset<D: Dataset> {
    inner: D,
    indices: Vec<usize>,
}

impl<D: Dataset> SubsetDataset<D> {
    /// Создает подмножество датасета по указанным индексам.
    pub fn new(dataset: D, indices: Vec<usize>) -> Self {
        Self {
            inner: dataset,
            indices,
        }
    }
}

impl<D: Dataset> Dataset for SubsetDataset<D> {
    fn len(&self) -> usize {
        self.indices.len()
    }

    fn name(&self) -> &str {
        self.inner.name()
    }

    fn get_with_rng(&self, index: usize, rng: &mut StdRng) -> Result<Sample> {
        let actual_idx = *self.indices.get(index).ok_or(DataError::IndexOutOfRange {
            index,
            len: self.indices.len(),
        })?;
        self.inner.get_with_rng(actual_idx, rng)
    }
}
