// --- Файл: src/data/sampler.rs ---

//! Порядок обхода датасета по эпохам.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// Сэмплер задает порядок индексов для эпохи.
pub trait Sampler: Send + Sync {
    /// Количество индексов за эпоху.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Индексы эпохи `epoch` в порядке обхода.
    fn order(&self, epoch: u64) -> Vec<usize>;
}

/// Индексы по порядку, одинаково для всех эпох.
#[derive(Debug, Clone, Copy)]
pub struct SequentialSampler {
    len: usize,
}

impl SequentialSampler {
    pub fn new(len: usize) -> Self {
        Self { len }
    }
}

impl Sampler for SequentialSampler {
    fn len(&self) -> usize {
        self.len
    }

    fn order(&self, _epoch: u64) -> Vec<usize> {
        (0..self.len).collect()
    }
}

/// Случайная перестановка индексов.
///
/// С seed перестановка определяется парой (seed, эпоха): каждая эпоха
/// перемешивается по-своему, но воспроизводимо. Без seed - новый порядок
/// при каждом вызове.
#[derive(Debug, Clone, Copy)]
pub struct RandomSampler {
    len: usize,
    seed: Option<u64>,
}

impl RandomSampler {
    pub fn new(len: usize) -> Self {
        Self { len, seed: None }
    }

    pub fn with_seed(len: usize, seed: u64) -> Self {
        Self {
            len,
            seed: Some(seed),
        }
    }
}

impl Sampler for RandomSampler {
    fn len(&self) -> usize {
        self.len
    }

    fn order(&self, epoch: u64) -> Vec<usize> {
        let mut indices: Vec<usize> = (0..self.len).collect();
        match self.seed {
            Some(seed) => {
                let mut rng = StdRng::seed_from_u64(seed ^ epoch.rotate_left(32));
                indices.shuffle(&mut rng);
            }
            None => indices.shuffle(&mut rand::rng()),
        }
        indices
    }
}

/// Нарезает порядок эпохи на батчи индексов.
pub struct BatchSampler {
    order: std::vec::IntoIter<usize>,
    batch_size: usize,
    drop_last: bool,
}

impl BatchSampler {
    /// `batch_size` приводится к минимуму 1; `drop_last` отбрасывает неполный хвост.
    pub fn new(sampler: &dyn Sampler, epoch: u64, batch_size: usize, drop_last: bool) -> Self {
        Self {
            order: sampler.order(epoch).into_iter(),
            batch_size: batch_size.max(1),
            drop_last,
        }
    }

    /// Сколько батчей получится из `len` индексов.
    pub fn num_batches(len: usize, batch_size: usize, drop_last: bool) -> usize {
        let batch_size = batch_size.max(1);
        if drop_last {
            len / batch_size
        } else {
            len.div_ceil(batch_size)
        }
    }
}

impl Iterator for BatchSampler {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Self::Item> {
        let batch: Vec<usize> = self.order.by_ref().take(self.batch_size).collect();
        let partial = batch.len() < self.batch_size;
        if batch.is_empty() || (partial && self.drop_last) {
            None
        } else {
            Some(batch)
        }
    }
}
