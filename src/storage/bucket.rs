// --- Файл: src/storage/bucket.rs ---

//! Глобальная нумерация записей поверх бакетов переменного размера.

use std::path::Path;

/// Индекс бакетов: по глобальному номеру записи находит бакет и локальный ключ.
#[derive(Debug, Clone, Default)]
pub struct BucketIndex {
    /// Накопленные размеры: `cumulative[i]` - число записей в бакетах `0..=i`
    cumulative: Vec<usize>,
}

impl BucketIndex {
    /// Строит индекс по количеству записей в каждом бакете.
    pub fn new(sizes: &[usize]) -> Self {
        let cumulative = sizes
            .iter()
            .scan(0usize, |total, &size| {
                *total += size;
                Some(*total)
            })
            .collect();
        Self { cumulative }
    }

    /// Общее число записей.
    pub fn len(&self) -> usize {
        self.cumulative.last().copied().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn num_buckets(&self) -> usize {
        self.cumulative.len()
    }

    /// Первый глобальный индекс бакета.
    pub fn bucket_start(&self, bucket: usize) -> usize {
        if bucket == 0 {
            0
        } else {
            self.cumulative[bucket - 1]
        }
    }

    /// Возвращает `(бакет, локальный индекс)` для глобального индекса.
    ///
    /// Пустые бакеты пропускаются, индекс за пределами - `None`.
    pub fn locate(&self, index: usize) -> Option<(usize, usize)> {
        if index >= self.len() {
            return None;
        }
        let bucket = self.cumulative.partition_point(|&c| c <= index);
        Some((bucket, index - self.bucket_start(bucket)))
    }

    /// Ключ записи внутри бакета: десятичная запись локального индекса в ASCII.
    pub fn key(local: usize) -> Vec<u8> {
        local.to_string().into_bytes()
    }
}

/// Числовой порядковый номер бакета из имени вида `bucket_12.lmdb`.
///
/// Берется часть между первым `_` и первым `.`; имена без номера - `None`.
pub fn bucket_ordinal(name: &str) -> Option<u64> {
    let stem = name.split('.').next()?;
    let (_, number) = stem.split_once('_')?;
    number.split('_').next()?.parse().ok()
}

/// Сортирует имена бакетов по их номеру.
pub fn sort_bucket_names(names: &mut [String]) {
    names.sort_by_key(|name| (bucket_ordinal(name).unwrap_or(u64::MAX), name.clone()));
}

/// Имена поддиректорий/файлов бакетов в корневой директории, отсортированные по номеру.
pub fn discover_buckets(root: &Path) -> std::io::Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in std::fs::read_dir(root)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if bucket_ordinal(&name).is_some() {
            names.push(name);
        }
    }
    sort_bucket_names(&mut names);
    Ok(names)
}
