// --- Файл: src/storage/shard.rs ---

//! Шарды ключ-значение, из которых читаются записи.

use crate::error::Result;
use std::collections::HashMap;

/// Шард ключ-значение только для чтения.
pub trait KvShard: Send + Sync {
    /// Количество записей в шарде.
    fn entries(&self) -> Result<usize>;

    /// Значение по ключу; отсутствующий ключ - `Ok(None)`.
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;
}

/// Шард в памяти (тесты, небольшие наборы).
#[derive(Debug, Clone, Default)]
pub struct MemoryShard {
    records: HashMap<Vec<u8>, Vec<u8>>,
}

impl MemoryShard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<Vec<u8>>, value: Vec<u8>) {
        self.records.insert(key.into(), value);
    }
}

impl FromIterator<(Vec<u8>, Vec<u8>)> for MemoryShard {
    fn from_iter<I: IntoIterator<Item = (Vec<u8>, Vec<u8>)>>(iter: I) -> Self {
        Self {
            records: iter.into_iter().collect(),
        }
    }
}

impl KvShard for MemoryShard {
    fn entries(&self) -> Result<usize> {
        Ok(self.records.len())
    }

    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.records.get(key).cloned())
    }
}

#[cfg(feature = "lmdb")]
pub use lmdb_shard::LmdbShard;

#[cfg(feature = "lmdb")]
mod lmdb_shard {
    use super::KvShard;
    use crate::error::{DataError, Result};
    use heed::types::Bytes;
    use heed::{Database, Env, EnvFlags, EnvOpenOptions};
    use std::path::Path;

    /// LMDB-окружение, открытое только на чтение и без файловых блокировок.
    pub struct LmdbShard {
        env: Env,
        db: Database<Bytes, Bytes>,
    }

    fn storage_err(path: &Path, e: heed::Error) -> DataError {
        DataError::Storage(format!("{}: {e}", path.display()))
    }

    impl LmdbShard {
        pub fn open(path: &Path) -> Result<Self> {
            let mut options = EnvOpenOptions::new();
            // SAFETY: окружение только читается, внешний процесс его не изменяет
            let env = unsafe {
                options.flags(EnvFlags::READ_ONLY | EnvFlags::NO_LOCK);
                options.open(path)
            }
            .map_err(|e| storage_err(path, e))?;

            let rtxn = env.read_txn().map_err(|e| storage_err(path, e))?;
            let db = env
                .open_database::<Bytes, Bytes>(&rtxn, None)
                .map_err(|e| storage_err(path, e))?
                .ok_or_else(|| {
                    DataError::Storage(format!("{}: no unnamed database", path.display()))
                })?;
            rtxn.commit().map_err(|e| storage_err(path, e))?;

            Ok(Self { env, db })
        }
    }

    impl KvShard for LmdbShard {
        fn entries(&self) -> Result<usize> {
            let rtxn = self
                .env
                .read_txn()
                .map_err(|e| DataError::Storage(e.to_string()))?;
            let n = self
                .db
                .len(&rtxn)
                .map_err(|e| DataError::Storage(e.to_string()))?;
            Ok(n as usize)
        }

        fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
            let rtxn = self
                .env
                .read_txn()
                .map_err(|e| DataError::Storage(e.to_string()))?;
            let value = self
                .db
                .get(&rtxn, key)
                .map_err(|e| DataError::Storage(e.to_string()))?;
            Ok(value.map(<[u8]>::to_vec))
        }
    }
}
