// --- Файл: src/storage/mod.rs ---

//! Хранилище записей, разбитое на бакеты ключ-значение.
//!
//! - [`BucketIndex`]: глобальный индекс -> (бакет, локальный ключ)
//! - [`KvShard`]: бакет только для чтения (память или LMDB)
//! - [`ObjectRecord`]: формат записи

pub mod bucket;
pub mod record;
pub mod shard;

pub use bucket::{bucket_ordinal, discover_buckets, sort_bucket_names, BucketIndex};
pub use record::ObjectRecord;
#[cfg(feature = "lmdb")]
pub use shard::LmdbShard;
pub use shard::{KvShard, MemoryShard};
