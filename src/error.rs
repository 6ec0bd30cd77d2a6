// --- Файл: src/error.rs ---

//! Ошибки загрузки данных.

use std::path::PathBuf;
use thiserror::Error;

/// Ошибки, возникающие при чтении датасетов, конфигурации и при сборке батчей.
#[derive(Error, Debug)]
pub enum DataError {
    #[error("Ошибка ввода/вывода ({path}): {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Ошибка YAML ({path}): {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Ошибка JSON ({path}): {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Ошибка декодирования записи: {0}")]
    Codec(#[from] bincode::Error),

    #[error("Ошибка изображения ({path}): {source}")]
    Image {
        path: String,
        #[source]
        source: image::ImageError,
    },

    #[error("Ошибка чтения .npy ({path}): {source}")]
    Npy {
        path: PathBuf,
        #[source]
        source: ndarray_npy::ReadNpyError,
    },

    #[error("Ошибка CSV ({path}): {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("Ошибка токенизатора: {0}")]
    Tokenizer(String),

    #[error("Ошибка хранилища: {0}")]
    Storage(String),

    #[error("Неверная форма массива: ожидалось {expected}, получено {actual:?}")]
    Shape { expected: String, actual: Vec<usize> },

    #[error("Индекс {index} вне диапазона (размер {len})")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Запись {index} (ключ {key}) не найдена в бакете {bucket}")]
    MissingRecord {
        index: usize,
        key: String,
        bucket: usize,
    },

    #[error("Не удалось построить пример {index}: все {attempts} попыток завершились ошибкой")]
    RetriesExhausted { index: usize, attempts: usize },

    #[error("Неверный аргумент: {0}")]
    InvalidArgument(String),

    #[error("Неверная конфигурация: {0}")]
    Config(String),

    #[error("Ошибка сборки батча: {0}")]
    Collate(String),
}

impl DataError {
    /// Оборачивает ошибку ввода/вывода вместе с путем к файлу.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        DataError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn shape(expected: impl Into<String>, actual: &[usize]) -> Self {
        DataError::Shape {
            expected: expected.into(),
            actual: actual.to_vec(),
        }
    }
}

pub type Result<T> = std::result::Result<T, DataError>;
