// --- Файл: src/storage/record.rs ---

//! Формат записей в шардах Objaverse.

use crate::error::Result;
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Одна запись: облако точек, закодированные изображения и подписи к ним.
///
/// `texts[i]` - варианты подписи к изображению `images[i]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectRecord {
    pub points: Array2<f32>,
    /// PNG/JPEG байты рендеров объекта
    pub images: Vec<Vec<u8>>,
    pub texts: Vec<Vec<String>>,
}

impl ObjectRecord {
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(bytes)?)
    }
}
