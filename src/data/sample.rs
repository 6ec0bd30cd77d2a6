// --- Файл: src/data/sample.rs ---

//! Обучающий пример и значения его полей.

use ndarray::{ArrayD, Dimension};
use std::collections::BTreeMap;

/// Значение поля примера или батча.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Вещественный тензор (облака точек, изображения)
    Tensor(ArrayD<f32>),
    /// Целочисленный тензор (токены, метки батча)
    LongTensor(ArrayD<i64>),
    /// Тензор двойной точности (собранные скаляры f64)
    DoubleTensor(ArrayD<f64>),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

impl Value {
    /// Короткое имя варианта для сообщений об ошибках.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Tensor(_) => "tensor<f32>",
            Value::LongTensor(_) => "tensor<i64>",
            Value::DoubleTensor(_) => "tensor<f64>",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::List(_) => "list",
            Value::Map(_) => "map",
        }
    }

    pub fn as_tensor(&self) -> Option<&ArrayD<f32>> {
        match self {
            Value::Tensor(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_long_tensor(&self) -> Option<&ArrayD<i64>> {
        match self {
            Value::LongTensor(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Форма тензорного значения.
    pub fn shape(&self) -> Option<&[usize]> {
        match self {
            Value::Tensor(t) => Some(t.shape()),
            Value::LongTensor(t) => Some(t.shape()),
            Value::DoubleTensor(t) => Some(t.shape()),
            _ => None,
        }
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl<D: Dimension> From<ndarray::Array<f32, D>> for Value {
    fn from(a: ndarray::Array<f32, D>) -> Self {
        Value::Tensor(a.into_dyn())
    }
}

impl<D: Dimension> From<ndarray::Array<i64, D>> for Value {
    fn from(a: ndarray::Array<i64, D>) -> Self {
        Value::LongTensor(a.into_dyn())
    }
}

/// Один обучающий пример: упорядоченный словарь "имя поля -> значение".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sample {
    fields: BTreeMap<String, Value>,
}

impl Sample {
    pub fn new() -> Self {
        Self::default()
    }

    /// Добавляет поле и возвращает пример (builder-стиль).
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: &str, value: impl Into<Value>) {
        self.fields.insert(key.to_string(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Возвращает f32-тензор поля, если он есть.
    pub fn tensor(&self, key: &str) -> Option<&ArrayD<f32>> {
        self.get(key).and_then(Value::as_tensor)
    }

    pub fn into_fields(self) -> BTreeMap<String, Value> {
        self.fields
    }
}

impl From<Sample> for Value {
    fn from(s: Sample) -> Self {
        Value::Map(s.fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array1, Array2};

    #[test]
    fn test_sample_builder() {
        let sample = Sample::new()
            .with("pc", Array2::<f32>::zeros((8, 3)))
            .with("caption", Array1::<i64>::zeros(77))
            .with("label", 3_i64)
            .with("class_name", "chair");

        assert_eq!(sample.len(), 4);
        assert_eq!(sample.tensor("pc").unwrap().shape(), &[8, 3]);
        assert_eq!(sample.get("caption").unwrap().shape(), Some(&[77][..]));
        assert_eq!(sample.get("label").unwrap().as_int(), Some(3));
        assert_eq!(sample.get("class_name").unwrap().as_str(), Some("chair"));
        assert_eq!(
            sample.keys().collect::<Vec<_>>(),
            vec!["caption", "class_name", "label", "pc"]
        );
    }
}
