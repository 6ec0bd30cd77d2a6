// --- Файл: src/data/collate.rs ---

//! Сборка списка примеров в батч.
//!
//! Правила определяются по первому элементу:
//! - тензоры складываются вдоль новой ведущей оси батча;
//! - целые числа дают `LongTensor` формы `[B]`, вещественные - `DoubleTensor` `[B]`;
//! - строки собираются в список;
//! - словари собираются поключево;
//! - списки должны иметь одинаковую длину и транспонируются.

use super::sample::{Sample, Value};
use crate::error::{DataError, Result};
use ndarray::{stack, Array1, ArrayD, ArrayView, Axis, IxDyn};
use std::collections::BTreeMap;

/// Трейт для функций сборки батча.
pub trait CollateFn: Send + Sync {
    fn collate(&self, batch: Vec<Sample>) -> Result<BTreeMap<String, Value>>;
}

/// Стандартная рекурсивная сборка.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultCollate;

impl CollateFn for DefaultCollate {
    fn collate(&self, batch: Vec<Sample>) -> Result<BTreeMap<String, Value>> {
        collate_samples(batch)
    }
}

/// Собирает примеры в словарь батчевых значений.
pub fn collate_samples(batch: Vec<Sample>) -> Result<BTreeMap<String, Value>> {
    let values = batch.into_iter().map(Value::from).collect();
    match collate(values)? {
        Value::Map(fields) => Ok(fields),
        other => Err(DataError::Collate(format!(
            "expected a map batch, got {}",
            other.kind()
        ))),
    }
}

fn stack_tensors<A: Clone>(items: &[ArrayView<A, IxDyn>]) -> Result<ArrayD<A>> {
    if let Some(first) = items.first() {
        if let Some(bad) = items.iter().find(|t| t.shape() != first.shape()) {
            return Err(DataError::Collate(format!(
                "cannot stack tensors of shapes {:?} and {:?}",
                first.shape(),
                bad.shape()
            )));
        }
    }
    stack(Axis(0), items).map_err(|e| DataError::Collate(e.to_string()))
}

fn mismatch(expected: &str, got: &Value) -> DataError {
    DataError::Collate(format!(
        "batch mixes {expected} with {}",
        got.kind()
    ))
}

/// Рекурсивно собирает значения одного поля из всех примеров батча.
pub fn collate(batch: Vec<Value>) -> Result<Value> {
    let first = batch
        .first()
        .ok_or_else(|| DataError::Collate("cannot collate an empty batch".to_string()))?;

    match first {
        Value::Tensor(_) => {
            let views = batch
                .iter()
                .map(|v| match v {
                    Value::Tensor(t) => Ok(t.view()),
                    other => Err(mismatch("tensor<f32>", other)),
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(Value::Tensor(stack_tensors(&views)?))
        }
        Value::LongTensor(_) => {
            let views = batch
                .iter()
                .map(|v| match v {
                    Value::LongTensor(t) => Ok(t.view()),
                    other => Err(mismatch("tensor<i64>", other)),
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(Value::LongTensor(stack_tensors(&views)?))
        }
        Value::DoubleTensor(_) => {
            let views = batch
                .iter()
                .map(|v| match v {
                    Value::DoubleTensor(t) => Ok(t.view()),
                    other => Err(mismatch("tensor<f64>", other)),
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(Value::DoubleTensor(stack_tensors(&views)?))
        }
        Value::Int(_) => {
            let ints = batch
                .iter()
                .map(|v| v.as_int().ok_or_else(|| mismatch("int", v)))
                .collect::<Result<Vec<_>>>()?;
            Ok(Value::LongTensor(Array1::from(ints).into_dyn()))
        }
        Value::Float(_) => {
            let floats = batch
                .iter()
                .map(|v| match v {
                    Value::Float(f) => Ok(*f),
                    other => Err(mismatch("float", other)),
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(Value::DoubleTensor(Array1::from(floats).into_dyn()))
        }
        Value::Str(_) => {
            for v in &batch {
                if !matches!(v, Value::Str(_)) {
                    return Err(mismatch("str", v));
                }
            }
            Ok(Value::List(batch))
        }
        Value::Map(first_map) => {
            let keys: Vec<String> = first_map.keys().cloned().collect();
            let mut maps = batch
                .into_iter()
                .map(|v| match v {
                    Value::Map(m) => Ok(m),
                    other => Err(mismatch("map", &other)),
                })
                .collect::<Result<Vec<_>>>()?;

            let mut out = BTreeMap::new();
            for key in keys {
                let column = maps
                    .iter_mut()
                    .map(|m| {
                        m.remove(&key).ok_or_else(|| {
                            DataError::Collate(format!("key '{key}' is missing in a batch element"))
                        })
                    })
                    .collect::<Result<Vec<_>>>()?;
                out.insert(key, collate(column)?);
            }
            Ok(Value::Map(out))
        }
        Value::List(first_list) => {
            let size = first_list.len();
            let mut lists = batch
                .into_iter()
                .map(|v| match v {
                    Value::List(items) if items.len() == size => Ok(items.into_iter()),
                    Value::List(_) => Err(DataError::Collate(
                        "each element in list of batch should be of equal size".to_string(),
                    )),
                    other => Err(mismatch("list", &other)),
                })
                .collect::<Result<Vec<_>>>()?;

            let mut out = Vec::with_capacity(size);
            for _ in 0..size {
                let column: Vec<Value> = lists.iter_mut().filter_map(Iterator::next).collect();
                out.push(collate(column)?);
            }
            Ok(Value::List(out))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array1, Array2, Array3};

    fn sample(i: usize) -> Sample {
        Sample::new()
            .with("pc", Array2::<f32>::from_elem((16, 3), i as f32))
            .with("image", Array3::<f32>::zeros((3, 8, 8)))
            .with("caption", Array1::<i64>::from_elem(77, i as i64))
            .with("label", i as i64)
            .with("class_name", format!("class_{i}"))
    }

    #[test]
    fn test_collate_adds_batch_dimension() {
        let batch = collate_samples((0..4).map(sample).collect()).unwrap();

        assert_eq!(batch["pc"].shape(), Some(&[4, 16, 3][..]));
        assert_eq!(batch["image"].shape(), Some(&[4, 3, 8, 8][..]));
        assert_eq!(batch["caption"].shape(), Some(&[4, 77][..]));

        let pc = batch["pc"].as_tensor().unwrap();
        assert_eq!(pc[[2, 5, 1]], 2.0);
    }

    #[test]
    fn test_collate_scalars_and_strings() {
        let batch = collate_samples((0..3).map(sample).collect()).unwrap();

        let labels = batch["label"].as_long_tensor().unwrap();
        assert_eq!(labels.as_slice().unwrap(), &[0, 1, 2]);

        let names = batch["class_name"].as_list().unwrap();
        assert_eq!(names.len(), 3);
        assert_eq!(names[1].as_str(), Some("class_1"));

        let floats = collate(vec![Value::Float(0.5), Value::Float(1.5)]).unwrap();
        match floats {
            Value::DoubleTensor(t) => assert_eq!(t.shape(), &[2]),
            other => panic!("unexpected {}", other.kind()),
        }
    }

    #[test]
    fn test_collate_shape_mismatch() {
        let a = Sample::new().with("pc", Array2::<f32>::zeros((16, 3)));
        let b = Sample::new().with("pc", Array2::<f32>::zeros((8, 3)));
        assert!(collate_samples(vec![a, b]).is_err());
    }

    #[test]
    fn test_collate_missing_key() {
        let a = Sample::new().with("pc", Array2::<f32>::zeros((4, 3))).with("label", 1_i64);
        let b = Sample::new().with("pc", Array2::<f32>::zeros((4, 3)));
        assert!(collate_samples(vec![a, b]).is_err());
    }

    #[test]
    fn test_collate_lists_transpose() {
        let batch = vec![
            Value::List(vec![Value::Int(1), Value::Str("a".into())]),
            Value::List(vec![Value::Int(2), Value::Str("b".into())]),
        ];
        let out = collate(batch).unwrap();
        let items = out.as_list().unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_long_tensor().unwrap().as_slice().unwrap(), &[1, 2]);
        assert_eq!(items[1].as_list().unwrap().len(), 2);

        let uneven = vec![
            Value::List(vec![Value::Int(1)]),
            Value::List(vec![Value::Int(2), Value::Int(3)]),
        ];
        assert!(collate(uneven).is_err());
    }

    #[test]
    fn test_collate_errors() {
        assert!(collate(Vec::new()).is_err());
        assert!(collate(vec![Value::Int(1), Value::Str("x".into())]).is_err());
    }
}
