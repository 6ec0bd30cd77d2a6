// --- Файл: src/config/merge.rs ---

//! Слияние YAML-конфигураций с поддержкой `_base_`.

use crate::error::{DataError, Result};
use serde_yaml::{Mapping, Value};
use std::fs::File;
use std::path::Path;

const BASE_KEY: &str = "_base_";

fn read_yaml(path: &Path) -> Result<Value> {
    let file = File::open(path).map_err(|e| DataError::io(path, e))?;
    serde_yaml::from_reader(file).map_err(|source| DataError::Yaml {
        path: path.to_path_buf(),
        source,
    })
}

fn as_mapping(value: Value, origin: &Path) -> Result<Mapping> {
    match value {
        Value::Mapping(m) => Ok(m),
        Value::Null => Ok(Mapping::new()),
        other => Err(DataError::Config(format!(
            "{}: expected a mapping at top level, got {:?}",
            origin.display(),
            other
        ))),
    }
}

/// Вливает `new_config` в `config`.
///
/// - скалярные значения и списки перезаписывают существующие;
/// - вложенные словари сливаются рекурсивно;
/// - ключ `_base_` содержит путь к YAML, содержимое которого вливается в `config["_base_"]`.
pub fn merge_new_config(config: &mut Mapping, new_config: Mapping) -> Result<()> {
    for (key, val) in new_config {
        let val = match val {
            Value::Mapping(m) => m,
            Value::String(path) if key.as_str() == Some(BASE_KEY) => {
                let path = Path::new(&path);
                as_mapping(read_yaml(path)?, path)?
            }
            other => {
                config.insert(key, other);
                continue;
            }
        };

        let entry = config
            .entry(key)
            .or_insert_with(|| Value::Mapping(Mapping::new()));
        if !entry.is_mapping() {
            *entry = Value::Mapping(Mapping::new());
        }
        if let Value::Mapping(sub) = entry {
            merge_new_config(sub, val)?;
        }
    }
    Ok(())
}

/// Читает YAML-файл и возвращает слитую конфигурацию.
pub fn cfg_from_yaml_file(path: &Path) -> Result<Mapping> {
    let new_config = as_mapping(read_yaml(path)?, path)?;
    let mut config = Mapping::new();
    merge_new_config(&mut config, new_config)?;
    Ok(config)
}
