// --- Файл: src/text.rs ---

//! Подписи: токенизация и шаблоны промптов.

use crate::error::{DataError, Result};
use ndarray::Array1;
use rand::seq::IndexedRandom;
use rand::Rng;
use std::collections::HashMap;
use std::path::Path;

/// Длина контекста текстового энкодера CLIP.
pub const DEFAULT_CONTEXT_LENGTH: usize = 77;

/// Токенизатор подписей: строка -> вектор id фиксированной длины.
pub trait CaptionTokenizer: Send + Sync {
    fn tokenize(&self, text: &str) -> Result<Array1<i64>>;

    fn context_length(&self) -> usize {
        DEFAULT_CONTEXT_LENGTH
    }
}

/// Дополняет нулями или обрезает до `context_length`.
///
/// При обрезке последним токеном ставится `eot`, если он задан.
pub fn pad_tokens(ids: &[u32], context_length: usize, eot: Option<u32>) -> Array1<i64> {
    let mut out = Array1::<i64>::zeros(context_length);
    let n = ids.len().min(context_length);
    for (dst, &id) in out.iter_mut().zip(&ids[..n]) {
        *dst = i64::from(id);
    }
    if ids.len() > context_length && context_length > 0 {
        if let Some(eot) = eot {
            out[context_length - 1] = i64::from(eot);
        }
    }
    out
}

/// Токенизатор на основе `tokenizer.json` (формат HuggingFace tokenizers).
pub struct ClipTokenizer {
    inner: tokenizers::Tokenizer,
    context_length: usize,
    eot_id: Option<u32>,
}

impl ClipTokenizer {
    pub fn from_file(path: &Path) -> Result<Self> {
        let inner = tokenizers::Tokenizer::from_file(path)
            .map_err(|e| DataError::Tokenizer(format!("{}: {e}", path.display())))?;
        let eot_id = inner.token_to_id("<|endoftext|>");
        Ok(Self {
            inner,
            context_length: DEFAULT_CONTEXT_LENGTH,
            eot_id,
        })
    }

    pub fn with_context_length(mut self, context_length: usize) -> Self {
        self.context_length = context_length;
        self
    }
}

impl CaptionTokenizer for ClipTokenizer {
    fn tokenize(&self, text: &str) -> Result<Array1<i64>> {
        let encoding = self
            .inner
            .encode(text, true)
            .map_err(|e| DataError::Tokenizer(e.to_string()))?;
        Ok(pad_tokens(
            encoding.get_ids(),
            self.context_length,
            self.eot_id,
        ))
    }

    fn context_length(&self) -> usize {
        self.context_length
    }
}

/// Разбивает имя синсета (`"chair,seat"`) на непустые варианты.
pub fn split_names(names: &str) -> Vec<String> {
    names
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Подставляет подпись в шаблон вида `"a point cloud model of {}."`.
pub fn format_template(template: &str, caption: &str) -> String {
    template.replacen("{}", caption, 1)
}

/// Набор шаблонов промптов, сгруппированный по имени.
#[derive(Debug, Clone, Default)]
pub struct PromptTemplates {
    templates: HashMap<String, Vec<String>>,
}

impl PromptTemplates {
    /// Загружает `templates.json`: `{ "<prompt>": ["...{}...", ...] }`.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| DataError::io(path, e))?;
        let templates = serde_json::from_str(&text).map_err(|source| DataError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self { templates })
    }

    pub fn get(&self, prompt: &str) -> Result<&[String]> {
        match self.templates.get(prompt) {
            Some(list) if !list.is_empty() => Ok(list),
            _ => Err(DataError::Config(format!(
                "no prompt templates named '{prompt}'"
            ))),
        }
    }
}

/// Случайная подпись по шаблону: `template.format(random(names))`.
pub fn random_caption<R: Rng + ?Sized>(
    names: &[String],
    templates: &[String],
    rng: &mut R,
) -> Result<String> {
    let name = names
        .choose(rng)
        .ok_or_else(|| DataError::InvalidArgument("empty caption list".to_string()))?;
    match templates.choose(rng) {
        Some(template) => Ok(format_template(template, name)),
        None => Ok(name.clone()),
    }
}
