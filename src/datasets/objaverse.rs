// --- Файл: src/datasets/objaverse.rs ---

//! Objaverse: тройки (облако, рендер, подпись) из бакетов ключ-значение.

use crate::data::dataset::check_index;
use crate::data::{Dataset, Sample};
use crate::error::{DataError, Result};
use crate::pointcloud::{pc_normalize, PointCloudAugment};
use crate::storage::{BucketIndex, KvShard, ObjectRecord};
use crate::text::CaptionTokenizer;
use crate::vision::{decode_rgb, ImageTransform};
use log::info;
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::Rng;
use std::sync::Arc;

const LOGGER: &str = "Objverse";

pub struct Objaverse<S: KvShard> {
    bucket_names: Vec<String>,
    shards: Vec<S>,
    index: BucketIndex,
    tokenizer: Arc<dyn CaptionTokenizer>,
    transform: Arc<dyn ImageTransform>,
    augment: Option<PointCloudAugment>,
}

impl<S: KvShard> Objaverse<S> {
    /// Собирает датасет из уже открытых бакетов в заданном порядке.
    pub fn from_shards(
        shards: Vec<(String, S)>,
        tokenizer: Arc<dyn CaptionTokenizer>,
        transform: Arc<dyn ImageTransform>,
    ) -> Result<Self> {
        let sizes = shards
            .iter()
            .map(|(_, shard)| shard.entries())
            .collect::<Result<Vec<_>>>()?;
        let index = BucketIndex::new(&sizes);
        let (bucket_names, shards): (Vec<_>, Vec<_>) = shards.into_iter().unzip();

        info!(
            target: LOGGER,
            "discovered {} entries from {} buckets",
            index.len(),
            bucket_names.len()
        );

        Ok(Self {
            bucket_names,
            shards,
            index,
            tokenizer,
            transform,
            augment: Some(PointCloudAugment::default()),
        })
    }

    /// `None` отключает аугментации облака.
    pub fn with_augment(mut self, augment: Option<PointCloudAugment>) -> Self {
        self.augment = augment;
        self
    }

    pub fn bucket_names(&self) -> &[String] {
        &self.bucket_names
    }

    pub fn bucket_index(&self) -> &BucketIndex {
        &self.index
    }

    fn load_record(&self, index: usize) -> Result<ObjectRecord> {
        let (bucket, local) = self
            .index
            .locate(index)
            .ok_or(DataError::IndexOutOfRange {
                index,
                len: self.index.len(),
            })?;
        let key = BucketIndex::key(local);
        let missing = || DataError::MissingRecord {
            index,
            key: local.to_string(),
            bucket,
        };
        let bytes = self.shards[bucket].get(&key)?.ok_or_else(missing)?;
        ObjectRecord::decode(&bytes)
    }
}

#[cfg(feature = "lmdb")]
impl Objaverse<crate::storage::LmdbShard> {
    /// Открывает все бакеты в `root`, упорядоченные по номеру в имени.
    pub fn open(
        root: &std::path::Path,
        tokenizer: Arc<dyn CaptionTokenizer>,
        transform: Arc<dyn ImageTransform>,
    ) -> Result<Self> {
        let names = crate::storage::discover_buckets(root).map_err(|e| DataError::io(root, e))?;
        let shards = names
            .into_iter()
            .map(|name| {
                let shard = crate::storage::LmdbShard::open(&root.join(&name))?;
                Ok((name, shard))
            })
            .collect::<Result<Vec<_>>>()?;
        Self::from_shards(shards, tokenizer, transform)
    }
}

impl<S: KvShard> Dataset for Objaverse<S> {
    fn len(&self) -> usize {
        self.index.len()
    }

    fn name(&self) -> &str {
        LOGGER
    }

    fn get_with_rng(&self, index: usize, rng: &mut StdRng) -> Result<Sample> {
        check_index(index, self.len())?;
        let record = self.load_record(index)?;

        let mut points = pc_normalize(&record.points.view())?;
        if let Some(augment) = &self.augment {
            points = augment.apply(points, rng)?;
        }

        if record.images.is_empty() {
            return Err(DataError::InvalidArgument(format!(
                "record {index} has no images"
            )));
        }
        let image_idx = rng.random_range(0..record.images.len());
        let image = decode_rgb(&record.images[image_idx], &format!("record {index}/{image_idx}"))?;
        let image = self.transform.apply(image, rng)?;

        let caption = record
            .texts
            .get(image_idx)
            .and_then(|captions| captions.choose(rng))
            .ok_or_else(|| {
                DataError::InvalidArgument(format!(
                    "record {index} has no captions for image {image_idx}"
                ))
            })?;
        let caption = self.tokenizer.tokenize(caption)?;

        Ok(Sample::new()
            .with("pc", points)
            .with("image", image)
            .with("caption", caption))
    }
}
