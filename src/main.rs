// --- Файл: src/main.rs ---
//! Просмотр батчей датасета из каталога.

use clap::{Parser, ValueEnum};
use log::info;
use rustyclip3d::config::DataPaths;
use rustyclip3d::data::{DataLoader, Dataset, SubsetDataset, Value};
use rustyclip3d::datasets::{build_3d_dataset, DataArgs, DatasetKind, DatasetType};
use rustyclip3d::text::{CaptionTokenizer, ClipTokenizer};
use rustyclip3d::vision::ClipImageTransform;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Mode {
    Train,
    Val,
}

/// Аргументы командной строки
#[derive(Parser, Debug)]
#[command(author, version, about = "RustyCLIP3D: point cloud / image / text batches", long_about = None)]
struct Args {
    /// Датасет для обучения
    #[arg(long, default_value = "shapenet")]
    train_data: DatasetKind,

    /// Датасет для валидации
    #[arg(long, default_value = "modelnet40")]
    val_data: DatasetKind,

    /// Какой из двух датасетов собирать
    #[arg(long, value_enum, default_value = "train")]
    mode: Mode,

    #[arg(long, default_value = "shapenet_64")]
    train_data_prompt: String,

    #[arg(long, default_value = "modelnet40_64")]
    val_data_prompt: String,

    /// Число точек в облаке
    #[arg(long, default_value_t = 8192)]
    pc_npoints: usize,

    /// Путь к tokenizer.json
    #[arg(long)]
    tokenizer: PathBuf,

    #[arg(long, default_value_t = 224)]
    image_size: u32,

    #[arg(short, long, default_value_t = 8)]
    batch_size: usize,

    /// Сколько батчей вывести
    #[arg(short, long, default_value_t = 2)]
    num_batches: usize,

    /// Ограничить датасет первыми N примерами
    #[arg(long)]
    max_samples: Option<usize>,

    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Отбрасывать примеры, которые не удалось загрузить
    #[arg(long)]
    skip_failed: bool,
}

fn describe(value: &Value) -> String {
    match value {
        Value::List(items) => format!("list[{}]", items.len()),
        other => match other.shape() {
            Some(shape) => format!("{} {:?}", other.kind(), shape),
            None => other.kind().to_string(),
        },
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let paths = DataPaths::from_env();
    info!("[Config] pc: {}", paths.pc_data_dir.display());
    info!("[Config] meta: {}", paths.meta_data_dir.display());

    let dataset_type = match args.mode {
        Mode::Train => DatasetType::Train,
        Mode::Val => DatasetType::Val,
    };
    let is_train = dataset_type == DatasetType::Train;

    let tokenizer: Arc<dyn CaptionTokenizer> = Arc::new(ClipTokenizer::from_file(&args.tokenizer)?);
    let transform = Arc::new(ClipImageTransform::new(args.image_size, is_train));
    let data_args = DataArgs {
        train_data: args.train_data,
        val_data: args.val_data,
        train_data_prompt: args.train_data_prompt.clone(),
        val_data_prompt: args.val_data_prompt.clone(),
        pc_npoints: args.pc_npoints,
    };

    let started = Instant::now();
    let mut dataset = build_3d_dataset(&data_args, dataset_type, &paths, tokenizer, transform)?;
    if let Some(max) = args.max_samples {
        let indices = (0..max.min(dataset.len())).collect();
        dataset = Box::new(SubsetDataset::new(dataset, indices));
    }
    info!(
        "[1] {}: {} примеров, собран за {:.2?}",
        dataset.name(),
        dataset.len(),
        started.elapsed()
    );

    let loader = DataLoader::new(dataset, args.batch_size)
        .shuffle(is_train)
        .seed(args.seed)
        .parallel(true)
        .skip_failed(args.skip_failed);
    info!("[2] {} батчей по {}", loader.num_batches(), args.batch_size);

    let started = Instant::now();
    for (i, batch) in loader.iter().take(args.num_batches).enumerate() {
        let batch = batch?;
        info!("[batch {i}] {} примеров, {:.2?}", batch.len(), started.elapsed());
        for (key, value) in &batch.fields {
            info!("    {key}: {}", describe(value));
        }
    }
    Ok(())
}
