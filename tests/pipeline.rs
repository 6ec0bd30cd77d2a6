// --- Файл: tests/pipeline.rs ---
//! Сквозные тесты: датасеты на временных файлах -> DataLoader -> батч.

use image::{DynamicImage, Rgb, RgbImage};
use ndarray::{s, Array1, Array2};
use ndarray_npy::WriteNpyExt;
use rustyclip3d::config::DataPaths;
use rustyclip3d::data::{DataLoader, Dataset, Value};
use rustyclip3d::datasets::modelnet::{ModelNet, ModelNetConfig, ProcessedSplit};
use rustyclip3d::datasets::shapenet::{rotation_degrees, ShapeEntry, ShapeNet, ShapeNetConfig, IMAGE_KINDS};
use rustyclip3d::datasets::{build_3d_dataset, DataArgs, DatasetKind, DatasetType, Objaverse, Split};
use rustyclip3d::storage::{BucketIndex, MemoryShard, ObjectRecord};
use rustyclip3d::pointcloud::geometry::pc_normalize_xyz;
use rustyclip3d::pointcloud::io::load_txt;
use rustyclip3d::text::{pad_tokens, CaptionTokenizer};
use rustyclip3d::vision::ClipImageTransform;
use rustyclip3d::{DataError, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

const CONTEXT: usize = 24;

/// Токены - байты строки.
struct ByteTokenizer;

impl CaptionTokenizer for ByteTokenizer {
    fn tokenize(&self, text: &str) -> Result<Array1<i64>> {
        let ids: Vec<u32> = text.bytes().map(u32::from).collect();
        Ok(pad_tokens(&ids, CONTEXT, None))
    }

    fn context_length(&self) -> usize {
        CONTEXT
    }
}

fn detokenize(ids: &[i64]) -> String {
    ids.iter()
        .take_while(|&&id| id != 0)
        .map(|&id| id as u8 as char)
        .collect()
}

fn cloud(n: usize, cols: usize, phase: f32) -> Array2<f32> {
    Array2::from_shape_fn((n, cols), |(i, c)| ((i as f32 + phase) * 0.7 + c as f32 * 1.3).sin())
}

fn write_png(path: &Path, size: u32) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    let img = RgbImage::from_fn(size, size, |x, y| Rgb([(x * 10) as u8, (y * 10) as u8, 77]));
    DynamicImage::ImageRgb8(img).save(path).unwrap();
}

fn png_bytes() -> Vec<u8> {
    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(RgbImage::new(10, 10))
        .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
        .unwrap();
    bytes
}

// ---------- ShapeNet ----------

struct ShapeNetFixture {
    _dir: tempfile::TempDir,
    config: ShapeNetConfig,
}

fn shapenet_fixture(models: &[&str], with_images: bool) -> ShapeNetFixture {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("ShapeNet55");
    let pc_path = root.join("shapenet_pc");
    let image_path = dir.path().join("renders");
    fs::create_dir_all(&pc_path).unwrap();

    fs::write(
        root.join("taxonomy.json"),
        r#"[{"synsetId": "03001627", "name": "chair", "numInstances": 2},
            {"synsetId": "04379243", "name": "table,desk", "numInstances": 1}]"#,
    )
    .unwrap();
    let templates_path = dir.path().join("templates.json");
    fs::write(&templates_path, r#"{"shapenet_64": ["a point cloud model of {}."]}"#).unwrap();

    let (test_models, train_models) = models.split_at(1);
    fs::write(root.join("test.txt"), format!("{}\n", test_models.join("\n"))).unwrap();
    fs::write(root.join("train.txt"), format!("{}\n", train_models.join("\n"))).unwrap();

    for (i, line) in models.iter().enumerate() {
        let file = File::create(pc_path.join(line)).unwrap();
        cloud(100, 3, i as f32 * 10.0).write_npy(file).unwrap();

        if with_images {
            let entry = ShapeEntry::parse(line).unwrap();
            for degree in rotation_degrees() {
                for kind in IMAGE_KINDS {
                    write_png(&entry.image_path(&image_path, degree, kind), 12);
                }
            }
        }
    }

    ShapeNetFixture {
        config: ShapeNetConfig {
            data_root: root,
            pc_path,
            image_path,
            templates_path,
            prompt: "shapenet_64".to_string(),
            subset: Split::Train,
            npoints: 64,
            whole: true,
            use_height: false,
            max_retries: 3,
        },
        _dir: dir,
    }
}

fn shapenet(config: ShapeNetConfig) -> ShapeNet {
    ShapeNet::new(
        config,
        Arc::new(ByteTokenizer),
        Arc::new(ClipImageTransform::new(8, true)),
    )
    .unwrap()
}

#[test]
fn shapenet_sample_fields() {
    let fixture = shapenet_fixture(&["03001627-aaa.npy", "04379243-bbb.npy"], true);
    let ds = shapenet(fixture.config.clone());
    assert_eq!(ds.len(), 2);

    // whole: test.txt идет первым
    assert_eq!(ds.entries()[0].model_id, "aaa");

    let sample = ds.get(1).unwrap();
    assert_eq!(sample.get("taxonomy_id").unwrap().as_str(), Some("04379243"));
    assert_eq!(sample.get("model_id").unwrap().as_str(), Some("bbb"));
    assert_eq!(sample.tensor("pc").unwrap().shape(), &[64, 3]);
    assert_eq!(sample.tensor("image").unwrap().shape(), &[3, 8, 8]);

    let caption = sample.get("caption").unwrap().as_long_tensor().unwrap();
    let text = detokenize(caption.as_slice().unwrap());
    assert!(
        text == "a point cloud model of table." || text == "a point cloud model of desk.",
        "unexpected caption: {text}"
    );
}

#[test]
fn shapenet_without_whole_reads_only_subset() {
    let fixture = shapenet_fixture(&["03001627-aaa.npy", "03001627-ccc.npy"], true);
    let mut config = fixture.config.clone();
    config.whole = false;
    let ds = shapenet(config);
    assert_eq!(ds.len(), 1);
    assert_eq!(ds.entries()[0].model_id, "ccc");
}

#[test]
fn shapenet_missing_images_exhaust_retries() {
    let fixture = shapenet_fixture(&["03001627-aaa.npy", "03001627-ccc.npy"], false);
    let ds = shapenet(fixture.config.clone());

    match ds.get(0) {
        Err(DataError::RetriesExhausted { index, attempts }) => {
            assert_eq!(index, 0);
            assert_eq!(attempts, 4);
        }
        other => panic!("expected exhausted retries, got {:?}", other.map(|s| s.len())),
    }
}

#[test]
fn shapenet_batches_through_loader() {
    let fixture = shapenet_fixture(
        &["03001627-aaa.npy", "03001627-ccc.npy", "04379243-bbb.npy"],
        true,
    );
    let ds = shapenet(fixture.config.clone());
    let loader = DataLoader::new(ds, 2).shuffle(true).seed(7).parallel(true);
    assert_eq!(loader.num_batches(), 2);

    let batches: Vec<_> = loader.iter().collect::<Result<Vec<_>>>().unwrap();
    assert_eq!(batches[0].len(), 2);
    assert_eq!(batches[1].len(), 1);

    let first = &batches[0];
    assert_eq!(first.tensor("pc").unwrap().shape(), &[2, 64, 3]);
    assert_eq!(first.tensor("image").unwrap().shape(), &[2, 3, 8, 8]);
    assert_eq!(first.long_tensor("caption").unwrap().shape(), &[2, CONTEXT]);
    match first.get("taxonomy_id") {
        Some(Value::List(ids)) => assert_eq!(ids.len(), 2),
        other => panic!("taxonomy_id should collate to a list, got {other:?}"),
    }
}

// ---------- ModelNet ----------

fn write_modelnet(root: &Path) {
    let classes = [
        "bathtub", "bed", "chair", "desk", "dresser", "monitor", "night_stand", "sofa", "table",
        "toilet",
    ];
    fs::create_dir_all(root).unwrap();
    fs::write(root.join("modelnet10_shape_names.txt"), classes.join("\n")).unwrap();
    fs::write(root.join("modelnet10_train.txt"), "chair_0001\nnight_stand_0002\n").unwrap();
    fs::write(root.join("modelnet10_test.txt"), "sofa_0003\n").unwrap();

    for (i, id) in ["chair_0001", "night_stand_0002", "sofa_0003"].iter().enumerate() {
        let class = id.rsplit_once('_').unwrap().0;
        let dir = root.join(class);
        fs::create_dir_all(&dir).unwrap();
        let mut file = File::create(dir.join(format!("{id}.txt"))).unwrap();
        for row in cloud(40, 6, i as f32 * 3.0).rows() {
            let line: Vec<String> = row.iter().map(|v| format!("{v:.6}")).collect();
            writeln!(file, "{}", line.join(",")).unwrap();
        }
    }
}

fn modelnet_config(root: &Path, subset: Split) -> ModelNetConfig {
    let mut config = ModelNetConfig::new(root, 16, subset);
    config.num_category = 10;
    config.generate_from_raw = true;
    config
}

#[test]
fn modelnet_generates_and_reuses_cache() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("modelnet");
    write_modelnet(&root);

    let config = modelnet_config(&root, Split::Train);
    let cache = config.cache_path(16);
    assert!(!cache.exists());

    let ds = ModelNet::new(config.clone()).unwrap();
    assert!(cache.exists());
    assert_eq!(ds.len(), 2);

    let sample = ds.get(1).unwrap();
    assert_eq!(sample.tensor("pc").unwrap().shape(), &[16, 3]);
    assert_eq!(sample.get("label").unwrap().as_int(), Some(6));
    assert_eq!(sample.get("class_name").unwrap().as_str(), Some("night_stand"));

    let mut cached_only = config;
    cached_only.generate_from_raw = false;
    let reloaded = ModelNet::new(cached_only).unwrap();
    assert_eq!(reloaded.len(), 2);
    assert_eq!(reloaded.get(0).unwrap().get("class_name").unwrap().as_str(), Some("chair"));
}

#[test]
fn modelnet_with_normals_keeps_six_columns() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("modelnet");
    write_modelnet(&root);

    let mut config = modelnet_config(&root, Split::Test);
    config.use_normals = true;
    config.use_height = true;
    let ds = ModelNet::new(config).unwrap();
    let sample = ds.get(0).unwrap();
    assert_eq!(sample.tensor("pc").unwrap().shape(), &[16, 7]);
}

/// Первые 16 точек сырого файла после нормализации, только xyz.
fn first_rows_normalized(root: &Path, class: &str, id: &str) -> Array2<f32> {
    let raw = load_txt(&root.join(class).join(format!("{id}.txt"))).unwrap();
    let head = raw.slice(s![0..16, ..]);
    pc_normalize_xyz(&head).unwrap().slice(s![.., 0..3]).to_owned()
}

fn assert_close(actual: &ndarray::ArrayD<f32>, expected: &Array2<f32>) {
    assert_eq!(actual.shape(), expected.shape());
    for (a, e) in actual.iter().zip(expected.iter()) {
        assert!((a - e).abs() < 1e-5, "{a} != {e}");
    }
}

#[test]
fn modelnet_rejects_truncated_cache() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("modelnet");
    write_modelnet(&root);

    let mut config = modelnet_config(&root, Split::Train);
    config.generate_from_raw = false;
    ProcessedSplit {
        points: vec![cloud(16, 3, 0.0)],
        labels: vec![0, 1],
    }
    .save(&config.cache_path(16))
    .unwrap();

    assert!(matches!(ModelNet::new(config), Err(DataError::Config(_))));
}

#[test]
fn modelnet_falls_back_to_full_cache() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("modelnet");
    write_modelnet(&root);

    let mut config = modelnet_config(&root, Split::Test);
    config.generate_from_raw = false;
    config.uniform = false;
    // полный кэш всегда называется *_8192pts_fps.dat
    ProcessedSplit {
        points: vec![cloud(40, 6, 5.0)],
        labels: vec![7],
    }
    .save(&root.join("modelnet10_test_8192pts_fps.dat"))
    .unwrap();
    assert!(!config.cache_path(16).exists());

    let ds = ModelNet::new(config).unwrap();
    assert_eq!(ds.len(), 1);
    let sample = ds.get(0).unwrap();
    assert_eq!(sample.tensor("pc").unwrap().shape(), &[16, 3]);
    assert_eq!(sample.get("class_name").unwrap().as_str(), Some("sofa"));
}

#[test]
fn modelnet_without_processing_reads_raw_files() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("modelnet");
    write_modelnet(&root);

    let mut config = modelnet_config(&root, Split::Test);
    config.process_data = false;
    let cache = config.cache_path(16);
    let ds = ModelNet::new(config).unwrap();
    assert!(!cache.exists());
    assert_eq!(ds.len(), 1);

    let sample = ds.get(0).unwrap();
    assert_eq!(sample.tensor("pc").unwrap().shape(), &[16, 3]);
    assert_eq!(sample.get("label").unwrap().as_int(), Some(7));
}

#[test]
fn modelnet_without_uniform_takes_first_points() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("modelnet");
    write_modelnet(&root);

    let mut config = modelnet_config(&root, Split::Test);
    config.process_data = false;
    config.uniform = false;
    let ds = ModelNet::new(config).unwrap();

    let sample = ds.get(0).unwrap();
    let expected = first_rows_normalized(&root, "sofa", "sofa_0003");
    assert_close(sample.tensor("pc").unwrap(), &expected);
}

#[test]
fn modelnet_train_split_shuffles_points() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("modelnet");
    write_modelnet(&root);

    let mut config = modelnet_config(&root, Split::Train);
    config.process_data = false;
    config.uniform = false;
    let ds = ModelNet::new(config).unwrap();

    let mut rng = StdRng::seed_from_u64(3);
    let sample = ds.get_with_rng(0, &mut rng).unwrap();
    let pc = sample.tensor("pc").unwrap();
    let expected = first_rows_normalized(&root, "chair", "chair_0001");
    assert_eq!(pc.shape(), expected.shape());

    let key = |row: Vec<f32>| row.iter().map(|v| format!("{v:.4}")).collect::<Vec<_>>();
    let mut got: Vec<_> = pc.rows().into_iter().map(|r| key(r.iter().copied().collect())).collect();
    let mut want: Vec<_> = expected.rows().into_iter().map(|r| key(r.to_vec())).collect();
    assert_ne!(got, want, "rows kept their original order");
    got.sort();
    want.sort();
    assert_eq!(got, want);
}

#[test]
fn build_modelnet_from_catalog() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("modelnet");
    write_modelnet(&root);
    // кэш тестового сплита на 16 точек
    ModelNet::new(modelnet_config(&root, Split::Test)).unwrap();

    let meta = dir.path().join("meta");
    fs::create_dir_all(&meta).unwrap();
    fs::write(
        meta.join("ModelNet40.yaml"),
        "NAME: ModelNet\nDATA_PATH: modelnet\nN_POINTS: 8192\nNUM_CATEGORY: 10\nUSE_NORMALS: false\n",
    )
    .unwrap();

    let paths = DataPaths {
        pc_data_dir: dir.path().to_path_buf(),
        meta_data_dir: meta,
        objaverse_data_dir: dir.path().join("objaverse"),
    };
    let args = DataArgs {
        train_data: DatasetKind::ShapeNet,
        val_data: DatasetKind::ModelNet40,
        train_data_prompt: "shapenet_64".into(),
        val_data_prompt: "modelnet40_64".into(),
        pc_npoints: 16,
    };

    let ds = build_3d_dataset(
        &args,
        DatasetType::Val,
        &paths,
        Arc::new(ByteTokenizer),
        Arc::new(ClipImageTransform::new(8, false)),
    )
    .unwrap();
    assert_eq!(ds.name(), "ModelNet");
    assert_eq!(ds.len(), 1);

    let batch = DataLoader::new(ds, 4).iter().next().unwrap().unwrap();
    assert_eq!(batch.tensor("pc").unwrap().shape(), &[1, 16, 3]);
    assert_eq!(batch.long_tensor("label").unwrap().as_slice().unwrap(), &[7]);
}

#[test]
fn build_fails_for_missing_catalog_config() {
    let dir = tempfile::tempdir().unwrap();
    let paths = DataPaths {
        pc_data_dir: dir.path().to_path_buf(),
        meta_data_dir: dir.path().to_path_buf(),
        objaverse_data_dir: dir.path().to_path_buf(),
    };
    let args = DataArgs {
        train_data: DatasetKind::ShapeNet,
        val_data: DatasetKind::ModelNet40,
        train_data_prompt: "shapenet_64".into(),
        val_data_prompt: "modelnet40_64".into(),
        pc_npoints: 16,
    };
    let result = build_3d_dataset(
        &args,
        DatasetType::Train,
        &paths,
        Arc::new(ByteTokenizer),
        Arc::new(ClipImageTransform::new(8, true)),
    );
    assert!(matches!(result, Err(DataError::Io { .. })));
}

// ---------- Objaverse ----------

#[test]
fn objaverse_batches_across_buckets() {
    let mut shards = Vec::new();
    let mut global = 0;
    for (b, size) in [2usize, 0, 3].into_iter().enumerate() {
        let shard: MemoryShard = (0..size)
            .map(|local| {
                let record = ObjectRecord {
                    points: cloud(48, 3, global as f32),
                    images: vec![png_bytes(), png_bytes()],
                    texts: vec![vec![format!("obj{global}")], vec![format!("obj{global}")]],
                };
                global += 1;
                (BucketIndex::key(local), record.encode().unwrap())
            })
            .collect();
        shards.push((format!("bucket_{b}.lmdb"), shard));
    }

    let ds = Objaverse::from_shards(
        shards,
        Arc::new(ByteTokenizer),
        Arc::new(ClipImageTransform::new(8, true)),
    )
    .unwrap();
    assert_eq!(ds.len(), 5);

    let loader = DataLoader::new(ds, 5).seed(1);
    let batch = loader.iter().next().unwrap().unwrap();
    assert_eq!(batch.tensor("pc").unwrap().shape(), &[5, 48, 3]);
    assert_eq!(batch.tensor("image").unwrap().shape(), &[5, 3, 8, 8]);

    let captions = batch.long_tensor("caption").unwrap();
    let texts: Vec<String> = captions
        .outer_iter()
        .map(|row| detokenize(&row.iter().copied().collect::<Vec<i64>>()))
        .collect();
    assert_eq!(texts, vec!["obj0", "obj1", "obj2", "obj3", "obj4"]);
}
