use std::collections::BTreeSet;
use std::path::Path;

use hamming_prep::codec::CodeLayout;
use hamming_prep::io::{read_center, read_word_file, write_points};
use hamming_prep::utils::vector::recenter;
use hamming_prep::{
    ArrayStore, Codec, ConvertConfig, ConvertError, DatasetProfile, ElementKind, Pipeline,
    PointFile, ShardedDeduplicator,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

const DIMS: usize = 8;

fn random_points(rng: &mut ChaCha8Rng, rows: usize, scale: f32) -> Vec<f32> {
    (0..rows * DIMS).map(|_| (rng.gen::<f32>() * scale).round()).collect()
}

/// Base file with some rows repeated verbatim, plus a small query file.
fn write_dataset(dir: &Path, base_rows: usize, element: ElementKind) {
    let mut rng = ChaCha8Rng::seed_from_u64(17);
    let mut base = random_points(&mut rng, base_rows, 200.0);
    for i in 0..base_rows / 10 {
        let (src, dst) = (i * 3, base_rows - 1 - i);
        let row: Vec<f32> = base[src * DIMS..(src + 1) * DIMS].to_vec();
        base[dst * DIMS..(dst + 1) * DIMS].copy_from_slice(&row);
    }
    let queries = random_points(&mut rng, 20, 200.0);
    write_points(&dir.join("sift_base.fvecs"), &base, DIMS, element).unwrap();
    write_points(&dir.join("sift_query.fvecs"), &queries, DIMS, element).unwrap();
}

fn config(root: &Path, profile: DatasetProfile, out: &str) -> ConvertConfig {
    let mut cfg = ConvertConfig::for_profile(profile, 128);
    cfg.dataset_dir = root.join("data");
    cfg.output_dir = root.join(out);
    cfg.scratch_dir = root.join(out).join("temp");
    cfg.num_queries = 10;
    cfg.num_shards = 8;
    cfg.chunk_points = 64;
    cfg.split_chunk_codes = 37;
    cfg
}

fn code_set(words: &[u64], layout: CodeLayout) -> BTreeSet<Vec<u64>> {
    words.chunks_exact(layout.words).map(|c| c.to_vec()).collect()
}

/// Encodes every point the pipeline should have encoded, without sharding.
fn brute_force_codes(cfg: &ConvertConfig, include_queries: bool) -> BTreeSet<Vec<u64>> {
    let center = read_center(&cfg.center_path()).unwrap();
    let mut points = PointFile::open(cfg.base_path(), cfg.element).unwrap().read_all().unwrap();
    if include_queries {
        points.extend(PointFile::open(cfg.query_path(), cfg.element).unwrap().read_all().unwrap());
    }
    recenter(&mut points, &center).unwrap();
    let mut rng = ChaCha8Rng::seed_from_u64(cfg.codec_seed);
    let codec = Codec::generate(DIMS, cfg.code_bits, &mut rng).unwrap();
    code_set(&codec.encode(&points).unwrap(), codec.layout())
}

#[test]
fn converts_and_splits_a_small_corpus() {
    let root = tempfile::tempdir().unwrap();
    write_dataset(&root.path().join("data"), 500, ElementKind::F32);
    let cfg = config(root.path(), DatasetProfile::Sift1M, "out");
    let layout = CodeLayout::new(cfg.code_bits).unwrap();

    let report = Pipeline::new(cfg.clone()).unwrap().run().unwrap();
    assert_eq!(report.dims, DIMS);
    assert_eq!(report.points_seen, 520);
    assert_eq!(report.points_encoded, 520);

    let expected = brute_force_codes(&cfg, true);
    assert_eq!(report.dedup.total_unique as usize, expected.len());
    assert!(report.dedup.total_unique < 520);

    let corpus = read_word_file(&cfg.corpus_path()).unwrap();
    assert_eq!(code_set(&corpus, layout), expected);
    assert_eq!(corpus.len(), expected.len() * layout.words);

    let train = read_word_file(&cfg.train_path()).unwrap();
    let test = read_word_file(&cfg.test_path()).unwrap();
    assert_eq!(test.len(), 10 * layout.words);
    assert_eq!(report.query_codes, 10);
    assert_eq!(report.train_codes as usize, expected.len() - 10);

    let train_set = code_set(&train, layout);
    let test_set = code_set(&test, layout);
    assert!(train_set.is_disjoint(&test_set));
    let union: BTreeSet<Vec<u64>> = train_set.union(&test_set).cloned().collect();
    assert_eq!(union, expected);

    assert_eq!(ArrayStore::read_dataset(&cfg.store_path(), "train").unwrap(), train);
    assert_eq!(ArrayStore::read_dataset(&cfg.store_path(), "test").unwrap(), test);

    // scratch shards are gone once consumed
    assert_eq!(std::fs::read_dir(&cfg.scratch_dir).unwrap().count(), 0);
}

#[test]
fn reruns_are_bit_identical() {
    let root = tempfile::tempdir().unwrap();
    write_dataset(&root.path().join("data"), 300, ElementKind::F32);
    let a = config(root.path(), DatasetProfile::Sift1M, "run-a");
    let b = config(root.path(), DatasetProfile::Sift1M, "run-b");
    Pipeline::new(a.clone()).unwrap().run().unwrap();
    Pipeline::new(b.clone()).unwrap().run().unwrap();

    for (x, y) in [
        (a.center_path(), b.center_path()),
        (a.corpus_path(), b.corpus_path()),
        (a.train_path(), b.train_path()),
        (a.test_path(), b.test_path()),
        (a.store_path(), b.store_path()),
    ] {
        assert_eq!(std::fs::read(&x).unwrap(), std::fs::read(&y).unwrap(), "{:?}", x);
    }
}

#[test]
fn corpus_of_exactly_one_chunk() {
    let root = tempfile::tempdir().unwrap();
    write_dataset(&root.path().join("data"), 64, ElementKind::F32);
    let mut cfg = config(root.path(), DatasetProfile::Sift1M, "out");
    cfg.split_chunk_codes = 1_000;
    let layout = CodeLayout::new(cfg.code_bits).unwrap();

    let report = Pipeline::new(cfg.clone()).unwrap().run().unwrap();
    let expected = brute_force_codes(&cfg, true);
    assert_eq!(report.dedup.total_unique as usize, expected.len());

    let mut all = read_word_file(&cfg.train_path()).unwrap();
    all.extend(read_word_file(&cfg.test_path()).unwrap());
    assert_eq!(all.len(), expected.len() * layout.words);
    assert_eq!(code_set(&all, layout), expected);
}

#[test]
fn billion_profile_encodes_base_only_from_bytes() {
    let root = tempfile::tempdir().unwrap();
    write_dataset(&root.path().join("data"), 200, ElementKind::U8);
    let cfg = config(root.path(), DatasetProfile::Sift1B, "out");

    let report = Pipeline::new(cfg.clone()).unwrap().run().unwrap();
    assert_eq!(report.points_seen, 220);
    assert_eq!(report.points_encoded, 200);
    assert_eq!(report.dedup.total_unique as usize, brute_force_codes(&cfg, false).len());
    assert_eq!(read_center(&cfg.center_path()).unwrap().len(), DIMS);
}

#[test]
fn too_few_unique_codes_for_queries_fails() {
    let root = tempfile::tempdir().unwrap();
    let data = root.path().join("data");
    let same = vec![3.0f32; 30 * DIMS];
    write_points(&data.join("sift_base.fvecs"), &same, DIMS, ElementKind::F32).unwrap();
    write_points(&data.join("sift_query.fvecs"), &same[..DIMS], DIMS, ElementKind::F32).unwrap();

    let cfg = config(root.path(), DatasetProfile::Sift1M, "out");
    let err = Pipeline::new(cfg).unwrap().run().unwrap_err();
    assert!(matches!(err, ConvertError::Consistency(_)));
}

#[test]
fn mismatched_query_dimensions_fail() {
    let root = tempfile::tempdir().unwrap();
    let data = root.path().join("data");
    write_points(&data.join("sift_base.fvecs"), &[1.0; 4 * DIMS], DIMS, ElementKind::F32).unwrap();
    write_points(&data.join("sift_query.fvecs"), &[1.0; 6], 3, ElementKind::F32).unwrap();

    let cfg = config(root.path(), DatasetProfile::Sift1M, "out");
    let err = Pipeline::new(cfg).unwrap().run().unwrap_err();
    assert!(matches!(err, ConvertError::DimensionMismatch { expected: DIMS, actual: 3 }));
}

#[test]
fn invalid_config_is_rejected_before_running() {
    let root = tempfile::tempdir().unwrap();
    let mut cfg = config(root.path(), DatasetProfile::Sift1M, "out");
    cfg.num_shards = 12;
    assert!(matches!(Pipeline::new(cfg), Err(ConvertError::InvalidConfig(_))));
}

#[test]
fn duplicate_and_near_duplicate_points_collapse() {
    let mut rng = ChaCha8Rng::seed_from_u64(91023221);
    let codec = Codec::generate(4, 128, &mut rng).unwrap();
    let layout = codec.layout();
    assert_eq!(layout.words, 2);

    #[rustfmt::skip]
    let points = [
        1.0, 0.0, 0.0, 0.0,
        1.0, 0.0, 0.0, 0.0,    // exact duplicate
        1.0, 0.0, 0.0, 1e-6,   // near duplicate, same projection signs
        0.0, 1.0, 0.0, 0.0,
        0.0, 0.0, 1.0, 0.0,
        -1.0, 0.0, 0.0, 0.0f32,
    ];
    let codes = codec.encode(&points).unwrap();
    assert_eq!(codes.len(), 6 * 2);
    assert_eq!(codes[0..2], codes[2..4]);
    assert_eq!(codes[0..2], codes[4..6]);

    let run = || {
        let dir = tempfile::tempdir().unwrap();
        let mut dedup = ShardedDeduplicator::new(dir.path(), layout, 4, u64::MAX).unwrap();
        dedup.route_chunk(&codes[..6]).unwrap();
        dedup.route_chunk(&codes[6..]).unwrap();
        let mut out = Vec::new();
        let summary = dedup.finish(&mut out, Path::new("corpus")).unwrap();
        (summary, out)
    };

    let (summary, bytes) = run();
    assert_eq!(summary.total_routed, 6);
    assert_eq!(summary.total_unique as usize, code_set(&codes, layout).len());
    assert_eq!(summary.total_unique, 4);

    let (again, bytes_again) = run();
    assert_eq!(summary, again);
    assert_eq!(bytes, bytes_again);
}
