// pipeline.rs – centroid, encode/dedup and split passes

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::PathBuf;
use std::time::Instant;

use log::{debug, info};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::centroid::StreamingCentroid;
use crate::codec::Codec;
use crate::config::ConvertConfig;
use crate::dedup::{DedupSummary, ShardedDeduplicator};
use crate::error::{ConvertError, Result};
use crate::io::{create_truncated, read_words, write_center, write_word_file, write_words, PointFile};
use crate::sink::{ArraySink, ArrayStore};
use crate::split::{QueryIndexSet, Splitter};
use crate::utils::vector::recenter;

/// What a finished conversion produced.
#[derive(Debug, Clone)]
pub struct ConversionReport {
    pub dims: usize,
    pub points_seen: u64,
    pub points_encoded: u64,
    pub dedup: DedupSummary,
    pub train_codes: u64,
    pub query_codes: u64,
    pub center_path: PathBuf,
    pub corpus_path: PathBuf,
    pub train_path: PathBuf,
    pub test_path: PathBuf,
    pub store_path: PathBuf,
}

/// Drives the three passes: centroid, encode + route + dedup, split.
pub struct Pipeline {
    config: ConvertConfig,
}

impl Pipeline {
    pub fn new(config: ConvertConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn run(&self) -> Result<ConversionReport> {
        let start = Instant::now();
        let cfg = &self.config;
        info!(
            "Converting {} from {:?} → {}-bit codes",
            cfg.profile.name(),
            cfg.dataset_dir,
            cfg.code_bits
        );

        let base = PointFile::open(cfg.base_path(), cfg.element)?;
        let queries = PointFile::open(cfg.query_path(), cfg.element)?;
        if queries.dims() != base.dims() {
            return Err(ConvertError::DimensionMismatch {
                expected: base.dims(),
                actual: queries.dims(),
            });
        }
        let dims = base.dims();

        // pass 1: centroid
        let center = self.compute_center(&base, &queries)?;
        write_center(&cfg.center_path(), &center)?;

        // pass 2: encode, route, dedup
        let mut rng = ChaCha8Rng::seed_from_u64(cfg.codec_seed);
        let codec = Codec::generate(dims, cfg.code_bits, &mut rng)?;
        codec.log_summary();

        let (points_encoded, dedup) = self.encode_and_dedup(&codec, &base, &queries, &center)?;

        // pass 3: sample and split
        let mut rng = ChaCha8Rng::seed_from_u64(cfg.split_seed);
        let query_set = QueryIndexSet::sample(dedup.total_unique, cfg.num_queries, &mut rng)?;
        let (train_codes, query_codes) = self.split(&codec, &query_set, dedup.total_unique)?;

        info!(
            "Conversion finished in {:.1}s: {} train, {} test codes",
            start.elapsed().as_secs_f64(),
            train_codes,
            query_codes
        );

        Ok(ConversionReport {
            dims,
            points_seen: base.rows() + queries.rows(),
            points_encoded,
            dedup,
            train_codes,
            query_codes,
            center_path: cfg.center_path(),
            corpus_path: cfg.corpus_path(),
            train_path: cfg.train_path(),
            test_path: cfg.test_path(),
            store_path: cfg.store_path(),
        })
    }

    fn compute_center(&self, base: &PointFile, queries: &PointFile) -> Result<Vec<f32>> {
        let cfg = &self.config;
        let mut centroid = StreamingCentroid::new(base.dims(), cfg.centroid_mode);

        for i in 0..base.chunk_count(cfg.chunk_points) {
            let chunk = base.read_chunk(i * cfg.chunk_points as u64, cfg.chunk_points)?;
            centroid.observe(&chunk)?;
        }
        // The query file is folded in as one final chunk.
        centroid.observe(&queries.read_all()?)?;

        info!("# of points: {}", centroid.points());
        centroid.finalize()
    }

    fn encode_and_dedup(
        &self,
        codec: &Codec,
        base: &PointFile,
        queries: &PointFile,
        center: &[f32],
    ) -> Result<(u64, DedupSummary)> {
        let cfg = &self.config;
        let mut dedup = ShardedDeduplicator::new(
            &cfg.scratch_dir,
            codec.layout(),
            cfg.num_shards,
            cfg.shard_memory_bytes,
        )?;

        let chunks = base.chunk_count(cfg.chunk_points);
        for i in 0..chunks {
            let mut points = base.read_chunk(i * cfg.chunk_points as u64, cfg.chunk_points)?;
            recenter(&mut points, center)?;
            let codes = codec.encode(&points)?;
            dedup.route_chunk(&codes)?;
            debug!("Encoded chunk {}/{}", i + 1, chunks);
        }

        if cfg.encode_query_file {
            for i in 0..queries.chunk_count(cfg.chunk_points) {
                let mut points = queries.read_chunk(i * cfg.chunk_points as u64, cfg.chunk_points)?;
                recenter(&mut points, center)?;
                dedup.route_chunk(&codec.encode(&points)?)?;
            }
        }

        let encoded = dedup.routed();
        let corpus_path = cfg.corpus_path();
        let mut corpus = BufWriter::new(create_truncated(&corpus_path)?);
        let summary = dedup.finish(&mut corpus, &corpus_path)?;
        Ok((encoded, summary))
    }

    fn split(&self, codec: &Codec, query_set: &QueryIndexSet, corpus_size: u64) -> Result<(u64, u64)> {
        let cfg = &self.config;
        let layout = codec.layout();
        let words = layout.words as u64;
        let train_len = corpus_size - query_set.len() as u64;

        let mut store = ArrayStore::create(
            cfg.store_path(),
            &[("train", train_len * words), ("test", query_set.len() as u64 * words)],
        )?;

        let train_path = cfg.train_path();
        let mut train_out = BufWriter::new(create_truncated(&train_path)?);

        let corpus_path = cfg.corpus_path();
        let mut corpus = BufReader::new(
            File::open(&corpus_path)
                .map_err(|e| ConvertError::io("failed to reopen corpus", &corpus_path, e))?,
        );

        let mut splitter = Splitter::new(query_set, layout);
        let mut written = 0u64;
        loop {
            let chunk = read_words(&mut corpus, cfg.split_chunk_codes * layout.words, &corpus_path)?;
            if chunk.is_empty() {
                break;
            }
            let train = splitter.split_chunk(&chunk)?;
            write_words(&mut train_out, &train, &train_path)?;
            store.write_range("train", written, &train)?;
            written += train.len() as u64;
        }

        if splitter.offset() != corpus_size {
            return Err(ConvertError::Consistency(format!(
                "corpus file holds {} codes, dedup reported {}",
                splitter.offset(),
                corpus_size
            )));
        }
        let test = splitter.finish()?;

        train_out
            .flush()
            .map_err(|e| ConvertError::io("failed to flush", &train_path, e))?;
        write_word_file(&cfg.test_path(), &test)?;
        store.write_range("test", 0, &test)?;
        store.finish()?;

        info!(
            "Wrote {:?}, {:?} and {:?}",
            train_path,
            cfg.test_path(),
            store.path()
        );
        Ok((written / words, (test.len() as u64) / words))
    }
}
