// config.rs – dataset profiles, run configuration and output naming

use std::path::{Path, PathBuf};

use crate::centroid::CentroidMode;
use crate::error::{ConvertError, Result};
use crate::io::ElementKind;

// ========== DEFAULTS ==========
pub const SPLIT_SEED: u64 = 4057218;
pub const CODEC_SEED: u64 = 91023221;
pub const DEFAULT_SHARDS: usize = 32;
pub const MAX_SHARDS: usize = 4096;
pub const DEFAULT_CHUNK_POINTS: usize = 1_000_000;
pub const SPLIT_CHUNK_CODES: usize = 10_000_000;
pub const DEFAULT_SHARD_MEMORY_MB: u64 = 8 * 1024;
pub const MAX_DIMENSIONS: usize = 256;
pub const BASE_FILE: &str = "sift_base.fvecs";
pub const QUERY_FILE: &str = "sift_query.fvecs";

/// Per-dataset settings of the two supported corpora.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DatasetProfile {
    Sift1M,
    Sift1B,
}

impl DatasetProfile {
    pub fn name(&self) -> &'static str {
        match self {
            DatasetProfile::Sift1M => "sift1m",
            DatasetProfile::Sift1B => "sift1b",
        }
    }

    pub fn element(&self) -> ElementKind {
        match self {
            DatasetProfile::Sift1M => ElementKind::F32,
            DatasetProfile::Sift1B => ElementKind::U8,
        }
    }

    pub fn num_queries(&self) -> usize {
        match self {
            DatasetProfile::Sift1M => 1_000,
            DatasetProfile::Sift1B => 10_000,
        }
    }

    pub fn default_dir(&self) -> &'static str {
        match self {
            DatasetProfile::Sift1M => "datasets/SIFT1M",
            DatasetProfile::Sift1B => "datasets/SIFT1B",
        }
    }

    pub fn centroid_mode(&self) -> CentroidMode {
        match self {
            DatasetProfile::Sift1M => CentroidMode::Exact,
            DatasetProfile::Sift1B => CentroidMode::ChunkMeans,
        }
    }

    /// The million-scale corpus folds the query file into the encoded
    /// corpus; the billion-scale one only uses it for the centroid.
    pub fn encode_query_file(&self) -> bool {
        matches!(self, DatasetProfile::Sift1M)
    }
}

#[derive(Clone, Debug)]
pub struct ConvertConfig {
    pub profile: DatasetProfile,
    pub code_bits: usize,
    pub dataset_dir: PathBuf,
    pub output_dir: PathBuf,
    pub scratch_dir: PathBuf,
    pub element: ElementKind,
    pub num_queries: usize,
    pub num_shards: usize,
    pub chunk_points: usize,
    pub split_chunk_codes: usize,
    pub shard_memory_bytes: u64,
    pub centroid_mode: CentroidMode,
    pub encode_query_file: bool,
    pub codec_seed: u64,
    pub split_seed: u64,
}

impl ConvertConfig {
    pub fn for_profile(profile: DatasetProfile, code_bits: usize) -> Self {
        Self {
            profile,
            code_bits,
            dataset_dir: PathBuf::from(profile.default_dir()),
            output_dir: PathBuf::from("."),
            scratch_dir: PathBuf::from("temp"),
            element: profile.element(),
            num_queries: profile.num_queries(),
            num_shards: DEFAULT_SHARDS,
            chunk_points: DEFAULT_CHUNK_POINTS,
            split_chunk_codes: SPLIT_CHUNK_CODES,
            shard_memory_bytes: DEFAULT_SHARD_MEMORY_MB * 1024 * 1024,
            centroid_mode: profile.centroid_mode(),
            encode_query_file: profile.encode_query_file(),
            codec_seed: CODEC_SEED,
            split_seed: SPLIT_SEED,
        }
    }

    /// Rejects anything that cannot be run to completion, before any file
    /// is opened.
    pub fn validate(&self) -> Result<()> {
        if self.code_bits == 0 || self.code_bits % 64 != 0 {
            return Err(ConvertError::InvalidConfig(format!(
                "code width must be a positive multiple of 64, got {}",
                self.code_bits
            )));
        }
        if self.num_shards == 0 || self.num_shards > MAX_SHARDS {
            return Err(ConvertError::InvalidConfig(format!(
                "shard count must be between 1 and {}, got {}",
                MAX_SHARDS, self.num_shards
            )));
        }
        // Routing reads whole bits of the first code word, so only a power
        // of two splits the code space evenly.
        if !self.num_shards.is_power_of_two() {
            return Err(ConvertError::InvalidConfig(format!(
                "shard count must be a power of two, got {}",
                self.num_shards
            )));
        }
        if self.num_shards.trailing_zeros() as usize > self.code_bits.min(64) {
            return Err(ConvertError::InvalidConfig(format!(
                "{} shards need more routing bits than a {}-bit code provides",
                self.num_shards, self.code_bits
            )));
        }
        if self.chunk_points == 0 || self.split_chunk_codes == 0 {
            return Err(ConvertError::InvalidConfig(
                "chunk sizes must be non-zero".into(),
            ));
        }
        if self.num_queries == 0 {
            return Err(ConvertError::InvalidConfig(
                "query count must be non-zero".into(),
            ));
        }
        if self.shard_memory_bytes == 0 {
            return Err(ConvertError::InvalidConfig(
                "shard memory budget must be non-zero".into(),
            ));
        }
        Ok(())
    }

    pub fn enc_dim(&self) -> usize {
        self.code_bits / 64
    }

    pub fn base_path(&self) -> PathBuf {
        self.dataset_dir.join(BASE_FILE)
    }

    pub fn query_path(&self) -> PathBuf {
        self.dataset_dir.join(QUERY_FILE)
    }

    pub fn corpus_path(&self) -> PathBuf {
        self.output_file(&format!("{}-hamming-all-{}.dat", self.profile.name(), self.code_bits))
    }

    pub fn train_path(&self) -> PathBuf {
        self.output_file(&format!("{}-hamming-train-{}.dat", self.profile.name(), self.code_bits))
    }

    pub fn test_path(&self) -> PathBuf {
        self.output_file(&format!("{}-hamming-test-{}.dat", self.profile.name(), self.code_bits))
    }

    pub fn store_path(&self) -> PathBuf {
        self.output_file(&format!("{}-hamming-{}.h5a", self.profile.name(), self.code_bits))
    }

    pub fn center_path(&self) -> PathBuf {
        self.output_file(&format!("{}_CENTER.dat", self.profile.name().to_uppercase()))
    }

    fn output_file(&self, name: &str) -> PathBuf {
        Path::new(&self.output_dir).join(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profiles_carry_dataset_defaults() {
        let small = ConvertConfig::for_profile(DatasetProfile::Sift1M, 128);
        assert_eq!(small.num_queries, 1_000);
        assert_eq!(small.element, ElementKind::F32);
        assert_eq!(small.centroid_mode, CentroidMode::Exact);
        assert!(small.encode_query_file);

        let big = ConvertConfig::for_profile(DatasetProfile::Sift1B, 128);
        assert_eq!(big.num_queries, 10_000);
        assert_eq!(big.element, ElementKind::U8);
        assert_eq!(big.centroid_mode, CentroidMode::ChunkMeans);
        assert!(!big.encode_query_file);
        assert_eq!(big.enc_dim(), 2);
    }

    #[test]
    fn rejects_code_width_not_multiple_of_64() {
        for bits in [0, 1, 63, 65, 100] {
            let cfg = ConvertConfig::for_profile(DatasetProfile::Sift1M, bits);
            assert!(matches!(cfg.validate(), Err(ConvertError::InvalidConfig(_))), "{bits}");
        }
        for bits in [64, 128, 256] {
            let cfg = ConvertConfig::for_profile(DatasetProfile::Sift1M, bits);
            assert!(cfg.validate().is_ok(), "{bits}");
        }
    }

    #[test]
    fn rejects_unbalanced_shard_counts() {
        let mut cfg = ConvertConfig::for_profile(DatasetProfile::Sift1B, 64);
        cfg.num_shards = 24;
        assert!(cfg.validate().is_err());
        cfg.num_shards = 0;
        assert!(cfg.validate().is_err());
        cfg.num_shards = MAX_SHARDS * 2;
        assert!(cfg.validate().is_err());
        cfg.num_shards = 1;
        assert!(cfg.validate().is_ok());
        cfg.num_shards = MAX_SHARDS;
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn output_names_follow_profile_and_width() {
        let mut cfg = ConvertConfig::for_profile(DatasetProfile::Sift1B, 256);
        cfg.output_dir = PathBuf::from("/out");
        assert_eq!(cfg.train_path(), PathBuf::from("/out/sift1b-hamming-train-256.dat"));
        assert_eq!(cfg.test_path(), PathBuf::from("/out/sift1b-hamming-test-256.dat"));
        assert_eq!(cfg.corpus_path(), PathBuf::from("/out/sift1b-hamming-all-256.dat"));
        assert_eq!(cfg.store_path(), PathBuf::from("/out/sift1b-hamming-256.h5a"));
        assert_eq!(cfg.center_path(), PathBuf::from("/out/SIFT1B_CENTER.dat"));
    }
}
