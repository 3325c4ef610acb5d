// main.rs – command-line entry point

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use log::{error, info};

use hamming_prep::config::{ConvertConfig, DatasetProfile};
use hamming_prep::utils::logger::init_logging;
use hamming_prep::Pipeline;

#[derive(Copy, Clone, Debug, ValueEnum)]
enum Profile {
    Sift1m,
    Sift1b,
}

impl From<Profile> for DatasetProfile {
    fn from(p: Profile) -> Self {
        match p {
            Profile::Sift1m => DatasetProfile::Sift1M,
            Profile::Sift1b => DatasetProfile::Sift1B,
        }
    }
}

/// Convert a SIFT point corpus into deduplicated Hamming codes split into
/// train and test sets.
#[derive(Debug, Parser)]
#[command(name = "hamming-prep", version)]
struct Cli {
    /// Code width in bits (positive multiple of 64)
    #[arg(value_name = "HAMMING-DIM", value_parser = parse_code_bits)]
    code_bits: usize,

    /// Directory holding sift_base.fvecs and sift_query.fvecs
    #[arg(value_name = "DATASET-DIRNAME")]
    dataset_dir: Option<PathBuf>,

    #[arg(long, value_enum, default_value = "sift1b")]
    profile: Profile,

    /// Where the code files, array store and centroid are written
    #[arg(long, default_value = ".")]
    output_dir: PathBuf,

    /// Directory for the temporary shard files
    #[arg(long, default_value = "temp")]
    scratch_dir: PathBuf,

    /// Number of dedup shards (power of two)
    #[arg(long)]
    shards: Option<usize>,

    /// Points per chunk in the centroid and encode passes
    #[arg(long)]
    chunk_points: Option<usize>,

    /// Largest shard, in MiB, that may be deduplicated in memory
    #[arg(long = "shard-memory-mb", value_name = "MB", value_parser = parse_shard_memory)]
    shard_memory_bytes: Option<u64>,

    /// Use the exact running-sum centroid instead of the profile default
    #[arg(long)]
    exact_centroid: bool,
}

fn parse_code_bits(s: &str) -> Result<usize, String> {
    let bits: usize = s.parse().map_err(|_| format!("'{}' is not a number", s))?;
    if bits == 0 || bits % 64 != 0 {
        return Err(format!("{} is not a positive multiple of 64", bits));
    }
    Ok(bits)
}

/// Parses a MiB count into bytes, rejecting zero and values that overflow.
fn parse_shard_memory(s: &str) -> Result<u64, String> {
    let mb: u64 = s.parse().map_err(|_| format!("'{}' is not a number", s))?;
    if mb == 0 {
        return Err("shard memory must be at least 1 MiB".into());
    }
    mb.checked_mul(1024 * 1024)
        .ok_or_else(|| format!("{} MiB does not fit in a 64-bit byte count", mb))
}

impl Cli {
    fn into_config(self) -> ConvertConfig {
        let mut cfg = ConvertConfig::for_profile(self.profile.into(), self.code_bits);
        if let Some(dir) = self.dataset_dir {
            cfg.dataset_dir = dir;
        }
        cfg.output_dir = self.output_dir;
        cfg.scratch_dir = self.scratch_dir;
        if let Some(n) = self.shards {
            cfg.num_shards = n;
        }
        if let Some(n) = self.chunk_points {
            cfg.chunk_points = n;
        }
        if let Some(bytes) = self.shard_memory_bytes {
            cfg.shard_memory_bytes = bytes;
        }
        if self.exact_centroid {
            cfg.centroid_mode = hamming_prep::CentroidMode::Exact;
        }
        cfg
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging();

    let pipeline = match Pipeline::new(cli.into_config()) {
        Ok(p) => p,
        Err(e) => {
            error!("{}", e);
            return ExitCode::from(2);
        }
    };

    match pipeline.run() {
        Ok(report) => {
            info!(
                "Done: {} points read, {} encoded, {} unique, {} train / {} test",
                report.points_seen,
                report.points_encoded,
                report.dedup.total_unique,
                report.train_codes,
                report.query_codes
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Conversion failed: {}", e);
            ExitCode::FAILURE
        }
    }
}
