// dedup.rs – bounded-memory exact deduplication over scratch shard files

use std::collections::HashSet;
use std::fs::{remove_file, File};
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use log::{debug, info};
use xxhash_rust::xxh64::Xxh64Builder;

use crate::codec::{CodeLayout, ShardRouter};
use crate::error::{ConvertError, Result};
use crate::io::{create_truncated, read_words, write_words};

const HASH_SEED: u64 = 0;

/// Append-only scratch file holding the codes routed to one shard.
pub struct Shard {
    id: usize,
    path: PathBuf,
    writer: BufWriter<File>,
    codes: u64,
}

impl Shard {
    pub fn create(dir: &Path, id: usize) -> Result<Self> {
        let path = dir.join(format!("{}.dat", id));
        let file = create_truncated(&path)?;
        Ok(Self {
            id,
            path,
            writer: BufWriter::new(file),
            codes: 0,
        })
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn codes(&self) -> u64 {
        self.codes
    }

    pub fn append(&mut self, words: &[u64], layout: CodeLayout) -> Result<()> {
        write_words(&mut self.writer, words, &self.path)?;
        self.codes += layout.count(words) as u64;
        Ok(())
    }

    /// Reads every code back, consuming the handle and removing the file.
    fn drain(self, layout: CodeLayout) -> Result<Vec<u64>> {
        let Shard { path, writer, codes, .. } = self;
        let mut file = writer
            .into_inner()
            .map_err(|e| ConvertError::io("failed to flush shard", &path, e.into_error()))?;
        file.seek(SeekFrom::Start(0))
            .map_err(|e| ConvertError::io("failed to rewind shard", &path, e))?;

        let expected = codes as usize * layout.words;
        let words = read_words(&mut file, expected, &path)?;
        if words.len() != expected {
            return Err(ConvertError::Consistency(format!(
                "shard {:?} returned {} words, {} were written",
                path,
                words.len(),
                expected
            )));
        }

        drop(file);
        remove_file(&path).map_err(|e| ConvertError::io("failed to remove shard", &path, e))?;
        Ok(words)
    }
}

/// Result of the per-shard deduplication pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DedupSummary {
    pub routed_per_shard: Vec<u64>,
    pub unique_per_shard: Vec<u64>,
    pub total_routed: u64,
    pub total_unique: u64,
}

/// Routes codes into disjoint scratch shards as they are produced, then
/// deduplicates each shard in memory.
pub struct ShardedDeduplicator {
    layout: CodeLayout,
    router: ShardRouter,
    shards: Vec<Shard>,
    shard_budget_bytes: u64,
    routed: u64,
}

impl ShardedDeduplicator {
    pub fn new(
        scratch_dir: &Path,
        layout: CodeLayout,
        num_shards: usize,
        shard_budget_bytes: u64,
    ) -> Result<Self> {
        let router = ShardRouter::new(layout, num_shards)?;
        std::fs::create_dir_all(scratch_dir)
            .map_err(|e| ConvertError::io("failed to create scratch directory", scratch_dir, e))?;

        let shards = (0..num_shards)
            .map(|k| Shard::create(scratch_dir, k))
            .collect::<Result<Vec<_>>>()?;

        info!(
            "Routing {}-bit codes into {} shards under {:?}",
            layout.bits, num_shards, scratch_dir
        );

        Ok(Self {
            layout,
            router,
            shards,
            shard_budget_bytes,
            routed: 0,
        })
    }

    pub fn layout(&self) -> CodeLayout {
        self.layout
    }

    pub fn routed(&self) -> u64 {
        self.routed
    }

    /// Splits one encoded chunk by shard and appends each part to its
    /// scratch file. Only this chunk's codes are buffered.
    pub fn route_chunk(&mut self, codes: &[u64]) -> Result<()> {
        let words = self.layout.words;
        if codes.len() % words != 0 {
            return Err(ConvertError::DimensionMismatch {
                expected: words,
                actual: codes.len() % words,
            });
        }

        let mut per_shard: Vec<Vec<u64>> = vec![Vec::new(); self.shards.len()];
        for code in codes.chunks_exact(words) {
            per_shard[self.router.route(code)].extend_from_slice(code);
        }

        for (shard, part) in self.shards.iter_mut().zip(per_shard.iter()) {
            if !part.is_empty() {
                shard.append(part, self.layout)?;
            }
        }

        let n = (codes.len() / words) as u64;
        self.routed += n;
        debug!("Routed {} codes ({} total)", n, self.routed);
        Ok(())
    }

    /// Deduplicates every shard and appends its unique codes to `out`.
    pub fn finish<W: Write>(self, out: &mut W, out_path: &Path) -> Result<DedupSummary> {
        let layout = self.layout;
        let mut summary = DedupSummary {
            routed_per_shard: Vec::with_capacity(self.shards.len()),
            unique_per_shard: Vec::with_capacity(self.shards.len()),
            total_routed: self.routed,
            total_unique: 0,
        };

        for shard in self.shards {
            let id = shard.id();
            let codes = shard.codes();
            let bytes = codes * layout.code_bytes();
            if bytes > self.shard_budget_bytes {
                return Err(ConvertError::ShardOverflow {
                    shard: id,
                    codes,
                    bytes,
                    budget: self.shard_budget_bytes,
                });
            }

            let words = shard.drain(layout)?;
            let unique = dedup_codes(&words, layout);
            let kept = layout.count(&unique) as u64;
            info!(
                "Shard {}: before dedup {} points, after {} points",
                id, codes, kept
            );

            write_words(out, &unique, out_path)?;
            summary.routed_per_shard.push(codes);
            summary.unique_per_shard.push(kept);
            summary.total_unique += kept;
        }

        out.flush()
            .map_err(|e| ConvertError::io("failed to flush corpus", out_path, e))?;
        info!(
            "Deduplicated corpus: {} of {} codes kept",
            summary.total_unique, summary.total_routed
        );
        Ok(summary)
    }
}

/// Exact in-memory deduplication keyed by the raw code words. Keeps the
/// first occurrence of each code, in input order.
pub fn dedup_codes(words: &[u64], layout: CodeLayout) -> Vec<u64> {
    let mut seen: HashSet<&[u64], Xxh64Builder> =
        HashSet::with_capacity_and_hasher(layout.count(words), Xxh64Builder::new(HASH_SEED));
    let mut unique = Vec::with_capacity(words.len());
    for code in words.chunks_exact(layout.words) {
        if seen.insert(code) {
            unique.extend_from_slice(code);
        }
    }
    unique
}
