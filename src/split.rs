// split.rs – query sampling and the single-pass train/test split

use std::collections::HashSet;

use log::{debug, info};
use rand::seq::index;
use rand::Rng;

use crate::codec::CodeLayout;
use crate::error::{ConvertError, Result};

/// Global corpus indices held out as queries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryIndexSet {
    indices: HashSet<u64>,
}

impl QueryIndexSet {
    /// Uniform sample of `num_queries` distinct indices from
    /// `[0, corpus_size)`.
    pub fn sample<R: Rng + ?Sized>(corpus_size: u64, num_queries: usize, rng: &mut R) -> Result<Self> {
        if (num_queries as u64) > corpus_size {
            return Err(ConvertError::Consistency(format!(
                "cannot hold out {} queries from a corpus of {} codes",
                num_queries, corpus_size
            )));
        }
        let length = usize::try_from(corpus_size).map_err(|_| {
            ConvertError::InvalidConfig(format!("corpus of {} codes exceeds usize", corpus_size))
        })?;

        let indices: HashSet<u64> = index::sample(rng, length, num_queries)
            .into_iter()
            .map(|i| i as u64)
            .collect();
        debug!("Sampled {} query indices from {} codes", indices.len(), corpus_size);
        Ok(Self { indices })
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn contains(&self, index: u64) -> bool {
        self.indices.contains(&index)
    }

    pub fn sorted(&self) -> Vec<u64> {
        let mut v: Vec<u64> = self.indices.iter().copied().collect();
        v.sort_unstable();
        v
    }
}

/// Single pass over the deduplicated corpus, sending each code to the
/// train or query stream by its global index.
pub struct Splitter<'a> {
    queries: &'a QueryIndexSet,
    layout: CodeLayout,
    offset: u64,
    query_codes: Vec<u64>,
    train_count: u64,
}

impl<'a> Splitter<'a> {
    pub fn new(queries: &'a QueryIndexSet, layout: CodeLayout) -> Self {
        Self {
            queries,
            layout,
            offset: 0,
            query_codes: Vec::with_capacity(queries.len() * layout.words),
            train_count: 0,
        }
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Classifies the chunk covering `[offset, offset + n)` and returns its
    /// training codes. Query codes are kept until `finish`.
    pub fn split_chunk(&mut self, chunk: &[u64]) -> Result<Vec<u64>> {
        let words = self.layout.words;
        if chunk.len() % words != 0 {
            return Err(ConvertError::DimensionMismatch {
                expected: words,
                actual: chunk.len() % words,
            });
        }

        let mut train = Vec::with_capacity(chunk.len());
        let mut n = 0u64;
        for (j, code) in chunk.chunks_exact(words).enumerate() {
            if self.queries.contains(self.offset + j as u64) {
                self.query_codes.extend_from_slice(code);
            } else {
                train.extend_from_slice(code);
            }
            n += 1;
        }

        self.offset += n;
        self.train_count += (train.len() / words) as u64;
        Ok(train)
    }

    /// Returns the query codes, failing if the stream does not hold
    /// exactly one code per sampled index.
    pub fn finish(self) -> Result<Vec<u64>> {
        let got = self.query_codes.len() / self.layout.words;
        if got != self.queries.len() {
            return Err(ConvertError::Consistency(format!(
                "query stream holds {} codes, expected {} (corpus scanned up to {})",
                got,
                self.queries.len(),
                self.offset
            )));
        }
        info!(
            "Split {} codes → {} train, {} queries",
            self.offset, self.train_count, got
        );
        Ok(self.query_codes)
    }
}
