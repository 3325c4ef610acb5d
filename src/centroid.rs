// centroid.rs – streaming centroid over chunked point passes

use log::{debug, info, warn};

use crate::error::{ConvertError, Result};
use crate::utils::vector::{accumulate_rows, l2_norm};

/// How per-chunk statistics are folded into the final centroid.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CentroidMode {
    /// Mean of the per-chunk means, divided by the total point count.
    /// Reproduces the published conversion; chunks of unequal size are
    /// weighted equally.
    ChunkMeans,
    /// Running sum over every point divided once by the point count.
    Exact,
}

/// Accumulates a global mean across chunks without keeping any of them.
pub struct StreamingCentroid {
    dims: usize,
    mode: CentroidMode,
    mean_sum: Vec<f64>,
    point_sum: Vec<f64>,
    chunks: u64,
    points: u64,
    first_chunk_len: Option<usize>,
    uneven: bool,
}

impl StreamingCentroid {
    pub fn new(dims: usize, mode: CentroidMode) -> Self {
        Self {
            dims,
            mode,
            mean_sum: vec![0.0; dims],
            point_sum: vec![0.0; dims],
            chunks: 0,
            points: 0,
            first_chunk_len: None,
            uneven: false,
        }
    }

    pub fn points(&self) -> u64 {
        self.points
    }

    pub fn chunks(&self) -> u64 {
        self.chunks
    }

    /// Folds in one flat `rows × dims` chunk and returns its mean.
    /// Empty chunks are skipped.
    pub fn observe(&mut self, chunk: &[f32]) -> Result<Vec<f64>> {
        let mut sum = vec![0.0f64; self.dims];
        let rows = accumulate_rows(chunk, &mut sum)?;
        if rows == 0 {
            return Ok(sum);
        }

        match self.first_chunk_len {
            None => self.first_chunk_len = Some(rows),
            Some(len) if len != rows => self.uneven = true,
            Some(_) => {}
        }

        let mean: Vec<f64> = sum.iter().map(|s| s / rows as f64).collect();
        for ((ms, ps), (m, s)) in self
            .mean_sum
            .iter_mut()
            .zip(self.point_sum.iter_mut())
            .zip(mean.iter().zip(sum.iter()))
        {
            *ms += m;
            *ps += s;
        }
        self.chunks += 1;
        self.points += rows as u64;

        debug!("Centroid chunk {} → {} points", self.chunks, rows);
        Ok(mean)
    }

    pub fn finalize(self) -> Result<Vec<f32>> {
        if self.points == 0 {
            return Err(ConvertError::EmptyCorpus);
        }

        let center: Vec<f32> = match self.mode {
            CentroidMode::ChunkMeans => {
                if self.uneven {
                    warn!(
                        "Chunks differ in size; chunk-mean centroid weights them equally ({} chunks)",
                        self.chunks
                    );
                }
                let denom = self.chunks as f64 * self.points as f64;
                self.mean_sum.iter().map(|m| (m / denom) as f32).collect()
            }
            CentroidMode::Exact => self
                .point_sum
                .iter()
                .map(|s| (s / self.points as f64) as f32)
                .collect(),
        };

        info!(
            "Centroid over {} points in {} chunks ({:?}) → norm {:.6}",
            self.points,
            self.chunks,
            self.mode,
            l2_norm(&center)
        );
        Ok(center)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_mode_is_the_true_mean() {
        let mut c = StreamingCentroid::new(2, CentroidMode::Exact);
        c.observe(&[0.0, 0.0, 2.0, 2.0, 4.0, 4.0]).unwrap();
        c.observe(&[10.0, 20.0]).unwrap();
        assert_eq!(c.points(), 4);
        assert_eq!(c.finalize().unwrap(), vec![4.0, 6.5]);
    }

    #[test]
    fn chunk_mean_mode_reproduces_published_formula() {
        let mut c = StreamingCentroid::new(2, CentroidMode::ChunkMeans);
        let m1 = c.observe(&[0.0, 0.0, 2.0, 2.0, 4.0, 4.0]).unwrap();
        let m2 = c.observe(&[10.0, 20.0]).unwrap();
        assert_eq!(m1, vec![2.0, 2.0]);
        assert_eq!(m2, vec![10.0, 20.0]);
        // mean of means = (6, 11); divided by 4 points
        assert_eq!(c.finalize().unwrap(), vec![1.5, 2.75]);
    }

    #[test]
    fn chunk_means_are_unaffected_by_order_of_equal_chunks() {
        let chunks = [[1.0f32, 3.0, 5.0, 7.0], [2.0, 2.0, 4.0, 4.0]];
        let mut fwd = StreamingCentroid::new(2, CentroidMode::ChunkMeans);
        let mut rev = StreamingCentroid::new(2, CentroidMode::ChunkMeans);
        for c in chunks.iter() {
            fwd.observe(c).unwrap();
        }
        for c in chunks.iter().rev() {
            rev.observe(c).unwrap();
        }
        assert_eq!(fwd.finalize().unwrap(), rev.finalize().unwrap());
    }

    #[test]
    fn empty_chunks_are_skipped() {
        let mut c = StreamingCentroid::new(3, CentroidMode::ChunkMeans);
        c.observe(&[]).unwrap();
        assert_eq!(c.chunks(), 0);
        assert!(matches!(c.finalize(), Err(ConvertError::EmptyCorpus)));
    }

    #[test]
    fn ragged_chunk_is_rejected() {
        let mut c = StreamingCentroid::new(3, CentroidMode::Exact);
        assert!(matches!(
            c.observe(&[1.0, 2.0]),
            Err(ConvertError::DimensionMismatch { .. })
        ));
    }
}
