// codec.rs – random-hyperplane (SimHash) encoder and the packed code layout

use log::{debug, info};
use rand::Rng;
use rand_distr::{Distribution, StandardNormal};
use sha2::{Digest, Sha256};

use crate::error::{ConvertError, Result};
use crate::utils::vector::{dot, validate_dimensions};

pub const WORD_BITS: usize = 64;

/// Shape of a packed code: `bits` signature bits in `words` u64 words,
/// hyperplane 0 in the most significant bit of word 0.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CodeLayout {
    pub bits: usize,
    pub words: usize,
}

impl CodeLayout {
    pub fn new(bits: usize) -> Result<Self> {
        if bits == 0 || bits % WORD_BITS != 0 {
            return Err(ConvertError::InvalidConfig(format!(
                "code width must be a positive multiple of {}, got {}",
                WORD_BITS, bits
            )));
        }
        Ok(Self { bits, words: bits / WORD_BITS })
    }

    pub fn code_bytes(&self) -> u64 {
        (self.words * 8) as u64
    }

    /// Number of whole codes in a flat word buffer.
    pub fn count(&self, words: &[u64]) -> usize {
        words.len() / self.words
    }
}

/// Picks a shard from the leading bits of a code's first word. Identical
/// codes always land in the same shard.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ShardRouter {
    shard_bits: u32,
}

impl ShardRouter {
    pub fn new(layout: CodeLayout, num_shards: usize) -> Result<Self> {
        if num_shards == 0 || !num_shards.is_power_of_two() {
            return Err(ConvertError::InvalidConfig(format!(
                "shard count must be a power of two, got {}",
                num_shards
            )));
        }
        let shard_bits = num_shards.trailing_zeros();
        if shard_bits as usize > layout.bits.min(WORD_BITS) {
            return Err(ConvertError::InvalidConfig(format!(
                "{} routing bits exceed the first code word",
                shard_bits
            )));
        }
        Ok(Self { shard_bits })
    }

    pub fn num_shards(&self) -> usize {
        1usize << self.shard_bits
    }

    #[inline]
    pub fn route(&self, code: &[u64]) -> usize {
        if self.shard_bits == 0 {
            0
        } else {
            (code[0] >> (WORD_BITS as u32 - self.shard_bits)) as usize
        }
    }
}

#[derive(Clone)]
pub struct Codec {
    dims: usize,
    layout: CodeLayout,
    hyperplanes: Vec<Vec<f32>>,
}

impl Codec {
    /// Draws `bits` standard-normal hyperplane normals. The same generator
    /// state always produces the same hyperplanes.
    pub fn generate<R: Rng + ?Sized>(dims: usize, bits: usize, rng: &mut R) -> Result<Self> {
        if dims == 0 {
            return Err(ConvertError::InvalidConfig("dimensionality must be non-zero".into()));
        }
        let layout = CodeLayout::new(bits)?;

        let hyperplanes: Vec<Vec<f32>> = (0..bits)
            .map(|_| {
                (0..dims)
                    .map(|_| {
                        let x: f64 = StandardNormal.sample(rng);
                        x as f32
                    })
                    .collect()
            })
            .collect();

        debug!("Generated {} random hyperplanes in {} dims", bits, dims);
        Ok(Self { dims, layout, hyperplanes })
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    pub fn layout(&self) -> CodeLayout {
        self.layout
    }

    pub fn hyperplanes(&self) -> &[Vec<f32>] {
        &self.hyperplanes
    }

    /// Encodes one centered point into `layout.words` words.
    pub fn encode_point(&self, point: &[f32], out: &mut Vec<u64>) -> Result<()> {
        if point.len() != self.dims {
            return Err(ConvertError::DimensionMismatch {
                expected: self.dims,
                actual: point.len(),
            });
        }
        for plane_chunk in self.hyperplanes.chunks(WORD_BITS) {
            let mut word = 0u64;
            for (bit, plane) in plane_chunk.iter().enumerate() {
                if dot(point, plane) >= 0.0 {
                    word |= 1u64 << (WORD_BITS - 1 - bit);
                }
            }
            out.push(word);
        }
        Ok(())
    }

    /// Encodes a flat `rows × dims` batch of centered points, keeping
    /// input order.
    pub fn encode(&self, points: &[f32]) -> Result<Vec<u64>> {
        let rows = validate_dimensions(points, self.dims)?;
        let mut codes = Vec::with_capacity(rows * self.layout.words);
        for point in points.chunks_exact(self.dims) {
            self.encode_point(point, &mut codes)?;
        }
        Ok(codes)
    }

    /// SHA-256 over the little-endian hyperplane coefficients.
    pub fn fingerprint(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update((self.dims as u32).to_le_bytes());
        hasher.update((self.layout.bits as u32).to_le_bytes());
        for plane in &self.hyperplanes {
            for v in plane {
                hasher.update(v.to_le_bytes());
            }
        }
        hasher.finalize().into()
    }

    pub fn log_summary(&self) {
        let hex: String = self.fingerprint()[..8]
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect();
        info!(
            "Codec ready → dims={} bits={} words/code={} hyperplanes={}",
            self.dims, self.layout.bits, self.layout.words, hex
        );
    }
}
