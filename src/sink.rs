// sink.rs – named u64 dataset sink and its memory-mapped container file

use std::fs::File;
use std::path::{Path, PathBuf};

use log::info;
use memmap2::{Mmap, MmapMut};

use crate::error::{ConvertError, Result};
use crate::io::create_truncated;

const MAGIC: &[u8; 8] = b"HAMARRAY";
const VERSION: u32 = 1;
const NAME_LEN: usize = 16;
const ENTRY_LEN: usize = NAME_LEN + 8 + 8;
const PREAMBLE_LEN: usize = 8 + 4 + 4;

/// Destination for named one-dimensional `u64` datasets.
pub trait ArraySink {
    /// Writes `data` at element offset `start` of dataset `name`.
    fn write_range(&mut self, name: &str, start: u64, data: &[u64]) -> Result<()>;

    fn finish(&mut self) -> Result<()>;
}

#[derive(Debug, Clone)]
struct Dataset {
    name: String,
    offset: usize,
    len: u64,
}

/// Memory-mapped container of fixed-size named datasets.
///
/// Layout: `HAMARRAY`, `u32` version, `u32` dataset count, then per dataset
/// a 16-byte zero-padded name, `u64` byte offset and `u64` element count,
/// followed by the 8-byte aligned little-endian data.
pub struct ArrayStore {
    path: PathBuf,
    mmap: MmapMut,
    datasets: Vec<Dataset>,
}

impl ArrayStore {
    /// Creates the file with every dataset sized up front.
    pub fn create<P: AsRef<Path>>(path: P, datasets: &[(&str, u64)]) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let mut header = Vec::new();
        header.extend_from_slice(MAGIC);
        header.extend_from_slice(&VERSION.to_le_bytes());
        header.extend_from_slice(&(datasets.len() as u32).to_le_bytes());

        let mut offset = align8(PREAMBLE_LEN + datasets.len() * ENTRY_LEN);
        let mut layout = Vec::with_capacity(datasets.len());
        for &(name, len) in datasets {
            if name.is_empty() || name.len() > NAME_LEN {
                return Err(ConvertError::InvalidConfig(format!(
                    "dataset name '{}' must be 1..={} bytes",
                    name, NAME_LEN
                )));
            }
            let mut padded = [0u8; NAME_LEN];
            padded[..name.len()].copy_from_slice(name.as_bytes());
            header.extend_from_slice(&padded);
            header.extend_from_slice(&(offset as u64).to_le_bytes());
            header.extend_from_slice(&len.to_le_bytes());

            layout.push(Dataset { name: name.to_string(), offset, len });
            offset += len as usize * 8;
        }

        let file = create_truncated(&path)?;
        file.set_len(offset as u64)
            .map_err(|e| ConvertError::io("failed to size array store", &path, e))?;
        let mut mmap = unsafe { MmapMut::map_mut(&file) }
            .map_err(|e| ConvertError::io("failed to map array store", &path, e))?;
        mmap[..header.len()].copy_from_slice(&header);

        info!(
            "Array store {:?} created: {}",
            path,
            layout
                .iter()
                .map(|d| format!("{}[{}]", d.name, d.len))
                .collect::<Vec<_>>()
                .join(", ")
        );

        Ok(Self { path, mmap, datasets: layout })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn find(&self, name: &str) -> Result<&Dataset> {
        self.datasets
            .iter()
            .find(|d| d.name == name)
            .ok_or_else(|| ConvertError::UnknownDataset(name.to_string()))
    }

    /// Reads a whole dataset back from a finished store file.
    pub fn read_dataset<P: AsRef<Path>>(path: P, name: &str) -> Result<Vec<u64>> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| ConvertError::io("failed to open array store", path, e))?;
        let mmap = unsafe { Mmap::map(&file) }
            .map_err(|e| ConvertError::io("failed to map array store", path, e))?;

        let bad = |reason: String| ConvertError::MalformedRecord {
            path: path.to_path_buf(),
            record: 0,
            reason,
        };

        if mmap.len() < PREAMBLE_LEN || &mmap[0..8] != MAGIC {
            return Err(bad("missing HAMARRAY header".into()));
        }
        let version = u32::from_le_bytes(mmap[8..12].try_into().map_err(|_| bad("short header".into()))?);
        if version != VERSION {
            return Err(bad(format!("unsupported version {}", version)));
        }
        let count = u32::from_le_bytes(mmap[12..16].try_into().map_err(|_| bad("short header".into()))?) as usize;
        if mmap.len() < PREAMBLE_LEN + count * ENTRY_LEN {
            return Err(bad("truncated dataset table".into()));
        }

        for i in 0..count {
            let entry = &mmap[PREAMBLE_LEN + i * ENTRY_LEN..PREAMBLE_LEN + (i + 1) * ENTRY_LEN];
            let raw_name = &entry[..NAME_LEN];
            let end = raw_name.iter().position(|&b| b == 0).unwrap_or(NAME_LEN);
            if &raw_name[..end] != name.as_bytes() {
                continue;
            }
            let offset = u64::from_le_bytes(entry[16..24].try_into().map_err(|_| bad("bad entry".into()))?) as usize;
            let len = u64::from_le_bytes(entry[24..32].try_into().map_err(|_| bad("bad entry".into()))?) as usize;
            let data_end = match len.checked_mul(8).and_then(|bytes| offset.checked_add(bytes)) {
                Some(end) if end <= mmap.len() => end,
                _ => return Err(bad(format!("dataset '{}' runs past end of file", name))),
            };
            return Ok(mmap[offset..data_end]
                .chunks_exact(8)
                .map(|c| u64::from_le_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]))
                .collect());
        }

        Err(ConvertError::UnknownDataset(name.to_string()))
    }
}

impl ArraySink for ArrayStore {
    fn write_range(&mut self, name: &str, start: u64, data: &[u64]) -> Result<()> {
        let dataset = self.find(name)?.clone();
        let end = start + data.len() as u64;
        if end > dataset.len {
            return Err(ConvertError::Consistency(format!(
                "write of {}..{} overruns dataset '{}' of {} elements",
                start, end, name, dataset.len
            )));
        }

        let byte_start = dataset.offset + start as usize * 8;
        let region = &mut self.mmap[byte_start..byte_start + data.len() * 8];
        for (dst, w) in region.chunks_exact_mut(8).zip(data) {
            dst.copy_from_slice(&w.to_le_bytes());
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.mmap
            .flush()
            .map_err(|e| ConvertError::io("failed to flush array store", &self.path, e))
    }
}

fn align8(n: usize) -> usize {
    (n + 7) & !7
}
