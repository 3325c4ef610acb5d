// io.rs – memory-mapped point files and little-endian word files

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use log::{debug, info};
use memmap2::Mmap;

use crate::config::MAX_DIMENSIONS;
use crate::error::{ConvertError, Result};

const DIM_HEADER: usize = 4;

/// Storage width of one vector element in a point file.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ElementKind {
    /// One unsigned byte per element (bvecs).
    U8,
    /// Little-endian `f32` per element (fvecs).
    F32,
}

impl ElementKind {
    pub fn width(&self) -> usize {
        match self {
            ElementKind::U8 => 1,
            ElementKind::F32 => 4,
        }
    }
}

/// A memory-mapped point file: records of a `u32` dimension followed by
/// that many elements. Only the pages of the chunk being read are touched.
pub struct PointFile {
    path: PathBuf,
    mmap: Mmap,
    element: ElementKind,
    dims: usize,
    rows: u64,
}

impl PointFile {
    pub fn open<P: AsRef<Path>>(path: P, element: ElementKind) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)
            .map_err(|e| ConvertError::io("can't open the file with the dataset", &path, e))?;
        let mmap = unsafe { Mmap::map(&file) }
            .map_err(|e| ConvertError::io("can't map the file with the dataset", &path, e))?;

        if mmap.len() < DIM_HEADER {
            return Err(ConvertError::MalformedRecord {
                path,
                record: 0,
                reason: format!("file is {} bytes, too small for a record header", mmap.len()),
            });
        }

        let dims = u32::from_le_bytes([mmap[0], mmap[1], mmap[2], mmap[3]]) as usize;
        if dims == 0 || dims > MAX_DIMENSIONS {
            return Err(ConvertError::MalformedRecord {
                path,
                record: 0,
                reason: format!("dimension {} outside 1..={}", dims, MAX_DIMENSIONS),
            });
        }

        let record_size = (DIM_HEADER + dims * element.width()) as u64;
        let len = mmap.len() as u64;
        if len % record_size != 0 {
            return Err(ConvertError::MalformedRecord {
                path,
                record: len / record_size,
                reason: format!(
                    "{} trailing bytes cannot hold a {}-byte record",
                    len % record_size,
                    record_size
                ),
            });
        }

        let rows = len / record_size;
        info!(
            "Opened point file {:?}: {} points × {} dims ({:?})",
            path, rows, dims, element
        );

        Ok(Self { path, mmap, element, dims, rows })
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    pub fn rows(&self) -> u64 {
        self.rows
    }

    pub fn record_size(&self) -> usize {
        DIM_HEADER + self.dims * self.element.width()
    }

    /// Number of chunks of `chunk_points` needed to cover the file.
    pub fn chunk_count(&self, chunk_points: usize) -> u64 {
        self.rows.div_ceil(chunk_points as u64)
    }

    /// Decodes up to `count` points starting at record `start` into a flat
    /// `rows × dims` buffer. Reading past the end yields a short chunk.
    pub fn read_chunk(&self, start: u64, count: usize) -> Result<Vec<f32>> {
        let end = (start + count as u64).min(self.rows);
        if start >= end {
            return Ok(Vec::new());
        }

        let record_size = self.record_size();
        let mut out = Vec::with_capacity((end - start) as usize * self.dims);

        for record in start..end {
            let offset = record as usize * record_size;
            let bytes = &self.mmap[offset..offset + record_size];
            let declared = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize;
            if declared != self.dims {
                return Err(ConvertError::MalformedRecord {
                    path: self.path.clone(),
                    record,
                    reason: format!("declares {} dims, file uses {}", declared, self.dims),
                });
            }

            let body = &bytes[DIM_HEADER..];
            match self.element {
                ElementKind::U8 => out.extend(body.iter().map(|&b| b as f32)),
                ElementKind::F32 => out.extend(
                    body.chunks_exact(4)
                        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]])),
                ),
            }
        }

        debug!("Read points {}..{} from {:?}", start, end, self.path);
        Ok(out)
    }

    pub fn read_all(&self) -> Result<Vec<f32>> {
        self.read_chunk(0, self.rows as usize)
    }
}

/// Opens `path` for writing, truncating anything already there.
pub fn create_truncated(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ConvertError::io("failed to create directory", parent, e))?;
        }
    }
    OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
        .map_err(|e| ConvertError::io("failed to open for writing", path, e))
}

/// Appends packed code words in little-endian order.
pub fn write_words<W: Write>(writer: &mut W, words: &[u64], path: &Path) -> Result<()> {
    if cfg!(target_endian = "little") {
        writer
            .write_all(bytemuck::cast_slice::<u64, u8>(words))
            .map_err(|e| ConvertError::io("failed to write codes to", path, e))
    } else {
        for w in words {
            writer
                .write_all(&w.to_le_bytes())
                .map_err(|e| ConvertError::io("failed to write codes to", path, e))?;
        }
        Ok(())
    }
}

/// Reads up to `max_words` little-endian words. A short read at end of file
/// returns fewer words; a partial trailing word is malformed.
pub fn read_words<R: Read>(reader: &mut R, max_words: usize, path: &Path) -> Result<Vec<u64>> {
    let mut words = vec![0u64; max_words];
    let bytes = bytemuck::cast_slice_mut::<u64, u8>(&mut words);
    let mut filled = 0;
    while filled < bytes.len() {
        match reader.read(&mut bytes[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(ConvertError::io("failed to read codes from", path, e)),
        }
    }
    if filled % 8 != 0 {
        return Err(ConvertError::MalformedRecord {
            path: path.to_path_buf(),
            record: (filled / 8) as u64,
            reason: format!("{} stray bytes after the last whole word", filled % 8),
        });
    }
    words.truncate(filled / 8);
    for w in words.iter_mut() {
        *w = u64::from_le(*w);
    }
    Ok(words)
}

/// Writes a whole code file in one go.
pub fn write_word_file(path: &Path, words: &[u64]) -> Result<()> {
    let mut writer = BufWriter::new(create_truncated(path)?);
    write_words(&mut writer, words, path)?;
    writer
        .flush()
        .map_err(|e| ConvertError::io("failed to flush", path, e))
}

pub fn read_word_file(path: &Path) -> Result<Vec<u64>> {
    let mut file =
        File::open(path).map_err(|e| ConvertError::io("failed to open", path, e))?;
    let len = file
        .metadata()
        .map_err(|e| ConvertError::io("failed to stat", path, e))?
        .len();
    read_words(&mut file, len.div_ceil(8) as usize, path)
}

/// Centroid sidecar: `u32` dimensionality then one `f32` per element.
pub fn write_center(path: &Path, center: &[f32]) -> Result<()> {
    let mut writer = BufWriter::new(create_truncated(path)?);
    let mut buf = Vec::with_capacity(4 + center.len() * 4);
    buf.extend_from_slice(&(center.len() as u32).to_le_bytes());
    for v in center {
        buf.extend_from_slice(&v.to_le_bytes());
    }
    writer
        .write_all(&buf)
        .and_then(|_| writer.flush())
        .map_err(|e| ConvertError::io("failed to write centroid", path, e))?;
    info!("Centroid ({} dims) written to {:?}", center.len(), path);
    Ok(())
}

pub fn read_center(path: &Path) -> Result<Vec<f32>> {
    let mut bytes = Vec::new();
    File::open(path)
        .and_then(|mut f| f.read_to_end(&mut bytes))
        .map_err(|e| ConvertError::io("failed to read centroid", path, e))?;
    if bytes.len() < 4 {
        return Err(ConvertError::MalformedRecord {
            path: path.to_path_buf(),
            record: 0,
            reason: "missing dimension header".into(),
        });
    }
    let dims = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize;
    if bytes.len() != 4 + dims * 4 {
        return Err(ConvertError::MalformedRecord {
            path: path.to_path_buf(),
            record: 0,
            reason: format!("expected {} values, found {} bytes", dims, bytes.len() - 4),
        });
    }
    Ok(bytes[4..]
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

/// Writes points in the point-file record layout. Used to build fixtures.
pub fn write_points(path: &Path, points: &[f32], dims: usize, element: ElementKind) -> Result<()> {
    crate::utils::vector::validate_dimensions(points, dims)?;
    let mut writer = BufWriter::new(create_truncated(path)?);
    let mut buf = Vec::new();
    for row in points.chunks_exact(dims) {
        buf.extend_from_slice(&(dims as u32).to_le_bytes());
        match element {
            ElementKind::U8 => buf.extend(row.iter().map(|&v| v as u8)),
            ElementKind::F32 => {
                for v in row {
                    buf.extend_from_slice(&v.to_le_bytes());
                }
            }
        }
    }
    writer
        .write_all(&buf)
        .and_then(|_| writer.flush())
        .map_err(|e| ConvertError::io("failed to write points", path, e))
}
