//! Binary dense record format.
//!
//! ```text
//! +------------+------------+-----------------------------------+
//! | rows: u64  | cols: u64  | rows * cols x f64, row-major      |
//! +------------+------------+-----------------------------------+
//! ```
//!
//! All values are in native byte order, the layout produced by writing the
//! raw memory of the counts and the value array. Vectors are stored as
//! `n x 1` records. Bytes after the payload are ignored.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use ndarray::{Array1, Array2};
use thiserror::Error;

const HEADER_BYTES: u64 = 16;
const VALUE_BYTES: u64 = std::mem::size_of::<f64>() as u64;

/// Errors while reading or writing a record.
#[derive(Debug, Error)]
pub enum FormatError {
    #[error("Cannot open {}: {source}", .path.display())]
    Open { path: PathBuf, source: io::Error },

    #[error("Cannot create {}: {source}", .path.display())]
    Create { path: PathBuf, source: io::Error },

    #[error("Record truncated: expected {expected} bytes, found {found}")]
    Truncated { expected: u64, found: u64 },

    #[error("Record header {rows}x{cols} is too large")]
    TooLarge { rows: u64, cols: u64 },

    #[error("Record has {rows}x{cols} shape but {len} values")]
    Shape { rows: usize, cols: usize, len: usize },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// A dense row-major record as stored on disk.
#[derive(Debug, Clone, PartialEq)]
pub struct DenseRecord {
    pub rows: usize,
    pub cols: usize,
    pub data: Vec<f64>,
}

impl DenseRecord {
    pub fn new(rows: usize, cols: usize, data: Vec<f64>) -> Result<Self, FormatError> {
        if rows.checked_mul(cols) != Some(data.len()) {
            return Err(FormatError::Shape {
                rows,
                cols,
                len: data.len(),
            });
        }
        Ok(Self { rows, cols, data })
    }

    /// An `n x 1` column record.
    pub fn column(values: &[f64]) -> Self {
        Self {
            rows: values.len(),
            cols: 1,
            data: values.to_vec(),
        }
    }

    pub fn from_matrix(matrix: &Array2<f64>) -> Self {
        let (rows, cols) = matrix.dim();
        Self {
            rows,
            cols,
            data: matrix.iter().copied().collect(),
        }
    }

    pub fn dims(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn into_matrix(self) -> Result<Array2<f64>, FormatError> {
        let (rows, cols, len) = (self.rows, self.cols, self.data.len());
        Array2::from_shape_vec((rows, cols), self.data)
            .map_err(|_| FormatError::Shape { rows, cols, len })
    }

    /// Flatten into a vector; meaningful for `n x 1` records.
    pub fn into_vector(self) -> Array1<f64> {
        Array1::from_vec(self.data)
    }
}

/// Byte length of the payload announced by a header.
fn payload_bytes(rows: u64, cols: u64) -> Result<u64, FormatError> {
    rows.checked_mul(cols)
        .and_then(|n| n.checked_mul(VALUE_BYTES))
        .filter(|&bytes| usize::try_from(bytes).is_ok())
        .ok_or(FormatError::TooLarge { rows, cols })
}

/// Read until `buf` is full or the stream ends; returns the bytes read.
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

fn read_header<R: Read>(reader: &mut R) -> Result<(u64, u64), FormatError> {
    let mut header = [0u64; 2];
    let found = read_full(reader, bytemuck::cast_slice_mut(&mut header))?;
    if (found as u64) < HEADER_BYTES {
        return Err(FormatError::Truncated {
            expected: HEADER_BYTES,
            found: found as u64,
        });
    }
    Ok((header[0], header[1]))
}

fn read_payload<R: Read>(reader: &mut R, rows: u64, cols: u64) -> Result<DenseRecord, FormatError> {
    let bytes = payload_bytes(rows, cols)?;
    let len = (bytes / VALUE_BYTES) as usize;
    let (rows, cols) = (rows as usize, cols as usize);

    let mut data = vec![0.0f64; len];
    let found = read_full(reader, bytemuck::cast_slice_mut(&mut data))?;
    if (found as u64) < bytes {
        return Err(FormatError::Truncated {
            expected: HEADER_BYTES + bytes,
            found: HEADER_BYTES + found as u64,
        });
    }
    Ok(DenseRecord { rows, cols, data })
}

/// Read a record from a stream.
pub fn read_from<R: Read>(reader: &mut R) -> Result<DenseRecord, FormatError> {
    let (rows, cols) = read_header(reader)?;
    read_payload(reader, rows, cols)
}

/// Write a record to a stream.
pub fn write_to<W: Write>(writer: &mut W, record: &DenseRecord) -> Result<(), FormatError> {
    let header = [record.rows as u64, record.cols as u64];
    writer.write_all(bytemuck::cast_slice(&header))?;
    writer.write_all(bytemuck::cast_slice(&record.data))?;
    Ok(())
}

/// Read a record from a file.
///
/// The announced payload is checked against the file length before any
/// allocation, so a corrupt header fails fast instead of exhausting memory.
pub fn read_record(path: &Path) -> Result<DenseRecord, FormatError> {
    let file = File::open(path).map_err(|source| FormatError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let file_len = file.metadata()?.len();
    let mut reader = BufReader::new(file);

    let (rows, cols) = read_header(&mut reader)?;
    let expected = HEADER_BYTES + payload_bytes(rows, cols)?;
    if file_len < expected {
        return Err(FormatError::Truncated {
            expected,
            found: file_len,
        });
    }
    if file_len > expected {
        log::warn!(
            "{}: ignoring {} trailing bytes",
            path.display(),
            file_len - expected
        );
    }
    let record = read_payload(&mut reader, rows, cols)?;
    log::debug!("read {}x{} record from {}", rows, cols, path.display());
    Ok(record)
}

/// Read a record from a file as a matrix.
pub fn read_matrix(path: &Path) -> Result<Array2<f64>, FormatError> {
    read_record(path)?.into_matrix()
}

/// Write a record to a file, replacing any existing file.
pub fn write_record(path: &Path, record: &DenseRecord) -> Result<(), FormatError> {
    let file = File::create(path).map_err(|source| FormatError::Create {
        path: path.to_path_buf(),
        source,
    })?;
    let mut writer = BufWriter::new(file);
    write_to(&mut writer, record)?;
    writer.flush()?;
    log::debug!("wrote {}x{} record to {}", record.rows, record.cols, path.display());
    Ok(())
}

/// Write a matrix as a `rows x cols` record.
pub fn write_matrix(path: &Path, matrix: &Array2<f64>) -> Result<(), FormatError> {
    write_record(path, &DenseRecord::from_matrix(matrix))
}

/// Write a vector as an `n x 1` record.
pub fn write_vector(path: &Path, values: &[f64]) -> Result<(), FormatError> {
    write_record(path, &DenseRecord::column(values))
}
