//! Flat binary coefficient files
//!
//! A coefficient file holds twelve consecutive monthly blocks, January first. Each block is
//! [`COEFFICIENTS_PER_MONTH`] single-precision values with no header or padding, so the
//! block for month `m` starts at byte `(m - 1) * BLOCK_BYTES`.

use crate::coefficients::CoefficientSource;
use crate::errors::{RSCTMError, RSCTMResult};
use crate::grid::{Month, COEFFICIENTS_PER_MONTH, MONTHS_PER_YEAR};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Size of one monthly block in bytes
pub const BLOCK_BYTES: u64 = (COEFFICIENTS_PER_MONTH * std::mem::size_of::<f32>()) as u64;

/// Byte order of the values in a coefficient file
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ByteOrder {
    #[default]
    Little,
    Big,
}

impl ByteOrder {
    fn decode(self, bytes: [u8; 4]) -> f32 {
        match self {
            ByteOrder::Little => f32::from_le_bytes(bytes),
            ByteOrder::Big => f32::from_be_bytes(bytes),
        }
    }

    fn encode(self, value: f32) -> [u8; 4] {
        match self {
            ByteOrder::Little => value.to_le_bytes(),
            ByteOrder::Big => value.to_be_bytes(),
        }
    }
}

/// [`CoefficientSource`] backed by a flat binary file
#[derive(Debug)]
pub struct BinaryFileSource {
    path: PathBuf,
    byte_order: ByteOrder,
    file: Option<File>,
}

impl BinaryFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            byte_order: ByteOrder::default(),
            file: None,
        }
    }

    pub fn with_byte_order(mut self, byte_order: ByteOrder) -> Self {
        self.byte_order = byte_order;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn byte_order(&self) -> ByteOrder {
        self.byte_order
    }
}

impl CoefficientSource for BinaryFileSource {
    fn connect(&mut self) -> RSCTMResult<()> {
        let file = File::open(&self.path).map_err(|e| {
            RSCTMError::SourceUnavailable(format!("cannot open {}: {}", self.path.display(), e))
        })?;

        let length = file.metadata()?.len();
        let expected = BLOCK_BYTES * MONTHS_PER_YEAR as u64;
        if length < expected {
            return Err(RSCTMError::SourceUnavailable(format!(
                "{} holds {} bytes, expected at least {} for {} monthly blocks",
                self.path.display(),
                length,
                expected,
                MONTHS_PER_YEAR
            )));
        }

        log::info!("Opened coefficient file {}", self.path.display());
        self.file = Some(file);
        Ok(())
    }

    fn read_month(&mut self, month: Month) -> RSCTMResult<Vec<f32>> {
        if self.file.is_none() {
            self.connect()?;
        }
        let file = self.file.as_mut().ok_or_else(|| {
            RSCTMError::SourceUnavailable("coefficient file is not open".to_string())
        })?;

        file.seek(SeekFrom::Start(month.index() as u64 * BLOCK_BYTES))?;
        let mut bytes = vec![0u8; BLOCK_BYTES as usize];
        file.read_exact(&mut bytes).map_err(|e| match e.kind() {
            std::io::ErrorKind::UnexpectedEof => RSCTMError::MissingMonth {
                month,
                reason: format!("{} ends inside the block", self.path.display()),
            },
            _ => RSCTMError::Io(e),
        })?;

        let byte_order = self.byte_order;
        Ok(bytes
            .chunks_exact(4)
            .map(|c| byte_order.decode([c[0], c[1], c[2], c[3]]))
            .collect())
    }
}

/// Write a year of monthly blocks in the layout read by [`BinaryFileSource`]
pub fn write_year(path: &Path, values: &[f32], byte_order: ByteOrder) -> RSCTMResult<()> {
    let expected = COEFFICIENTS_PER_MONTH * MONTHS_PER_YEAR;
    if values.len() != expected {
        return Err(RSCTMError::Error(format!(
            "a year of coefficients needs {} values, got {}",
            expected,
            values.len()
        )));
    }

    let mut writer = BufWriter::new(File::create(path)?);
    for value in values {
        writer.write_all(&byte_order.encode(*value))?;
    }
    writer.flush()?;
    Ok(())
}
