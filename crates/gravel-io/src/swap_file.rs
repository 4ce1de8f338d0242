//! File-backed swap batches.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};

use gravel_error::{GravelError, Result};
use gravel_types::encoding::read_u64_le;
use gravel_types::limits::SWAP_WIRE_LEN;
use gravel_types::SwapDescriptor;

const READER_BUF: usize = 64 << 10;

/// A batch of swap descriptors on disk: `eid0 LE, eid1 LE, direction` per
/// record, in batch (swap id) order.
pub struct SwapBatchFile {
    file: File,
    len: u64,
}

impl SwapBatchFile {
    /// Materialize a batch from descriptors.
    pub fn from_descriptors(swaps: &[SwapDescriptor]) -> Result<Self> {
        let mut out = BufWriter::with_capacity(READER_BUF, tempfile::tempfile()?);
        for swap in swaps {
            let [e0, e1] = swap.edges();
            out.write_all(&e0.to_le_bytes())?;
            out.write_all(&e1.to_le_bytes())?;
            out.write_all(&[u8::from(swap.direction())])?;
        }
        let file = out
            .into_inner()
            .map_err(std::io::IntoInnerError::into_error)?;
        Ok(Self {
            file,
            len: swaps.len() as u64,
        })
    }

    /// Number of swaps in the batch.
    #[inline]
    #[must_use]
    pub fn len(&self) -> u64 {
        self.len
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Sequential reader over the sub-batch `[start, end)`.
    pub fn reader_range(&self, start: u64, end: u64) -> Result<SwapBatchReader> {
        if start > end || end > self.len {
            return Err(GravelError::invalid_input(format!(
                "swap range {start}..{end} out of bounds (batch has {})",
                self.len
            )));
        }
        let mut file = self.file.try_clone()?;
        file.seek(SeekFrom::Start(start * SWAP_WIRE_LEN as u64))?;
        Ok(SwapBatchReader {
            input: BufReader::with_capacity(READER_BUF, file),
            remaining: end - start,
        })
    }

    /// Sequential reader over the whole batch.
    pub fn reader(&self) -> Result<SwapBatchReader> {
        self.reader_range(0, self.len)
    }
}

/// Streams descriptors back in swap-id order.
pub struct SwapBatchReader {
    input: BufReader<File>,
    remaining: u64,
}

impl SwapBatchReader {
    pub fn next(&mut self) -> Result<Option<SwapDescriptor>> {
        if self.remaining == 0 {
            return Ok(None);
        }
        let mut buf = [0u8; SWAP_WIRE_LEN];
        self.input.read_exact(&mut buf).map_err(|err| {
            if err.kind() == std::io::ErrorKind::UnexpectedEof {
                GravelError::ShortRead {
                    expected: SWAP_WIRE_LEN,
                    actual: 0,
                }
            } else {
                GravelError::Io(err)
            }
        })?;
        self.remaining -= 1;

        let e0 = read_u64_le(&buf[..8]).expect("buffer is record-sized");
        let e1 = read_u64_le(&buf[8..16]).expect("buffer is record-sized");
        let direction = buf[16] != 0;
        let swap = SwapDescriptor::new(e0, e1, direction).ok_or_else(|| {
            GravelError::invalid_input(format!("swap references edge {e0} twice"))
        })?;
        Ok(Some(swap))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch() -> Vec<SwapDescriptor> {
        vec![
            SwapDescriptor::new(0, 1, false).expect("distinct"),
            SwapDescriptor::new(2, 5, true).expect("distinct"),
            SwapDescriptor::new(1, 3, false).expect("distinct"),
        ]
    }

    #[test]
    fn round_trips_in_order() {
        let file = SwapBatchFile::from_descriptors(&batch()).expect("batch");
        assert_eq!(file.len(), 3);
        let mut reader = file.reader().expect("reader");
        let mut out = Vec::new();
        while let Some(swap) = reader.next().expect("read") {
            out.push(swap);
        }
        assert_eq!(out, batch());
    }

    #[test]
    fn range_reader_skips_ahead() {
        let file = SwapBatchFile::from_descriptors(&batch()).expect("batch");
        let mut reader = file.reader_range(1, 3).expect("reader");
        assert_eq!(
            reader.next().expect("read"),
            Some(SwapDescriptor::new(2, 5, true).expect("distinct"))
        );
        assert_eq!(
            reader.next().expect("read"),
            Some(SwapDescriptor::new(1, 3, false).expect("distinct"))
        );
        assert_eq!(reader.next().expect("read"), None);
    }

    #[test]
    fn out_of_bounds_range_is_invalid_input() {
        let file = SwapBatchFile::from_descriptors(&batch()).expect("batch");
        assert!(matches!(
            file.reader_range(0, 4),
            Err(GravelError::InvalidInput { .. })
        ));
    }
}
