//! File-backed swap-result debug stream.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};

use gravel_error::{GravelError, Result};
use gravel_types::encoding::read_u64_le;
use gravel_types::limits::SWAP_RESULT_WIRE_LEN;
use gravel_types::{Edge, SwapResult};

const READER_BUF: usize = 64 << 10;

/// Per-swap results on disk, in swap-id order:
/// `performed, loop, conflict0, conflict1` bytes followed by both edges.
pub struct SwapResultFile {
    file: File,
    len: u64,
}

impl SwapResultFile {
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

    pub fn reader(&self) -> Result<SwapResultReader> {
        let mut file = self.file.try_clone()?;
        file.seek(SeekFrom::Start(0))?;
        Ok(SwapResultReader {
            input: BufReader::with_capacity(READER_BUF, file),
            remaining: self.len,
        })
    }

    /// Read every result into RAM. Test and debugging helper.
    pub fn to_vec(&self) -> Result<Vec<SwapResult>> {
        let mut reader = self.reader()?;
        let mut out = Vec::with_capacity(usize::try_from(self.len).unwrap_or(0));
        while let Some(result) = reader.next()? {
            out.push(result);
        }
        Ok(out)
    }
}

/// Appends results during pass D.
pub struct SwapResultWriter {
    out: BufWriter<File>,
    len: u64,
}

impl SwapResultWriter {
    pub fn create() -> Result<Self> {
        Ok(Self {
            out: BufWriter::with_capacity(READER_BUF, tempfile::tempfile()?),
            len: 0,
        })
    }

    pub fn push(&mut self, result: &SwapResult) -> Result<()> {
        let flags = [
            u8::from(result.performed),
            u8::from(result.loop_detected),
            u8::from(result.conflict[0]),
            u8::from(result.conflict[1]),
        ];
        self.out.write_all(&flags)?;
        for edge in result.edges {
            self.out.write_all(&edge.u.to_le_bytes())?;
            self.out.write_all(&edge.v.to_le_bytes())?;
        }
        self.len += 1;
        Ok(())
    }

    pub fn finish(self) -> Result<SwapResultFile> {
        let file = self
            .out
            .into_inner()
            .map_err(std::io::IntoInnerError::into_error)?;
        Ok(SwapResultFile {
            file,
            len: self.len,
        })
    }
}

/// Streams results back in swap-id order.
pub struct SwapResultReader {
    input: BufReader<File>,
    remaining: u64,
}

impl SwapResultReader {
    pub fn next(&mut self) -> Result<Option<SwapResult>> {
        if self.remaining == 0 {
            return Ok(None);
        }
        let mut buf = [0u8; SWAP_RESULT_WIRE_LEN];
        self.input.read_exact(&mut buf).map_err(|err| {
            if err.kind() == std::io::ErrorKind::UnexpectedEof {
                GravelError::ShortRead {
                    expected: SWAP_RESULT_WIRE_LEN,
                    actual: 0,
                }
            } else {
                GravelError::Io(err)
            }
        })?;
        self.remaining -= 1;

        let edge_at = |offset: usize| -> Edge {
            let u = read_u64_le(&buf[offset..]).expect("buffer is record-sized");
            let v = read_u64_le(&buf[offset + 8..]).expect("buffer is record-sized");
            Edge { u, v }
        };
        Ok(Some(SwapResult {
            performed: buf[0] != 0,
            loop_detected: buf[1] != 0,
            conflict: [buf[2] != 0, buf[3] != 0],
            edges: [edge_at(4), edge_at(20)],
        }))
    }
}
