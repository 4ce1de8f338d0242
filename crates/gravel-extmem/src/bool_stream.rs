//! Bit-packed boolean stream, spilled to an anonymous temp file.
//!
//! Bits are packed MSB-first within each byte; this is also the wire layout
//! of the edge-update mask.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::mem;

use gravel_error::{GravelError, Result};

enum State {
    Writing {
        out: BufWriter<File>,
        acc: u8,
        pending: u8,
    },
    Reading {
        input: BufReader<File>,
        cur: u8,
        bits_in_cur: u8,
        remaining: u64,
    },
}

/// Write-once, read-once stream of bits with a tiny RAM footprint.
pub struct BoolStream {
    state: State,
    len: u64,
}

impl BoolStream {
    pub fn new() -> Result<Self> {
        Ok(Self {
            state: fresh_writer()?,
            len: 0,
        })
    }

    /// Bits pushed since creation or the last [`Self::clear`].
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

    /// Append one bit. Only valid while writing.
    pub fn push(&mut self, bit: bool) -> Result<()> {
        let State::Writing { out, acc, pending } = &mut self.state else {
            return Err(GravelError::invariant("push into a consumed bool stream"));
        };
        *acc = (*acc << 1) | u8::from(bit);
        *pending += 1;
        if *pending == 8 {
            out.write_all(&[*acc])?;
            *acc = 0;
            *pending = 0;
        }
        self.len += 1;
        Ok(())
    }

    /// Finish writing and switch to the read side.
    pub fn consume(&mut self) -> Result<()> {
        let state = mem::replace(&mut self.state, fresh_writer()?);
        let State::Writing {
            mut out,
            acc,
            pending,
        } = state
        else {
            return Err(GravelError::invariant("bool stream consumed twice"));
        };
        if pending > 0 {
            out.write_all(&[acc << (8 - pending)])?;
        }
        let mut file = out
            .into_inner()
            .map_err(std::io::IntoInnerError::into_error)?;
        file.seek(SeekFrom::Start(0))?;
        self.state = State::Reading {
            input: BufReader::new(file),
            cur: 0,
            bits_in_cur: 0,
            remaining: self.len,
        };
        Ok(())
    }

    /// Read the next bit. Only valid after [`Self::consume`].
    pub fn next_bit(&mut self) -> Result<Option<bool>> {
        let State::Reading {
            input,
            cur,
            bits_in_cur,
            remaining,
        } = &mut self.state
        else {
            return Err(GravelError::invariant("read from an unconsumed bool stream"));
        };
        if *remaining == 0 {
            return Ok(None);
        }
        if *bits_in_cur == 0 {
            let mut byte = [0u8; 1];
            input.read_exact(&mut byte)?;
            *cur = byte[0];
            *bits_in_cur = 8;
        }
        let bit = *cur & 0x80 != 0;
        *cur <<= 1;
        *bits_in_cur -= 1;
        *remaining -= 1;
        Ok(Some(bit))
    }

    /// Drop all contents and return to the write side.
    pub fn clear(&mut self) -> Result<()> {
        self.state = fresh_writer()?;
        self.len = 0;
        Ok(())
    }
}

fn fresh_writer() -> Result<State> {
    Ok(State::Writing {
        out: BufWriter::new(tempfile::tempfile()?),
        acc: 0,
        pending: 0,
    })
}
