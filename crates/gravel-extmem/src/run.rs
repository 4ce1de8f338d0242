//! Sorted spill runs: anonymous temp files of fixed-size records.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::marker::PhantomData;

use gravel_error::Result;

use crate::record::Record;

/// Writes a run of records to an anonymous temp file.
pub(crate) struct RunWriter<T: Record> {
    out: BufWriter<File>,
    len: u64,
    scratch: Vec<u8>,
    _marker: PhantomData<T>,
}

impl<T: Record> RunWriter<T> {
    pub(crate) fn with_capacity(buf_bytes: usize) -> Result<Self> {
        let file = tempfile::tempfile()?;
        Ok(Self {
            out: BufWriter::with_capacity(buf_bytes.max(T::ENCODED_LEN), file),
            len: 0,
            scratch: Vec::with_capacity(T::ENCODED_LEN),
            _marker: PhantomData,
        })
    }

    pub(crate) fn push(&mut self, item: &T) -> Result<()> {
        self.scratch.clear();
        item.encode(&mut self.scratch);
        self.out.write_all(&self.scratch)?;
        self.len += 1;
        Ok(())
    }

    pub(crate) fn finish(self) -> Result<Run<T>> {
        let file = self
            .out
            .into_inner()
            .map_err(std::io::IntoInnerError::into_error)?;
        Ok(Run {
            file,
            len: self.len,
            _marker: PhantomData,
        })
    }
}

/// A finished, immutable run.
pub(crate) struct Run<T: Record> {
    file: File,
    len: u64,
    _marker: PhantomData<T>,
}

impl<T: Record> Run<T> {
    pub(crate) fn reader(self, buf_bytes: usize) -> Result<RunReader<T>> {
        RunReader::new(self.file, self.len, buf_bytes)
    }
}

/// Streams a run back with a one-record lookahead.
pub(crate) struct RunReader<T: Record> {
    input: BufReader<File>,
    scratch: Vec<u8>,
    head: Option<T>,
    remaining: u64,
    total: u64,
}

impl<T: Record> RunReader<T> {
    fn new(file: File, len: u64, buf_bytes: usize) -> Result<Self> {
        let mut input = BufReader::with_capacity(buf_bytes.max(T::ENCODED_LEN), file);
        input.seek(SeekFrom::Start(0))?;
        let mut reader = Self {
            input,
            scratch: vec![0u8; T::ENCODED_LEN],
            head: None,
            remaining: len,
            total: len,
        };
        reader.fetch()?;
        Ok(reader)
    }

    fn fetch(&mut self) -> Result<()> {
        if self.remaining == 0 {
            self.head = None;
            return Ok(());
        }
        self.input.read_exact(&mut self.scratch)?;
        self.head = Some(T::decode(&self.scratch));
        self.remaining -= 1;
        Ok(())
    }

    #[inline]
    pub(crate) fn peek(&self) -> Option<T> {
        self.head
    }

    pub(crate) fn next(&mut self) -> Result<Option<T>> {
        let current = self.head;
        if current.is_some() {
            self.fetch()?;
        }
        Ok(current)
    }

    pub(crate) fn rewind(&mut self) -> Result<()> {
        self.input.seek(SeekFrom::Start(0))?;
        self.remaining = self.total;
        self.head = None;
        self.fetch()
    }
}
