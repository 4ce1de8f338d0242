//! File-backed edge lists in the canonical wire format.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::Path;

use gravel_error::{GravelError, Result};
use gravel_types::encoding::read_u64_le;
use gravel_types::limits::EDGE_WIRE_LEN;
use gravel_types::{Edge, EdgeId};

const READER_BUF: usize = 64 << 10;

/// Anything that yields edges in list order; lets the dependency-chain pass
/// read either a plain edge file or the update stream of the previous
/// sub-batch.
pub trait EdgeSource {
    fn next_edge(&mut self) -> Result<Option<Edge>>;
}

/// A sorted edge list on disk: `len` records of two `u64` LE words, first
/// word ≤ second.
pub struct EdgeListFile {
    file: File,
    len: u64,
}

impl EdgeListFile {
    /// Materialize a list from a slice. Validates range and normalization.
    pub fn from_edges(edges: &[Edge]) -> Result<Self> {
        let mut writer = EdgeListWriter::create()?;
        for &edge in edges {
            writer.push(edge)?;
        }
        writer.finish()
    }

    /// Open an existing edge file; the length is derived from the file size.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let bytes = file.metadata()?.len();
        if bytes % EDGE_WIRE_LEN as u64 != 0 {
            return Err(GravelError::invalid_input(format!(
                "{} is not a whole number of {EDGE_WIRE_LEN}-byte edge records",
                path.display()
            )));
        }
        Ok(Self {
            file,
            len: bytes / EDGE_WIRE_LEN as u64,
        })
    }

    /// Number of edges.
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

    /// Sequential reader from the first edge. One active reader at a time;
    /// the underlying descriptor is shared.
    pub fn reader(&self) -> Result<EdgeListReader> {
        let mut file = self.file.try_clone()?;
        file.seek(SeekFrom::Start(0))?;
        EdgeListReader::new(file, self.len)
    }

    /// Random access by edge id.
    pub fn get(&self, eid: EdgeId) -> Result<Edge> {
        if eid >= self.len {
            return Err(GravelError::invalid_input(format!(
                "edge id {eid} out of range (list has {} edges)",
                self.len
            )));
        }
        let mut file = self.file.try_clone()?;
        file.seek(SeekFrom::Start(eid * EDGE_WIRE_LEN as u64))?;
        let mut buf = [0u8; EDGE_WIRE_LEN];
        file.read_exact(&mut buf)?;
        Ok(decode_edge(&buf))
    }

    /// Read the whole list into RAM. Test and debugging helper.
    pub fn to_vec(&self) -> Result<Vec<Edge>> {
        let mut reader = self.reader()?;
        let mut out = Vec::with_capacity(usize::try_from(self.len).unwrap_or(0));
        while let Some(edge) = reader.next_edge()? {
            out.push(edge);
        }
        Ok(out)
    }

    /// Scan the list and verify it is sorted, loop-free, and duplicate-free.
    pub fn verify_simple(&self) -> Result<()> {
        let mut reader = self.reader()?;
        let mut last: Option<Edge> = None;
        while let Some(edge) = reader.next_edge()? {
            if edge.is_loop() {
                return Err(GravelError::invariant(format!("edge list holds loop {edge}")));
            }
            if let Some(prev) = last {
                if prev >= edge {
                    return Err(GravelError::invariant(format!(
                        "edge list not strictly sorted: {prev} then {edge}"
                    )));
                }
            }
            last = Some(edge);
        }
        Ok(())
    }
}

/// Streaming writer producing an [`EdgeListFile`].
pub struct EdgeListWriter {
    out: BufWriter<File>,
    len: u64,
}

impl EdgeListWriter {
    /// Write into an anonymous temp file.
    pub fn create() -> Result<Self> {
        Ok(Self {
            out: BufWriter::with_capacity(READER_BUF, tempfile::tempfile()?),
            len: 0,
        })
    }

    /// Write into a named file, so the list survives the process.
    pub fn create_at(path: &Path) -> Result<Self> {
        let file = File::options()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        Ok(Self {
            out: BufWriter::with_capacity(READER_BUF, file),
            len: 0,
        })
    }

    /// Append one edge. Rejects unnormalized pairs and out-of-range nodes.
    pub fn push(&mut self, edge: Edge) -> Result<()> {
        if edge.u > edge.v {
            return Err(GravelError::invalid_input(format!(
                "edge {edge} is not normalized"
            )));
        }
        if !edge.in_range() {
            return Err(GravelError::invalid_input(format!(
                "edge {edge} exceeds the 36-bit node space"
            )));
        }
        self.out.write_all(&edge.u.to_le_bytes())?;
        self.out.write_all(&edge.v.to_le_bytes())?;
        self.len += 1;
        Ok(())
    }

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

    pub fn finish(self) -> Result<EdgeListFile> {
        let file = self
            .out
            .into_inner()
            .map_err(std::io::IntoInnerError::into_error)?;
        Ok(EdgeListFile {
            file,
            len: self.len,
        })
    }
}

/// Buffered sequential reader with one edge of lookahead.
pub struct EdgeListReader {
    input: BufReader<File>,
    head: Option<Edge>,
    remaining: u64,
}

impl EdgeListReader {
    fn new(file: File, len: u64) -> Result<Self> {
        let mut reader = Self {
            input: BufReader::with_capacity(READER_BUF, file),
            head: None,
            remaining: len,
        };
        reader.fetch()?;
        Ok(reader)
    }

    fn fetch(&mut self) -> Result<()> {
        if self.remaining == 0 {
            self.head = None;
            return Ok(());
        }
        let mut buf = [0u8; EDGE_WIRE_LEN];
        self.input.read_exact(&mut buf).map_err(|err| {
            if err.kind() == std::io::ErrorKind::UnexpectedEof {
                GravelError::ShortRead {
                    expected: EDGE_WIRE_LEN,
                    actual: 0,
                }
            } else {
                GravelError::Io(err)
            }
        })?;
        self.head = Some(decode_edge(&buf));
        self.remaining -= 1;
        Ok(())
    }

    /// The edge under the cursor, if any.
    #[inline]
    #[must_use]
    pub fn peek(&self) -> Option<Edge> {
        self.head
    }
}

impl EdgeSource for EdgeListReader {
    fn next_edge(&mut self) -> Result<Option<Edge>> {
        let current = self.head;
        if current.is_some() {
            self.fetch()?;
        }
        Ok(current)
    }
}

fn decode_edge(buf: &[u8; EDGE_WIRE_LEN]) -> Edge {
    let u = read_u64_le(&buf[..8]).expect("buffer is record-sized");
    let v = read_u64_le(&buf[8..]).expect("buffer is record-sized");
    Edge { u, v }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<Edge> {
        vec![Edge::new(0, 1), Edge::new(0, 3), Edge::new(2, 3)]
    }

    #[test]
    fn write_then_stream_back() {
        let list = EdgeListFile::from_edges(&sample()).expect("list");
        assert_eq!(list.len(), 3);
        assert_eq!(list.to_vec().expect("read"), sample());
    }

    #[test]
    fn random_access_by_rank() {
        let list = EdgeListFile::from_edges(&sample()).expect("list");
        assert_eq!(list.get(1).expect("get"), Edge::new(0, 3));
        assert!(matches!(
            list.get(3),
            Err(GravelError::InvalidInput { .. })
        ));
    }

    #[test]
    fn writer_rejects_denormalized_edges() {
        let mut writer = EdgeListWriter::create().expect("writer");
        assert!(matches!(
            writer.push(Edge { u: 5, v: 2 }),
            Err(GravelError::InvalidInput { .. })
        ));
    }

    #[test]
    fn writer_rejects_out_of_range_nodes() {
        let mut writer = EdgeListWriter::create().expect("writer");
        let too_big = gravel_types::limits::MAX_NODE + 1;
        assert!(matches!(
            writer.push(Edge { u: 0, v: too_big }),
            Err(GravelError::InvalidInput { .. })
        ));
    }

    #[test]
    fn verify_simple_flags_loops_and_duplicates() {
        let ok = EdgeListFile::from_edges(&sample()).expect("list");
        ok.verify_simple().expect("simple");

        let looped = EdgeListFile::from_edges(&[Edge::new(1, 1)]).expect("list");
        assert!(matches!(
            looped.verify_simple(),
            Err(GravelError::Invariant { .. })
        ));

        let dup = EdgeListFile::from_edges(&[Edge::new(0, 1), Edge::new(0, 1)]).expect("list");
        assert!(matches!(
            dup.verify_simple(),
            Err(GravelError::Invariant { .. })
        ));
    }

    #[test]
    fn reader_peek_does_not_consume() {
        let list = EdgeListFile::from_edges(&sample()).expect("list");
        let mut reader = list.reader().expect("reader");
        assert_eq!(reader.peek(), Some(Edge::new(0, 1)));
        assert_eq!(reader.peek(), Some(Edge::new(0, 1)));
        assert_eq!(reader.next_edge().expect("read"), Some(Edge::new(0, 1)));
        assert_eq!(reader.peek(), Some(Edge::new(0, 3)));
    }
}
