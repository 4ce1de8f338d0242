//! Canonical little-endian helpers for the on-disk record formats.
//!
//! Every gravel wire format (edge lists, swap batches, swap results, spill
//! runs) is little-endian with fixed-size records.

#[inline]
#[must_use]
pub fn read_u64_le(src: &[u8]) -> Option<u64> {
    Some(u64::from_le_bytes(src.get(..8)?.try_into().ok()?))
}

#[inline]
#[must_use]
pub fn read_u8(src: &[u8]) -> Option<u8> {
    src.first().copied()
}

#[inline]
pub fn write_u64_le(dst: &mut [u8], value: u64) -> Option<()> {
    dst.get_mut(..8)?.copy_from_slice(&value.to_le_bytes());
    Some(())
}

#[inline]
pub fn append_u64_le(buf: &mut Vec<u8>, value: u64) {
    buf.extend_from_slice(&value.to_le_bytes());
}

#[inline]
pub fn append_u8(buf: &mut Vec<u8>, value: u8) {
    buf.push(value);
}

#[inline]
pub fn append_bool(buf: &mut Vec<u8>, value: bool) {
    buf.push(u8::from(value));
}
