//! Little-endian, tag-length-value helpers for binary state blobs.
//!
//! A blob is a fixed magic, a `u32` version, then chunks:
//!
//! - tag: `[u8; 4]`
//! - len: `u32` (bytes following)
//! - payload
//!
//! Compressed chunks carry the uncompressed length (`u32`) as the first four
//! payload bytes, followed by a raw LZ4 block.

use std::io::{self, Read, Write};

pub fn compress_lz4(input: &[u8]) -> Vec<u8> {
    lz4_flex::compress(input)
}

pub fn decompress_lz4(input: &[u8], expected_size: usize) -> io::Result<Vec<u8>> {
    lz4_flex::decompress(input, expected_size)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "lz4 decompression failed"))
}

pub fn write_u32_le<W: Write + ?Sized>(w: &mut W, v: u32) -> io::Result<()> {
    w.write_all(&v.to_le_bytes())
}

pub fn write_u64_le<W: Write + ?Sized>(w: &mut W, v: u64) -> io::Result<()> {
    w.write_all(&v.to_le_bytes())
}

pub fn read_exact<const N: usize, R: Read + ?Sized>(r: &mut R) -> io::Result<[u8; N]> {
    let mut buf = [0u8; N];
    r.read_exact(&mut buf)?;
    Ok(buf)
}

pub fn read_u32_le<R: Read + ?Sized>(r: &mut R) -> io::Result<u32> {
    Ok(u32::from_le_bytes(read_exact::<4, _>(r)?))
}

pub fn read_u64_le<R: Read + ?Sized>(r: &mut R) -> io::Result<u64> {
    Ok(u64::from_le_bytes(read_exact::<8, _>(r)?))
}

pub fn write_chunk<W: Write + ?Sized>(w: &mut W, tag: [u8; 4], payload: &[u8]) -> io::Result<()> {
    let len = u32::try_from(payload.len())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "chunk too large"))?;
    w.write_all(&tag)?;
    write_u32_le(w, len)?;
    w.write_all(payload)
}

/// Write an LZ4-compressed chunk.
pub fn write_chunk_lz4<W: Write + ?Sized>(
    w: &mut W,
    tag: [u8; 4],
    payload: &[u8],
) -> io::Result<()> {
    let compressed = compress_lz4(payload);
    let uncompressed_len = u32::try_from(payload.len())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "chunk too large"))?;
    let total_len = 4u32.saturating_add(
        u32::try_from(compressed.len())
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "chunk too large"))?,
    );

    w.write_all(&tag)?;
    write_u32_le(w, total_len)?;
    write_u32_le(w, uncompressed_len)?;
    w.write_all(&compressed)
}

pub fn read_chunk_header<R: Read + ?Sized>(r: &mut R) -> io::Result<([u8; 4], u32)> {
    let tag = read_exact::<4, _>(r)?;
    let len = read_u32_le(r)?;
    Ok((tag, len))
}

/// Read `len` payload bytes following a chunk header.
pub fn read_chunk_payload<R: Read + ?Sized>(r: &mut R, len: u32) -> io::Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(len.min(1 << 20) as usize);
    let read = r.take(u64::from(len)).read_to_end(&mut buf)?;
    if read != len as usize {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "truncated chunk payload",
        ));
    }
    Ok(buf)
}

/// Decode a payload written by [`write_chunk_lz4`].
pub fn inflate_chunk_payload(payload: &[u8]) -> io::Result<Vec<u8>> {
    if payload.len() < 4 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "compressed chunk missing length prefix",
        ));
    }
    let (prefix, compressed) = payload.split_at(4);
    let mut prefix_reader = prefix;
    let uncompressed_len = read_u32_le(&mut prefix_reader)? as usize;
    decompress_lz4(compressed, uncompressed_len)
}
