// Splitting an image payload into the fixed-size pieces sent through
// `pwg.images.addChunk`, and the MD5 checksum that ties those pieces to the
// final `pwg.images.add` call.

use std::num::NonZeroUsize;

use md5::{Digest, Md5};

/// Size of each chunk, in bytes, unless the caller asks for another one.
pub const DEFAULT_CHUNK_SIZE: NonZeroUsize = match NonZeroUsize::new(500_000) {
    Some(size) => size,
    None => panic!("chunk size must be positive"),
};

/// A contiguous slice of a payload with its 1-based position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk<'a> {
    pub position: u32,
    pub data: &'a [u8],
}

/// Splits `payload` into consecutive chunks of at most `chunk_size` bytes.
///
/// Positions start at 1. Only the last chunk may be shorter than
/// `chunk_size`, and an empty payload produces no chunks at all.
pub fn split(payload: &[u8], chunk_size: NonZeroUsize) -> impl Iterator<Item = Chunk<'_>> {
    payload
        .chunks(chunk_size.get())
        .zip(1u32..)
        .map(|(data, position)| Chunk { position, data })
}

/// Number of chunks `split` yields for a payload of `len` bytes.
pub fn chunk_count(len: usize, chunk_size: NonZeroUsize) -> usize {
    len.div_ceil(chunk_size.get())
}

/// Lowercase hex MD5 of the raw payload bytes.
pub fn checksum(payload: &[u8]) -> String {
    let mut hasher = Md5::new();
    hasher.update(payload);
    format!("{:x}", hasher.finalize())
}
