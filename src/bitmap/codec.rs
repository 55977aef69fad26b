use crate::bitmap::bitset::Bitset;
use crate::core::error::Result;

/// Stored blob form of a bitset: minimal big-endian byte image, then a
/// general-purpose compressor. Level 3 is balanced for blobs this size.
const ZSTD_LEVEL: i32 = 3;

pub fn encode(set: &Bitset) -> Result<Vec<u8>> {
    let raw = set.to_be_bytes();
    Ok(zstd::encode_all(&raw[..], ZSTD_LEVEL)?)
}

pub fn decode(blob: &[u8]) -> Result<Bitset> {
    let raw = zstd::decode_all(blob)?;
    Ok(Bitset::from_be_bytes(&raw))
}

/// Document content is stored through the same compressor.
pub fn compress_text(text: &str) -> Result<Vec<u8>> {
    Ok(zstd::encode_all(text.as_bytes(), ZSTD_LEVEL)?)
}

pub fn decompress_text(blob: &[u8]) -> Result<String> {
    let raw = zstd::decode_all(blob)?;
    String::from_utf8(raw)
        .map_err(|e| crate::core::error::Error::decode(format!("stored content: {}", e)))
}
