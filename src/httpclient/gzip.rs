//! gzip framing for OpAMP bodies.

use libdeflater::{CompressionLvl, Compressor, Decompressor};

/// Refuse to inflate bodies claiming to be larger than this
pub const MAX_INFLATED_LEN: usize = 16 * 1024 * 1024;

// 10 byte header + 8 byte trailer
const MIN_GZIP_LEN: usize = 18;

pub fn compress(raw: &[u8]) -> Result<Vec<u8>, String> {
    let mut compressor = Compressor::new(CompressionLvl::fastest());
    let mut compressed_data = vec![0; compressor.gzip_compress_bound(raw.len())];
    let written = compressor
        .gzip_compress(raw, compressed_data.as_mut_slice())
        .map_err(|e| format!("gzip compression failed: {:?}", e))?;
    compressed_data.truncate(written);
    Ok(compressed_data)
}

/// Inflates a single member gzip stream. The output buffer is sized from the ISIZE trailer.
pub fn decompress(gz: &[u8]) -> Result<Vec<u8>, String> {
    if gz.len() < MIN_GZIP_LEN {
        return Err(format!("truncated gzip body of {} bytes", gz.len()));
    }
    let mut trailer = [0u8; 4];
    trailer.copy_from_slice(&gz[gz.len() - 4..]);
    let inflated_len = u32::from_le_bytes(trailer) as usize;
    if inflated_len > MAX_INFLATED_LEN {
        return Err(format!("gzip body inflates to {} bytes", inflated_len));
    }

    let mut decompressed_data = vec![0; inflated_len];
    let written = Decompressor::new()
        .gzip_decompress(gz, decompressed_data.as_mut_slice())
        .map_err(|e| format!("gzip decompression failed: {:?}", e))?;
    decompressed_data.truncate(written);
    Ok(decompressed_data)
}
