//! FNV-1a hashing and bucket selection.
//!
//! Unseeded: with the same backend order, an address lands on the same
//! index in every process and across restarts.

const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

/// 32-bit FNV-1a over `bytes`.
pub fn fnv1a_32(bytes: &[u8]) -> u32 {
    bytes.iter().fold(FNV_OFFSET_BASIS, |hash, byte| {
        (hash ^ u32::from(*byte)).wrapping_mul(FNV_PRIME)
    })
}

/// Map a hash onto `len` buckets.
///
/// Returns `None` for an empty pool instead of dividing by zero.
pub fn bucket(hash: u32, len: usize) -> Option<usize> {
    if len == 0 {
        return None;
    }
    Some(hash as usize % len)
}
