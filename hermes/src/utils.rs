use serde::Serialize;
use std::num::Wrapping;

/// djb2 over a string. Used as the key of a document.
pub fn hash_str(s: &str) -> u32 {
    let mut h = Wrapping(5381u32);
    for byte in s.bytes() {
        h = (h << 5) + h + Wrapping(byte as u32);
    }
    h.0
}

/// When we have separate values it's useful to run a progressive
/// version of djb2 where we pretend that we're still looping over
/// the same value
pub fn progressive_hash<V: Serialize>(h: u32, x: &V) -> u64 {
    let x = serde_json::to_vec(x).unwrap_or_default();

    let mut h = Wrapping(h as u64);

    for byte in x {
        h = (h << 5) + h + Wrapping(byte as u64)
    }

    h.0
}
