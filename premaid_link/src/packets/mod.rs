mod command;
mod reply;
pub mod hex;

pub use command::*;
pub use reply::*;

/// XOR of every byte in `bytes`.
pub fn xor_checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0, |acc, b| acc ^ b)
}

/// Overwrites the trailing byte of `frame` so the XOR of the whole frame is zero.
pub fn rewrite_checksum(frame: &mut [u8]) {
    if let Some((last, body)) = frame.split_last_mut() {
        *last = xor_checksum(body);
    }
}

/// True when the XOR of every byte of `frame`, checksum included, is zero.
pub fn verify_checksum(frame: &[u8]) -> bool {
    !frame.is_empty() && xor_checksum(frame) == 0
}
