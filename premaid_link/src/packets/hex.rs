//! Spaced hex text such as `"07 01 00 02 00 02 06"`, the notation the
//! device documentation and logs use for frames.

use crate::LinkError;

pub fn to_hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Parses hex text, ignoring any whitespace between digits.
pub fn from_hex(text: &str) -> Result<Vec<u8>, LinkError> {
    let digits: Vec<char> = text.chars().filter(|c| !c.is_whitespace()).collect();
    if digits.len() % 2 != 0 {
        return Err(LinkError::InvalidHex(format!("odd number of digits in {:?}", text)));
    }
    digits
        .chunks(2)
        .map(|pair| {
            let s: String = pair.iter().collect();
            u8::from_str_radix(&s, 16).map_err(|_| LinkError::InvalidHex(format!("{:?} is not a byte", s)))
        })
        .collect()
}
