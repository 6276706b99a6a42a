use convert_base::Convert;
use serde::{Deserialize, Serialize};

use crate::{is_bit_vector, is_two_state};

/// Display format applied to bit-vector values.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum VarFormat {
    ASCII,
    #[default]
    Binary,
    BinaryWithGroups,
    Hexadecimal,
    Octal,
    Signed,
    Unsigned,
}

impl VarFormat {
    pub const ALL: [VarFormat; 7] = [
        VarFormat::ASCII,
        VarFormat::Binary,
        VarFormat::BinaryWithGroups,
        VarFormat::Hexadecimal,
        VarFormat::Octal,
        VarFormat::Signed,
        VarFormat::Unsigned,
    ];

    pub fn as_static_str(&self) -> &'static str {
        match self {
            VarFormat::ASCII => "ASCII",
            VarFormat::Binary => "Bin",
            VarFormat::BinaryWithGroups => "Bins",
            VarFormat::Hexadecimal => "Hex",
            VarFormat::Octal => "Oct",
            VarFormat::Signed => "Int",
            VarFormat::Unsigned => "UInt",
        }
    }

    /// Format a raw bit-vector string (msb first). Values that are not bit
    /// vectors (real or string encodings) are returned unchanged.
    pub fn format(&self, raw: &str) -> String {
        if !is_bit_vector(raw) {
            return raw.to_string();
        }
        match self {
            VarFormat::Binary => raw.to_string(),
            VarFormat::BinaryWithGroups => group_binary(raw),
            VarFormat::Hexadecimal => radix_digits(raw, 4),
            VarFormat::Octal => radix_digits(raw, 3),
            VarFormat::Unsigned => unsigned_decimal(raw),
            VarFormat::Signed => signed_decimal(raw),
            VarFormat::ASCII => ascii(raw),
        }
    }
}

fn group_binary(raw: &str) -> String {
    let chars: Vec<char> = raw.chars().collect();
    let mut groups: Vec<String> = chars
        .rchunks(4)
        .map(|group| group.iter().collect())
        .collect();
    groups.reverse();
    groups.join(" ")
}

/// Collapse a group of bits that is not strictly two-state into one marker:
/// a uniform group keeps its marker, a mixed one becomes `X`.
fn nine_state_marker(group: &[char]) -> char {
    let first = group[0].to_ascii_uppercase();
    if group.iter().all(|c| c.to_ascii_uppercase() == first) {
        first
    } else {
        'X'
    }
}

fn radix_digits(raw: &str, bits_per_digit: usize) -> String {
    let chars: Vec<char> = raw.chars().collect();
    let mut digits: Vec<char> = chars
        .rchunks(bits_per_digit)
        .map(|group| {
            if group.iter().all(|c| *c == '0' || *c == '1') {
                let value = group
                    .iter()
                    .fold(0u32, |acc, c| (acc << 1) | u32::from(*c == '1'));
                char::from_digit(value, 16).unwrap_or('?')
            } else {
                nine_state_marker(group)
            }
        })
        .collect();
    digits.reverse();
    digits.into_iter().collect()
}

fn unsigned_decimal(raw: &str) -> String {
    if !is_two_state(raw) {
        let chars: Vec<char> = raw.chars().collect();
        return nine_state_marker(&chars).to_string();
    }
    // convert-base works on little-endian digit vectors
    let input: Vec<u8> = raw.bytes().rev().map(|b| b - b'0').collect();
    let mut base = Convert::new(2, 10);
    let output = base.convert::<u8, u8>(&input);
    let decimal: String = output
        .iter()
        .rev()
        .skip_while(|digit| **digit == 0)
        .map(|digit| char::from(b'0' + digit))
        .collect();
    if decimal.is_empty() {
        "0".to_string()
    } else {
        decimal
    }
}

fn signed_decimal(raw: &str) -> String {
    if !is_two_state(raw) || raw.starts_with('0') {
        return unsigned_decimal(raw);
    }
    // two's complement magnitude: invert and add one
    let mut magnitude: Vec<u8> = raw.bytes().map(|b| if b == b'1' { b'0' } else { b'1' }).collect();
    for bit in magnitude.iter_mut().rev() {
        if *bit == b'0' {
            *bit = b'1';
            break;
        }
        *bit = b'0';
    }
    let magnitude = String::from_utf8(magnitude).unwrap_or_default();
    format!("-{}", unsigned_decimal(&magnitude))
}

fn ascii(raw: &str) -> String {
    let chars: Vec<char> = raw.chars().collect();
    let mut bytes: Vec<char> = chars
        .rchunks(8)
        .map(|group| {
            if group.iter().all(|c| *c == '0' || *c == '1') {
                let value = group
                    .iter()
                    .fold(0u8, |acc, c| (acc << 1) | u8::from(*c == '1'));
                if (0x20..=0x7e).contains(&value) {
                    char::from(value)
                } else {
                    '.'
                }
            } else {
                '?'
            }
        })
        .collect();
    bytes.reverse();
    bytes.into_iter().collect()
}
