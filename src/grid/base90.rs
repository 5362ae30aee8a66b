//! GXF character compression (`#GTYPE` > 0).
//!
//! Each value is `width` printable characters read as base-90 digits offset
//! by 37, most significant first. `!` marks a dummy cell and `"` opens a run:
//! a repeat count followed by the repeated value. Whitespace and line breaks
//! carry no meaning.

use std::iter;

use super::{dummy_value, RawSamples};
use crate::error::{GxfError, Result};
use crate::model::Header;

const DIGIT_OFFSET: u8 = 37;
const BASE: u64 = 90;
const DUMMY_MARK: u8 = b'!';
const REPEAT_MARK: u8 = b'"';

pub(super) fn read(data: &str, header: &Header, width: usize) -> Result<RawSamples> {
    let expected = header.cell_count();
    let chars: Vec<u8> = data
        .bytes()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();

    let dummy = dummy_value(header.dummy.as_ref()) as f32;
    let mut implicit_dummy = false;
    let mut values = Vec::with_capacity(expected);
    let mut cursor = Cursor {
        chars: &chars,
        pos: 0,
        width,
    };

    while values.len() < expected {
        let Some(chunk) = cursor.next_chunk() else {
            return Err(GxfError::TruncatedData {
                expected,
                found: values.len(),
            });
        };

        match chunk[0] {
            DUMMY_MARK => {
                implicit_dummy |= header.dummy.is_none();
                values.push(dummy);
            }
            REPEAT_MARK => {
                let truncated = GxfError::TruncatedData {
                    expected,
                    found: values.len(),
                };
                let count_chunk = cursor.next_chunk().ok_or(truncated)?;
                let count = decode_digits(count_chunk)? as usize;
                if count == 0 {
                    return Err(GxfError::format("base-90 repeat count of zero"));
                }
                let value_chunk = cursor.next_chunk().ok_or(GxfError::TruncatedData {
                    expected,
                    found: values.len(),
                })?;
                let value = if value_chunk[0] == DUMMY_MARK {
                    implicit_dummy |= header.dummy.is_none();
                    dummy
                } else {
                    header.transform.apply(decode_digits(value_chunk)? as f64) as f32
                };
                let n = count.min(expected - values.len());
                values.extend(iter::repeat(value).take(n));
            }
            _ => {
                let raw = decode_digits(chunk)?;
                values.push(header.transform.apply(raw as f64) as f32);
            }
        }
    }

    Ok(RawSamples {
        values,
        implicit_dummy,
    })
}

struct Cursor<'a> {
    chars: &'a [u8],
    pos: usize,
    width: usize,
}

impl<'a> Cursor<'a> {
    fn next_chunk(&mut self) -> Option<&'a [u8]> {
        let chunk = self.chars.get(self.pos..self.pos + self.width)?;
        self.pos += self.width;
        Some(chunk)
    }
}

fn decode_digits(chunk: &[u8]) -> Result<u64> {
    chunk.iter().try_fold(0u64, |acc, &c| {
        if !(DIGIT_OFFSET..=b'~').contains(&c) {
            return Err(GxfError::format(format!(
                "invalid base-90 character {:?}",
                c as char
            )));
        }
        Ok(acc * BASE + u64::from(c - DIGIT_OFFSET))
    })
}

/// Encodes `value` as `width` base-90 characters.
#[cfg(test)]
pub(crate) fn encode_digits(mut value: u64, width: usize) -> String {
    let mut out = vec![DIGIT_OFFSET; width];
    for slot in out.iter_mut().rev() {
        *slot = DIGIT_OFFSET + (value % BASE) as u8;
        value /= BASE;
    }
    String::from_utf8(out).unwrap()
}
