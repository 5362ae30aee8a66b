use std::iter;

use super::RawSamples;
use crate::error::{GxfError, Result};
use crate::model::{Dummy, Header};

/// Reads whitespace separated tokens across lines until the grid is full.
/// With `allow_repeat`, `count*value` tokens are expanded.
pub(super) fn read_stream(data: &str, header: &Header, allow_repeat: bool) -> Result<RawSamples> {
    let expected = header.cell_count();
    let dummy = header.dummy.as_ref();
    let mut values = Vec::with_capacity(expected);

    for token in data.split_ascii_whitespace() {
        if values.len() >= expected {
            break;
        }
        push_token(&mut values, token, dummy, allow_repeat, expected)?;
    }

    if values.len() < expected {
        return Err(GxfError::TruncatedData {
            expected,
            found: values.len(),
        });
    }

    Ok(RawSamples {
        values,
        implicit_dummy: false,
    })
}

/// Reads one file row per logical line. A trailing `\` joins a physical line
/// with the next one.
pub(super) fn read_lines(data: &str, header: &Header) -> Result<RawSamples> {
    let expected = header.cell_count();
    let dummy = header.dummy.as_ref();
    let mut values = Vec::with_capacity(expected);

    for line in logical_lines(data).filter(|l| !l.trim().is_empty()) {
        if values.len() >= expected {
            break;
        }
        let row_end = values.len() + header.points;
        for token in line.split_ascii_whitespace() {
            if values.len() >= row_end {
                break;
            }
            push_token(&mut values, token, dummy, true, row_end)?;
        }
        if values.len() < row_end {
            return Err(GxfError::TruncatedData {
                expected,
                found: values.len(),
            });
        }
    }

    if values.len() < expected {
        return Err(GxfError::TruncatedData {
            expected,
            found: values.len(),
        });
    }

    Ok(RawSamples {
        values,
        implicit_dummy: false,
    })
}

fn logical_lines(data: &str) -> impl Iterator<Item = String> + '_ {
    let mut physical = data.lines();
    iter::from_fn(move || {
        let mut logical = String::new();
        loop {
            let line = match physical.next() {
                Some(line) => line.trim_end(),
                None if logical.is_empty() => return None,
                None => return Some(logical),
            };
            match line.strip_suffix('\\') {
                Some(head) => {
                    logical.push_str(head);
                    logical.push(' ');
                }
                None => {
                    logical.push_str(line);
                    return Some(logical);
                }
            }
        }
    })
}

/// Appends the samples of one token, never growing `values` past `limit`.
fn push_token(
    values: &mut Vec<f32>,
    token: &str,
    dummy: Option<&Dummy>,
    allow_repeat: bool,
    limit: usize,
) -> Result<()> {
    let (count, value_text) = match token.split_once('*') {
        None => (1, token),
        Some((count, value)) if allow_repeat => {
            let count = count
                .parse::<usize>()
                .ok()
                .filter(|&c| c > 0)
                .ok_or_else(|| GxfError::format(format!("bad repeat count in {:?}", token)))?;
            (count, value)
        }
        Some(_) => {
            return Err(GxfError::format(format!(
                "repeat token {:?} in a plain text grid",
                token
            )))
        }
    };

    let value = parse_value(value_text, dummy)?;
    let n = count.min(limit.saturating_sub(values.len()));
    values.extend(iter::repeat(value).take(n));
    Ok(())
}

fn parse_value(token: &str, dummy: Option<&Dummy>) -> Result<f32> {
    if let Some(d) = dummy {
        if token == d.text {
            return Ok(d.value as f32);
        }
    }
    let value = token
        .parse::<f64>()
        .map_err(|_| GxfError::format(format!("invalid grid value {:?}", token)))?;
    match dummy {
        Some(d) if d.matches(token, value) => Ok(d.value as f32),
        _ => Ok(value as f32),
    }
}
