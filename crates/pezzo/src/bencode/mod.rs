//! Decoder of bencode, the encoding of metainfo files and tracker responses.
//!
//! The decoder is a single forward scan with an explicit stack of containers
//! that are still open, instead of recursive descent. Nesting depth is only
//! bounded by memory.
//!
//! ```text
//! byte string   <len>:<bytes>       4:spam
//! integer       i<decimal>e         i-42e
//! list          l<value>*e          l4:spami42ee
//! dictionary    d(<key><value>)*e   d3:bar4:spam3:fooi42ee
//! ```
mod value;

pub use value::*;

use crate::error::Error;

/// A list or dictionary that was opened but not closed yet.
enum Frame {
    List(Vec<Value>),
    Dict { dict: Dictionary, key: Option<Vec<u8>> },
}

impl Frame {
    /// Append a complete value to this container. Dictionaries alternate
    /// between expecting a key and expecting the value of that key.
    fn push(&mut self, value: Value, pos: usize) -> Result<(), Error> {
        match self {
            Frame::List(list) => list.push(value),
            Frame::Dict { dict, key } => match key.take() {
                Some(k) => dict.insert(k, value),
                None => match value {
                    Value::ByteString(k) => *key = Some(k),
                    _ => {
                        return Err(malformed(
                            pos,
                            "dictionary key is not a byte string",
                        ))
                    }
                },
            },
        }
        Ok(())
    }

    fn close(self, pos: usize) -> Result<Value, Error> {
        match self {
            Frame::List(list) => Ok(Value::List(list)),
            Frame::Dict { key: Some(_), .. } => {
                Err(malformed(pos, "dictionary key without a value"))
            }
            Frame::Dict { dict, .. } => Ok(Value::Dictionary(dict)),
        }
    }
}

fn malformed(pos: usize, reason: &str) -> Error {
    Error::MalformedEncoding(format!("{reason} at byte {pos}"))
}

/// Decode exactly one value, the whole buffer must be consumed.
pub fn decode(buf: &[u8]) -> Result<Value, Error> {
    let (value, read) = decode_prefix(buf)?;

    if read != buf.len() {
        return Err(malformed(read, "trailing data after the value"));
    }

    Ok(value)
}

/// Decode the first value of the buffer, returning it together with the
/// number of bytes that it spans. Anything after it is left untouched.
pub fn decode_prefix(buf: &[u8]) -> Result<(Value, usize), Error> {
    let mut stack: Vec<Frame> = Vec::new();
    let mut pos = 0;

    loop {
        let Some(&tag) = buf.get(pos) else {
            return Err(malformed(pos, "unexpected end of input"));
        };

        let value = match tag {
            b'l' => {
                stack.push(Frame::List(Vec::new()));
                pos += 1;
                continue;
            }
            b'd' => {
                stack.push(Frame::Dict { dict: Dictionary::new(), key: None });
                pos += 1;
                continue;
            }
            b'e' => {
                let Some(frame) = stack.pop() else {
                    return Err(malformed(pos, "unexpected end marker"));
                };
                pos += 1;
                frame.close(pos)?
            }
            b'i' => {
                let (v, next) = integer(buf, pos)?;
                pos = next;
                v
            }
            b'0'..=b'9' => {
                let (v, next) = byte_string(buf, pos)?;
                pos = next;
                v
            }
            _ => {
                return Err(malformed(
                    pos,
                    &format!("unknown tag {:?}", tag as char),
                ))
            }
        };

        match stack.last_mut() {
            Some(frame) => frame.push(value, pos)?,
            None => return Ok((value, pos)),
        }
    }
}

/// `i<decimal>e`, `pos` is at the `i`.
fn integer(buf: &[u8], pos: usize) -> Result<(Value, usize), Error> {
    let start = pos + 1;
    let end = buf[start..]
        .iter()
        .position(|&b| b == b'e')
        .map(|i| start + i)
        .ok_or_else(|| malformed(pos, "unterminated integer"))?;

    let digits = &buf[start..end];

    if digits.is_empty() || digits[0] == b'+' {
        return Err(malformed(start, "invalid integer"));
    }

    let n = std::str::from_utf8(digits)
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or_else(|| malformed(start, "invalid integer"))?;

    Ok((Value::Integer(n), end + 1))
}

/// `<len>:<bytes>`, `pos` is at the first digit of the length.
fn byte_string(buf: &[u8], pos: usize) -> Result<(Value, usize), Error> {
    let colon = buf[pos..]
        .iter()
        .position(|&b| b == b':')
        .map(|i| pos + i)
        .ok_or_else(|| malformed(pos, "unterminated byte string length"))?;

    let len = std::str::from_utf8(&buf[pos..colon])
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .ok_or_else(|| malformed(pos, "invalid byte string length"))?;

    let start = colon + 1;
    let end = start
        .checked_add(len)
        .filter(|end| *end <= buf.len())
        .ok_or_else(|| malformed(start, "byte string is truncated"))?;

    Ok((Value::ByteString(buf[start..end].to_vec()), end))
}
