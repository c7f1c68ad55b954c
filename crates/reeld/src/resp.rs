//! RESP2 framing for the control surface
//!
//! Clients send commands as arrays of bulk strings (what `redis-cli` does)
//! or as a single inline line (`FOCUS 5\r\n`, handy over telnet).

use std::io::Cursor;
use bytes::{Buf, BufMut, BytesMut};

/// Maximum bulk string size; control commands are tiny
const MAX_BULK_LEN: usize = 64 * 1024;

/// Maximum elements in one array
const MAX_ARRAY_LEN: usize = 1024;

/// Maximum inline command line
const MAX_INLINE_LEN: usize = 64 * 1024;

/// Protocol violation; the connection buffer is discarded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameError(pub String);

impl std::fmt::Display for FrameError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "protocol error: {}", self.0)
    }
}

impl std::error::Error for FrameError {}

/// One RESP value
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// `+OK\r\n`
    Simple(String),
    /// `-ERR message\r\n`
    Error(String),
    /// `:42\r\n`
    Integer(i64),
    /// `$5\r\nhello\r\n`, or `$-1\r\n` for null
    Bulk(Option<Vec<u8>>),
    /// `*2\r\n...`, or `*-1\r\n` for null
    Array(Option<Vec<Frame>>),
}

impl Frame {
    /// `+OK`
    pub fn ok() -> Frame {
        Frame::Simple("OK".to_string())
    }

    /// `-ERR <message>`
    pub fn err(message: impl std::fmt::Display) -> Frame {
        Frame::Error(format!("ERR {}", message))
    }

    /// Bulk string from text
    pub fn text(text: impl Into<String>) -> Frame {
        Frame::Bulk(Some(text.into().into_bytes()))
    }

    /// Null bulk string
    pub fn null() -> Frame {
        Frame::Bulk(None)
    }

    /// Append the wire form to `out`
    pub fn write_to(&self, out: &mut BytesMut) {
        match self {
            Frame::Simple(s) => put_line(out, b'+', s.as_bytes()),
            Frame::Error(e) => put_line(out, b'-', e.as_bytes()),
            Frame::Integer(i) => put_line(out, b':', i.to_string().as_bytes()),
            Frame::Bulk(None) => out.put_slice(b"$-1\r\n"),
            Frame::Bulk(Some(data)) => {
                put_line(out, b'$', data.len().to_string().as_bytes());
                out.put_slice(data);
                out.put_slice(b"\r\n");
            }
            Frame::Array(None) => out.put_slice(b"*-1\r\n"),
            Frame::Array(Some(items)) => {
                put_line(out, b'*', items.len().to_string().as_bytes());
                for item in items {
                    item.write_to(out);
                }
            }
        }
    }

    /// Take one complete frame off the front of `buf`.
    ///
    /// `Ok(None)` means more bytes are needed; `buf` is left untouched.
    pub fn parse(buf: &mut BytesMut) -> Result<Option<Frame>, FrameError> {
        if buf.is_empty() {
            return Ok(None);
        }

        let mut cursor = Cursor::new(&buf[..]);
        let frame = if is_type_byte(buf[0]) {
            parse_frame(&mut cursor)?
        } else {
            parse_inline(&mut cursor)?
        };

        if frame.is_some() {
            let consumed = cursor.position() as usize;
            buf.advance(consumed);
        }
        Ok(frame)
    }

    /// Split a command frame into its words
    pub fn into_words(self) -> Result<Vec<String>, FrameError> {
        let items = match self {
            Frame::Array(Some(items)) if !items.is_empty() => items,
            _ => return Err(FrameError("expected a non-empty command array".to_string())),
        };

        items
            .into_iter()
            .map(|item| match item {
                Frame::Bulk(Some(data)) => String::from_utf8(data)
                    .map_err(|_| FrameError("command words must be utf-8".to_string())),
                Frame::Simple(s) => Ok(s),
                Frame::Integer(i) => Ok(i.to_string()),
                _ => Err(FrameError("command words must be bulk strings".to_string())),
            })
            .collect()
    }
}

fn put_line(out: &mut BytesMut, kind: u8, body: &[u8]) {
    out.put_u8(kind);
    out.put_slice(body);
    out.put_slice(b"\r\n");
}

fn is_type_byte(byte: u8) -> bool {
    matches!(byte, b'+' | b'-' | b':' | b'$' | b'*')
}

fn parse_frame(cursor: &mut Cursor<&[u8]>) -> Result<Option<Frame>, FrameError> {
    if !cursor.has_remaining() {
        return Ok(None);
    }

    match cursor.get_u8() {
        b'+' => Ok(read_text(cursor)?.map(Frame::Simple)),
        b'-' => Ok(read_text(cursor)?.map(Frame::Error)),
        b':' => Ok(read_number(cursor)?.map(Frame::Integer)),
        b'$' => parse_bulk(cursor),
        b'*' => parse_array(cursor),
        other => Err(FrameError(format!("unknown type byte {:?}", other as char))),
    }
}

fn parse_bulk(cursor: &mut Cursor<&[u8]>) -> Result<Option<Frame>, FrameError> {
    let Some(len) = read_number(cursor)? else {
        return Ok(None);
    };
    if len == -1 {
        return Ok(Some(Frame::Bulk(None)));
    }
    let len = checked_len(len, MAX_BULK_LEN, "bulk string")?;

    if cursor.remaining() < len + 2 {
        return Ok(None);
    }
    let mut data = vec![0u8; len];
    cursor.copy_to_slice(&mut data);
    if cursor.get_u8() != b'\r' || cursor.get_u8() != b'\n' {
        return Err(FrameError("bulk string not terminated by CRLF".to_string()));
    }
    Ok(Some(Frame::Bulk(Some(data))))
}

fn parse_array(cursor: &mut Cursor<&[u8]>) -> Result<Option<Frame>, FrameError> {
    let Some(len) = read_number(cursor)? else {
        return Ok(None);
    };
    if len == -1 {
        return Ok(Some(Frame::Array(None)));
    }
    let len = checked_len(len, MAX_ARRAY_LEN, "array")?;

    let mut items = Vec::with_capacity(len);
    for _ in 0..len {
        match parse_frame(cursor)? {
            Some(item) => items.push(item),
            None => return Ok(None),
        }
    }
    Ok(Some(Frame::Array(Some(items))))
}

fn parse_inline(cursor: &mut Cursor<&[u8]>) -> Result<Option<Frame>, FrameError> {
    let Some(line) = read_line(cursor) else {
        if cursor.get_ref().len() > MAX_INLINE_LEN {
            return Err(FrameError("inline command too long".to_string()));
        }
        return Ok(None);
    };

    let line = std::str::from_utf8(line)
        .map_err(|_| FrameError("inline command must be utf-8".to_string()))?;
    let words = line
        .split_whitespace()
        .map(|word| Frame::Bulk(Some(word.as_bytes().to_vec())))
        .collect();
    Ok(Some(Frame::Array(Some(words))))
}

fn checked_len(len: i64, max: usize, what: &str) -> Result<usize, FrameError> {
    match usize::try_from(len) {
        Ok(len) if len <= max => Ok(len),
        _ => Err(FrameError(format!("{} length {} out of range (max {})", what, len, max))),
    }
}

fn read_text(cursor: &mut Cursor<&[u8]>) -> Result<Option<String>, FrameError> {
    match read_line(cursor) {
        Some(line) => String::from_utf8(line.to_vec())
            .map(Some)
            .map_err(|_| FrameError("line must be utf-8".to_string())),
        None => Ok(None),
    }
}

fn read_number(cursor: &mut Cursor<&[u8]>) -> Result<Option<i64>, FrameError> {
    match read_text(cursor)? {
        Some(text) => text
            .parse()
            .map(Some)
            .map_err(|_| FrameError(format!("invalid number {:?}", text))),
        None => Ok(None),
    }
}

/// Line up to CRLF; the cursor moves past the CRLF only when one is found
fn read_line<'a>(cursor: &mut Cursor<&'a [u8]>) -> Option<&'a [u8]> {
    let buf: &'a [u8] = *cursor.get_ref();
    let start = cursor.position() as usize;
    let end = start + buf[start..].windows(2).position(|w| w == b"\r\n")?;
    cursor.set_position((end + 2) as u64);
    Some(&buf[start..end])
}
