//! List file parser using nom
//!
//! File format:
//! ```text
//! REEL001\n
//! [version: u32 little-endian]
//! [entry_count: u32 little-endian]
//! ...entries (\n-terminated)...
//! ```

use nom::{
    bytes::complete::{tag, take_until},
    character::complete::char,
    number::complete::le_u32,
    sequence::{preceded, terminated, tuple},
    IResult,
};

use crate::error::{Error, Result};

/// Magic header for list files
pub const LIST_MAGIC: &[u8] = b"REEL001\n";

/// Current list file format version
pub const FORMAT_VERSION: u32 = 1;

/// Magic plus version plus entry count
pub const HEADER_LEN: usize = LIST_MAGIC.len() + 8;

/// List file header
#[derive(Debug, Clone, PartialEq)]
pub struct ListHeader {
    /// File format version
    pub version: u32,
    /// Number of entries that follow the header
    pub entry_count: u32,
}

fn header(input: &[u8]) -> IResult<&[u8], ListHeader> {
    let (rest, (version, entry_count)) = preceded(tag(LIST_MAGIC), tuple((le_u32, le_u32)))(input)?;
    Ok((rest, ListHeader { version, entry_count }))
}

/// Parse and validate a list file header
pub fn parse_header(input: &[u8]) -> Result<ListHeader> {
    if input.len() < HEADER_LEN {
        return Err(Error::Parse("Input too short for header".to_string()));
    }

    if !input.starts_with(LIST_MAGIC) {
        return Err(Error::Parse("Invalid list magic header".to_string()));
    }

    let (_, parsed) = header(input)?;
    if parsed.version != FORMAT_VERSION {
        return Err(Error::Parse(format!(
            "Unsupported list format version {}",
            parsed.version
        )));
    }

    Ok(parsed)
}

/// Parse a single entry line, returning it without the trailing newline
pub fn parse_line(input: &[u8]) -> IResult<&[u8], &[u8]> {
    terminated(take_until("\n"), char('\n'))(input)
}

/// Parse a complete list file into its entries
pub fn parse_list(input: &[u8]) -> Result<Vec<String>> {
    let parsed = parse_header(input)?;
    let body = &input[HEADER_LEN..];

    let (rest, lines) = nom::multi::count(parse_line, parsed.entry_count as usize)(body)?;
    if !rest.is_empty() {
        return Err(Error::Parse(format!(
            "{} trailing bytes after {} entries",
            rest.len(),
            parsed.entry_count
        )));
    }

    lines
        .into_iter()
        .map(|line| String::from_utf8(line.to_vec()).map_err(|e| Error::Parse(e.to_string())))
        .collect()
}

/// Encode entries into the list file format
pub fn encode_list<S: AsRef<str>>(entries: &[S]) -> Vec<u8> {
    let body_len: usize = entries.iter().map(|e| e.as_ref().len() + 1).sum();
    let mut out = Vec::with_capacity(HEADER_LEN + body_len);
    out.extend_from_slice(LIST_MAGIC);
    out.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    out.extend_from_slice(&(entries.len() as u32).to_le_bytes());
    for entry in entries {
        out.extend_from_slice(entry.as_ref().as_bytes());
        out.push(b'\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_header() {
        let encoded = encode_list(&["a", "b", "c"]);
        let parsed = parse_header(&encoded).unwrap();

        assert_eq!(parsed.version, FORMAT_VERSION);
        assert_eq!(parsed.entry_count, 3);
    }

    #[test]
    fn test_parse_header_invalid_magic() {
        let mut encoded = encode_list::<&str>(&[]);
        encoded[0] = b'X';

        assert!(parse_header(&encoded).is_err());
    }

    #[test]
    fn test_parse_header_too_short() {
        assert!(parse_header(b"REEL001\n").is_err());
    }

    #[test]
    fn test_parse_header_future_version() {
        let mut encoded = encode_list::<&str>(&[]);
        encoded[LIST_MAGIC.len()] = 9;

        let err = parse_header(&encoded).unwrap_err();
        assert!(err.to_string().contains("version 9"));
    }

    #[test]
    fn test_parse_line() {
        let (remaining, line) = parse_line(b"clip-1\nclip-2\n").unwrap();

        assert_eq!(line, b"clip-1");
        assert_eq!(remaining, b"clip-2\n");
    }

    #[test]
    fn test_parse_list() {
        let encoded = encode_list(&["clip-1", "clip-2"]);
        assert_eq!(parse_list(&encoded).unwrap(), vec!["clip-1", "clip-2"]);
    }

    #[test]
    fn test_parse_list_empty() {
        let encoded = encode_list::<String>(&[]);
        assert!(parse_list(&encoded).unwrap().is_empty());
    }

    #[test]
    fn test_parse_list_truncated() {
        let encoded = encode_list(&["clip-1", "clip-2"]);
        let truncated = &encoded[..encoded.len() - 3];

        assert!(parse_list(truncated).is_err());
    }

    #[test]
    fn test_parse_list_trailing_garbage() {
        let mut encoded = encode_list(&["clip-1"]);
        encoded.extend_from_slice(b"junk");

        assert!(parse_list(&encoded).is_err());
    }
}
