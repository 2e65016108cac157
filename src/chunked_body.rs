use super::CRLF;

fn hex_digit_value(digit: u8) -> Option<usize> {
    match digit {
        b'0'..=b'9' => Some(usize::from(digit - b'0')),
        b'a'..=b'f' => Some(usize::from(digit - b'a' + 10)),
        b'A'..=b'F' => Some(usize::from(digit - b'A' + 10)),
        _ => None,
    }
}

/// Read the chunk size from the start of a chunk size line.  Reading stops
/// at the first byte which is not a hexadecimal digit, so chunk extensions
/// are ignored.  `None` is returned if the line does not start with a digit.
/// Sizes too large to represent saturate rather than fail.
pub(crate) fn parse_chunk_size(chunk_size_line: &[u8]) -> Option<usize> {
    let mut digits = chunk_size_line
        .iter()
        .map_while(|&digit| hex_digit_value(digit))
        .peekable();
    digits.peek()?;
    Some(digits.fold(0_usize, |size, digit| {
        size.saturating_mul(16).saturating_add(digit)
    }))
}

/// Frame the given body with chunked transfer coding, using chunks of at
/// most `chunk_size` bytes, followed by the terminating zero-size chunk and
/// an empty trailer.  A `chunk_size` of zero puts the whole body in one
/// chunk.
#[must_use]
pub fn encode_chunked<B>(
    body: B,
    chunk_size: usize,
) -> Vec<u8>
where
    B: AsRef<[u8]>,
{
    let body = body.as_ref();
    let chunk_size = match chunk_size {
        0 => body.len().max(1),
        size => size,
    };
    let mut output = Vec::with_capacity(body.len() + 16);
    for chunk in body.chunks(chunk_size) {
        output.extend(format!("{:X}", chunk.len()).as_bytes());
        output.extend(CRLF.as_bytes());
        output.extend(chunk);
        output.extend(CRLF.as_bytes());
    }
    output.extend(b"0");
    output.extend(CRLF.as_bytes());
    output.extend(CRLF.as_bytes());
    output
}
