use super::{
    error::ParseError,
    CRLF,
};

/// A single header field, as it appeared on the wire.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Header {
    pub name: String,
    pub value: String,
}

/// An ordered list of header fields.  Insertion order is preserved, and
/// lookups compare names without regard to case.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Headers {
    headers: Vec<Header>,
}

impl Headers {
    pub fn add_header<N, V>(
        &mut self,
        name: N,
        value: V,
    ) where
        N: Into<String>,
        V: Into<String>,
    {
        self.headers.push(Header {
            name: name.into(),
            value: value.into(),
        });
    }

    /// Render the header lines followed by the blank line which ends them.
    #[must_use]
    pub fn generate(&self) -> Vec<u8> {
        let mut output = Vec::new();
        for header in &self.headers {
            output.extend(header.name.as_bytes());
            output.extend(b": ");
            output.extend(header.value.as_bytes());
            output.extend(CRLF.as_bytes());
        }
        output.extend(CRLF.as_bytes());
        output
    }

    #[must_use]
    pub fn has_header(
        &self,
        name: &str,
    ) -> bool {
        self.header_value(name).is_some()
    }

    /// Check whether any header with the given name lists the given token
    /// in its comma-separated value.
    #[must_use]
    pub fn has_header_token(
        &self,
        name: &str,
        token: &str,
    ) -> bool {
        self.headers
            .iter()
            .filter(|header| header.name.eq_ignore_ascii_case(name))
            .flat_map(|header| header.value.split(','))
            .any(|candidate| candidate.trim().eq_ignore_ascii_case(token))
    }

    /// Return the value of the first header with the given name.
    #[must_use]
    pub fn header_value(
        &self,
        name: &str,
    ) -> Option<&str> {
        self.headers
            .iter()
            .find(|header| header.name.eq_ignore_ascii_case(name))
            .map(|header| header.value.as_str())
    }

    #[must_use]
    pub fn headers(&self) -> &[Header] {
        &self.headers
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Header> {
        self.headers.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.headers.len()
    }

    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl<'a> IntoIterator for &'a Headers {
    type IntoIter = std::slice::Iter<'a, Header>;
    type Item = &'a Header;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

// Split a header line (without its line terminator) at the first colon.
// Exactly one space must follow the colon; anything after that space is
// the value, verbatim.  Bytes which are not valid UTF-8 are replaced rather
// than rejected.
pub(crate) fn parse_header_line(line: &[u8]) -> Result<Header, ParseError> {
    let malformed = || ParseError::MalformedHeaderLine(line.to_vec());
    let colon = line.iter().position(|&b| b == b':').ok_or_else(malformed)?;
    if line.get(colon + 1) != Some(&b' ') {
        return Err(malformed());
    }
    Ok(Header {
        name: String::from_utf8_lossy(&line[..colon]).into_owned(),
        value: String::from_utf8_lossy(&line[colon + 2..]).into_owned(),
    })
}

#[cfg(test)]
mod tests {

    use super::*;

    #[test]
    fn lookup_is_case_insensitive() {
        let mut headers = Headers::new();
        headers.add_header("Content-Type", "text/plain");
        assert_eq!(Some("text/plain"), headers.header_value("content-type"));
        assert!(headers.has_header("CONTENT-TYPE"));
        assert!(!headers.has_header("Content-Length"));
    }

    #[test]
    fn lookup_returns_first_match() {
        let mut headers = Headers::new();
        headers.add_header("Via", "a");
        headers.add_header("via", "b");
        assert_eq!(Some("a"), headers.header_value("VIA"));
        assert_eq!(2, headers.len());
    }

    #[test]
    fn header_tokens() {
        let mut headers = Headers::new();
        headers.add_header("Transfer-Encoding", "gzip, Chunked");
        assert!(headers.has_header_token("transfer-encoding", "chunked"));
        assert!(headers.has_header_token("Transfer-Encoding", "gzip"));
        assert!(!headers.has_header_token("Transfer-Encoding", "deflate"));
    }

    #[test]
    fn generate_keeps_order() {
        let mut headers = Headers::new();
        headers.add_header("Host", "www.example.com");
        headers.add_header("Accept", "application/json");
        assert_eq!(
            concat!(
                "Host: www.example.com\r\n",
                "Accept: application/json\r\n",
                "\r\n",
            )
            .as_bytes(),
            &headers.generate()[..]
        );
    }

    #[test]
    fn parse_good_header_line() {
        assert_eq!(
            Ok(Header {
                name: "Content-Type".into(),
                value: "text/plain; charset=utf-8".into(),
            }),
            parse_header_line(b"Content-Type: text/plain; charset=utf-8")
        );
    }

    #[test]
    fn parse_header_line_keeps_extra_whitespace_in_value() {
        assert_eq!(
            Ok(Header {
                name: "X-Foo".into(),
                value: " bar ".into(),
            }),
            parse_header_line(b"X-Foo:  bar ")
        );
    }

    #[test]
    fn parse_header_line_empty_value() {
        assert_eq!(
            Ok(Header {
                name: "X-Empty".into(),
                value: "".into(),
            }),
            parse_header_line(b"X-Empty: ")
        );
    }

    #[test]
    fn parse_header_line_non_utf8_value() {
        assert_eq!(
            Ok(Header {
                name: "Content-Disposition".into(),
                value: "attachment; filename=caf\u{FFFD}.txt".into(),
            }),
            parse_header_line(
                b"Content-Disposition: attachment; filename=caf\xE9.txt"
            )
        );
    }

    #[test]
    fn parse_header_line_missing_colon() {
        assert_eq!(
            Err(ParseError::MalformedHeaderLine(b"X-Foo Bar".to_vec())),
            parse_header_line(b"X-Foo Bar")
        );
    }

    #[test]
    fn parse_header_line_missing_space() {
        assert_eq!(
            Err(ParseError::MalformedHeaderLine(b"X-Foo:Bar".to_vec())),
            parse_header_line(b"X-Foo:Bar")
        );
        assert_eq!(
            Err(ParseError::MalformedHeaderLine(b"X-Foo:".to_vec())),
            parse_header_line(b"X-Foo:")
        );
    }
}
