use super::{
    chunked_body::encode_chunked,
    error::Error,
    headers::Headers,
};
use std::io::Write;

/// This is a complete HTTP response, as produced by
/// [`ResponseParser::into_response`](struct.ResponseParser.html#method.into_response).
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Response {
    /// The body, with any chunked transfer coding removed.
    pub body: Vec<u8>,
    pub headers: Headers,
    pub protocol: std::borrow::Cow<'static, str>,
    pub reason_phrase: std::borrow::Cow<'static, str>,
    pub status_code: u16,
    pub trailers: Headers,
}

impl Response {
    /// Render the response in wire form.  If the headers ask for chunked
    /// transfer coding, the body is framed as a single chunk followed by any
    /// trailers; otherwise it follows the headers as is.
    pub fn generate(&self) -> Result<Vec<u8>, Error> {
        let mut output = Vec::new();
        write!(
            &mut output,
            "{} {} {}\r\n",
            self.protocol, self.status_code, self.reason_phrase
        )
        .map_err(|_| Error::StringFormat)?;
        output.append(&mut self.headers.generate());
        if self.headers.has_header_token("Transfer-Encoding", "chunked") {
            let mut chunked = encode_chunked(&self.body, 0);
            if !self.trailers.is_empty() {
                // Put the trailers between the last chunk and the final CRLF.
                chunked.truncate(chunked.len() - 2);
                chunked.append(&mut self.trailers.generate());
            }
            output.append(&mut chunked);
        } else {
            output.extend(&self.body);
        }
        Ok(output)
    }

    #[must_use]
    pub fn new() -> Self {
        Self {
            body: Vec::new(),
            headers: Headers::new(),
            protocol: "HTTP/1.1".into(),
            reason_phrase: "OK".into(),
            status_code: 200,
            trailers: Headers::new(),
        }
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {

    use super::*;

    #[test]
    fn generate_content_length_response() {
        let mut response = Response::new();
        response.headers.add_header("Date", "Mon, 27 Jul 2009 12:28:53 GMT");
        response.headers.add_header("Accept-Ranges", "bytes");
        response.headers.add_header("Content-Type", "text/plain");
        response.body =
            "Hello World! My payload includes a trailing CRLF.\r\n".into();
        response
            .headers
            .add_header("Content-Length", format!("{}", response.body.len()));
        assert_eq!(
            format!(
                concat!(
                    "HTTP/1.1 200 OK\r\n",
                    "Date: Mon, 27 Jul 2009 12:28:53 GMT\r\n",
                    "Accept-Ranges: bytes\r\n",
                    "Content-Type: text/plain\r\n",
                    "Content-Length: {}\r\n",
                    "\r\n",
                    "Hello World! My payload includes a trailing CRLF.\r\n",
                ),
                response.body.len()
            )
            .as_bytes(),
            &response.generate().unwrap()[..]
        );
    }

    #[test]
    fn generate_chunked_response_with_trailers() {
        let mut response = Response::new();
        response.protocol = "HTTP/1.0".into();
        response.status_code = 400;
        response.reason_phrase = "Bad Request".into();
        response.headers.add_header("Transfer-Encoding", "chunked");
        response.trailers.add_header("X-Foo", "Bar");
        response.body = "salam".into();
        assert_eq!(
            concat!(
                "HTTP/1.0 400 Bad Request\r\n",
                "Transfer-Encoding: chunked\r\n",
                "\r\n",
                "5\r\nsalam\r\n",
                "0\r\n",
                "X-Foo: Bar\r\n",
                "\r\n",
            )
            .as_bytes(),
            &response.generate().unwrap()[..]
        );
    }
}
