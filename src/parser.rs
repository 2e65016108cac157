use super::{
    chunked_body::parse_chunk_size,
    error::ParseError,
    headers::{
        parse_header_line,
        Headers,
    },
    response::Response,
};
use std::convert::TryFrom;
use tracing::{
    debug,
    trace,
    warn,
};

/// Read the decimal number at the start of the given bytes, stopping at the
/// first byte which is not a digit.  Values too large to represent saturate.
fn read_decimal(digits: &[u8]) -> usize {
    digits.iter().take_while(|digit| digit.is_ascii_digit()).fold(
        0_usize,
        |value, digit| {
            value.saturating_mul(10).saturating_add(usize::from(digit - b'0'))
        },
    )
}

struct StatusLine {
    protocol: String,
    reason_phrase: String,
    status_code: u16,
}

fn parse_status_line(status_line: &[u8]) -> Result<StatusLine, ParseError> {
    let protocol_delimiter = status_line
        .iter()
        .position(|&b| b == b' ')
        .ok_or_else(|| ParseError::MalformedStatusLine(status_line.to_vec()))?;
    let protocol = &status_line[..protocol_delimiter];
    let status_line_at_code = &status_line[protocol_delimiter + 1..];
    let status_code = read_decimal(status_line_at_code);
    let reason_phrase = status_line_at_code
        .iter()
        .position(|&b| b == b' ')
        .map_or(&b""[..], |delimiter| &status_line_at_code[delimiter + 1..]);
    Ok(StatusLine {
        protocol: String::from_utf8_lossy(protocol).into_owned(),
        reason_phrase: String::from_utf8_lossy(reason_phrase).into_owned(),
        status_code: u16::try_from(status_code).unwrap_or(u16::MAX),
    })
}

/// This is the position of a parser in the response grammar.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Phase {
    /// Waiting for the status line.
    Status,

    /// Reading header lines, up to the blank line which ends them.
    Headers,

    /// Reading an identity body, sized by `Content-Length` or by the
    /// connection closing.
    Body,

    /// Waiting for the line holding the size of the next chunk.
    ChunkSize,

    /// Reading the payload of the current chunk.
    ChunkData,

    /// Waiting for the line terminator after a chunk, or for the trailer
    /// section after the last chunk.
    ChunkTrailer,

    /// The response is complete.
    Done,

    /// The response could not be parsed.
    Error,
}

/// This is the result of giving bytes to a parser.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ParseStatus {
    /// The response is complete.
    Complete,

    /// All bytes given so far have been examined, and more are needed to
    /// complete the response.
    NeedMoreData,
}

/// These are the bounds a parser enforces on the response it reads.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ParserLimits {
    /// Maximum number of bytes the parser buffers before the response is
    /// complete.  Exceeding it is fatal.
    pub max_buffer_size: usize,

    /// Maximum number of header fields kept.  Further headers are dropped
    /// without error.
    pub max_headers: usize,
}

impl Default for ParserLimits {
    fn default() -> Self {
        Self {
            max_buffer_size: 128_000,
            max_headers: 40,
        }
    }
}

/// This is an incremental HTTP/1.x response parser.  Bytes are handed to
/// it with [`feed`](#method.feed) as they arrive, in pieces of any size, and
/// it picks up where it left off each time.  Once it reaches
/// [`Phase::Done`](enum.Phase.html#variant.Done) the status code, headers
/// and decoded body are available.
///
/// All received bytes are kept in one buffer, addressed by offsets.  The
/// decoded body of a chunked response is collected in a separate buffer, so
/// the raw bytes stay as they were received.
#[derive(Debug)]
pub struct ResponseParser {
    body: Vec<u8>,
    buffer: Vec<u8>,
    chunk_data_start: usize,
    chunk_size: usize,
    chunked: bool,
    content_length: Option<usize>,
    cursor: usize,
    dropped_headers: usize,
    error: Option<ParseError>,
    headers: Headers,
    limits: ParserLimits,
    line_start: usize,
    payload_start: usize,
    phase: Phase,
    protocol: String,
    reason_phrase: String,
    status_code: u16,
    trailers: Headers,
}

impl ResponseParser {
    fn add_header(
        &mut self,
        line_start: usize,
        line_end: usize,
    ) -> Result<(), ParseError> {
        let header = parse_header_line(&self.buffer[line_start..line_end])?;
        if header.name.eq_ignore_ascii_case("Content-Length") {
            self.content_length = Some(read_decimal(header.value.as_bytes()));
        } else if header.name.eq_ignore_ascii_case("Transfer-Encoding")
            && header
                .value
                .split(',')
                .any(|coding| coding.trim().eq_ignore_ascii_case("chunked"))
        {
            self.chunked = true;
        }
        if self.headers.len() < self.limits.max_headers {
            self.headers.add_header(header.name, header.value);
        } else {
            self.dropped_headers += 1;
            warn!(
                header = %header.name,
                limit = self.limits.max_headers,
                "header table full; dropping header"
            );
        }
        Ok(())
    }

    fn add_trailer(
        &mut self,
        line_start: usize,
        line_end: usize,
    ) -> Result<(), ParseError> {
        let trailer = parse_header_line(&self.buffer[line_start..line_end])?;
        if self.trailers.len() < self.limits.max_headers {
            self.trailers.add_header(trailer.name, trailer.value);
        } else {
            self.dropped_headers += 1;
            warn!(
                trailer = %trailer.name,
                limit = self.limits.max_headers,
                "trailer table full; dropping trailer"
            );
        }
        Ok(())
    }

    fn advance(&mut self) -> Result<ParseStatus, ParseError> {
        loop {
            match self.phase {
                Phase::Done => return Ok(ParseStatus::Complete),
                Phase::Error => {
                    return Err(
                        self.error.clone().unwrap_or(ParseError::UnexpectedEof)
                    );
                },
                Phase::Body => return Ok(self.advance_body()),
                Phase::ChunkData => {
                    if !self.advance_chunk_data() {
                        return Ok(ParseStatus::NeedMoreData);
                    }
                },
                Phase::Status
                | Phase::Headers
                | Phase::ChunkSize
                | Phase::ChunkTrailer => match self.next_line_end() {
                    Some(line_end) => {
                        if let Err(error) = self.process_line(line_end) {
                            return Err(self.fail(error));
                        }
                    },
                    None => return Ok(ParseStatus::NeedMoreData),
                },
            }
        }
    }

    fn advance_body(&mut self) -> ParseStatus {
        match self.content_length {
            Some(content_length)
                if self.buffer.len() - self.payload_start >= content_length =>
            {
                let payload_end = self.payload_start + content_length;
                self.body =
                    self.buffer[self.payload_start..payload_end].to_vec();
                self.cursor = payload_end;
                self.line_start = payload_end;
                self.complete();
                ParseStatus::Complete
            },
            _ => {
                self.cursor = self.buffer.len();
                self.line_start = self.cursor;
                ParseStatus::NeedMoreData
            },
        }
    }

    // Returns true once the whole chunk has been received.
    fn advance_chunk_data(&mut self) -> bool {
        let chunk_data_end =
            self.chunk_data_start.saturating_add(self.chunk_size);
        self.cursor = chunk_data_end.min(self.buffer.len());
        self.line_start = self.cursor;
        if self.cursor < chunk_data_end {
            return false;
        }
        self.body
            .extend(&self.buffer[self.chunk_data_start..chunk_data_end]);
        self.set_phase(Phase::ChunkTrailer);
        true
    }

    #[must_use]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    #[must_use]
    pub fn buffered(&self) -> &[u8] {
        &self.buffer
    }

    fn complete(&mut self) {
        self.set_phase(Phase::Done);
        debug!(
            status_code = self.status_code,
            headers = self.headers.len(),
            body_len = self.body.len(),
            chunked = self.chunked,
            "response complete"
        );
    }

    #[must_use]
    pub fn content_length(&self) -> Option<usize> {
        self.content_length
    }

    #[must_use]
    pub fn dropped_headers(&self) -> usize {
        self.dropped_headers
    }

    fn end_headers(&mut self) {
        self.payload_start = self.cursor;
        if self.chunked {
            self.set_phase(Phase::ChunkSize);
        } else {
            self.set_phase(Phase::Body);
        }
    }

    #[must_use]
    pub fn error(&self) -> Option<&ParseError> {
        self.error.as_ref()
    }

    fn fail(
        &mut self,
        error: ParseError,
    ) -> ParseError {
        debug!(
            phase = ?self.phase,
            cursor = self.cursor,
            %error,
            "response parse failed"
        );
        self.phase = Phase::Error;
        self.error = Some(error.clone());
        error
    }

    /// Give the parser the next bytes received for the response.  The bytes
    /// may hold any part of the response, including nothing at all.
    ///
    /// Once the response is complete, or has failed to parse, further calls
    /// change nothing and report the same outcome again.
    ///
    /// # Errors
    ///
    /// A [`ParseError`](enum.ParseError.html) is returned if the response is
    /// malformed, or if it does not fit in
    /// [`ParserLimits::max_buffer_size`](struct.ParserLimits.html) bytes.
    pub fn feed<T>(
        &mut self,
        bytes: T,
    ) -> Result<ParseStatus, ParseError>
    where
        T: AsRef<[u8]>,
    {
        if let Some(error) = &self.error {
            return Err(error.clone());
        }
        if self.phase == Phase::Done {
            return Ok(ParseStatus::Complete);
        }
        let bytes = bytes.as_ref();
        let room =
            self.limits.max_buffer_size.saturating_sub(self.buffer.len());
        let accepted = bytes.len().min(room);
        self.buffer.extend(&bytes[..accepted]);
        match self.advance()? {
            ParseStatus::NeedMoreData if accepted < bytes.len() => {
                Err(self.fail(ParseError::BufferOverflow {
                    limit: self.limits.max_buffer_size,
                }))
            },
            status => Ok(status),
        }
    }

    /// Tell the parser the connection has reached end-of-stream.  This
    /// completes a response which has neither `Content-Length` nor chunked
    /// transfer coding, taking every byte after the headers as the body.
    ///
    /// # Errors
    ///
    /// [`ParseError::UnexpectedEof`](enum.ParseError.html#variant.UnexpectedEof)
    /// is returned if the response was not otherwise complete.  Any earlier
    /// parse error is returned again.
    pub fn force_close(&mut self) -> Result<ParseStatus, ParseError> {
        if let Some(error) = &self.error {
            return Err(error.clone());
        }
        match (self.phase, self.content_length) {
            (Phase::Done, _) => Ok(ParseStatus::Complete),
            (Phase::Body, None) => {
                self.body = self.buffer[self.payload_start..].to_vec();
                self.cursor = self.buffer.len();
                self.line_start = self.cursor;
                self.complete();
                Ok(ParseStatus::Complete)
            },
            _ => Err(self.fail(ParseError::UnexpectedEof)),
        }
    }

    /// Report whether any header or trailer was dropped because the
    /// header table was full.
    #[must_use]
    pub fn header_table_full(&self) -> bool {
        self.dropped_headers > 0
    }

    #[must_use]
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Consume the parser, returning the response if it is complete.
    #[must_use]
    pub fn into_response(self) -> Option<Response> {
        match self.phase {
            Phase::Done => Some(Response {
                body: self.body,
                headers: self.headers,
                protocol: self.protocol.into(),
                reason_phrase: self.reason_phrase.into(),
                status_code: self.status_code,
                trailers: self.trailers,
            }),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_chunked(&self) -> bool {
        self.chunked
    }

    #[must_use]
    pub fn new() -> Self {
        Self::with_limits(ParserLimits::default())
    }

    // Scan forward for the CRLF ending the current line, returning the
    // offset of its CR.  The cursor is left after the LF, or at the end of
    // the buffer if the line is not yet terminated.
    fn next_line_end(&mut self) -> Option<usize> {
        while self.cursor < self.buffer.len() {
            let position = self.cursor;
            self.cursor += 1;
            if self.buffer[position] == b'\n'
                && position > self.line_start
                && self.buffer[position - 1] == b'\r'
            {
                return Some(position - 1);
            }
        }
        None
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    fn process_line(
        &mut self,
        line_end: usize,
    ) -> Result<(), ParseError> {
        let line_start = self.line_start;
        self.line_start = self.cursor;
        let blank = line_start == line_end;
        match self.phase {
            Phase::Status => {
                let status_line =
                    parse_status_line(&self.buffer[line_start..line_end])?;
                self.protocol = status_line.protocol;
                self.reason_phrase = status_line.reason_phrase;
                self.status_code = status_line.status_code;
                self.set_phase(Phase::Headers);
            },
            Phase::Headers if blank => self.end_headers(),
            Phase::Headers => self.add_header(line_start, line_end)?,
            Phase::ChunkSize => {
                self.chunk_size =
                    parse_chunk_size(&self.buffer[line_start..line_end])
                        .ok_or_else(|| {
                            ParseError::MalformedChunkSize(
                                self.buffer[line_start..line_end].to_vec(),
                            )
                        })?;
                self.chunk_data_start = self.cursor;
                self.set_phase(Phase::ChunkData);
            },
            Phase::ChunkTrailer if self.chunk_size != 0 => {
                if !blank {
                    return Err(ParseError::InvalidChunkTerminator(
                        self.buffer[line_start..self.cursor].to_vec(),
                    ));
                }
                self.set_phase(Phase::ChunkSize);
            },
            Phase::ChunkTrailer if blank => self.complete(),
            Phase::ChunkTrailer => self.add_trailer(line_start, line_end)?,
            Phase::Body | Phase::ChunkData | Phase::Done | Phase::Error => (),
        }
        Ok(())
    }

    #[must_use]
    pub fn protocol(&self) -> &str {
        &self.protocol
    }

    #[must_use]
    pub fn reason_phrase(&self) -> &str {
        &self.reason_phrase
    }

    fn set_phase(
        &mut self,
        phase: Phase,
    ) {
        trace!(
            from = ?self.phase,
            to = ?phase,
            cursor = self.cursor,
            "phase change"
        );
        self.phase = phase;
    }

    #[must_use]
    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    #[must_use]
    pub fn trailers(&self) -> &Headers {
        &self.trailers
    }

    #[must_use]
    pub fn with_limits(limits: ParserLimits) -> Self {
        Self {
            body: Vec::new(),
            buffer: Vec::new(),
            chunk_data_start: 0,
            chunk_size: 0,
            chunked: false,
            content_length: None,
            cursor: 0,
            dropped_headers: 0,
            error: None,
            headers: Headers::new(),
            limits,
            line_start: 0,
            payload_start: 0,
            phase: Phase::Status,
            protocol: String::new(),
            reason_phrase: String::new(),
            status_code: 0,
            trailers: Headers::new(),
        }
    }
}

impl Default for ResponseParser {
    fn default() -> Self {
        Self::new()
    }
}
