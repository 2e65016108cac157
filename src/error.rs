/// These are the ways a response can fail to parse.  Every one of them is
/// fatal: once the parser reports one, it stays in the error phase.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum ParseError {
    /// More bytes arrived than the parser buffer may hold before the
    /// response was complete.
    #[error("response exceeds the {limit} byte buffer limit")]
    BufferOverflow {
        limit: usize,
    },

    /// The attached bytes appeared after the end of a chunk
    /// in the place where a carriage-return and line-feed were expected.
    #[error("unexpected extra junk at the end of a chunk")]
    InvalidChunkTerminator(Vec<u8>),

    /// The attached chunk size line did not begin with a hexadecimal digit.
    #[error("invalid chunk size line")]
    MalformedChunkSize(Vec<u8>),

    /// The attached header line had no colon, or the colon was not followed
    /// by a single space.
    #[error("malformed header line")]
    MalformedHeaderLine(Vec<u8>),

    /// No delimiter was found to parse the status code from the attached
    /// HTTP status line.
    #[error("malformed status line")]
    MalformedStatusLine(Vec<u8>),

    /// The connection closed before the response was complete.
    #[error("connection closed before the response was complete")]
    UnexpectedEof,
}

/// This is the enumeration of all the different kinds of errors which this
/// crate generates.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The connection to the server could not be established.
    #[error("unable to connect to server")]
    Connect(#[source] std::io::Error),

    /// The connection to the server was not established in time.
    #[error("timeout connecting to server")]
    ConnectTimeout,

    /// An error occurred sending the request or receiving the response.
    #[error("error sending request or receiving response")]
    Io(#[source] std::io::Error),

    /// A request template placeholder was not terminated.
    #[error("unterminated placeholder in request template")]
    MalformedTemplate(String),

    /// The attached request template placeholder had no matching parameter.
    #[error("no value given for request template parameter")]
    MissingTemplateParameter(String),

    /// The response could not be parsed.
    #[error("invalid response")]
    Parse(#[from] ParseError),

    /// An error occurred during string formatting.
    #[error("error during string format")]
    StringFormat,

    /// The response was not received in full before the transfer timeout.
    #[error("timeout receiving response")]
    TransferTimeout,
}
