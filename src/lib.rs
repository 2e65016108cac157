#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::module_name_repetitions)]

mod chunked_body;
mod client;
mod error;
mod headers;
mod parser;
mod request;
mod response;

pub use crate::chunked_body::encode_chunked;
pub use crate::client::{
    Client,
    Endpoint,
};
pub use crate::error::{
    Error,
    ParseError,
};
pub use crate::headers::{
    Header,
    Headers,
};
pub use crate::parser::{
    ParseStatus,
    ParserLimits,
    Phase,
    ResponseParser,
};
pub use crate::request::{
    Request,
    RequestTemplate,
};
pub use crate::response::Response;

// This is the character sequence corresponding to a carriage return (CR)
// followed by a line feed (LF), which officially delimits each
// line of an HTTP response.
const CRLF: &str = "\r\n";
