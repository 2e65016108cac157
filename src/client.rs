use super::{
    error::{
        Error,
        ParseError,
    },
    parser::{
        ParseStatus,
        ParserLimits,
        ResponseParser,
    },
    request::{
        Request,
        RequestTemplate,
    },
    response::Response,
};
use std::{
    fmt::Display,
    io::{
        ErrorKind,
        Read,
        Write,
    },
    net::{
        SocketAddr,
        TcpStream,
    },
    time::{
        Duration,
        Instant,
    },
};
use tracing::{
    debug,
    warn,
};

const READ_BUFFER_SIZE: usize = 4096;

/// This is where, and under what time limits, a client sends its requests.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Endpoint {
    pub address: SocketAddr,

    /// Value of the `Host` header in requests rendered by
    /// [`Client::send_template`](struct.Client.html#method.send_template).
    pub host_name: String,

    pub connect_timeout: Duration,

    /// How long a response may take to arrive in full, counted from when the
    /// request has been sent.
    pub transfer_timeout: Duration,

    /// How long each read waits for data before the transfer timeout is
    /// checked again.
    pub poll_interval: Duration,

    pub limits: ParserLimits,
}

impl Endpoint {
    #[must_use]
    pub fn new<H>(
        address: SocketAddr,
        host_name: H,
    ) -> Self
    where
        H: Into<String>,
    {
        Self {
            address,
            host_name: host_name.into(),
            connect_timeout: Duration::from_secs(20),
            transfer_timeout: Duration::from_secs(30),
            poll_interval: Duration::from_secs(1),
            limits: ParserLimits::default(),
        }
    }
}

/// This sends one request per connection to an endpoint and reads back the
/// response.
#[derive(Clone, Debug)]
pub struct Client {
    endpoint: Endpoint,
}

impl Client {
    fn connect(&self) -> Result<TcpStream, Error> {
        let address = self.endpoint.address;
        let stream =
            TcpStream::connect_timeout(&address, self.endpoint.connect_timeout)
                .map_err(|error| match error.kind() {
                    ErrorKind::TimedOut | ErrorKind::WouldBlock => {
                        warn!(%address, "timeout connecting to server");
                        Error::ConnectTimeout
                    },
                    _ => Error::Connect(error),
                })?;
        debug!(%address, "connected");
        Ok(stream)
    }

    #[must_use]
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    #[must_use]
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
        }
    }

    fn receive(
        &self,
        stream: &mut TcpStream,
    ) -> Result<Response, Error> {
        stream
            .set_read_timeout(Some(self.endpoint.poll_interval))
            .map_err(Error::Io)?;
        let mut parser = ResponseParser::with_limits(self.endpoint.limits);
        let mut buffer = [0; READ_BUFFER_SIZE];
        let start = Instant::now();
        loop {
            if start.elapsed() >= self.endpoint.transfer_timeout {
                warn!(
                    address = %self.endpoint.address,
                    phase = ?parser.phase(),
                    "timeout receiving response"
                );
                return Err(Error::TransferTimeout);
            }
            let status = match stream.read(&mut buffer) {
                Ok(0) => {
                    debug!("connection closed by server");
                    parser.force_close()?
                },
                Ok(received) => parser.feed(&buffer[..received])?,
                Err(error)
                    if matches!(
                        error.kind(),
                        ErrorKind::WouldBlock
                            | ErrorKind::TimedOut
                            | ErrorKind::Interrupted
                    ) =>
                {
                    continue;
                },
                Err(error) => return Err(Error::Io(error)),
            };
            if status == ParseStatus::Complete {
                break;
            }
        }
        parser
            .into_response()
            .ok_or(Error::Parse(ParseError::UnexpectedEof))
    }

    /// Connect to the endpoint, send the given request, and wait for the
    /// complete response.
    ///
    /// # Errors
    ///
    /// Errors connecting, sending or receiving are returned as
    /// [`Error::Connect`](enum.Error.html#variant.Connect),
    /// [`Error::ConnectTimeout`](enum.Error.html#variant.ConnectTimeout),
    /// [`Error::Io`](enum.Error.html#variant.Io) or
    /// [`Error::TransferTimeout`](enum.Error.html#variant.TransferTimeout).
    /// A response which cannot be parsed is returned as
    /// [`Error::Parse`](enum.Error.html#variant.Parse).
    pub fn send(
        &self,
        request: &Request,
    ) -> Result<Response, Error> {
        let mut stream = self.connect()?;
        stream.write_all(&request.generate()?).map_err(Error::Io)?;
        debug!(
            method = %request.method,
            request_target = %request.target,
            "request sent"
        );
        let response = self.receive(&mut stream)?;
        debug!(status_code = response.status_code, "response received");
        Ok(response)
    }

    /// Render the given template for this client's endpoint, using its host
    /// name for the `Host` header, and send the resulting request.
    ///
    /// # Errors
    ///
    /// Errors rendering the template are returned as
    /// [`Error::MalformedTemplate`](enum.Error.html#variant.MalformedTemplate)
    /// or
    /// [`Error::MissingTemplateParameter`](enum.Error.html#variant.MissingTemplateParameter).
    /// Otherwise errors are as for
    /// [`send`](struct.Client.html#method.send).
    pub fn send_template(
        &self,
        template: &RequestTemplate,
        parameters: &[(&str, &dyn Display)],
    ) -> Result<Response, Error> {
        let request = template.render(&self.endpoint.host_name, parameters)?;
        self.send(&request)
    }
}

#[cfg(test)]
mod tests {

    use super::*;
    use std::{
        net::TcpListener,
        thread,
    };

    // Accept one connection, read the request up to the end of its headers
    // plus `Content-Length` bytes of body, then play back the given pieces of
    // response, pausing between them, and close the connection.
    fn serve_once(
        pieces: Vec<&'static str>
    ) -> (SocketAddr, thread::JoinHandle<Vec<u8>>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let address = listener.local_addr().unwrap();
        let handle = thread::spawn(move || {
            let (mut connection, _) = listener.accept().unwrap();
            let mut request = Vec::new();
            let mut buffer = [0; 1024];
            let mut parser_input = Vec::new();
            loop {
                let received = connection.read(&mut buffer).unwrap();
                if received == 0 {
                    break;
                }
                parser_input.extend(&buffer[..received]);
                if let Some(end) = find_request_end(&parser_input) {
                    request.extend(&parser_input[..end]);
                    break;
                }
            }
            for piece in pieces {
                connection.write_all(piece.as_bytes()).unwrap();
                connection.flush().unwrap();
                thread::sleep(Duration::from_millis(10));
            }
            request
        });
        (address, handle)
    }

    fn find_request_end(request: &[u8]) -> Option<usize> {
        let headers_end = request.windows(4).position(|w| w == b"\r\n\r\n")? + 4;
        let headers = String::from_utf8_lossy(&request[..headers_end]);
        let content_length = headers
            .lines()
            .find_map(|line| line.strip_prefix("Content-Length: "))
            .map_or(0, |value| value.trim().parse::<usize>().unwrap());
        let end = headers_end + content_length;
        if request.len() >= end {
            Some(end)
        } else {
            None
        }
    }

    fn test_endpoint(address: SocketAddr) -> Endpoint {
        let mut endpoint = Endpoint::new(address, "www.example.com");
        endpoint.connect_timeout = Duration::from_secs(5);
        endpoint.transfer_timeout = Duration::from_secs(5);
        endpoint.poll_interval = Duration::from_millis(50);
        endpoint
    }

    fn test_request() -> Request {
        RequestTemplate::new("POST", "/jikjik", "{\"gholeidoon\": \"${value}\"}")
            .render("www.example.com", &[("value", &23 as &dyn Display)])
            .unwrap()
    }

    #[test]
    fn send_receives_content_length_response_in_pieces() {
        let (address, server) = serve_once(vec![
            "HTTP/1.1 200 OK\r\nContent-Le",
            "ngth: 12\r\nContent-Type: text/plain\r\n\r\nHello",
            " World.",
        ]);
        let client = Client::new(test_endpoint(address));
        let request = test_request();
        let response = client.send(&request).unwrap();
        assert_eq!(200, response.status_code);
        assert_eq!(Some("text/plain"), response.headers.header_value("content-type"));
        assert_eq!(b"Hello World.", &response.body[..]);
        assert_eq!(request.generate().unwrap(), server.join().unwrap());
    }

    #[test]
    fn send_template_uses_endpoint_host_name() {
        let (address, server) = serve_once(vec![
            "HTTP/1.1 204 No Content\r\nContent-Length: 0\r\n\r\n",
        ]);
        let mut endpoint = test_endpoint(address);
        endpoint.host_name = "api.example.net".into();
        let client = Client::new(endpoint);
        let template = RequestTemplate::new(
            "POST",
            "/jikjik",
            "{\"gholeidoon\": \"${value}\"}",
        );
        let parameters: [(&str, &dyn Display); 1] = [("value", &23)];
        let response = client.send_template(&template, &parameters).unwrap();
        assert_eq!(204, response.status_code);
        let request = server.join().unwrap();
        let request = String::from_utf8(request).unwrap();
        assert!(request.starts_with("POST /jikjik HTTP/1.0\r\n"));
        assert!(request.contains("Host: api.example.net\r\n"));
        assert!(!request.contains("www.example.com"));
        assert!(request.ends_with("{\"gholeidoon\": \"23\"}"));
    }

    #[test]
    fn send_receives_chunked_response() {
        let (address, server) = serve_once(vec![
            "HTTP/1.0 400 Bad Request\r\nTransfer-Encoding: chunked\r\n\r\n",
            "5\r\nsal",
            "am\r\n0\r\n\r\n",
        ]);
        let client = Client::new(test_endpoint(address));
        let response = client.send(&test_request()).unwrap();
        assert_eq!(400, response.status_code);
        assert_eq!(b"salam", &response.body[..]);
        server.join().unwrap();
    }

    #[test]
    fn send_receives_close_delimited_response() {
        let (address, server) = serve_once(vec![
            "HTTP/1.0 200 OK\r\nContent-Type: text/plain\r\n\r\n",
            "until the ",
            "connection closes",
        ]);
        let client = Client::new(test_endpoint(address));
        let response = client.send(&test_request()).unwrap();
        assert_eq!(b"until the connection closes", &response.body[..]);
        server.join().unwrap();
    }

    #[test]
    fn send_reports_truncated_response() {
        let (address, server) = serve_once(vec![
            "HTTP/1.1 200 OK\r\nContent-Length: 100\r\n\r\nnot enough",
        ]);
        let client = Client::new(test_endpoint(address));
        assert!(matches!(
            client.send(&test_request()),
            Err(Error::Parse(ParseError::UnexpectedEof))
        ));
        server.join().unwrap();
    }

    #[test]
    fn send_reports_malformed_response() {
        let (address, server) = serve_once(vec!["GARBAGE\r\n\r\n"]);
        let client = Client::new(test_endpoint(address));
        assert!(matches!(
            client.send(&test_request()),
            Err(Error::Parse(ParseError::MalformedStatusLine(_)))
        ));
        server.join().unwrap();
    }

    #[test]
    fn send_times_out_waiting_for_response() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let address = listener.local_addr().unwrap();
        let server = thread::spawn(move || {
            let (mut connection, _) = listener.accept().unwrap();
            connection.write_all(b"HTTP/1.1 200 OK\r\n").unwrap();
            thread::sleep(Duration::from_millis(500));
        });
        let mut endpoint = test_endpoint(address);
        endpoint.transfer_timeout = Duration::from_millis(200);
        endpoint.poll_interval = Duration::from_millis(20);
        let client = Client::new(endpoint);
        assert!(matches!(
            client.send(&test_request()),
            Err(Error::TransferTimeout)
        ));
        server.join().unwrap();
    }

    #[test]
    fn send_reports_connection_refused() {
        let address = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap()
        };
        let client = Client::new(test_endpoint(address));
        assert!(matches!(
            client.send(&test_request()),
            Err(Error::Connect(_))
        ));
    }

    #[test]
    fn endpoint_defaults() {
        let endpoint = Endpoint::new(
            "192.168.1.1:80".parse().unwrap(),
            "www.example.com",
        );
        assert_eq!(Duration::from_secs(20), endpoint.connect_timeout);
        assert_eq!(Duration::from_secs(30), endpoint.transfer_timeout);
        assert_eq!(Duration::from_secs(1), endpoint.poll_interval);
        assert_eq!(ParserLimits::default(), endpoint.limits);
        let client = Client::new(endpoint.clone());
        assert_eq!(&endpoint, client.endpoint());
    }
}
