use super::{
    error::Error,
    headers::Headers,
};
use std::{
    borrow::Cow,
    fmt::{
        Display,
        Write as _,
    },
    io::Write,
};

// Replace each `${name}` placeholder in the template with the value of the
// parameter of the same name.
fn substitute(
    template: &str,
    parameters: &[(&str, &dyn Display)],
) -> Result<String, Error> {
    let mut output = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(placeholder_start) = rest.find("${") {
        output.push_str(&rest[..placeholder_start]);
        let rest_at_name = &rest[placeholder_start + 2..];
        let name_end = rest_at_name.find('}').ok_or_else(|| {
            Error::MalformedTemplate(rest[placeholder_start..].into())
        })?;
        let name = &rest_at_name[..name_end];
        let value = parameters
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value)
            .ok_or_else(|| Error::MissingTemplateParameter(name.into()))?;
        write!(&mut output, "{}", value).map_err(|_| Error::StringFormat)?;
        rest = &rest_at_name[name_end + 1..];
    }
    output.push_str(rest);
    Ok(output)
}

/// This is an HTTP/1.0 request, ready to be sent.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Request {
    pub body: Vec<u8>,
    pub headers: Headers,
    pub method: Cow<'static, str>,
    pub target: Cow<'static, str>,
}

impl Request {
    pub fn generate(&self) -> Result<Vec<u8>, Error> {
        let mut output = Vec::new();
        write!(&mut output, "{} {} HTTP/1.0\r\n", self.method, self.target)
            .map_err(|_| Error::StringFormat)?;
        output.append(&mut self.headers.generate());
        output.extend(&self.body);
        Ok(output)
    }

    #[must_use]
    pub fn new() -> Self {
        Self {
            body: Vec::new(),
            headers: Headers::new(),
            method: "GET".into(),
            target: "/".into(),
        }
    }
}

impl Default for Request {
    fn default() -> Self {
        Self::new()
    }
}

/// This describes one kind of request a client makes.  The body may hold
/// `${name}` placeholders, which are filled in from named parameters when
/// the template is rendered into a [`Request`](struct.Request.html).
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RequestTemplate {
    pub accept: Cow<'static, str>,
    pub body: Cow<'static, str>,
    pub content_type: Cow<'static, str>,
    pub method: Cow<'static, str>,
    pub target: Cow<'static, str>,
}

impl RequestTemplate {
    #[must_use]
    pub fn new<M, T, B>(
        method: M,
        target: T,
        body: B,
    ) -> Self
    where
        M: Into<Cow<'static, str>>,
        T: Into<Cow<'static, str>>,
        B: Into<Cow<'static, str>>,
    {
        Self {
            accept: "application/json".into(),
            body: body.into(),
            content_type: "application/json".into(),
            method: method.into(),
            target: target.into(),
        }
    }

    /// Build a request for the given host, substituting the given parameters
    /// into the body.
    ///
    /// # Errors
    ///
    /// [`Error::MissingTemplateParameter`](enum.Error.html#variant.MissingTemplateParameter)
    /// is returned if a placeholder names no given parameter, and
    /// [`Error::MalformedTemplate`](enum.Error.html#variant.MalformedTemplate)
    /// if a placeholder is not closed.
    pub fn render(
        &self,
        host_name: &str,
        parameters: &[(&str, &dyn Display)],
    ) -> Result<Request, Error> {
        let body = substitute(&self.body, parameters)?;
        let mut headers = Headers::new();
        headers.add_header("Host", host_name);
        headers.add_header("Accept", self.accept.clone());
        headers.add_header("Content-Length", body.len().to_string());
        headers.add_header("Content-Type", self.content_type.clone());
        Ok(Request {
            body: body.into_bytes(),
            headers,
            method: self.method.clone(),
            target: self.target.clone(),
        })
    }
}
