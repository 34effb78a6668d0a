use crate::error::DissectError;
use crate::field::FieldReader;
use crate::frame::NodeId;
use crate::parser::Dissection;
use crate::protocols::ProtocolData;
use crate::reader::Reader;
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter};

// HTTP Protocol
// RFC 2616: https://datatracker.ietf.org/doc/html/rfc2616

// Longest token the sniffer looks at: "OPTIONS", "CONNECT", "HTTP/1.1".
pub const TOKEN_WINDOW: usize = 10;
pub const VERSIONS: [&str; 2] = ["HTTP/1.0", "HTTP/1.1"];

/// Classifies the payload at the cursor by its first space-delimited token.
/// Nothing is consumed.
pub fn sniff(reader: &Reader) -> bool {
    match reader.peek_token(TOKEN_WINDOW, b' ') {
        Some(token) => VERSIONS.contains(&token) || Methods::try_from(token).is_ok(),
        None => false,
    }
}

pub fn dissect(dissection: &mut Dissection, parent: NodeId) -> Result<NodeId, DissectError> {
    let token = dissection
        .reader
        .peek_token(TOKEN_WINDOW, b' ')
        .unwrap_or_default();
    let mut http = match Methods::try_from(token) {
        Ok(method) => HTTP::Request(HTTPRequest {
            method,
            ..Default::default()
        }),
        Err(_) => HTTP::Response(HTTPResponse::default()),
    };

    let mut fields = FieldReader::new(&mut dissection.reader);
    let result = read(&mut fields, &mut http);
    let fields = fields.into_fields();

    dissection.link(parent, ProtocolData::HTTP(http), fields, result)
}

fn read(fields: &mut FieldReader, http: &mut HTTP) -> Result<(), DissectError> {
    match http {
        HTTP::Request(request) => {
            let line = fields.line("Request Line")?;
            let mut parts = line.splitn(3, ' ');
            // The method was taken from the same token.
            parts.next();
            request.target = parts.next().unwrap_or_default().to_string();
            request.version = parts.next().unwrap_or_default().to_string();

            request.headers = fields.group("Headers", read_headers)?;
            (request.body_offset, request.body_length) = body(fields);
        },
        HTTP::Response(response) => {
            let line = fields.line("Status Line")?;
            let mut parts = line.splitn(3, ' ');
            response.version = parts.next().unwrap_or_default().to_string();
            response.status_code = parts
                .next()
                .and_then(|code| code.parse::<u16>().ok())
                .ok_or(DissectError::Verify("HTTP status code is not a number"))?;
            response.reason = parts.next().unwrap_or_default().to_string();

            response.headers = fields.group("Headers", read_headers)?;
            (response.body_offset, response.body_length) = body(fields);
        },
    }

    Ok(())
}

fn read_headers(fields: &mut FieldReader) -> Result<Vec<Header>, DissectError> {
    let mut headers = vec![];

    loop {
        let line = fields.line("Header")?;
        if line.is_empty() {
            break;
        }
        if let Some((key, value)) = line.split_once(':') {
            headers.push((key.trim().to_string(), value.trim().to_string()));
        }
    }

    Ok(headers)
}

// Body bytes stay unread; consumers fetch them by offset.
fn body(fields: &FieldReader) -> (usize, usize) {
    (fields.position(), fields.left())
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub enum HTTP {
    Request(HTTPRequest),
    Response(HTTPResponse),
}

impl HTTP {
    pub fn headers(&self) -> &[Header] {
        match self {
            HTTP::Request(request) => &request.headers,
            HTTP::Response(response) => &response.headers,
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers()
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

pub type Header = (String, String);

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct HTTPRequest {
    pub method: Methods,
    pub target: String,
    pub version: String,
    pub headers: Vec<Header>,
    pub body_offset: usize,
    pub body_length: usize,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct HTTPResponse {
    pub version: String,
    pub status_code: u16,
    pub reason: String,
    pub headers: Vec<Header>,
    pub body_offset: usize,
    pub body_length: usize,
}

#[derive(Clone, Copy, Debug, Default, Display, EnumIter, Serialize, Deserialize, PartialEq)]
pub enum Methods {
    #[default]
    GET,
    POST,
    PUT,
    DELETE,
    HEAD,
    OPTIONS,
    TRACE,
    PATCH,
    CONNECT,
}

impl TryFrom<&str> for Methods {
    type Error = DissectError;

    fn try_from(method: &str) -> Result<Self, Self::Error> {
        Self::iter()
            .find(|known| known.to_string() == method)
            .ok_or(DissectError::Verify("Unknown HTTP method"))
    }
}
