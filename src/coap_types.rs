//! CoAP types for the SID resolution resource
//!
//! Transport-agnostic request/response shapes, so the handler can sit
//! behind any CoAP implementation.

/// CoAP Content-Format identifiers accepted and produced by the resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum ContentFormat {
    /// application/cbor
    Cbor = 60,
    /// application/yang-data+cbor
    YangDataCbor = 112,
    /// application/yang-identifiers+cbor
    YangIdentifiersCbor = 311,
}

impl ContentFormat {
    /// Convert from raw content-format ID
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            60 => Some(Self::Cbor),
            112 => Some(Self::YangDataCbor),
            311 => Some(Self::YangIdentifiersCbor),
            _ => None,
        }
    }

    /// Get the raw content-format ID
    pub fn as_u16(self) -> u16 {
        self as u16
    }
}

/// Request methods understood by the handler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// Resolve a batch of SID queries (RFC 8132)
    Fetch,
    /// Retrieve the whole model
    Get,
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Method::Fetch => f.write_str("FETCH"),
            Method::Get => f.write_str("GET"),
        }
    }
}

/// CoAP response codes surfaced to the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseCode {
    /// 2.05 Content
    Content,
    /// 4.00 Bad Request
    BadRequest,
    /// 4.04 Not Found
    NotFound,
    /// 4.15 Unsupported Content-Format
    UnsupportedContentFormat,
    /// 5.00 Internal Server Error
    InternalServerError,
}

impl std::fmt::Display for ResponseCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (class, detail) = self.to_code_pair();
        write!(f, "{}.{:02}", class, detail)
    }
}

impl ResponseCode {
    /// Convert to CoAP response code format (class.detail)
    pub fn to_code_pair(self) -> (u8, u8) {
        match self {
            Self::Content => (2, 5),
            Self::BadRequest => (4, 0),
            Self::NotFound => (4, 4),
            Self::UnsupportedContentFormat => (4, 15),
            Self::InternalServerError => (5, 0),
        }
    }

    /// Check if this is a success code
    pub fn is_success(self) -> bool {
        matches!(self, Self::Content)
    }
}

/// A request (transport-agnostic)
#[derive(Debug, Clone)]
pub struct Request {
    /// The request method
    pub method: Method,
    /// CBOR-encoded payload
    pub payload: Vec<u8>,
    /// Content format of the payload
    pub content_format: Option<ContentFormat>,
}

impl Request {
    /// Create a new request
    pub fn new(method: Method) -> Self {
        Self {
            method,
            payload: Vec::new(),
            content_format: None,
        }
    }

    /// Set the payload
    pub fn with_payload(mut self, payload: Vec<u8>, format: ContentFormat) -> Self {
        self.payload = payload;
        self.content_format = Some(format);
        self
    }
}

/// A response (transport-agnostic)
#[derive(Debug, Clone)]
pub struct Response {
    /// Response code
    pub code: ResponseCode,
    /// CBOR-encoded payload
    pub payload: Vec<u8>,
    /// Content format of the payload
    pub content_format: Option<ContentFormat>,
}

impl Response {
    /// Create a success response with content
    pub fn content(payload: Vec<u8>, format: ContentFormat) -> Self {
        Self {
            code: ResponseCode::Content,
            payload,
            content_format: Some(format),
        }
    }

    /// Create an error response with a diagnostic payload
    pub fn error(code: ResponseCode, message: &str) -> Self {
        Self {
            code,
            payload: message.as_bytes().to_vec(),
            content_format: None,
        }
    }

    /// Create an error response without a body
    pub fn empty(code: ResponseCode) -> Self {
        Self {
            code,
            payload: Vec::new(),
            content_format: None,
        }
    }
}
