//! ActiveSync error types.
use std::error::Error as StdError;
use std::fmt;
use std::io::Error as IoError;
use std::result;
use std::sync::Arc;

use reqwest::StatusCode;

/// A convenience wrapper around `Result` for `activesync::Error`.
pub type Result<T> = result::Result<T, Error>;

/// A shareable, type-erased error coming from a collaborator (HTTP client, codec).
pub type BoxedError = Arc<dyn StdError + Send + Sync + 'static>;

/// A set of errors that can occur in the ActiveSync client.
///
/// `Error` is cheap to clone so that a single failure can be handed to every caller that was
/// waiting on the same connection attempt.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum Error {
    /// A DNS, TCP, TLS or timeout failure reported by the HTTP client.
    Transport(BoxedError),
    /// The server answered with a non-2xx status that is not otherwise handled.
    Http(HttpError),
    /// Autodiscovery could not produce a usable configuration.
    Autodiscover(AutodiscoverError),
    /// The server does not advertise the named command. No request was sent.
    UnsupportedCommand(String),
    /// Error parsing a server response.
    Parse(ParseError),
    /// Error validating input data.
    Validate(ValidateError),
    /// The WBXML codec could not encode or decode a document.
    Codec(BoxedError),
    /// The server kept answering `451` past the configured number of relocations.
    TooManyRelocations(usize),
    /// An operation that needs a connected session was attempted before `connect` finished.
    NotConnected,
    /// `disconnect` was called while a connection attempt was still in flight.
    ConnectionInProgress,
    /// The connection attempt this call was waiting on was abandoned before it completed.
    ConnectionLost,
}

impl Error {
    /// Returns true if this is the autodiscover "wrong host" error that triggers the
    /// `autodiscover.<domain>` fallback.
    pub fn is_domain_error(&self) -> bool {
        matches!(self, Error::Autodiscover(AutodiscoverError::Domain(_)))
    }

    /// Returns true if the server rejected our credentials.
    pub fn is_auth_failure(&self) -> bool {
        match *self {
            Error::Http(ref e) => e.is_auth_failure(),
            _ => false,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Error {
        Error::Transport(Arc::new(err))
    }
}

impl From<IoError> for Error {
    fn from(err: IoError) -> Error {
        Error::Transport(Arc::new(err))
    }
}

impl From<HttpError> for Error {
    fn from(err: HttpError) -> Error {
        Error::Http(err)
    }
}

impl From<AutodiscoverError> for Error {
    fn from(err: AutodiscoverError) -> Error {
        Error::Autodiscover(err)
    }
}

impl From<ParseError> for Error {
    fn from(err: ParseError) -> Error {
        Error::Parse(err)
    }
}

impl From<ValidateError> for Error {
    fn from(err: ValidateError) -> Error {
        Error::Validate(err)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Error::Transport(ref e) => fmt::Display::fmt(e, f),
            Error::Http(ref e) => fmt::Display::fmt(e, f),
            Error::Autodiscover(ref e) => fmt::Display::fmt(e, f),
            Error::UnsupportedCommand(ref name) => {
                write!(f, "This server doesn't support the command {}", name)
            }
            Error::Parse(ref e) => fmt::Display::fmt(e, f),
            Error::Validate(ref e) => fmt::Display::fmt(e, f),
            Error::Codec(ref e) => write!(f, "WBXML codec error: {}", e),
            Error::TooManyRelocations(n) => {
                write!(f, "Server relocated the command endpoint {} times in a row", n)
            }
            Error::NotConnected => f.write_str("Connection is not established"),
            Error::ConnectionInProgress => {
                f.write_str("Cannot disconnect while a connection attempt is in progress")
            }
            Error::ConnectionLost => f.write_str("Connection attempt was abandoned"),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match *self {
            Error::Transport(ref e) | Error::Codec(ref e) => Some(&**e),
            Error::Http(ref e) => Some(e),
            Error::Autodiscover(ref e) => Some(e),
            Error::Parse(ref e) => Some(e),
            Error::Validate(ref e) => Some(e),
            _ => None,
        }
    }
}

/// A non-2xx HTTP status, and its standard reason phrase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpError {
    /// The status code of the response.
    pub status: StatusCode,
    /// The reason phrase for `status`.
    pub status_text: String,
}

impl HttpError {
    pub(crate) fn new(status: StatusCode) -> Self {
        HttpError {
            status,
            status_text: status.canonical_reason().unwrap_or("").to_string(),
        }
    }

    /// 401 and 403 both mean the credentials were not accepted.
    pub fn is_auth_failure(&self) -> bool {
        self.status == StatusCode::UNAUTHORIZED || self.status == StatusCode::FORBIDDEN
    }
}

impl fmt::Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HTTP {} {}", self.status.as_u16(), self.status_text)
    }
}

impl StdError for HttpError {}

/// Failures specific to the Autodiscover handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AutodiscoverError {
    /// The host does not support autodiscovery as asked: the body wasn't XML, or had no
    /// `Response` element. Autodiscovery retries once against `autodiscover.<domain>`.
    Domain(String),
    /// The server understood the request and refused it, or the answer was unusable.
    Protocol(String),
}

impl fmt::Display for AutodiscoverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            AutodiscoverError::Domain(ref msg) | AutodiscoverError::Protocol(ref msg) => {
                write!(f, "Autodiscover error: {}", msg)
            }
        }
    }
}

impl StdError for AutodiscoverError {}

/// An error parsing a server response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// A header the protocol requires was absent or not valid text.
    MissingHeader(&'static str),
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            ParseError::MissingHeader(name) => write!(f, "Missing or invalid {} header", name),
        }
    }
}

impl StdError for ParseError {}

/// Invalid input passed by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidateError {
    /// An extra query parameter tried to override one of `Cmd`, `User`, `DeviceId` or
    /// `DeviceType`.
    ReservedParameter(String),
    /// A numeric tag that no codepage defines.
    UnknownTag(u16),
    /// A header name or value that cannot be sent over HTTP.
    InvalidHeader(String),
    /// An email address without a domain part.
    InvalidEmail(String),
}

impl fmt::Display for ValidateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            ValidateError::ReservedParameter(ref key) => {
                write!(f, "Query parameter {:?} is reserved", key)
            }
            ValidateError::UnknownTag(tag) => write!(f, "Unknown tag {:#06x}", tag),
            ValidateError::InvalidHeader(ref name) => write!(f, "Invalid header {:?}", name),
            ValidateError::InvalidEmail(ref email) => {
                write!(f, "Invalid email address {:?}", email)
            }
        }
    }
}

impl StdError for ValidateError {}
