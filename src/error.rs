use std::fmt;

#[derive(Debug)]
pub enum Error {
    /// Transport-level failure (connection, TLS, timeout).
    Http(reqwest::Error),
    /// Credentials rejected at some step of the login flow.
    Authentication {
        status: Option<u16>,
        message: String,
    },
    /// Unreachable endpoint or unexpected payload shape.
    Network {
        status: Option<u16>,
        message: String,
    },
    UnknownApiType(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Http(e) => write!(f, "HTTP error: {e}"),
            Error::Authentication { status: Some(s), message } => {
                write!(f, "authentication failed ({s}): {message}")
            }
            Error::Authentication { status: None, message } => {
                write!(f, "authentication failed: {message}")
            }
            Error::Network { status: Some(s), message } => {
                write!(f, "network error ({s}): {message}")
            }
            Error::Network { status: None, message } => write!(f, "network error: {message}"),
            Error::UnknownApiType(t) => write!(f, "unknown API type: {t}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Http(e) => Some(e),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Http(e)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
