use http::StatusCode;
use thiserror;

use importer_core::OciDigest;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("http transport error: {0}")]
    Hyper(#[from] hyper::Error),
    #[error("http request error: {0}")]
    Http(#[from] http::Error),
    #[error("invalid uri: {0}")]
    InvalidUri(#[from] http::uri::InvalidUri),
    #[error("http invalid header value")]
    HTTPInvalidHeaderValue(#[from] http::header::InvalidHeaderValue),
    #[error("http non-ascii header value")]
    HTTPHeaderToStr(#[from] http::header::ToStrError),

    #[error("archive read error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unsupported registry url scheme: {0}")]
    UnsupportedScheme(String),
    #[error("registry url has no host: {0}")]
    MissingHost(String),

    #[error("{method} {uri} returned {status}: {body}")]
    UnexpectedStatus {
        method: http::Method,
        uri: String,
        status: StatusCode,
        body: String,
    },
    #[error("missing header: {0}")]
    MissingHeader(&'static str),

    #[error("blob {digest} ended after {read} of {expected} bytes")]
    ShortRead {
        digest: OciDigest,
        read: u64,
        expected: u64,
    },
    #[error("request body closed before blob {0} was sent")]
    BodyClosed(OciDigest),
}
