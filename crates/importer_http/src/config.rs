use http::Uri;
use hyper::Client;
use serde::Deserialize;

use crate::client::HttpRegistry;
use crate::errors::{Error, Result};

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct HttpRegistryConfig {
    /// Base url of the registry, eg `http://localhost:5000`. Any path is ignored; the
    /// distribution API always lives under `/v2/`.
    pub url: String,
}

impl HttpRegistryConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    pub fn new_client(&self) -> Result<HttpRegistry> {
        let origin = self.origin()?;
        tracing::debug!("using registry at {origin}");
        Ok(HttpRegistry::new(Client::new(), origin))
    }

    fn origin(&self) -> Result<String> {
        let uri: Uri = self.url.parse()?;
        match uri.scheme_str() {
            Some("http") => (),
            Some(other) => return Err(Error::UnsupportedScheme(other.to_string())),
            None => return Err(Error::UnsupportedScheme(String::from("<none>"))),
        }
        let authority = uri
            .authority()
            .ok_or_else(|| Error::MissingHost(self.url.clone()))?;
        if !matches!(uri.path(), "" | "/" | "/v2" | "/v2/") {
            tracing::warn!("ignoring path of registry url {}", self.url);
        }
        Ok(format!("http://{authority}"))
    }
}
