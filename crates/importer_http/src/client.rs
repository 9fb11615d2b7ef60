use std::io::{self, Read};

use async_trait::async_trait;
use bytes::Bytes;
use http::header::{CONTENT_LENGTH, CONTENT_TYPE, LOCATION};
use http::{Method, Request, Response, StatusCode, Uri};
use hyper::body::Sender;
use hyper::client::HttpConnector;
use hyper::{Body, Client};

use importer_core::registry::{ManifestRef, ManifestSpec, Registry};
use importer_core::OciDigest;

use crate::errors::{Error, Result};
use crate::location::{encode_query_value, resolve_location, with_digest_query};

const CHUNK_SIZE: usize = 1024 * 1024;
const ERROR_BODY_LIMIT: usize = 1024;

/// [`Registry`] speaking the OCI distribution API over plain HTTP.
///
/// Blobs are pushed with a monolithic POST-PUT upload; the PUT body is streamed from the archive
/// in chunks while the request is in flight.
pub struct HttpRegistry {
    client: Client<HttpConnector>,
    origin: String,
}

impl HttpRegistry {
    pub(crate) fn new(client: Client<HttpConnector>, origin: String) -> Self {
        Self { client, origin }
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    fn uri(&self, path: &str) -> Result<Uri> {
        Ok(format!("{}{}", self.origin, path).parse()?)
    }

    async fn send(&self, request: Request<Body>) -> Result<Response<Body>> {
        Ok(self.client.request(request).await?)
    }

    async fn start_upload(&self, repository: &str) -> Result<Uri> {
        let path = format!("/v2/{repository}/blobs/uploads/");
        let uri = self.uri(&path)?;
        let request = Request::post(uri.clone())
            .header(CONTENT_LENGTH, 0u64)
            .body(Body::empty())?;

        let response = self.send(request).await?;
        if !response.status().is_success() {
            return Err(unexpected(Method::POST, &uri, response).await);
        }
        let location = response
            .headers()
            .get(LOCATION)
            .ok_or(Error::MissingHeader("Location"))?
            .to_str()?;
        let location = resolve_location(&self.origin, &path, location)?;
        drain(response).await?;
        Ok(location)
    }

    async fn finish_upload(
        &self,
        location: &Uri,
        digest: &OciDigest,
        content: &mut dyn Read,
        size: u64,
    ) -> Result<()> {
        let uri = with_digest_query(location, digest)?;
        let (mut sender, body) = Body::channel();
        let request = Request::put(uri.clone())
            .header(CONTENT_TYPE, "application/octet-stream")
            .header(CONTENT_LENGTH, size)
            .body(body)?;

        let feed = async move {
            let fed = feed_body(&mut sender, content, digest, size).await;
            if fed.is_err() {
                sender.abort();
            }
            fed
        };
        let (fed, response) = tokio::join!(feed, self.send(request));
        fed?;
        let response = response?;

        if !response.status().is_success() {
            return Err(unexpected(Method::PUT, &uri, response).await);
        }
        drain(response).await
    }

    async fn cancel_upload(&self, location: Uri) {
        let request = match Request::delete(location.clone()).body(Body::empty()) {
            Ok(r) => r,
            Err(e) => {
                tracing::debug!("not cancelling upload session {location}: {e}");
                return;
            }
        };
        match self.send(request).await {
            Ok(response) if response.status().is_success() => (),
            Ok(response) => {
                tracing::debug!(
                    "cancelling upload session {location} returned {}",
                    response.status()
                )
            }
            Err(e) => tracing::debug!("cancelling upload session {location} failed: {e}"),
        }
    }
}

#[async_trait(?Send)]
impl Registry for HttpRegistry {
    type Error = Error;

    async fn has_blob(&self, repository: &str, digest: &OciDigest) -> Result<bool> {
        let uri = self.uri(&format!("/v2/{repository}/blobs/{digest}"))?;
        let request = Request::head(uri.clone()).body(Body::empty())?;
        let response = self.send(request).await?;

        match response.status() {
            StatusCode::OK => {
                drain(response).await?;
                Ok(true)
            }
            StatusCode::NOT_FOUND => {
                drain(response).await?;
                Ok(false)
            }
            _ => Err(unexpected(Method::HEAD, &uri, response).await),
        }
    }

    async fn upload_blob(
        &self,
        repository: &str,
        digest: &OciDigest,
        content: &mut dyn Read,
        size: u64,
    ) -> Result<()> {
        let location = self.start_upload(repository).await?;
        tracing::debug!("upload session for {digest} at {location}");
        self.finish_upload(&location, digest, content, size).await
    }

    async fn mount_blob(&self, repository: &str, digest: &OciDigest, from: &str) -> Result<bool> {
        let path = format!("/v2/{repository}/blobs/uploads/");
        let uri = self.uri(&format!(
            "{path}?mount={}&from={}",
            encode_query_value(&digest.to_string()),
            encode_query_value(from)
        ))?;
        let request = Request::post(uri.clone())
            .header(CONTENT_LENGTH, 0u64)
            .body(Body::empty())?;
        let response = self.send(request).await?;

        match response.status() {
            StatusCode::CREATED => {
                drain(response).await?;
                Ok(true)
            }
            // the registry fell back to opening a regular upload session
            StatusCode::ACCEPTED => {
                let location = match response.headers().get(LOCATION) {
                    Some(l) => Some(resolve_location(&self.origin, &path, l.to_str()?)?),
                    None => None,
                };
                drain(response).await?;
                if let Some(location) = location {
                    self.cancel_upload(location).await;
                }
                Ok(false)
            }
            _ => Err(unexpected(Method::POST, &uri, response).await),
        }
    }

    async fn put_manifest(
        &self,
        repository: &str,
        reference: &ManifestRef,
        spec: &ManifestSpec,
        body: Bytes,
    ) -> Result<()> {
        let uri = self.uri(&format!("/v2/{repository}/manifests/{reference}"))?;
        let request = Request::put(uri.clone())
            .header(CONTENT_TYPE, spec.content_type())
            .header(CONTENT_LENGTH, body.len())
            .body(Body::from(body))?;
        let response = self.send(request).await?;

        if !response.status().is_success() {
            return Err(unexpected(Method::PUT, &uri, response).await);
        }
        drain(response).await
    }
}

// Reads from `content` block the task. The hyper request it feeds is polled in the same task
// through `tokio::join!`, while the connection itself is driven on another worker, so this
// needs the multi-thread runtime.
async fn feed_body(
    sender: &mut Sender,
    content: &mut dyn Read,
    digest: &OciDigest,
    size: u64,
) -> Result<()> {
    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut sent = 0u64;

    while sent < size {
        let want = (size - sent).min(CHUNK_SIZE as u64) as usize;
        let n = match content.read(&mut buf[..want]) {
            Ok(0) => {
                return Err(Error::ShortRead {
                    digest: digest.clone(),
                    read: sent,
                    expected: size,
                })
            }
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };
        sender
            .send_data(Bytes::copy_from_slice(&buf[..n]))
            .await
            .map_err(|_| Error::BodyClosed(digest.clone()))?;
        sent += n as u64;
    }

    Ok(())
}

/// Read a response body to completion so its connection can be reused.
async fn drain(response: Response<Body>) -> Result<()> {
    hyper::body::to_bytes(response.into_body()).await?;
    Ok(())
}

async fn unexpected(method: Method, uri: &Uri, response: Response<Body>) -> Error {
    let status = response.status();
    let body = match hyper::body::to_bytes(response.into_body()).await {
        Ok(b) => String::from_utf8_lossy(&b[..b.len().min(ERROR_BODY_LIMIT)]).into_owned(),
        Err(e) => format!("<unreadable body: {e}>"),
    };
    Error::UnexpectedStatus {
        method,
        uri: uri.to_string(),
        status,
        body,
    }
}
