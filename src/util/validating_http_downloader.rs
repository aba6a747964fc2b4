use std::sync::Arc;

use anyhow::anyhow;
use hex::FromHex;
use hyper::{Body, Client, Request, StatusCode, Uri};
use hyper::client::HttpConnector;
use hyper::header::USER_AGENT;
use hyper_tls::HttpsConnector;
use tracing::{debug, trace};

use crate::util::blob::Blob;
use crate::util::validating_http_body::{Md5StreamVerifier, Sha1StreamVerifier, StreamVerifier, StreamVerifierFactory, ValidatingHttpBody};

/// Downloads files relative to a fixed base URI, checking the body's integrity against a hashcode
///  if one is returned in a header or passed in by the caller.
///
/// Instances do HTTP connection caching internally, so keeping them alive has performance benefits.
pub struct ValidatingHttpDownloader {
    client: Client<HttpsConnector<HttpConnector>>,
    base_uri: String, // with trailing '/'
    verifier_factories: Vec<Arc<dyn StreamVerifierFactory>>,
}
impl ValidatingHttpDownloader {
    pub fn new(base_uri: String) -> anyhow::Result<ValidatingHttpDownloader> {
        let mut base_uri = base_uri;
        if !base_uri.ends_with('/') {
            base_uri.push('/');
        }

        // check that the base URI is valid
        Uri::try_from(base_uri.clone())?;

        Ok(ValidatingHttpDownloader {
            client: Client::builder()
                .build::<_, Body>(HttpsConnector::new()),
            base_uri,
            verifier_factories: Vec::new(),
        })
    }

    pub fn with_verifier_factory(mut self, factory: Arc<dyn StreamVerifierFactory>) -> ValidatingHttpDownloader {
        self.verifier_factories.push(factory);
        self
    }

    pub fn base_uri(&self) -> &str {
        &self.base_uri
    }

    /// Returns `None` if the server does not have the file (404). `expected_sha1` is checked in
    ///  addition to any checksum headers.
    pub async fn get(&self, path: &str, expected_sha1: Option<[u8;20]>) -> anyhow::Result<Option<Blob>> {
        let artifact_path = format!("{}{}", self.base_uri, path);
        let request = Request::builder()
            .method("GET")
            .uri(Uri::try_from(artifact_path.clone())?)
            .header(USER_AGENT, concat!("arti-resolve/", env!("CARGO_PKG_VERSION")))
            .body(Body::empty())?;

        trace!("getting {:?}", request);

        let artifact_response = self.client.request(request)
            .await?;

        if artifact_response.status() == StatusCode::NOT_FOUND {
            debug!("{} not found", artifact_path);
            return Ok(None);
        }
        if !artifact_response.status().is_success() {
            return Err(anyhow!("GET {} returned status {}", artifact_path, artifact_response.status()));
        }

        let sha1_string = artifact_response.headers().get("x-checksum-sha1")
            .or_else(|| artifact_response.headers().get("x-goog-meta-checksum-sha1"))
            .map(|h| h.to_str().unwrap_or(""))
            .map(|s| s.trim_matches('"'))
            .filter(|s| s.len() == 40)
            ;

        let md5_string = artifact_response.headers().get("x-checksum-md5")
            .or_else(|| artifact_response.headers().get("x-goog-meta-checksum-md5"))
            .map(|h| h.to_str().unwrap_or(""))
            .filter(|s| s.len() == 32)
            ;

        let mut expected_md5 = None;

        let mut verifiers: Vec<Box<dyn StreamVerifier>> = vec![];
        if let Some(sha1) = expected_sha1 {
            verifiers.push(Box::new(Sha1StreamVerifier::new(sha1)));
        }
        let header_sha1 = match sha1_string {
            Some(s) => Some(<[u8;20]>::from_hex(s)?),
            None => None,
        };
        if let Some(sha1) = header_sha1 {
            if Some(sha1) != expected_sha1 {
                verifiers.push(Box::new(Sha1StreamVerifier::new(sha1)));
            }
        }
        if let Some(md5) = md5_string {
            let expected_hash = <[u8;16]>::from_hex(md5)?;
            expected_md5 = Some(expected_hash);
            verifiers.push(Box::new(Md5StreamVerifier::new(expected_hash)));
        }
        for factory in &self.verifier_factories {
            if let Some(verifier) = factory.create(path) {
                verifiers.push(verifier);
            }
        }

        Ok(Some(Blob {
            data: Box::pin(ValidatingHttpBody::new(artifact_response.into_body(), verifiers)),
            md5: expected_md5,
            sha1: expected_sha1.or(header_sha1),
        }))
    }
}
