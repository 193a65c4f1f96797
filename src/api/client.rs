//! Purpose: Blocking HTTP client for the licensed `/process` API.
//! Exports: `LicensedClient`, `StatusPolicy`, `DEFAULT_API_ENDPOINT`.
//! Role: Validates the license locally, then POSTs a JSON envelope and decodes the reply.
//! Invariants: The license is re-validated on every call; a rejected key never hits the network.
//! Invariants: The endpoint is fixed once the builder methods have run.
//! Invariants: Response bodies are owned by the call and released on every exit path.
#![allow(clippy::result_large_err)]

use super::envelope::{decode_response, encode_request, normalize_base_url, process_url};
use crate::core::error::{Error, ErrorKind};
use crate::core::license::{Tier, license_matches};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::fmt;
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};
use url::Url;

type ApiResult<T> = Result<T, Error>;

pub const DEFAULT_API_ENDPOINT: &str = "https://api.yourpackage.com";

/// How non-success HTTP statuses are treated.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum StatusPolicy {
    /// Decode the body whatever the status.
    #[default]
    Lenient,
    /// Fail 4xx/5xx replies with `ErrorKind::Status`.
    Strict,
}

#[derive(Clone)]
pub struct LicensedClient {
    inner: Arc<ClientInner>,
}

#[derive(Clone)]
struct ClientInner {
    license_key: String,
    tier: String,
    api_endpoint: Url,
    process_url: Url,
    timeout: Option<Duration>,
    status_policy: StatusPolicy,
    tls_config: Option<Arc<ureq::rustls::ClientConfig>>,
    agent: ureq::Agent,
}

impl LicensedClient {
    /// Builds a client for `tier`. Paid tiers need a non-empty key; its
    /// shape is only checked when a call is made.
    pub fn new(license_key: impl Into<String>, tier: impl Into<String>) -> ApiResult<Self> {
        let license_key = license_key.into();
        let tier = tier.into();
        if license_key.is_empty() && tier != Tier::Free.as_str() {
            return Err(Error::new(ErrorKind::Configuration)
                .with_message("license key required for paid tiers"));
        }
        let api_endpoint = normalize_base_url(DEFAULT_API_ENDPOINT)?;
        let process_url = process_url(&api_endpoint)?;
        Ok(Self {
            inner: Arc::new(ClientInner {
                license_key,
                tier,
                api_endpoint,
                process_url,
                timeout: None,
                status_policy: StatusPolicy::default(),
                tls_config: None,
                agent: build_agent(None, None),
            }),
        })
    }

    pub fn free() -> ApiResult<Self> {
        Self::new(String::new(), Tier::Free.as_str())
    }

    pub fn with_endpoint(mut self, base_url: impl AsRef<str>) -> ApiResult<Self> {
        let api_endpoint = normalize_base_url(base_url.as_ref())?;
        let process_url = process_url(&api_endpoint)?;
        let inner = Arc::make_mut(&mut self.inner);
        inner.api_endpoint = api_endpoint;
        inner.process_url = process_url;
        Ok(self)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        let inner = Arc::make_mut(&mut self.inner);
        inner.timeout = Some(timeout);
        inner.agent = build_agent(inner.timeout, inner.tls_config.clone());
        self
    }

    pub fn with_status_policy(mut self, policy: StatusPolicy) -> Self {
        Arc::make_mut(&mut self.inner).status_policy = policy;
        self
    }

    /// Trusts only the PEM certificates in `path` for TLS endpoints.
    pub fn with_tls_ca_file(mut self, path: impl AsRef<Path>) -> ApiResult<Self> {
        let path = path.as_ref();
        let cert_bytes = std::fs::read(path).map_err(|err| {
            Error::new(ErrorKind::Configuration)
                .with_message(format!(
                    "failed to read TLS CA/certificate file {}",
                    path.display()
                ))
                .with_source(err)
        })?;
        let mut cert_reader = Cursor::new(cert_bytes);
        let certs = rustls_pemfile::certs(&mut cert_reader)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|err| {
                Error::new(ErrorKind::Configuration)
                    .with_message(format!(
                        "failed to parse TLS CA/certificate file {}",
                        path.display()
                    ))
                    .with_source(err)
            })?;
        if certs.is_empty() {
            return Err(Error::new(ErrorKind::Configuration).with_message(format!(
                "TLS CA/certificate file {} contains no certificates",
                path.display()
            )));
        }

        let _ = ureq::rustls::crypto::aws_lc_rs::default_provider().install_default();
        let mut root_store = ureq::rustls::RootCertStore::empty();
        let (added, _) = root_store.add_parsable_certificates(certs);
        if added == 0 {
            return Err(Error::new(ErrorKind::Configuration).with_message(format!(
                "TLS CA/certificate file {} contains no parsable certificates",
                path.display()
            )));
        }

        let tls_config = ureq::rustls::ClientConfig::builder()
            .with_root_certificates(root_store)
            .with_no_client_auth();
        let inner = Arc::make_mut(&mut self.inner);
        inner.tls_config = Some(Arc::new(tls_config));
        inner.agent = build_agent(inner.timeout, inner.tls_config.clone());
        Ok(self)
    }

    /// Replaces the key and tier. The non-empty check from `new` is not
    /// repeated; the next call re-validates the pattern.
    pub fn set_license(&mut self, license_key: impl Into<String>, tier: impl Into<String>) {
        let inner = Arc::make_mut(&mut self.inner);
        inner.license_key = license_key.into();
        inner.tier = tier.into();
    }

    pub fn license_key(&self) -> &str {
        &self.inner.license_key
    }

    pub fn tier(&self) -> &str {
        &self.inner.tier
    }

    pub fn api_endpoint(&self) -> &Url {
        &self.inner.api_endpoint
    }

    pub fn process_url(&self) -> &Url {
        &self.inner.process_url
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.inner.timeout
    }

    pub fn status_policy(&self) -> StatusPolicy {
        self.inner.status_policy
    }

    pub fn validate_license(&self) -> bool {
        license_matches(&self.inner.tier, &self.inner.license_key)
    }

    /// Sends `data` to `/process` and returns the decoded JSON object.
    pub fn api_call<T>(&self, data: &T) -> ApiResult<Map<String, Value>>
    where
        T: Serialize + ?Sized,
    {
        self.api_call_as(data)
    }

    /// Like [`api_call`](Self::api_call), decoding the reply into `R`.
    pub fn api_call_as<T, R>(&self, data: &T) -> ApiResult<R>
    where
        T: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let inner = &self.inner;
        if !self.validate_license() {
            debug!(tier = %inner.tier, "license key rejected");
            return Err(Error::new(ErrorKind::Authorization).with_message("invalid license key"));
        }

        let payload = encode_request(data, &inner.license_key, &inner.tier)?;
        let url = inner.process_url.as_str();
        debug!(tier = %inner.tier, url, bytes = payload.len(), "sending process request");

        let response = inner
            .agent
            .post(url)
            .set("Content-Type", "application/json")
            .send_string(&payload);

        let response = match response {
            Ok(resp) => resp,
            Err(ureq::Error::Status(code, resp)) => match inner.status_policy {
                StatusPolicy::Lenient => resp,
                StatusPolicy::Strict => {
                    drop(resp);
                    return Err(Error::new(ErrorKind::Status)
                        .with_message("remote returned error status")
                        .with_status(code)
                        .with_endpoint(url));
                }
            },
            Err(ureq::Error::Transport(err)) => {
                return Err(Error::new(ErrorKind::Transport)
                    .with_message("request failed")
                    .with_endpoint(url)
                    .with_source(err));
            }
        };

        let status = response.status();
        trace!(status, "received process response");
        decode_response(response.into_reader())
            .map_err(|err| err.with_status(status).with_endpoint(url))
    }
}

impl fmt::Debug for LicensedClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LicensedClient")
            .field("tier", &self.inner.tier)
            .field("license_key", &"<redacted>")
            .field("api_endpoint", &self.inner.api_endpoint.as_str())
            .field("timeout", &self.inner.timeout)
            .field("status_policy", &self.inner.status_policy)
            .finish_non_exhaustive()
    }
}

fn build_agent(
    timeout: Option<Duration>,
    tls_config: Option<Arc<ureq::rustls::ClientConfig>>,
) -> ureq::Agent {
    let mut builder = ureq::AgentBuilder::new();
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }
    if let Some(tls_config) = tls_config {
        builder = builder.tls_config(tls_config);
    }
    builder.build()
}

#[cfg(test)]
mod tests {
    use super::{DEFAULT_API_ENDPOINT, LicensedClient, StatusPolicy};
    use crate::core::error::ErrorKind;
    use serde::ser::{Error as _, Serialize, Serializer};
    use serde_json::json;
    use std::io::Write;
    use std::time::Duration;

    // Nothing listens on the discard port; auth and encode failures must
    // surface before any connection is attempted.
    const UNREACHABLE: &str = "http://127.0.0.1:9";

    struct Unserializable;

    impl Serialize for Unserializable {
        fn serialize<S: Serializer>(&self, _serializer: S) -> Result<S::Ok, S::Error> {
            Err(S::Error::custom("value cannot be encoded"))
        }
    }

    #[test]
    fn paid_tier_requires_key() {
        for tier in ["basic", "pro", "enterprise", "gold"] {
            let err = LicensedClient::new("", tier).expect_err("missing key");
            assert_eq!(err.kind(), ErrorKind::Configuration, "tier {tier}");
        }
    }

    #[test]
    fn free_tier_allows_empty_key() {
        let client = LicensedClient::new("", "free").expect("client");
        assert_eq!(client.license_key(), "");
        assert!(client.validate_license());

        let client = LicensedClient::free().expect("client");
        assert_eq!(client.tier(), "free");
    }

    #[test]
    fn construction_stores_inputs_verbatim() {
        let client = LicensedClient::new("PRO_ABC", "Pro").expect("client");
        assert_eq!(client.license_key(), "PRO_ABC");
        assert_eq!(client.tier(), "Pro");
        assert!(!client.validate_license());
    }

    #[test]
    fn default_endpoint_and_settings() {
        let client = LicensedClient::new("bsc_0123456789abcdef", "basic").expect("client");
        assert_eq!(
            client.api_endpoint().as_str(),
            format!("{DEFAULT_API_ENDPOINT}/")
        );
        assert_eq!(
            client.process_url().as_str(),
            "https://api.yourpackage.com/process"
        );
        assert_eq!(client.timeout(), None);
        assert_eq!(client.status_policy(), StatusPolicy::Lenient);
    }

    #[test]
    fn builder_overrides_settings() {
        let client = LicensedClient::free()
            .expect("client")
            .with_endpoint("http://localhost:8080/v2")
            .expect("endpoint")
            .with_timeout(Duration::from_secs(5))
            .with_status_policy(StatusPolicy::Strict);
        assert_eq!(client.process_url().as_str(), "http://localhost:8080/v2/process");
        assert_eq!(client.timeout(), Some(Duration::from_secs(5)));
        assert_eq!(client.status_policy(), StatusPolicy::Strict);
    }

    #[test]
    fn with_endpoint_rejects_bad_urls() {
        let err = LicensedClient::free()
            .expect("client")
            .with_endpoint("ftp://example.com")
            .expect_err("scheme");
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn set_license_is_revalidated() {
        let mut client = LicensedClient::new("bsc_0123456789abcdef", "basic").expect("client");
        assert!(client.validate_license());

        client.set_license("bsc_0123456789abcdef", "pro");
        assert!(!client.validate_license());

        client.set_license("pro_0123456789abcdef", "pro");
        assert!(client.validate_license());

        client.set_license("", "enterprise");
        assert!(!client.validate_license());
    }

    #[test]
    fn clones_are_independent_after_mutation() {
        let original = LicensedClient::new("bsc_0123456789abcdef", "basic").expect("client");
        let mut copy = original.clone();
        copy.set_license("junk", "basic");
        assert!(original.validate_license());
        assert!(!copy.validate_license());
    }

    #[test]
    fn invalid_license_fails_before_network() {
        let client = LicensedClient::new("bsc_0000000000000000", "pro")
            .expect("client")
            .with_endpoint(UNREACHABLE)
            .expect("endpoint");
        let err = client.api_call(&json!({"x": 1})).expect_err("auth");
        assert_eq!(err.kind(), ErrorKind::Authorization);
        assert_eq!(err.message(), Some("invalid license key"));
    }

    #[test]
    fn unknown_tier_fails_authorization() {
        let client = LicensedClient::new("bsc_0123456789abcdef", "gold")
            .expect("client")
            .with_endpoint(UNREACHABLE)
            .expect("endpoint");
        let err = client.api_call(&json!({})).expect_err("auth");
        assert_eq!(err.kind(), ErrorKind::Authorization);
    }

    #[test]
    fn unserializable_payload_fails_before_network() {
        let client = LicensedClient::free()
            .expect("client")
            .with_endpoint(UNREACHABLE)
            .expect("endpoint");
        let err = client.api_call(&Unserializable).expect_err("encode");
        assert_eq!(err.kind(), ErrorKind::Serialization);
    }

    #[test]
    fn debug_output_redacts_key() {
        let client = LicensedClient::new("ent_0123456789abcdef", "enterprise").expect("client");
        let rendered = format!("{client:?}");
        assert!(rendered.contains("enterprise"));
        assert!(!rendered.contains("ent_0123456789abcdef"));
    }

    #[test]
    fn tls_ca_file_must_exist() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = LicensedClient::free()
            .expect("client")
            .with_tls_ca_file(dir.path().join("missing.pem"))
            .expect_err("missing");
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn tls_ca_file_without_certificates_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().expect("file");
        file.write_all(b"not a certificate\n").expect("write");
        let err = LicensedClient::free()
            .expect("client")
            .with_tls_ca_file(file.path())
            .expect_err("empty");
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(err.message().unwrap_or_default().contains("no certificates"));
    }
}
