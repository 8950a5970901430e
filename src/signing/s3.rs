//! S3 presigned URLs (AWS Signature Version 4, query-string authentication)
//!
//! Signing is done locally from the configured credentials; no request is made
//! to S3. Works with AWS S3 and S3-compatible stores through a custom endpoint.

use crate::catalog::Locator;
use crate::signing::{DelegatedLink, LinkSigner, SigningError};
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use std::fmt;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

/// Longest lifetime SigV4 accepts for a presigned URL
pub const MAX_PRESIGN_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

const ALGORITHM: &str = "AWS4-HMAC-SHA256";
const SERVICE: &str = "s3";
const UNSIGNED_PAYLOAD: &str = "UNSIGNED-PAYLOAD";
const NONCE_PARAM: &str = "x-lockbox-nonce";

/// Bucket location and credentials
#[derive(Clone)]
pub struct S3Config {
    pub bucket: String,
    pub region: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
    /// Custom endpoint, e.g. `https://minio.local:9000`. Defaults to AWS virtual-hosted style.
    pub endpoint: Option<String>,
    /// Address the bucket as the first path segment instead of a subdomain
    pub path_style: bool,
}

impl fmt::Debug for S3Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("S3Config")
            .field("bucket", &self.bucket)
            .field("region", &self.region)
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"[REDACTED]")
            .field("session_token", &self.session_token.as_ref().map(|_| "[REDACTED]"))
            .field("endpoint", &self.endpoint)
            .field("path_style", &self.path_style)
            .finish()
    }
}

/// Presigns GET requests for objects in one bucket
#[derive(Debug, Clone)]
pub struct S3Presigner {
    config: S3Config,
    scheme: String,
    host: String,
    /// Path prefix before the object key: empty, or `/bucket` for path-style
    base_path: String,
}

impl S3Presigner {
    pub fn new(config: S3Config) -> Result<Self, SigningError> {
        for (field, value) in [
            ("bucket", &config.bucket),
            ("region", &config.region),
            ("access key id", &config.access_key_id),
            ("secret access key", &config.secret_access_key),
        ] {
            if value.trim().is_empty() {
                return Err(SigningError::Configuration(format!("{} is required", field)));
            }
        }

        let (scheme, host) = match &config.endpoint {
            Some(endpoint) => parse_endpoint(endpoint)?,
            None => (
                "https".to_string(),
                format!("{}.s3.{}.amazonaws.com", config.bucket, config.region),
            ),
        };

        let base_path = if config.path_style {
            format!("/{}", encode_segment(&config.bucket))
        } else {
            String::new()
        };

        Ok(Self {
            config,
            scheme,
            host,
            base_path,
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Build a presigned URL for `key` as of `now`.
    ///
    /// `nonce` is folded into the signed query so that two links minted within
    /// the same second still differ.
    pub(crate) fn presign_at(
        &self,
        key: &str,
        ttl: Duration,
        now: DateTime<Utc>,
        nonce: Option<&str>,
    ) -> Result<DelegatedLink, SigningError> {
        if ttl.is_zero() || ttl > MAX_PRESIGN_TTL {
            return Err(SigningError::InvalidTtl(ttl));
        }

        let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
        let date = now.format("%Y%m%d").to_string();
        let scope = format!("{}/{}/{}/aws4_request", date, self.config.region, SERVICE);
        let credential = format!("{}/{}", self.config.access_key_id, scope);

        let canonical_uri = format!("{}/{}", self.base_path, encode_key(key));

        let mut params: Vec<(String, String)> = vec![
            ("X-Amz-Algorithm".into(), ALGORITHM.into()),
            ("X-Amz-Credential".into(), credential),
            ("X-Amz-Date".into(), amz_date.clone()),
            ("X-Amz-Expires".into(), ttl.as_secs().to_string()),
            ("X-Amz-SignedHeaders".into(), "host".into()),
        ];
        if let Some(token) = &self.config.session_token {
            params.push(("X-Amz-Security-Token".into(), token.clone()));
        }
        if let Some(nonce) = nonce {
            params.push((NONCE_PARAM.into(), nonce.to_string()));
        }

        let mut encoded: Vec<(String, String)> = params
            .iter()
            .map(|(k, v)| (uri_encode(k), uri_encode(v)))
            .collect();
        encoded.sort();
        let canonical_query = encoded
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&");

        let canonical_request = format!(
            "GET\n{}\n{}\nhost:{}\n\nhost\n{}",
            canonical_uri, canonical_query, self.host, UNSIGNED_PAYLOAD
        );

        let string_to_sign = format!(
            "{}\n{}\n{}\n{}",
            ALGORITHM,
            amz_date,
            scope,
            hex::encode(Sha256::digest(canonical_request.as_bytes()))
        );

        let signing_key = self.signing_key(&date);
        let signature = hex::encode(hmac_sha256(&signing_key, string_to_sign.as_bytes()));

        let url = format!(
            "{}://{}{}?{}&X-Amz-Signature={}",
            self.scheme, self.host, canonical_uri, canonical_query, signature
        );

        let expires_at = now
            + ChronoDuration::from_std(ttl).map_err(|_| SigningError::InvalidTtl(ttl))?;

        Ok(DelegatedLink {
            url,
            issued_at: now,
            expires_at,
        })
    }

    fn signing_key(&self, date: &str) -> Vec<u8> {
        let secret = format!("AWS4{}", self.config.secret_access_key);
        let k_date = hmac_sha256(secret.as_bytes(), date.as_bytes());
        let k_region = hmac_sha256(&k_date, self.config.region.as_bytes());
        let k_service = hmac_sha256(&k_region, SERVICE.as_bytes());
        hmac_sha256(&k_service, b"aws4_request")
    }
}

#[async_trait]
impl LinkSigner for S3Presigner {
    async fn sign(&self, locator: &Locator, ttl: Duration) -> Result<DelegatedLink, SigningError> {
        let nonce = Uuid::new_v4().simple().to_string();
        let link = self.presign_at(locator.as_str(), ttl, Utc::now(), Some(&nonce))?;
        debug!(
            bucket = %self.config.bucket,
            key = %locator,
            expires_at = %link.expires_at,
            "Presigned URL generated"
        );
        Ok(link)
    }
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC can take key of any size");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

/// SigV4 URI encoding: everything except unreserved characters is percent-encoded
fn uri_encode(s: &str) -> String {
    urlencoding::encode(s).into_owned()
}

fn encode_segment(s: &str) -> String {
    uri_encode(s)
}

/// Encode an object key, keeping `/` as the path delimiter
fn encode_key(key: &str) -> String {
    key.trim_start_matches('/')
        .split('/')
        .map(encode_segment)
        .collect::<Vec<_>>()
        .join("/")
}

fn parse_endpoint(endpoint: &str) -> Result<(String, String), SigningError> {
    let (scheme, rest) = endpoint
        .split_once("://")
        .ok_or_else(|| {
            SigningError::Configuration(format!("endpoint needs a scheme: {}", endpoint))
        })?;

    if scheme != "https" && scheme != "http" {
        return Err(SigningError::Configuration(format!(
            "unsupported endpoint scheme: {}",
            scheme
        )));
    }

    let host = rest.split('/').next().unwrap_or_default();
    if host.is_empty() {
        return Err(SigningError::Configuration(format!(
            "endpoint has no host: {}",
            endpoint
        )));
    }

    Ok((scheme.to_string(), host.to_string()))
}
