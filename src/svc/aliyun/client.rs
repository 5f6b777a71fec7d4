//! # Client module
//!
//! This module provides the signed http client used by every product module.
//! Requests are authenticated with the ACS3-HMAC-SHA256 scheme: parameters
//! are flattened into a canonically sorted query string, headers carry the
//! action, version, nonce and timestamp, and the whole request is signed with
//! the account secret.

use std::{collections::BTreeMap, sync::Arc};

use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::StatusCode;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;
use uuid::Uuid;

use crate::svc::cfg::Configuration;

pub type HmacSha256 = Hmac<Sha256>;

// -----------------------------------------------------------------------------
// Constants

pub const ALGORITHM: &str = "ACS3-HMAC-SHA256";
pub const DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

pub const HEADER_HOST: &str = "host";
pub const HEADER_ACTION: &str = "x-acs-action";
pub const HEADER_CONTENT_SHA256: &str = "x-acs-content-sha256";
pub const HEADER_DATE: &str = "x-acs-date";
pub const HEADER_NONCE: &str = "x-acs-signature-nonce";
pub const HEADER_VERSION: &str = "x-acs-version";

pub const NOT_FOUND_SUFFIX: &str = ".NotFound";

// -----------------------------------------------------------------------------
// Product enumeration

#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum Product {
    Dds,
    Kms,
    Vpc,
}

impl Product {
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Dds => "mongodb",
            Self::Kms => "kms",
            Self::Vpc => "vpc",
        }
    }

    pub const fn version(&self) -> &'static str {
        match self {
            Self::Dds => "2015-12-01",
            Self::Kms => "2016-01-20",
            Self::Vpc => "2016-04-28",
        }
    }

    pub fn endpoint(&self, region: &str, domain: &str) -> String {
        format!("{}.{}.{}", self.code(), region, domain)
    }
}

// -----------------------------------------------------------------------------
// ResponseError structure

/// Error envelope returned by the openapi gateway
#[derive(Deserialize, PartialEq, Eq, Clone, Debug, Default)]
#[serde(rename_all = "PascalCase")]
pub struct ResponseError {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub request_id: String,
}

impl std::fmt::Display for ResponseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "code: '{}', message: '{}', request id: '{}'",
            self.code, self.message, self.request_id
        )
    }
}

// -----------------------------------------------------------------------------
// Error enumerations

#[derive(thiserror::Error, Debug)]
pub enum SignerError {
    #[error("failed to build signing key, {0}")]
    SigningKey(hmac::digest::InvalidLength),
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("failed to serialize request parameters, {0}")]
    Serialize(serde_json::Error),
    #[error("failed to sign request, {0}")]
    Sign(SignerError),
    #[error("failed to execute request, {0}")]
    Request(reqwest::Error),
    #[error("failed to deserialize response payload, {0}")]
    Deserialize(reqwest::Error),
    #[error("failed to execute request, got status code '{0}', {1}")]
    Response(StatusCode, ResponseError),
}

impl Error {
    /// Tell whether the remote api reported that the resource does not exist
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Response(status, err) => {
                StatusCode::NOT_FOUND.eq(status) || err.code.ends_with(NOT_FOUND_SUFFIX)
            }
            _ => false,
        }
    }
}

// -----------------------------------------------------------------------------
// Credentials structure

#[derive(PartialEq, Eq, Clone, Debug, Default)]
pub struct Credentials {
    pub access_key_id: String,
    pub access_key_secret: String,
}

impl From<&Configuration> for Credentials {
    fn from(config: &Configuration) -> Self {
        Self {
            access_key_id: config.api.access_key_id.to_owned(),
            access_key_secret: config.api.access_key_secret.to_owned(),
        }
    }
}

// -----------------------------------------------------------------------------
// Signer structure

pub struct Signer {
    pub nonce: String,
    pub timestamp: String,
    pub credentials: Credentials,
}

impl Signer {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            nonce: Uuid::new_v4().to_string(),
            timestamp: Utc::now().format(DATE_FORMAT).to_string(),
            credentials,
        }
    }

    /// Build the canonically sorted and percent-encoded query string
    pub fn canonical_query(params: &BTreeMap<String, String>) -> String {
        params
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&")
    }

    /// Build the set of signed headers for the given invocation
    pub fn headers(
        &self,
        action: &str,
        version: &str,
        host: &str,
        payload_hash: &str,
    ) -> BTreeMap<String, String> {
        BTreeMap::from([
            (HEADER_HOST.to_string(), host.to_string()),
            (HEADER_ACTION.to_string(), action.to_string()),
            (HEADER_CONTENT_SHA256.to_string(), payload_hash.to_string()),
            (HEADER_DATE.to_string(), self.timestamp.to_owned()),
            (HEADER_NONCE.to_string(), self.nonce.to_owned()),
            (HEADER_VERSION.to_string(), version.to_string()),
        ])
    }

    /// Compute the authorization header value over the canonical request
    pub fn authorization(
        &self,
        method: &str,
        query: &str,
        headers: &BTreeMap<String, String>,
    ) -> Result<String, SignerError> {
        let signed_headers = headers.keys().cloned().collect::<Vec<_>>().join(";");
        let canonical_headers = headers
            .iter()
            .map(|(k, v)| format!("{k}:{v}\n"))
            .collect::<String>();

        let payload_hash = headers
            .get(HEADER_CONTENT_SHA256)
            .map(String::as_str)
            .unwrap_or_default();

        let canonical_request =
            format!("{method}\n/\n{query}\n{canonical_headers}\n{signed_headers}\n{payload_hash}");

        let string_to_sign = format!(
            "{ALGORITHM}\n{}",
            hex(&Sha256::digest(canonical_request.as_bytes()))
        );

        let mut mac = HmacSha256::new_from_slice(self.credentials.access_key_secret.as_bytes())
            .map_err(SignerError::SigningKey)?;

        mac.update(string_to_sign.as_bytes());

        let signature = hex(&mac.finalize().into_bytes());

        Ok(format!(
            "{ALGORITHM} Credential={},SignedHeaders={signed_headers},Signature={signature}",
            self.credentials.access_key_id
        ))
    }
}

// -----------------------------------------------------------------------------
// Client structure

#[derive(Clone, Debug)]
pub struct Client {
    inner: reqwest::Client,
    credentials: Credentials,
    region: String,
    domain: String,
}

impl From<&Configuration> for Client {
    fn from(config: &Configuration) -> Self {
        Self {
            inner: reqwest::Client::new(),
            credentials: Credentials::from(config),
            region: config.api.region.to_owned(),
            domain: config.api.domain.to_owned(),
        }
    }
}

impl From<Arc<Configuration>> for Client {
    fn from(config: Arc<Configuration>) -> Self {
        Self::from(config.as_ref())
    }
}

impl Client {
    /// Execute the given action against the product's regional endpoint and
    /// deserialize the response payload
    #[cfg_attr(feature = "trace", tracing::instrument(skip_all, fields(action = action)))]
    pub async fn invoke<T, U>(&self, product: Product, action: &str, payload: &T) -> Result<U, Error>
    where
        T: Serialize + ?Sized,
        U: DeserializeOwned,
    {
        let params = params_from(payload)?;
        let query = Signer::canonical_query(&params);
        let host = product.endpoint(&self.region, &self.domain);
        let payload_hash = hex(&Sha256::digest(b""));

        let signer = Signer::new(self.credentials.to_owned());
        let headers = signer.headers(action, product.version(), &host, &payload_hash);
        let authorization = signer
            .authorization("POST", &query, &headers)
            .map_err(Error::Sign)?;

        let url = if query.is_empty() {
            format!("https://{host}/")
        } else {
            format!("https://{host}/?{query}")
        };

        debug!(endpoint = host.as_str(), action = action, "Execute request");

        let mut builder = self.inner.post(url);
        for (name, value) in &headers {
            // reqwest fills the host header from the url
            if HEADER_HOST == name {
                continue;
            }

            builder = builder.header(name, value);
        }

        let response = builder
            .header("Authorization", authorization)
            .send()
            .await
            .map_err(Error::Request)?;

        let status = response.status();
        if !status.is_success() {
            let buf = response.text().await.map_err(Error::Request)?;
            let err = serde_json::from_str(&buf).unwrap_or_else(|_| ResponseError {
                message: buf.trim().to_string(),
                ..Default::default()
            });

            return Err(Error::Response(status, err));
        }

        response.json().await.map_err(Error::Deserialize)
    }
}

// -----------------------------------------------------------------------------
// helpers

/// Flatten the payload into plain string parameters, skipping unset ones
pub fn params_from<T>(payload: &T) -> Result<BTreeMap<String, String>, Error>
where
    T: Serialize + ?Sized,
{
    let mut params = BTreeMap::new();
    if let serde_json::Value::Object(map) = serde_json::to_value(payload).map_err(Error::Serialize)? {
        for (key, value) in map {
            match value {
                serde_json::Value::Null => continue,
                serde_json::Value::String(s) => {
                    params.insert(key, s);
                }
                other => {
                    params.insert(key, other.to_string());
                }
            }
        }
    }

    Ok(params)
}

fn hex(input: &[u8]) -> String {
    input.iter().map(|b| format!("{b:02x}")).collect()
}

// -----------------------------------------------------------------------------
// unit tests

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use reqwest::StatusCode;
    use serde::Serialize;
    use sha2::{Digest, Sha256};

    use super::{hex, params_from, Credentials, Error, Product, ResponseError, Signer, ALGORITHM};

    #[test]
    fn bytes_are_rendered_as_lowercase_hex() {
        assert_eq!("dead", hex(&[0xde, 0xad]));
        assert_eq!("00ff", hex(&[0x00, 0xff]));
    }

    #[test]
    fn products_build_regional_endpoints() {
        assert_eq!(
            "mongodb.cn-hangzhou.aliyuncs.com",
            Product::Dds.endpoint("cn-hangzhou", "aliyuncs.com")
        );
        assert_eq!(
            "kms.eu-west-1.aliyuncs.com",
            Product::Kms.endpoint("eu-west-1", "aliyuncs.com")
        );
    }

    #[test]
    fn canonical_query_sorts_and_encodes_parameters() {
        let params = BTreeMap::from([
            ("RegionId".to_string(), "cn-hangzhou".to_string()),
            ("DBInstanceDescription".to_string(), "a name +&".to_string()),
        ]);

        assert_eq!(
            "DBInstanceDescription=a%20name%20%2B%26&RegionId=cn-hangzhou",
            Signer::canonical_query(&params)
        );
    }

    #[test]
    fn params_skip_unset_values_and_stringify_numbers() {
        #[derive(Serialize)]
        struct Payload {
            #[serde(rename = "DBInstanceId")]
            id: String,
            #[serde(rename = "DBInstanceStorage")]
            storage: i64,
            #[serde(rename = "ZoneId", skip_serializing_if = "Option::is_none")]
            zone_id: Option<String>,
        }

        let params = params_from(&Payload {
            id: "dds-deadbeef".to_string(),
            storage: 10,
            zone_id: None,
        })
        .expect("payload flattens into parameters");

        assert_eq!(2, params.len());
        assert_eq!(Some(&"dds-deadbeef".to_string()), params.get("DBInstanceId"));
        assert_eq!(Some(&"10".to_string()), params.get("DBInstanceStorage"));
    }

    #[test]
    fn authorization_carries_credential_and_signature() {
        let signer = Signer {
            nonce: "3156853b-f6b3-4527-b8b9-1e6b32a4e279".to_string(),
            timestamp: "2023-10-26T10:22:32Z".to_string(),
            credentials: Credentials {
                access_key_id: "testid".to_string(),
                access_key_secret: "testsecret".to_string(),
            },
        };

        let headers = signer.headers(
            "DescribeDBInstanceAttribute",
            "2015-12-01",
            "mongodb.cn-hangzhou.aliyuncs.com",
            &hex(&Sha256::digest(b"")),
        );

        let authorization = signer
            .authorization("POST", "DBInstanceId=dds-deadbeef", &headers)
            .expect("request is signed");

        assert!(authorization.starts_with(&format!("{ALGORITHM} Credential=testid,SignedHeaders=")));
        assert!(authorization.contains(
            "host;x-acs-action;x-acs-content-sha256;x-acs-date;x-acs-signature-nonce;x-acs-version"
        ));

        let signature = authorization
            .rsplit_once("Signature=")
            .map(|(_, sig)| sig)
            .expect("signature is present");

        assert_eq!(64, signature.len());
        assert!(signature.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn signature_depends_on_the_secret() {
        let params = BTreeMap::from([("DBInstanceId".to_string(), "dds-deadbeef".to_string())]);
        let query = Signer::canonical_query(&params);

        let mut signer = Signer {
            nonce: "nonce".to_string(),
            timestamp: "2023-10-26T10:22:32Z".to_string(),
            credentials: Credentials {
                access_key_id: "testid".to_string(),
                access_key_secret: "first".to_string(),
            },
        };

        let headers = signer.headers("Decrypt", "2016-01-20", "kms.cn-hangzhou.aliyuncs.com", "");
        let first = signer
            .authorization("POST", &query, &headers)
            .expect("request is signed");

        signer.credentials.access_key_secret = "second".to_string();
        let second = signer
            .authorization("POST", &query, &headers)
            .expect("request is signed");

        assert_ne!(first, second);
    }

    #[test]
    fn not_found_is_told_apart_from_other_failures() {
        let not_found = Error::Response(
            StatusCode::NOT_FOUND,
            ResponseError {
                code: "InvalidDBInstanceId.NotFound".to_string(),
                message: "The specified instance does not exist".to_string(),
                request_id: "42".to_string(),
            },
        );

        let code_only = Error::Response(
            StatusCode::BAD_REQUEST,
            ResponseError {
                code: "InvalidDBInstanceId.NotFound".to_string(),
                ..Default::default()
            },
        );

        let throttled = Error::Response(
            StatusCode::BAD_REQUEST,
            ResponseError {
                code: "Throttling.User".to_string(),
                ..Default::default()
            },
        );

        assert!(not_found.is_not_found());
        assert!(code_only.is_not_found());
        assert!(!throttled.is_not_found());
    }
}
