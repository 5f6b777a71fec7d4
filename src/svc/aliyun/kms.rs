//! # Key management service module
//!
//! This module provides typed payloads and the api trait for the `kms`
//! product, used to decrypt credentials supplied as ciphertext.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::svc::aliyun::client::{Client, Error, Product};

// -----------------------------------------------------------------------------
// Actions

pub mod action {
    pub const DECRYPT: &str = "Decrypt";
}

// -----------------------------------------------------------------------------
// Decrypt payloads

#[derive(Serialize, PartialEq, Eq, Clone, Debug)]
pub struct DecryptRequest {
    #[serde(rename = "CiphertextBlob")]
    pub ciphertext_blob: String,
    /// Encryption context, serialized as a json object
    #[serde(rename = "EncryptionContext", skip_serializing_if = "Option::is_none")]
    pub encryption_context: Option<String>,
}

#[derive(Deserialize, PartialEq, Eq, Clone, Debug, Default)]
pub struct DecryptResponse {
    #[serde(rename = "Plaintext", default)]
    pub plaintext: String,
}

// -----------------------------------------------------------------------------
// KmsApi trait

#[async_trait]
pub trait KmsApi {
    async fn decrypt(&self, request: &DecryptRequest) -> Result<DecryptResponse, Error>;
}

#[async_trait]
impl KmsApi for Client {
    async fn decrypt(&self, request: &DecryptRequest) -> Result<DecryptResponse, Error> {
        self.invoke(Product::Kms, action::DECRYPT, request).await
    }
}
