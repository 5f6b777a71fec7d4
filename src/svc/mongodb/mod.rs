//! # MongoDB module
//!
//! This module provides the reconciliation logic of managed MongoDB
//! instances, a domain service wrapping the raw api and the lifecycle
//! handlers themselves.

use std::time::Duration;

use crate::svc::{aliyun::client, poll};

pub mod instance;
pub mod service;

// -----------------------------------------------------------------------------
// Constants

pub const ENGINE: &str = "MongoDB";
pub const ROOT_ACCOUNT: &str = "root";
pub const MULTI_ZONE_MARKER: &str = "MAZ";

/// Statuses the reconciler cares about, the remote api exposes more
pub mod status {
    pub const CREATING: &str = "Creating";
    pub const RUNNING: &str = "Running";
    pub const DELETING: &str = "Deleting";
    pub const CLASS_CHANGING: &str = "DBInstanceClassChanging";
    pub const NET_TYPE_CHANGING: &str = "DBInstanceNetTypeChanging";
}

// -----------------------------------------------------------------------------
// Error enumeration

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("failed to validate the desired configuration, {0}")]
    Validation(String),
    #[error("failed to execute action '{0}', {1}")]
    Action(&'static str, client::Error),
    #[error("failed to decrypt the account password, {0}")]
    Decrypt(client::Error),
    #[error("failed to serialize the kms encryption context, {0}")]
    EncryptionContext(serde_json::Error),
    #[error("failed to resolve the vswitch '{0}', {1}")]
    Lookup(String, client::Error),
    #[error("failed to resolve the vswitch '{0}', it could not be found")]
    VSwitchNotFound(String),
    #[error("failed to validate network placement, the vswitch zone '{0}' does not match the declared zone '{1}'")]
    ZoneMismatch(String, String),
    #[error("failed to validate network placement, the vswitch zone '{0}' does not belong to the multi zone group '{1}'")]
    ZoneNotInGroup(String, String),
    #[error("failed to wait for the instance to reach the expected status, {0}")]
    Wait(poll::Error<client::Error>),
    #[error("failed to delete the instance '{0}', still refused after {1:?}, {2}")]
    DeleteTimeout(String, Duration, client::Error),
    #[error("failed to import the instance '{0}', it could not be found")]
    ImportNotFound(String),
    #[error("failed to update the instance, the descriptor does not carry an identifier")]
    MissingIdentity,
}

impl From<poll::Error<client::Error>> for Error {
    fn from(err: poll::Error<client::Error>) -> Self {
        Self::Wait(err)
    }
}
