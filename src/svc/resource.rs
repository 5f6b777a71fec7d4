//! # Resource module
//!
//! This module provides the descriptor of a managed MongoDB instance. The
//! descriptor carries the desired configuration, the identifier returned at
//! creation time and a snapshot of the last state observed on the remote api.
//! It is serialized as a json document owned by the calling orchestrator and
//! handed back on each invocation.

use std::{
    collections::{BTreeMap, BTreeSet},
    fmt::{self, Display, Formatter},
    path::Path,
};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

// -----------------------------------------------------------------------------
// Constants

pub const LOCAL_HOST_IP: &str = "127.0.0.1";
pub const DEFAULT_TIMEOUT: u64 = 1_800;

// -----------------------------------------------------------------------------
// Error enumeration

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("failed to read descriptor '{0}', {1}")]
    Read(String, std::io::Error),
    #[error("failed to deserialize descriptor '{0}', {1}")]
    Deserialize(String, serde_json::Error),
    #[error("failed to serialize descriptor, {0}")]
    Serialize(serde_json::Error),
    #[error("failed to write descriptor '{0}', {1}")]
    Write(String, std::io::Error),
}

// -----------------------------------------------------------------------------
// InstanceConfig structure

/// Desired configuration of a managed MongoDB instance.
///
/// The same structure doubles as the snapshot of the last synchronized state,
/// which allows field to field comparisons between what the user declared and
/// what the remote api reported.
#[derive(Serialize, Deserialize, JsonSchema, PartialEq, Clone, Debug, Default)]
pub struct InstanceConfig {
    pub engine_version: String,
    pub instance_class: String,
    /// Allocated storage in gigabytes
    pub storage: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replication_factor: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_engine: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub charge_type: Option<String>,
    /// Prepaid billing duration in months
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub period: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vswitch_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub security_ips: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kms_encrypted_password: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub kms_encryption_context: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup_time: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub backup_period: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maintain_start_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maintain_end_time: Option<String>,
}

// -----------------------------------------------------------------------------
// Timeouts structure

/// Per operation timeouts, in seconds
#[derive(Serialize, Deserialize, JsonSchema, PartialEq, Eq, Clone, Copy, Debug)]
pub struct Timeouts {
    #[serde(default = "default_timeout")]
    pub create: u64,
    #[serde(default = "default_timeout")]
    pub update: u64,
    #[serde(default = "default_timeout")]
    pub delete: u64,
}

const fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            create: DEFAULT_TIMEOUT,
            update: DEFAULT_TIMEOUT,
            delete: DEFAULT_TIMEOUT,
        }
    }
}

// -----------------------------------------------------------------------------
// Field enumeration

/// Fields watched by the update handler
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum Field {
    BackupTime,
    BackupPeriod,
    MaintainStartTime,
    MaintainEndTime,
    Name,
    SecurityIps,
    AccountPassword,
    KmsEncryptedPassword,
    InstanceClass,
    Storage,
    ReplicationFactor,
}

impl Display for Field {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::BackupTime => "backup_time",
            Self::BackupPeriod => "backup_period",
            Self::MaintainStartTime => "maintain_start_time",
            Self::MaintainEndTime => "maintain_end_time",
            Self::Name => "name",
            Self::SecurityIps => "security_ips",
            Self::AccountPassword => "account_password",
            Self::KmsEncryptedPassword => "kms_encrypted_password",
            Self::InstanceClass => "instance_class",
            Self::Storage => "storage",
            Self::ReplicationFactor => "replication_factor",
        };

        write!(f, "{name}")
    }
}

// -----------------------------------------------------------------------------
// Descriptor structure

#[derive(Serialize, Deserialize, JsonSchema, Clone, Debug, Default)]
pub struct Descriptor {
    /// Identifier assigned by the remote api at creation time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Desired configuration declared by the user
    pub config: InstanceConfig,
    /// Last state synchronized from the remote api
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<InstanceConfig>,
    /// Backup retention computed by the remote api, in days
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retention_period: Option<i64>,
    #[serde(default)]
    pub timeouts: Timeouts,
    #[serde(skip)]
    pub(crate) new_resource: bool,
}

impl Descriptor {
    /// Tell whether the desired value of the given field diverges from the
    /// last synchronized state. An unset desired value never triggers a
    /// change, the remote api keeps or computes those fields on its own.
    pub fn has_changed(&self, field: Field) -> bool {
        let state = self.state.as_ref();

        match field {
            Field::BackupTime => changed_option(
                &self.config.backup_time,
                state.and_then(|state| state.backup_time.as_ref()),
            ),
            Field::BackupPeriod => changed_collection(
                &self.config.backup_period,
                state.map(|state| state.backup_period.as_slice()),
            ),
            Field::MaintainStartTime => changed_option(
                &self.config.maintain_start_time,
                state.and_then(|state| state.maintain_start_time.as_ref()),
            ),
            Field::MaintainEndTime => changed_option(
                &self.config.maintain_end_time,
                state.and_then(|state| state.maintain_end_time.as_ref()),
            ),
            Field::Name => changed_option(
                &self.config.name,
                state.and_then(|state| state.name.as_ref()),
            ),
            // an emptied allow list falls back to the loopback-only default,
            // so it still counts as a change when the remote state differs
            Field::SecurityIps => match state {
                None => !self.config.security_ips.is_empty(),
                Some(synced) => {
                    let desired = if self.config.security_ips.is_empty() {
                        BTreeSet::from([LOCAL_HOST_IP])
                    } else {
                        self.config.security_ips.iter().map(String::as_str).collect()
                    };

                    let synced = synced
                        .security_ips
                        .iter()
                        .map(String::as_str)
                        .collect::<BTreeSet<_>>();

                    desired != synced
                }
            },
            Field::AccountPassword => changed_option(
                &self.config.account_password,
                state.and_then(|state| state.account_password.as_ref()),
            ),
            Field::KmsEncryptedPassword => changed_option(
                &self.config.kms_encrypted_password,
                state.and_then(|state| state.kms_encrypted_password.as_ref()),
            ),
            Field::InstanceClass => {
                state.map_or(true, |state| state.instance_class != self.config.instance_class)
            }
            Field::Storage => state.map_or(true, |state| state.storage != self.config.storage),
            Field::ReplicationFactor => changed_option(
                &self.config.replication_factor,
                state.and_then(|state| state.replication_factor.as_ref()),
            ),
        }
    }

    /// Copy the desired value of the given fields into the synchronized
    /// state. Called once the related api call succeeded, so an aborted
    /// update does not replay the groups that already went through.
    pub fn commit(&mut self, fields: &[Field]) {
        let state = self.state.get_or_insert_with(InstanceConfig::default);

        for field in fields {
            match field {
                Field::BackupTime => state.backup_time = self.config.backup_time.clone(),
                Field::BackupPeriod => state.backup_period = self.config.backup_period.clone(),
                Field::MaintainStartTime => {
                    state.maintain_start_time = self.config.maintain_start_time.clone();
                }
                Field::MaintainEndTime => {
                    state.maintain_end_time = self.config.maintain_end_time.clone();
                }
                Field::Name => state.name = self.config.name.clone(),
                Field::SecurityIps => state.security_ips = self.config.security_ips.clone(),
                Field::AccountPassword => {
                    state.account_password = self.config.account_password.clone();
                }
                Field::KmsEncryptedPassword => {
                    state.kms_encrypted_password = self.config.kms_encrypted_password.clone();
                }
                Field::InstanceClass => state.instance_class = self.config.instance_class.clone(),
                Field::Storage => state.storage = self.config.storage,
                Field::ReplicationFactor => {
                    state.replication_factor = self.config.replication_factor;
                }
            }
        }
    }

    /// Record the identifier assigned by the remote api.
    ///
    /// The synchronized state is seeded with every field the create call
    /// conveyed. Backup and maintenance windows are only settable once the
    /// instance exists, they are left out so the first update pass applies
    /// them.
    pub fn record_create(&mut self, id: String) {
        let mut state = self.config.clone();
        state.backup_time = None;
        state.backup_period = Vec::new();
        state.maintain_start_time = None;
        state.maintain_end_time = None;

        self.id = Some(id);
        self.state = Some(state);
        self.new_resource = true;
    }

    /// Replace the synchronized state with the observed one.
    ///
    /// Fields the remote api never reports, the account credential and the
    /// billing period, keep their last committed values.
    pub fn sync(&mut self, mut observed: InstanceConfig, retention_period: Option<i64>) {
        if let Some(previous) = &self.state {
            observed.account_password = previous.account_password.clone();
            observed.kms_encrypted_password = previous.kms_encrypted_password.clone();
            observed.kms_encryption_context = previous.kms_encryption_context.clone();
            observed.period = previous.period;
            if observed.replication_factor.is_none() {
                observed.replication_factor = previous.replication_factor;
            }
        }

        self.state = Some(observed);
        if retention_period.is_some() {
            self.retention_period = retention_period;
        }
    }

    /// Forget the remote instance, it does not exist anymore
    pub fn clear_identity(&mut self) {
        self.id = None;
        self.state = None;
        self.retention_period = None;
        self.new_resource = false;
    }

    pub fn is_new_resource(&self) -> bool {
        self.new_resource
    }

    pub fn clear_new_resource(&mut self) {
        self.new_resource = false;
    }
}

// -----------------------------------------------------------------------------
// file round-trip

impl Descriptor {
    pub async fn read_from(path: &Path) -> Result<Self, Error> {
        let buf = tokio::fs::read(path)
            .await
            .map_err(|err| Error::Read(path.display().to_string(), err))?;

        serde_json::from_slice(&buf)
            .map_err(|err| Error::Deserialize(path.display().to_string(), err))
    }

    pub async fn write_to(&self, path: &Path) -> Result<(), Error> {
        let mut buf = serde_json::to_vec_pretty(self).map_err(Error::Serialize)?;
        buf.push(b'\n');

        tokio::fs::write(path, buf)
            .await
            .map_err(|err| Error::Write(path.display().to_string(), err))
    }
}

// -----------------------------------------------------------------------------
// helpers

fn changed_option<T: PartialEq>(desired: &Option<T>, synced: Option<&T>) -> bool {
    match desired {
        None => false,
        Some(value) => synced != Some(value),
    }
}

fn changed_collection(desired: &[String], synced: Option<&[String]>) -> bool {
    if desired.is_empty() {
        return false;
    }

    match synced {
        None => true,
        Some(values) => {
            desired.iter().collect::<BTreeSet<_>>() != values.iter().collect::<BTreeSet<_>>()
        }
    }
}

// -----------------------------------------------------------------------------
// unit tests
