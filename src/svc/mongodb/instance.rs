//! # Instance module
//!
//! This module provides the lifecycle handlers of a managed MongoDB
//! instance. Each handler takes the descriptor, drives the remote api
//! towards the desired configuration and records what it achieved back into
//! the descriptor, so an aborted pass resumes where it stopped.

use std::time::Duration;

use chrono::{NaiveTime, Timelike};
use tokio::time::{sleep, Instant};
use tracing::{info, warn};
use uuid::Uuid;

use crate::svc::{
    aliyun::{
        dds::{action, CreateDbInstanceRequest, DdsApi},
        kms::{DecryptRequest, KmsApi},
        vpc::{DescribeVSwitchAttributesRequest, VpcApi},
    },
    poll,
    resource::{Descriptor, Field, InstanceConfig, LOCAL_HOST_IP},
};

use super::{service::MongoDbService, status, Error, ENGINE, MULTI_ZONE_MARKER};

// -----------------------------------------------------------------------------
// Constants

/// How long deletions are retried, the remote api refuses them while the
/// instance is locked by a pending operation
const DELETE_RETRY_TIMEOUT: Duration = Duration::from_secs(50 * 60);
const DELETE_RETRY_INTERVAL: Duration = Duration::from_secs(10);

const VPC_NETWORK: &str = "VPC";
const PRE_PAID: &str = "PrePaid";

const MIN_STORAGE: i64 = 10;
const MAX_STORAGE: i64 = 2_000;
const REPLICATION_FACTORS: [i64; 3] = [3, 5, 7];
const STORAGE_ENGINES: [&str; 2] = ["WiredTiger", "RocksDB"];
const CHARGE_TYPES: [&str; 2] = [PRE_PAID, "PostPaid"];
const WEEKDAYS: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

// -----------------------------------------------------------------------------
// validation

/// Check the desired configuration against the constraints the remote api
/// enforces, so a doomed request is refused before any call is issued
pub fn validate(config: &InstanceConfig) -> Result<(), Error> {
    if config.engine_version.is_empty() {
        return Err(Error::Validation(
            "the engine version must be provided".to_string(),
        ));
    }

    if config.instance_class.is_empty() {
        return Err(Error::Validation(
            "the instance class must be provided".to_string(),
        ));
    }

    if !(MIN_STORAGE..=MAX_STORAGE).contains(&config.storage) {
        return Err(Error::Validation(format!(
            "the storage must be between {MIN_STORAGE} and {MAX_STORAGE} gigabytes, got '{}'",
            config.storage
        )));
    }

    if let Some(factor) = config.replication_factor {
        if !REPLICATION_FACTORS.contains(&factor) {
            return Err(Error::Validation(format!(
                "the replication factor must be one of 3, 5 or 7, got '{factor}'"
            )));
        }
    }

    if let Some(engine) = &config.storage_engine {
        if !STORAGE_ENGINES.contains(&engine.as_str()) {
            return Err(Error::Validation(format!(
                "the storage engine must be either 'WiredTiger' or 'RocksDB', got '{engine}'"
            )));
        }
    }

    if let Some(charge_type) = &config.charge_type {
        if !CHARGE_TYPES.contains(&charge_type.as_str()) {
            return Err(Error::Validation(format!(
                "the charge type must be either 'PrePaid' or 'PostPaid', got '{charge_type}'"
            )));
        }
    }

    if let Some(period) = config.period {
        if !is_billing_period(period) {
            return Err(Error::Validation(format!(
                "the period must be between 1 and 9 months or one of 12, 24 or 36, got '{period}'"
            )));
        }
    }

    if let Some(name) = &config.name {
        let length = name.chars().count();
        if !(2..=256).contains(&length) {
            return Err(Error::Validation(format!(
                "the name must be between 2 and 256 characters long, got '{length}'"
            )));
        }

        if name.starts_with("http://") || name.starts_with("https://") {
            return Err(Error::Validation(
                "the name must not start with 'http://' or 'https://'".to_string(),
            ));
        }
    }

    if config.account_password.is_some() && config.kms_encrypted_password.is_some() {
        return Err(Error::Validation(
            "the account password and the kms encrypted password are mutually exclusive"
                .to_string(),
        ));
    }

    if let Some(window) = &config.backup_time {
        if !is_backup_window(window) {
            return Err(Error::Validation(format!(
                "the backup time must be a whole hour window such as '03:00Z-04:00Z', got '{window}'"
            )));
        }
    }

    for day in &config.backup_period {
        if !WEEKDAYS.contains(&day.as_str()) {
            return Err(Error::Validation(format!(
                "the backup period must contain week day names, got '{day}'"
            )));
        }
    }

    Ok(())
}

const fn is_billing_period(period: i64) -> bool {
    matches!(period, 1..=9 | 12 | 24 | 36)
}

/// Tell whether the given window is a one hour slot aligned on a whole hour.
/// The last slot of the day ends on the '24:00Z' bound, which is not a
/// parsable time, so the end is checked textually.
fn is_backup_window(window: &str) -> bool {
    let (start, end) = match window.split_once('-') {
        Some(parts) => parts,
        None => return false,
    };

    let start = match NaiveTime::parse_from_str(start, "%H:%MZ") {
        Ok(time) => time,
        Err(_) => return false,
    };

    start.minute() == 0 && end == format!("{:02}:00Z", start.hour() + 1)
}

/// Check that the vswitch zone belongs to the declared multi zone group.
///
/// Multi zone identifiers embed their member list, 'cn-hangzhou-MAZ5(b,c)'
/// covers the zones ending in 'b' and 'c', and the membership of a single
/// zone is carried by its trailing letter.
fn check_zone_membership(declared: &str, vswitch_zone: &str) -> Result<(), Error> {
    let members = declared
        .split_once('(')
        .and_then(|(_, rest)| rest.split_once(')'))
        .map(|(members, _)| members)
        .ok_or_else(|| {
            Error::Validation(format!(
                "the multi zone identifier '{declared}' does not carry a '(..)' member list"
            ))
        })?;

    match vswitch_zone.chars().last() {
        Some(letter) if members.contains(letter) => Ok(()),
        _ => Err(Error::ZoneNotInGroup(
            vswitch_zone.to_string(),
            declared.to_string(),
        )),
    }
}

/// Build an idempotency token bound to the given action
fn client_token(action: &str) -> String {
    let mut token = format!("{action}-{}", Uuid::new_v4().simple());
    token.truncate(64);
    token
}

// -----------------------------------------------------------------------------
// Reconciler structure

pub struct Reconciler<A, K, V> {
    service: MongoDbService<A>,
    kms: K,
    vpc: V,
    region: String,
    /// Cadence of the status polls
    pub poll_interval: Duration,
    /// Cadence of the delete retries
    pub retry_interval: Duration,
}

impl<A, K, V> Reconciler<A, K, V>
where
    A: DdsApi + Send + Sync,
    K: KmsApi + Send + Sync,
    V: VpcApi + Send + Sync,
{
    pub fn new(api: A, kms: K, vpc: V, region: &str) -> Self {
        Self {
            service: MongoDbService::new(api),
            kms,
            vpc,
            region: region.to_string(),
            poll_interval: poll::DEFAULT_INTERVAL,
            retry_interval: DELETE_RETRY_INTERVAL,
        }
    }

    /// Resolve the account credential, a clear text password wins over the
    /// kms ciphertext
    async fn resolve_password(&self, config: &InstanceConfig) -> Result<Option<String>, Error> {
        if let Some(password) = &config.account_password {
            return Ok(Some(password.to_string()));
        }

        let ciphertext = match &config.kms_encrypted_password {
            Some(ciphertext) => ciphertext,
            None => return Ok(None),
        };

        let encryption_context = if config.kms_encryption_context.is_empty() {
            None
        } else {
            Some(
                serde_json::to_string(&config.kms_encryption_context)
                    .map_err(Error::EncryptionContext)?,
            )
        };

        let request = DecryptRequest {
            ciphertext_blob: ciphertext.to_string(),
            encryption_context,
        };

        let response = self.kms.decrypt(&request).await.map_err(Error::Decrypt)?;

        Ok(Some(response.plaintext))
    }

    /// Assemble the creation request, resolving the credential and the
    /// network placement along the way
    async fn build_create_request(
        &self,
        descriptor: &Descriptor,
    ) -> Result<CreateDbInstanceRequest, Error> {
        let config = &descriptor.config;
        let account_password = self.resolve_password(config).await?;

        let mut zone_id = config.zone_id.clone();
        let mut network_type = None;
        let mut vpc_id = None;

        if let Some(vswitch_id) = &config.vswitch_id {
            let request = DescribeVSwitchAttributesRequest {
                vswitch_id: vswitch_id.to_string(),
            };

            let vswitch = self
                .vpc
                .describe_vswitch_attributes(&request)
                .await
                .map_err(|err| Error::Lookup(vswitch_id.to_string(), err))?;

            if vswitch.vswitch_id != *vswitch_id {
                return Err(Error::VSwitchNotFound(vswitch_id.to_string()));
            }

            let declared = zone_id.clone().unwrap_or_default();
            if declared.is_empty() {
                // no declared zone, adopt the placement of the vswitch
                zone_id = Some(vswitch.zone_id.clone());
            } else if declared.contains(MULTI_ZONE_MARKER) {
                check_zone_membership(&declared, &vswitch.zone_id)?;
            } else if declared != vswitch.zone_id {
                return Err(Error::ZoneMismatch(vswitch.zone_id.clone(), declared));
            }

            network_type = Some(VPC_NETWORK.to_string());
            vpc_id = Some(vswitch.vpc_id);
        }

        let security_ip_list = if config.security_ips.is_empty() {
            LOCAL_HOST_IP.to_string()
        } else {
            config.security_ips.join(",")
        };

        // the period only makes sense on subscription billing
        let period = match config.charge_type.as_deref() {
            Some(PRE_PAID) => config.period,
            _ => None,
        };

        Ok(CreateDbInstanceRequest {
            region_id: self.region.clone(),
            engine: ENGINE.to_string(),
            engine_version: config.engine_version.clone(),
            db_instance_class: config.instance_class.clone(),
            db_instance_storage: config.storage,
            db_instance_description: config.name.clone(),
            account_password,
            zone_id,
            storage_engine: config.storage_engine.clone(),
            replication_factor: config.replication_factor.map(|factor| factor.to_string()),
            security_ip_list,
            charge_type: config.charge_type.clone(),
            period,
            network_type,
            vswitch_id: config.vswitch_id.clone(),
            vpc_id,
            client_token: client_token(action::CREATE_DB_INSTANCE),
        })
    }

    /// Create the instance, wait for it to come up and apply the settings
    /// the creation call could not convey
    #[cfg_attr(feature = "trace", tracing::instrument(skip_all))]
    pub async fn create(&self, descriptor: &mut Descriptor) -> Result<(), Error> {
        validate(&descriptor.config)?;

        let request = self.build_create_request(descriptor).await?;
        let response = self
            .service
            .create(&request)
            .await
            .map_err(|err| Error::Action(action::CREATE_DB_INSTANCE, err))?;

        info!(
            identifier = response.db_instance_id,
            request = response.request_id,
            "Instance creation accepted"
        );

        let id = response.db_instance_id;
        descriptor.record_create(id.clone());

        self.wait_status(
            &id,
            &[status::CREATING],
            &[status::RUNNING],
            Duration::from_secs(descriptor.timeouts.create),
        )
        .await?;

        self.update(descriptor).await
    }

    /// Mirror the remote state into the descriptor. A vanished instance
    /// clears the identity, so the next pass recreates it.
    #[cfg_attr(feature = "trace", tracing::instrument(skip_all))]
    pub async fn read(&self, descriptor: &mut Descriptor) -> Result<(), Error> {
        let id = match &descriptor.id {
            Some(id) => id.clone(),
            None => return Ok(()),
        };

        let instance = self
            .service
            .describe_instance(&id)
            .await
            .map_err(|err| Error::Action(action::DESCRIBE_DB_INSTANCE_ATTRIBUTE, err))?;

        let instance = match instance {
            Some(instance) => instance,
            None => {
                info!(identifier = id, "Instance is gone, clearing its identity");
                descriptor.clear_identity();
                return Ok(());
            }
        };

        let (policy, security_ips) = futures::try_join!(
            async {
                self.service
                    .describe_backup_policy(&id)
                    .await
                    .map_err(|err| Error::Action(action::DESCRIBE_BACKUP_POLICY, err))
            },
            async {
                self.service
                    .security_ips(&id)
                    .await
                    .map_err(|err| Error::Action(action::DESCRIBE_SECURITY_IPS, err))
            }
        )?;

        let replication_factor = parse_count(&instance.replication_factor, "replication_factor");
        let retention_period = parse_count(&policy.backup_retention_period, "retention_period");

        let observed = InstanceConfig {
            engine_version: instance.engine_version,
            instance_class: instance.db_instance_class,
            storage: instance.db_instance_storage,
            replication_factor,
            storage_engine: none_if_empty(instance.storage_engine),
            charge_type: none_if_empty(instance.charge_type),
            period: None,
            zone_id: none_if_empty(instance.zone_id),
            vswitch_id: none_if_empty(instance.vswitch_id),
            name: none_if_empty(instance.db_instance_description),
            security_ips,
            account_password: None,
            kms_encrypted_password: None,
            kms_encryption_context: Default::default(),
            backup_time: none_if_empty(policy.preferred_backup_time),
            backup_period: split_list(&policy.preferred_backup_period),
            maintain_start_time: none_if_empty(instance.maintain_start_time),
            maintain_end_time: none_if_empty(instance.maintain_end_time),
        };

        descriptor.sync(observed, retention_period);

        Ok(())
    }

    /// Apply the desired configuration, one group of related fields at a
    /// time. Each group is committed as soon as its call succeeds, a failure
    /// aborts the pass and the next one resumes with the remaining groups.
    #[cfg_attr(feature = "trace", tracing::instrument(skip_all))]
    pub async fn update(&self, descriptor: &mut Descriptor) -> Result<(), Error> {
        validate(&descriptor.config)?;

        let id = match &descriptor.id {
            Some(id) => id.clone(),
            None => return Err(Error::MissingIdentity),
        };

        if descriptor.has_changed(Field::BackupTime) || descriptor.has_changed(Field::BackupPeriod)
        {
            let backup_time = descriptor.config.backup_time.clone().unwrap_or_default();

            self.service
                .modify_backup_policy(&id, &backup_time, &descriptor.config.backup_period)
                .await
                .map_err(|err| Error::Action(action::MODIFY_BACKUP_POLICY, err))?;

            descriptor.commit(&[Field::BackupTime, Field::BackupPeriod]);
        }

        if descriptor.has_changed(Field::MaintainStartTime)
            || descriptor.has_changed(Field::MaintainEndTime)
        {
            let start = descriptor.config.maintain_start_time.clone().unwrap_or_default();
            let end = descriptor.config.maintain_end_time.clone().unwrap_or_default();

            self.service
                .modify_maintain_time(&id, &start, &end)
                .await
                .map_err(|err| Error::Action(action::MODIFY_DB_INSTANCE_MAINTAIN_TIME, err))?;

            descriptor.commit(&[Field::MaintainStartTime, Field::MaintainEndTime]);
        }

        // a freshly created instance only needs the groups above, the
        // creation call already conveyed everything else
        if descriptor.is_new_resource() {
            descriptor.clear_new_resource();
            return self.read(descriptor).await;
        }

        if descriptor.has_changed(Field::Name) {
            let name = descriptor.config.name.clone().unwrap_or_default();

            self.service
                .modify_description(&id, &name)
                .await
                .map_err(|err| Error::Action(action::MODIFY_DB_INSTANCE_DESCRIPTION, err))?;

            descriptor.commit(&[Field::Name]);
        }

        if descriptor.has_changed(Field::SecurityIps) {
            let ips = if descriptor.config.security_ips.is_empty() {
                LOCAL_HOST_IP.to_string()
            } else {
                descriptor.config.security_ips.join(",")
            };

            self.service
                .modify_security_ips(&id, &ips)
                .await
                .map_err(|err| Error::Action(action::MODIFY_SECURITY_IPS, err))?;

            descriptor.commit(&[Field::SecurityIps]);
        }

        if descriptor.has_changed(Field::AccountPassword)
            || descriptor.has_changed(Field::KmsEncryptedPassword)
        {
            if let Some(password) = self.resolve_password(&descriptor.config).await? {
                self.service
                    .reset_account_password(&id, &password)
                    .await
                    .map_err(|err| Error::Action(action::RESET_ACCOUNT_PASSWORD, err))?;
            }

            descriptor.commit(&[Field::AccountPassword, Field::KmsEncryptedPassword]);
        }

        if descriptor.has_changed(Field::InstanceClass)
            || descriptor.has_changed(Field::Storage)
            || descriptor.has_changed(Field::ReplicationFactor)
        {
            let pending = [status::CLASS_CHANGING, status::NET_TYPE_CHANGING];
            let timeout = Duration::from_secs(descriptor.timeouts.update);

            // the remote api refuses capacity changes while one is running,
            // so the instance is drained before and after the call
            self.wait_status(&id, &pending, &[status::RUNNING], timeout)
                .await?;

            let replication_factor = descriptor.config.replication_factor.or_else(|| {
                descriptor
                    .state
                    .as_ref()
                    .and_then(|state| state.replication_factor)
            });

            self.service
                .modify_spec(
                    &id,
                    &descriptor.config.instance_class,
                    descriptor.config.storage,
                    replication_factor,
                )
                .await
                .map_err(|err| Error::Action(action::MODIFY_DB_INSTANCE_SPEC, err))?;

            self.wait_status(&id, &pending, &[status::RUNNING], timeout)
                .await?;

            descriptor.commit(&[
                Field::InstanceClass,
                Field::Storage,
                Field::ReplicationFactor,
            ]);
        }

        self.read(descriptor).await
    }

    /// Delete the instance and wait for it to disappear. The deletion call
    /// is retried for a bounded time, the remote api refuses it while the
    /// instance is locked by a pending operation.
    #[cfg_attr(feature = "trace", tracing::instrument(skip_all))]
    pub async fn delete(&self, descriptor: &mut Descriptor) -> Result<(), Error> {
        let id = match &descriptor.id {
            Some(id) => id.clone(),
            None => return Ok(()),
        };

        let deadline = Instant::now() + DELETE_RETRY_TIMEOUT;

        loop {
            match self.service.delete(&id).await {
                Ok(()) => break,
                Err(err) if err.is_not_found() => {
                    info!(identifier = id, "Instance is already gone");
                    descriptor.clear_identity();
                    return Ok(());
                }
                Err(err) => {
                    if deadline <= Instant::now() {
                        return Err(Error::DeleteTimeout(id, DELETE_RETRY_TIMEOUT, err));
                    }

                    warn!(
                        identifier = id,
                        error = err.to_string(),
                        "Instance deletion was refused, retrying"
                    );

                    sleep(self.retry_interval).await;
                }
            }
        }

        self.wait_status(
            &id,
            &[status::CREATING, status::DELETING],
            &[],
            Duration::from_secs(descriptor.timeouts.delete),
        )
        .await?;

        descriptor.clear_identity();

        Ok(())
    }

    /// Adopt an instance created outside of the descriptor
    #[cfg_attr(feature = "trace", tracing::instrument(skip_all))]
    pub async fn import(&self, descriptor: &mut Descriptor, id: &str) -> Result<(), Error> {
        descriptor.clear_identity();
        descriptor.id = Some(id.to_string());

        self.read(descriptor).await?;

        if descriptor.id.is_none() {
            return Err(Error::ImportNotFound(id.to_string()));
        }

        Ok(())
    }

    async fn wait_status(
        &self,
        id: &str,
        pending: &[&str],
        target: &[&str],
        timeout: Duration,
    ) -> Result<(), Error> {
        Ok(poll::wait_for_status(
            || self.service.status(id),
            pending,
            target,
            timeout,
            self.poll_interval,
        )
        .await?)
    }
}

// -----------------------------------------------------------------------------
// helpers

fn none_if_empty(value: String) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .filter(|part| !part.is_empty())
        .map(String::from)
        .collect()
}

/// Parse a number the remote api reports as a string. An unparsable value
/// is logged and discarded, it must not fail the whole read.
fn parse_count(value: &str, field: &str) -> Option<i64> {
    if value.is_empty() {
        return None;
    }

    match value.parse() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            warn!(value, field, "Discarding a malformed number reported by the remote api");
            None
        }
    }
}

// -----------------------------------------------------------------------------
// unit tests

#[cfg(test)]
mod tests {
    use std::{
        collections::{BTreeMap, VecDeque},
        sync::{Arc, Mutex},
        time::Duration,
    };

    use async_trait::async_trait;
    use reqwest::StatusCode;

    use crate::svc::{
        aliyun::{
            client::{Error as ClientError, ResponseError},
            dds::{
                action, CreateDbInstanceRequest, CreateDbInstanceResponse, DbInstance,
                DbInstances, DdsApi, DeleteDbInstanceRequest, DescribeBackupPolicyRequest,
                DescribeBackupPolicyResponse, DescribeDbInstanceAttributeRequest,
                DescribeDbInstanceAttributeResponse, DescribeSecurityIpsRequest,
                DescribeSecurityIpsResponse, ModifyBackupPolicyRequest,
                ModifyDbInstanceDescriptionRequest, ModifyDbInstanceMaintainTimeRequest,
                ModifyDbInstanceSpecRequest, ModifySecurityIpsRequest, OperationResponse,
                ResetAccountPasswordRequest, SecurityIpGroup, SecurityIpGroups,
            },
            kms::{DecryptRequest, DecryptResponse, KmsApi},
            vpc::{
                DescribeVSwitchAttributesRequest, DescribeVSwitchAttributesResponse, VpcApi,
            },
        },
        mongodb::Error,
        resource::{Descriptor, InstanceConfig, Timeouts, LOCAL_HOST_IP},
    };

    use super::{check_zone_membership, client_token, is_backup_window, validate, Reconciler};

    // -------------------------------------------------------------------------
    // fakes

    #[derive(Default)]
    struct FakeState {
        calls: Mutex<Vec<&'static str>>,
        statuses: Mutex<VecDeque<Option<String>>>,
        fallback: Mutex<Option<String>>,
        fail_once: Mutex<Vec<&'static str>>,
        not_found_once: Mutex<Vec<&'static str>>,
        instance: Mutex<DbInstance>,
        backup_policy: Mutex<DescribeBackupPolicyResponse>,
        security_ip_groups: Mutex<Vec<SecurityIpGroup>>,
        create_requests: Mutex<Vec<CreateDbInstanceRequest>>,
        spec_requests: Mutex<Vec<ModifyDbInstanceSpecRequest>>,
        security_ip_requests: Mutex<Vec<ModifySecurityIpsRequest>>,
    }

    #[derive(Clone, Default)]
    struct FakeApi {
        inner: Arc<FakeState>,
    }

    impl FakeApi {
        fn record(&self, action: &'static str) -> Result<(), ClientError> {
            self.inner.calls.lock().unwrap().push(action);

            let mut not_found = self.inner.not_found_once.lock().unwrap();
            if let Some(position) = not_found.iter().position(|name| *name == action) {
                not_found.remove(position);
                return Err(not_found_error());
            }

            let mut failures = self.inner.fail_once.lock().unwrap();
            if let Some(position) = failures.iter().position(|name| *name == action) {
                failures.remove(position);
                return Err(server_error());
            }

            Ok(())
        }

        fn calls(&self) -> Vec<&'static str> {
            self.inner.calls.lock().unwrap().clone()
        }

        fn push_statuses(&self, statuses: &[Option<&str>]) {
            self.inner
                .statuses
                .lock()
                .unwrap()
                .extend(statuses.iter().map(|status| status.map(String::from)));
        }

        fn next_status(&self) -> Option<String> {
            let mut statuses = self.inner.statuses.lock().unwrap();
            match statuses.pop_front() {
                Some(status) => {
                    *self.inner.fallback.lock().unwrap() = status.clone();
                    status
                }
                None => self.inner.fallback.lock().unwrap().clone(),
            }
        }
    }

    fn not_found_error() -> ClientError {
        ClientError::Response(
            StatusCode::NOT_FOUND,
            ResponseError {
                code: "InvalidDBInstanceId.NotFound".to_string(),
                ..Default::default()
            },
        )
    }

    fn server_error() -> ClientError {
        ClientError::Response(
            StatusCode::INTERNAL_SERVER_ERROR,
            ResponseError {
                code: "OperationDenied.DBInstanceStatus".to_string(),
                ..Default::default()
            },
        )
    }

    #[async_trait]
    impl DdsApi for FakeApi {
        async fn create_db_instance(
            &self,
            request: &CreateDbInstanceRequest,
        ) -> Result<CreateDbInstanceResponse, ClientError> {
            self.record(action::CREATE_DB_INSTANCE)?;
            self.inner
                .create_requests
                .lock()
                .unwrap()
                .push(request.clone());

            Ok(CreateDbInstanceResponse {
                request_id: "req-1".to_string(),
                db_instance_id: "dds-deadbeef".to_string(),
            })
        }

        async fn describe_db_instance_attribute(
            &self,
            _request: &DescribeDbInstanceAttributeRequest,
        ) -> Result<DescribeDbInstanceAttributeResponse, ClientError> {
            self.record(action::DESCRIBE_DB_INSTANCE_ATTRIBUTE)?;

            let db_instance = match self.next_status() {
                None => Vec::new(),
                Some(status) => {
                    let mut instance = self.inner.instance.lock().unwrap().clone();
                    instance.db_instance_status = status;
                    vec![instance]
                }
            };

            Ok(DescribeDbInstanceAttributeResponse {
                db_instances: DbInstances { db_instance },
            })
        }

        async fn describe_backup_policy(
            &self,
            _request: &DescribeBackupPolicyRequest,
        ) -> Result<DescribeBackupPolicyResponse, ClientError> {
            self.record(action::DESCRIBE_BACKUP_POLICY)?;
            Ok(self.inner.backup_policy.lock().unwrap().clone())
        }

        async fn describe_security_ips(
            &self,
            _request: &DescribeSecurityIpsRequest,
        ) -> Result<DescribeSecurityIpsResponse, ClientError> {
            self.record(action::DESCRIBE_SECURITY_IPS)?;
            Ok(DescribeSecurityIpsResponse {
                security_ip_groups: SecurityIpGroups {
                    security_ip_group: self.inner.security_ip_groups.lock().unwrap().clone(),
                },
            })
        }

        async fn modify_backup_policy(
            &self,
            _request: &ModifyBackupPolicyRequest,
        ) -> Result<OperationResponse, ClientError> {
            self.record(action::MODIFY_BACKUP_POLICY)?;
            Ok(OperationResponse::default())
        }

        async fn modify_db_instance_description(
            &self,
            _request: &ModifyDbInstanceDescriptionRequest,
        ) -> Result<OperationResponse, ClientError> {
            self.record(action::MODIFY_DB_INSTANCE_DESCRIPTION)?;
            Ok(OperationResponse::default())
        }

        async fn modify_db_instance_maintain_time(
            &self,
            _request: &ModifyDbInstanceMaintainTimeRequest,
        ) -> Result<OperationResponse, ClientError> {
            self.record(action::MODIFY_DB_INSTANCE_MAINTAIN_TIME)?;
            Ok(OperationResponse::default())
        }

        async fn modify_security_ips(
            &self,
            request: &ModifySecurityIpsRequest,
        ) -> Result<OperationResponse, ClientError> {
            self.record(action::MODIFY_SECURITY_IPS)?;
            self.inner
                .security_ip_requests
                .lock()
                .unwrap()
                .push(request.clone());

            Ok(OperationResponse::default())
        }

        async fn reset_account_password(
            &self,
            _request: &ResetAccountPasswordRequest,
        ) -> Result<OperationResponse, ClientError> {
            self.record(action::RESET_ACCOUNT_PASSWORD)?;
            Ok(OperationResponse::default())
        }

        async fn modify_db_instance_spec(
            &self,
            request: &ModifyDbInstanceSpecRequest,
        ) -> Result<OperationResponse, ClientError> {
            self.record(action::MODIFY_DB_INSTANCE_SPEC)?;
            self.inner
                .spec_requests
                .lock()
                .unwrap()
                .push(request.clone());

            Ok(OperationResponse::default())
        }

        async fn delete_db_instance(
            &self,
            _request: &DeleteDbInstanceRequest,
        ) -> Result<OperationResponse, ClientError> {
            self.record(action::DELETE_DB_INSTANCE)?;
            Ok(OperationResponse::default())
        }
    }

    #[derive(Clone, Default)]
    struct FakeKms {
        requests: Arc<Mutex<Vec<DecryptRequest>>>,
    }

    #[async_trait]
    impl KmsApi for FakeKms {
        async fn decrypt(&self, request: &DecryptRequest) -> Result<DecryptResponse, ClientError> {
            self.requests.lock().unwrap().push(request.clone());
            Ok(DecryptResponse {
                plaintext: "d3crypted!".to_string(),
            })
        }
    }

    #[derive(Clone, Default)]
    struct FakeVpc {
        response: Arc<Mutex<Option<DescribeVSwitchAttributesResponse>>>,
        requests: Arc<Mutex<Vec<DescribeVSwitchAttributesRequest>>>,
    }

    #[async_trait]
    impl VpcApi for FakeVpc {
        async fn describe_vswitch_attributes(
            &self,
            request: &DescribeVSwitchAttributesRequest,
        ) -> Result<DescribeVSwitchAttributesResponse, ClientError> {
            self.requests.lock().unwrap().push(request.clone());
            Ok(self.response.lock().unwrap().clone().unwrap_or_default())
        }
    }

    // -------------------------------------------------------------------------
    // helpers

    fn reconciler(
        api: FakeApi,
        kms: FakeKms,
        vpc: FakeVpc,
    ) -> Reconciler<FakeApi, FakeKms, FakeVpc> {
        let mut reconciler = Reconciler::new(api, kms, vpc, "cn-hangzhou");
        reconciler.poll_interval = Duration::from_millis(1);
        reconciler.retry_interval = Duration::from_millis(1);
        reconciler
    }

    fn descriptor() -> Descriptor {
        Descriptor {
            config: InstanceConfig {
                engine_version: "4.0".to_string(),
                instance_class: "dds.mongo.mid".to_string(),
                storage: 10,
                ..Default::default()
            },
            timeouts: Timeouts {
                create: 5,
                update: 5,
                delete: 5,
            },
            ..Default::default()
        }
    }

    /// A descriptor whose state mirrors the remote instance, as left by a
    /// previous read
    fn synced_descriptor() -> Descriptor {
        let mut descriptor = descriptor();
        descriptor.id = Some("dds-deadbeef".to_string());

        let mut state = descriptor.config.clone();
        state.security_ips = vec![LOCAL_HOST_IP.to_string()];
        state.replication_factor = Some(3);
        descriptor.state = Some(state);

        descriptor
    }

    fn vswitch_response() -> DescribeVSwitchAttributesResponse {
        DescribeVSwitchAttributesResponse {
            vswitch_id: "vsw-1".to_string(),
            zone_id: "cn-hangzhou-c".to_string(),
            vpc_id: "vpc-1".to_string(),
        }
    }

    // -------------------------------------------------------------------------
    // validation

    #[test]
    fn validation_accepts_a_complete_configuration() {
        let config = InstanceConfig {
            engine_version: "4.0".to_string(),
            instance_class: "dds.mongo.mid".to_string(),
            storage: 10,
            replication_factor: Some(3),
            storage_engine: Some("WiredTiger".to_string()),
            charge_type: Some("PrePaid".to_string()),
            period: Some(12),
            name: Some("sample".to_string()),
            account_password: Some("s3cret!".to_string()),
            backup_time: Some("23:00Z-24:00Z".to_string()),
            backup_period: vec!["Monday".to_string(), "Thursday".to_string()],
            ..Default::default()
        };

        assert!(validate(&config).is_ok());
    }

    #[test]
    fn validation_rejects_invalid_capacity() {
        let mut config = descriptor().config;

        config.storage = 9;
        assert!(matches!(validate(&config), Err(Error::Validation(_))));

        config.storage = 2_001;
        assert!(matches!(validate(&config), Err(Error::Validation(_))));

        config.storage = 10;
        config.replication_factor = Some(4);
        assert!(matches!(validate(&config), Err(Error::Validation(_))));
    }

    #[test]
    fn validation_rejects_invalid_billing() {
        let mut config = descriptor().config;

        config.charge_type = Some("Monthly".to_string());
        assert!(matches!(validate(&config), Err(Error::Validation(_))));

        config.charge_type = Some("PrePaid".to_string());
        config.period = Some(10);
        assert!(matches!(validate(&config), Err(Error::Validation(_))));

        config.period = Some(36);
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn validation_rejects_conflicting_credentials() {
        let mut config = descriptor().config;
        config.account_password = Some("s3cret!".to_string());
        config.kms_encrypted_password = Some("blob".to_string());

        assert!(matches!(validate(&config), Err(Error::Validation(_))));
    }

    #[test]
    fn validation_rejects_invalid_names() {
        let mut config = descriptor().config;

        config.name = Some("x".to_string());
        assert!(matches!(validate(&config), Err(Error::Validation(_))));

        config.name = Some("https://sample".to_string());
        assert!(matches!(validate(&config), Err(Error::Validation(_))));

        config.name = Some("sample".to_string());
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn validation_rejects_malformed_windows() {
        let mut config = descriptor().config;

        config.backup_time = Some("02:30Z-03:30Z".to_string());
        assert!(matches!(validate(&config), Err(Error::Validation(_))));

        config.backup_time = Some("03:00Z-04:00Z".to_string());
        config.backup_period = vec!["Funday".to_string()];
        assert!(matches!(validate(&config), Err(Error::Validation(_))));
    }

    #[test]
    fn backup_windows_are_whole_hour_slots() {
        assert!(is_backup_window("00:00Z-01:00Z"));
        assert!(is_backup_window("23:00Z-24:00Z"));
        assert!(!is_backup_window("23:00Z-00:00Z"));
        assert!(!is_backup_window("03:00Z-05:00Z"));
        assert!(!is_backup_window("03:00Z"));
        assert!(!is_backup_window("3am-4am"));
    }

    #[test]
    fn zone_membership_follows_the_trailing_letter() {
        assert!(check_zone_membership("cn-hangzhou-MAZ5(b,c)", "cn-hangzhou-c").is_ok());
        assert!(matches!(
            check_zone_membership("cn-hangzhou-MAZ5(d,e)", "cn-hangzhou-c"),
            Err(Error::ZoneNotInGroup(_, _))
        ));
        assert!(matches!(
            check_zone_membership("cn-hangzhou-MAZ5", "cn-hangzhou-c"),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn client_tokens_are_action_scoped_and_bounded() {
        let token = client_token(action::CREATE_DB_INSTANCE);

        assert!(token.starts_with("CreateDBInstance-"));
        assert!(token.len() <= 64);
        assert_ne!(token, client_token(action::CREATE_DB_INSTANCE));
    }

    // -------------------------------------------------------------------------
    // create

    #[tokio::test]
    async fn create_defaults_the_allow_list_to_loopback() {
        let api = FakeApi::default();
        api.push_statuses(&[Some("Running")]);

        let reconciler = reconciler(api.clone(), FakeKms::default(), FakeVpc::default());
        let mut descriptor = descriptor();

        reconciler
            .create(&mut descriptor)
            .await
            .expect("instance is created");

        let requests = api.inner.create_requests.lock().unwrap();
        assert_eq!(LOCAL_HOST_IP, requests[0].security_ip_list);
        assert_eq!("MongoDB", requests[0].engine);
        assert_eq!("cn-hangzhou", requests[0].region_id);
        assert_eq!(None, requests[0].zone_id);
        assert_eq!(None, requests[0].network_type);
        assert_eq!(None, requests[0].period);
        assert!(!requests[0].client_token.is_empty());
        assert_eq!(Some("dds-deadbeef".to_string()), descriptor.id);
    }

    #[tokio::test]
    async fn create_gates_the_period_on_prepaid_billing() {
        let reconciler = reconciler(FakeApi::default(), FakeKms::default(), FakeVpc::default());

        let mut descriptor = descriptor();
        descriptor.config.charge_type = Some("PostPaid".to_string());
        descriptor.config.period = Some(3);

        let request = reconciler
            .build_create_request(&descriptor)
            .await
            .expect("request is built");
        assert_eq!(None, request.period);

        descriptor.config.charge_type = Some("PrePaid".to_string());

        let request = reconciler
            .build_create_request(&descriptor)
            .await
            .expect("request is built");
        assert_eq!(Some(3), request.period);
    }

    #[tokio::test]
    async fn create_resolves_the_network_placement_from_the_vswitch() {
        let vpc = FakeVpc::default();
        *vpc.response.lock().unwrap() = Some(vswitch_response());

        let reconciler = reconciler(FakeApi::default(), FakeKms::default(), vpc);

        let mut descriptor = descriptor();
        descriptor.config.replication_factor = Some(3);
        descriptor.config.vswitch_id = Some("vsw-1".to_string());

        let request = reconciler
            .build_create_request(&descriptor)
            .await
            .expect("request is built");

        assert_eq!(Some("cn-hangzhou-c".to_string()), request.zone_id);
        assert_eq!(Some("VPC".to_string()), request.network_type);
        assert_eq!(Some("vpc-1".to_string()), request.vpc_id);
        assert_eq!(Some("vsw-1".to_string()), request.vswitch_id);
        assert_eq!(Some("3".to_string()), request.replication_factor);
        assert_eq!(10, request.db_instance_storage);
    }

    #[tokio::test]
    async fn create_rejects_a_vswitch_outside_the_declared_zone() {
        let api = FakeApi::default();
        let vpc = FakeVpc::default();
        *vpc.response.lock().unwrap() = Some(vswitch_response());

        let reconciler = reconciler(api.clone(), FakeKms::default(), vpc);

        let mut descriptor = descriptor();
        descriptor.config.zone_id = Some("cn-hangzhou-b".to_string());
        descriptor.config.vswitch_id = Some("vsw-1".to_string());

        let result = reconciler.create(&mut descriptor).await;

        assert!(matches!(result, Err(Error::ZoneMismatch(_, _))));
        assert!(api.calls().is_empty());
        assert_eq!(None, descriptor.id);
    }

    #[tokio::test]
    async fn create_accepts_a_vswitch_inside_the_multi_zone_group() {
        let vpc = FakeVpc::default();
        *vpc.response.lock().unwrap() = Some(vswitch_response());

        let reconciler = reconciler(FakeApi::default(), FakeKms::default(), vpc);

        let mut descriptor = descriptor();
        descriptor.config.zone_id = Some("cn-hangzhou-MAZ5(b,c)".to_string());
        descriptor.config.vswitch_id = Some("vsw-1".to_string());

        let request = reconciler
            .build_create_request(&descriptor)
            .await
            .expect("request is built");

        // the declared group stands, only the network is adopted
        assert_eq!(Some("cn-hangzhou-MAZ5(b,c)".to_string()), request.zone_id);
        assert_eq!(Some("vpc-1".to_string()), request.vpc_id);

        descriptor.config.zone_id = Some("cn-hangzhou-MAZ6(d,e)".to_string());

        let result = reconciler.build_create_request(&descriptor).await;
        assert!(matches!(result, Err(Error::ZoneNotInGroup(_, _))));
    }

    #[tokio::test]
    async fn create_rejects_an_unknown_vswitch() {
        let reconciler = reconciler(FakeApi::default(), FakeKms::default(), FakeVpc::default());

        let mut descriptor = descriptor();
        descriptor.config.vswitch_id = Some("vsw-1".to_string());

        let result = reconciler.build_create_request(&descriptor).await;

        assert!(matches!(result, Err(Error::VSwitchNotFound(id)) if id == "vsw-1"));
    }

    #[tokio::test]
    async fn create_decrypts_the_kms_credential() {
        let kms = FakeKms::default();
        let reconciler = reconciler(FakeApi::default(), kms.clone(), FakeVpc::default());

        let mut descriptor = descriptor();
        descriptor.config.kms_encrypted_password = Some("blob".to_string());
        descriptor.config.kms_encryption_context =
            BTreeMap::from([("scope".to_string(), "sample".to_string())]);

        let request = reconciler
            .build_create_request(&descriptor)
            .await
            .expect("request is built");

        assert_eq!(Some("d3crypted!".to_string()), request.account_password);

        let requests = kms.requests.lock().unwrap();
        assert_eq!("blob", requests[0].ciphertext_blob);
        assert_eq!(
            Some(r#"{"scope":"sample"}"#.to_string()),
            requests[0].encryption_context
        );
    }

    #[tokio::test]
    async fn create_polls_then_applies_the_post_create_groups() {
        let api = FakeApi::default();
        api.push_statuses(&[Some("Creating"), Some("Creating"), Some("Running")]);

        let reconciler = reconciler(api.clone(), FakeKms::default(), FakeVpc::default());

        let mut descriptor = descriptor();
        descriptor.config.backup_time = Some("03:00Z-04:00Z".to_string());
        descriptor.config.backup_period = vec!["Monday".to_string()];
        descriptor.config.maintain_start_time = Some("01:00Z".to_string());
        descriptor.config.maintain_end_time = Some("02:00Z".to_string());
        descriptor.config.account_password = Some("s3cret!".to_string());

        reconciler
            .create(&mut descriptor)
            .await
            .expect("instance is created");

        assert_eq!(
            vec![
                action::CREATE_DB_INSTANCE,
                action::DESCRIBE_DB_INSTANCE_ATTRIBUTE,
                action::DESCRIBE_DB_INSTANCE_ATTRIBUTE,
                action::DESCRIBE_DB_INSTANCE_ATTRIBUTE,
                action::MODIFY_BACKUP_POLICY,
                action::MODIFY_DB_INSTANCE_MAINTAIN_TIME,
                action::DESCRIBE_DB_INSTANCE_ATTRIBUTE,
                action::DESCRIBE_BACKUP_POLICY,
                action::DESCRIBE_SECURITY_IPS,
            ],
            api.calls()
        );
        assert!(!descriptor.is_new_resource());
    }

    // -------------------------------------------------------------------------
    // read

    #[tokio::test]
    async fn read_mirrors_the_remote_state() {
        let api = FakeApi::default();
        api.push_statuses(&[Some("Running")]);

        *api.inner.instance.lock().unwrap() = DbInstance {
            engine_version: "4.0".to_string(),
            db_instance_class: "dds.mongo.standard".to_string(),
            db_instance_storage: 20,
            db_instance_description: "sample".to_string(),
            zone_id: "cn-hangzhou-c".to_string(),
            vswitch_id: "vsw-1".to_string(),
            charge_type: "PostPaid".to_string(),
            storage_engine: "WiredTiger".to_string(),
            maintain_start_time: "01:00Z".to_string(),
            maintain_end_time: "02:00Z".to_string(),
            replication_factor: "3".to_string(),
            ..Default::default()
        };
        *api.inner.backup_policy.lock().unwrap() = DescribeBackupPolicyResponse {
            preferred_backup_time: "03:00Z-04:00Z".to_string(),
            preferred_backup_period: "Monday,Thursday".to_string(),
            backup_retention_period: "7".to_string(),
        };
        *api.inner.security_ip_groups.lock().unwrap() = vec![SecurityIpGroup {
            security_ip_list: "10.0.0.1,10.0.0.2".to_string(),
            ..Default::default()
        }];

        let reconciler = reconciler(api, FakeKms::default(), FakeVpc::default());

        let mut descriptor = descriptor();
        descriptor.id = Some("dds-deadbeef".to_string());

        reconciler
            .read(&mut descriptor)
            .await
            .expect("instance is read");

        let state = descriptor.state.as_ref().expect("state is synchronized");
        assert_eq!("dds.mongo.standard", state.instance_class);
        assert_eq!(20, state.storage);
        assert_eq!(Some(3), state.replication_factor);
        assert_eq!(Some("sample".to_string()), state.name);
        assert_eq!(Some("03:00Z-04:00Z".to_string()), state.backup_time);
        assert_eq!(
            vec!["Monday".to_string(), "Thursday".to_string()],
            state.backup_period
        );
        assert_eq!(
            vec!["10.0.0.1".to_string(), "10.0.0.2".to_string()],
            state.security_ips
        );
        assert_eq!(Some(7), descriptor.retention_period);
    }

    #[tokio::test]
    async fn read_tolerates_malformed_numbers() {
        let api = FakeApi::default();
        api.push_statuses(&[Some("Running")]);

        *api.inner.instance.lock().unwrap() = DbInstance {
            replication_factor: "three".to_string(),
            ..Default::default()
        };

        let reconciler = reconciler(api, FakeKms::default(), FakeVpc::default());

        let mut descriptor = descriptor();
        descriptor.id = Some("dds-deadbeef".to_string());

        reconciler
            .read(&mut descriptor)
            .await
            .expect("malformed numbers are not fatal");

        let state = descriptor.state.as_ref().expect("state is synchronized");
        assert_eq!(None, state.replication_factor);
        assert_eq!(None, descriptor.retention_period);
    }

    #[tokio::test]
    async fn read_clears_the_identity_once_the_instance_is_gone() {
        let api = FakeApi::default();
        api.push_statuses(&[None]);

        let reconciler = reconciler(api.clone(), FakeKms::default(), FakeVpc::default());

        let mut descriptor = synced_descriptor();

        reconciler
            .read(&mut descriptor)
            .await
            .expect("a vanished instance is not an error");

        assert_eq!(None, descriptor.id);
        assert_eq!(None, descriptor.state);

        // a second read has nothing left to do
        reconciler
            .read(&mut descriptor)
            .await
            .expect("an empty descriptor reads fine");

        assert_eq!(vec![action::DESCRIBE_DB_INSTANCE_ATTRIBUTE], api.calls());
    }

    // -------------------------------------------------------------------------
    // update

    #[tokio::test]
    async fn update_requires_an_identifier() {
        let reconciler = reconciler(FakeApi::default(), FakeKms::default(), FakeVpc::default());
        let mut descriptor = descriptor();

        let result = reconciler.update(&mut descriptor).await;

        assert!(matches!(result, Err(Error::MissingIdentity)));
    }

    #[tokio::test]
    async fn update_without_changes_only_reads() {
        let api = FakeApi::default();
        api.push_statuses(&[Some("Running")]);

        let reconciler = reconciler(api.clone(), FakeKms::default(), FakeVpc::default());
        let mut descriptor = synced_descriptor();

        reconciler
            .update(&mut descriptor)
            .await
            .expect("a no-op update succeeds");

        assert_eq!(
            vec![
                action::DESCRIBE_DB_INSTANCE_ATTRIBUTE,
                action::DESCRIBE_BACKUP_POLICY,
                action::DESCRIBE_SECURITY_IPS,
            ],
            api.calls()
        );
    }

    #[tokio::test]
    async fn update_commits_each_group_and_resumes_after_a_failure() {
        let api = FakeApi::default();
        api.push_statuses(&[Some("Running")]);
        api.inner
            .fail_once
            .lock()
            .unwrap()
            .push(action::MODIFY_SECURITY_IPS);

        let reconciler = reconciler(api.clone(), FakeKms::default(), FakeVpc::default());

        let mut descriptor = synced_descriptor();
        descriptor.config.name = Some("renamed".to_string());
        descriptor.config.security_ips = vec!["10.0.0.1".to_string()];

        let result = reconciler.update(&mut descriptor).await;
        assert!(matches!(
            result,
            Err(Error::Action(action::MODIFY_SECURITY_IPS, _))
        ));

        reconciler
            .update(&mut descriptor)
            .await
            .expect("the second pass resumes with the remaining groups");

        assert_eq!(
            vec![
                action::MODIFY_DB_INSTANCE_DESCRIPTION,
                action::MODIFY_SECURITY_IPS,
                action::MODIFY_SECURITY_IPS,
                action::DESCRIBE_DB_INSTANCE_ATTRIBUTE,
                action::DESCRIBE_BACKUP_POLICY,
                action::DESCRIBE_SECURITY_IPS,
            ],
            api.calls()
        );

        let requests = api.inner.security_ip_requests.lock().unwrap();
        assert_eq!(1, requests.len());
        assert_eq!("10.0.0.1", requests[0].security_ips);
    }

    #[tokio::test]
    async fn update_maps_an_emptied_allow_list_to_loopback() {
        let api = FakeApi::default();
        api.push_statuses(&[Some("Running")]);

        let reconciler = reconciler(api.clone(), FakeKms::default(), FakeVpc::default());

        let mut descriptor = synced_descriptor();
        descriptor
            .state
            .as_mut()
            .expect("state is synchronized")
            .security_ips = vec!["10.0.0.1".to_string()];

        reconciler
            .update(&mut descriptor)
            .await
            .expect("the allow list falls back to loopback");

        let requests = api.inner.security_ip_requests.lock().unwrap();
        assert_eq!(1, requests.len());
        assert_eq!(LOCAL_HOST_IP, requests[0].security_ips);
    }

    #[tokio::test]
    async fn update_resets_the_account_credential() {
        let api = FakeApi::default();
        api.push_statuses(&[Some("Running")]);

        let reconciler = reconciler(api.clone(), FakeKms::default(), FakeVpc::default());

        let mut descriptor = synced_descriptor();
        descriptor.config.account_password = Some("s3cret!".to_string());

        reconciler
            .update(&mut descriptor)
            .await
            .expect("the credential is reset");

        assert_eq!(
            vec![
                action::RESET_ACCOUNT_PASSWORD,
                action::DESCRIBE_DB_INSTANCE_ATTRIBUTE,
                action::DESCRIBE_BACKUP_POLICY,
                action::DESCRIBE_SECURITY_IPS,
            ],
            api.calls()
        );
    }

    #[tokio::test]
    async fn update_wraps_the_capacity_change_in_status_waits() {
        let api = FakeApi::default();
        api.push_statuses(&[
            Some("Running"),
            Some("DBInstanceClassChanging"),
            Some("Running"),
        ]);

        let reconciler = reconciler(api.clone(), FakeKms::default(), FakeVpc::default());

        let mut descriptor = synced_descriptor();
        descriptor.config.storage = 20;

        reconciler
            .update(&mut descriptor)
            .await
            .expect("the capacity change goes through");

        assert_eq!(
            vec![
                action::DESCRIBE_DB_INSTANCE_ATTRIBUTE,
                action::MODIFY_DB_INSTANCE_SPEC,
                action::DESCRIBE_DB_INSTANCE_ATTRIBUTE,
                action::DESCRIBE_DB_INSTANCE_ATTRIBUTE,
                action::DESCRIBE_DB_INSTANCE_ATTRIBUTE,
                action::DESCRIBE_BACKUP_POLICY,
                action::DESCRIBE_SECURITY_IPS,
            ],
            api.calls()
        );

        let requests = api.inner.spec_requests.lock().unwrap();
        assert_eq!("dds.mongo.mid", requests[0].db_instance_class);
        assert_eq!("20", requests[0].db_instance_storage);
        // the declared configuration leaves the factor unset, the synced
        // state fills it in
        assert_eq!(Some("3".to_string()), requests[0].replication_factor);
    }

    #[tokio::test]
    async fn update_aborts_the_capacity_change_once_the_wait_times_out() {
        let api = FakeApi::default();
        api.push_statuses(&[Some("DBInstanceClassChanging")]);

        let reconciler = reconciler(api.clone(), FakeKms::default(), FakeVpc::default());

        let mut descriptor = synced_descriptor();
        descriptor.config.storage = 20;
        descriptor.timeouts.update = 0;

        let result = reconciler.update(&mut descriptor).await;

        assert!(matches!(result, Err(Error::Wait(_))));
        assert!(!api.calls().contains(&action::MODIFY_DB_INSTANCE_SPEC));
    }

    // -------------------------------------------------------------------------
    // delete

    #[tokio::test]
    async fn delete_succeeds_once_the_instance_is_already_gone() {
        let api = FakeApi::default();
        api.inner
            .not_found_once
            .lock()
            .unwrap()
            .push(action::DELETE_DB_INSTANCE);

        let reconciler = reconciler(api.clone(), FakeKms::default(), FakeVpc::default());
        let mut descriptor = synced_descriptor();

        reconciler
            .delete(&mut descriptor)
            .await
            .expect("a vanished instance deletes fine");

        assert_eq!(vec![action::DELETE_DB_INSTANCE], api.calls());
        assert_eq!(None, descriptor.id);
    }

    #[tokio::test]
    async fn delete_retries_refusals_then_waits_for_the_instance_to_vanish() {
        let api = FakeApi::default();
        api.push_statuses(&[Some("Deleting"), None]);
        api.inner
            .fail_once
            .lock()
            .unwrap()
            .push(action::DELETE_DB_INSTANCE);

        let reconciler = reconciler(api.clone(), FakeKms::default(), FakeVpc::default());
        let mut descriptor = synced_descriptor();

        reconciler
            .delete(&mut descriptor)
            .await
            .expect("the deletion is retried");

        assert_eq!(
            vec![
                action::DELETE_DB_INSTANCE,
                action::DELETE_DB_INSTANCE,
                action::DESCRIBE_DB_INSTANCE_ATTRIBUTE,
                action::DESCRIBE_DB_INSTANCE_ATTRIBUTE,
            ],
            api.calls()
        );
        assert_eq!(None, descriptor.id);
        assert_eq!(None, descriptor.state);
    }

    #[tokio::test]
    async fn delete_without_an_identifier_does_nothing() {
        let api = FakeApi::default();

        let reconciler = reconciler(api.clone(), FakeKms::default(), FakeVpc::default());
        let mut descriptor = descriptor();

        reconciler
            .delete(&mut descriptor)
            .await
            .expect("nothing to delete");

        assert!(api.calls().is_empty());
    }

    // -------------------------------------------------------------------------
    // import

    #[tokio::test]
    async fn import_adopts_an_existing_instance() {
        let api = FakeApi::default();
        api.push_statuses(&[Some("Running")]);

        *api.inner.instance.lock().unwrap() = DbInstance {
            engine_version: "4.0".to_string(),
            db_instance_class: "dds.mongo.mid".to_string(),
            db_instance_storage: 10,
            ..Default::default()
        };

        let reconciler = reconciler(api, FakeKms::default(), FakeVpc::default());
        let mut descriptor = descriptor();

        reconciler
            .import(&mut descriptor, "dds-cafe")
            .await
            .expect("instance is imported");

        assert_eq!(Some("dds-cafe".to_string()), descriptor.id);
        assert!(descriptor.state.is_some());
    }

    #[tokio::test]
    async fn import_rejects_an_unknown_identifier() {
        let api = FakeApi::default();
        api.push_statuses(&[None]);

        let reconciler = reconciler(api, FakeKms::default(), FakeVpc::default());
        let mut descriptor = descriptor();

        let result = reconciler.import(&mut descriptor, "dds-cafe").await;

        assert!(matches!(result, Err(Error::ImportNotFound(id)) if id == "dds-cafe"));
        assert_eq!(None, descriptor.id);
    }
}
