//! # ApsaraDB for MongoDB module
//!
//! This module provides typed payloads and the api trait for the `dds`
//! product, which manages MongoDB replica-set instances.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::svc::aliyun::client::{Client, Error, Product};

// -----------------------------------------------------------------------------
// Actions

pub mod action {
    pub const CREATE_DB_INSTANCE: &str = "CreateDBInstance";
    pub const DELETE_DB_INSTANCE: &str = "DeleteDBInstance";
    pub const DESCRIBE_DB_INSTANCE_ATTRIBUTE: &str = "DescribeDBInstanceAttribute";
    pub const DESCRIBE_BACKUP_POLICY: &str = "DescribeBackupPolicy";
    pub const DESCRIBE_SECURITY_IPS: &str = "DescribeSecurityIps";
    pub const MODIFY_BACKUP_POLICY: &str = "ModifyBackupPolicy";
    pub const MODIFY_DB_INSTANCE_DESCRIPTION: &str = "ModifyDBInstanceDescription";
    pub const MODIFY_DB_INSTANCE_MAINTAIN_TIME: &str = "ModifyDBInstanceMaintainTime";
    pub const MODIFY_DB_INSTANCE_SPEC: &str = "ModifyDBInstanceSpec";
    pub const MODIFY_SECURITY_IPS: &str = "ModifySecurityIps";
    pub const RESET_ACCOUNT_PASSWORD: &str = "ResetAccountPassword";
}

// -----------------------------------------------------------------------------
// CreateDBInstance payloads

#[derive(Serialize, PartialEq, Clone, Debug, Default)]
pub struct CreateDbInstanceRequest {
    #[serde(rename = "RegionId")]
    pub region_id: String,
    #[serde(rename = "Engine")]
    pub engine: String,
    #[serde(rename = "EngineVersion")]
    pub engine_version: String,
    #[serde(rename = "DBInstanceClass")]
    pub db_instance_class: String,
    #[serde(rename = "DBInstanceStorage")]
    pub db_instance_storage: i64,
    #[serde(rename = "DBInstanceDescription", skip_serializing_if = "Option::is_none")]
    pub db_instance_description: Option<String>,
    #[serde(rename = "AccountPassword", skip_serializing_if = "Option::is_none")]
    pub account_password: Option<String>,
    #[serde(rename = "ZoneId", skip_serializing_if = "Option::is_none")]
    pub zone_id: Option<String>,
    #[serde(rename = "StorageEngine", skip_serializing_if = "Option::is_none")]
    pub storage_engine: Option<String>,
    #[serde(rename = "ReplicationFactor", skip_serializing_if = "Option::is_none")]
    pub replication_factor: Option<String>,
    #[serde(rename = "SecurityIPList")]
    pub security_ip_list: String,
    #[serde(rename = "ChargeType", skip_serializing_if = "Option::is_none")]
    pub charge_type: Option<String>,
    #[serde(rename = "Period", skip_serializing_if = "Option::is_none")]
    pub period: Option<i64>,
    #[serde(rename = "NetworkType", skip_serializing_if = "Option::is_none")]
    pub network_type: Option<String>,
    #[serde(rename = "VSwitchId", skip_serializing_if = "Option::is_none")]
    pub vswitch_id: Option<String>,
    #[serde(rename = "VpcId", skip_serializing_if = "Option::is_none")]
    pub vpc_id: Option<String>,
    #[serde(rename = "ClientToken")]
    pub client_token: String,
}

#[derive(Deserialize, PartialEq, Eq, Clone, Debug, Default)]
pub struct CreateDbInstanceResponse {
    #[serde(rename = "RequestId", default)]
    pub request_id: String,
    #[serde(rename = "DBInstanceId", default)]
    pub db_instance_id: String,
}

// -----------------------------------------------------------------------------
// DescribeDBInstanceAttribute payloads

#[derive(Serialize, PartialEq, Eq, Clone, Debug)]
pub struct DescribeDbInstanceAttributeRequest {
    #[serde(rename = "DBInstanceId")]
    pub db_instance_id: String,
}

#[derive(Deserialize, PartialEq, Clone, Debug, Default)]
pub struct DescribeDbInstanceAttributeResponse {
    #[serde(rename = "DBInstances", default)]
    pub db_instances: DbInstances,
}

#[derive(Deserialize, PartialEq, Clone, Debug, Default)]
pub struct DbInstances {
    #[serde(rename = "DBInstance", default)]
    pub db_instance: Vec<DbInstance>,
}

/// Attributes of a MongoDB instance, as reported by the remote api.
///
/// The replication factor comes back as a string, it is parsed leniently on
/// the read path.
#[derive(Deserialize, PartialEq, Clone, Debug, Default)]
pub struct DbInstance {
    #[serde(rename = "DBInstanceStatus", default)]
    pub db_instance_status: String,
    #[serde(rename = "DBInstanceDescription", default)]
    pub db_instance_description: String,
    #[serde(rename = "EngineVersion", default)]
    pub engine_version: String,
    #[serde(rename = "DBInstanceClass", default)]
    pub db_instance_class: String,
    #[serde(rename = "DBInstanceStorage", default)]
    pub db_instance_storage: i64,
    #[serde(rename = "ZoneId", default)]
    pub zone_id: String,
    #[serde(rename = "VSwitchId", default)]
    pub vswitch_id: String,
    #[serde(rename = "ChargeType", default)]
    pub charge_type: String,
    #[serde(rename = "StorageEngine", default)]
    pub storage_engine: String,
    #[serde(rename = "MaintainStartTime", default)]
    pub maintain_start_time: String,
    #[serde(rename = "MaintainEndTime", default)]
    pub maintain_end_time: String,
    #[serde(rename = "ReplicationFactor", default)]
    pub replication_factor: String,
}

// -----------------------------------------------------------------------------
// Backup policy payloads

#[derive(Serialize, PartialEq, Eq, Clone, Debug)]
pub struct DescribeBackupPolicyRequest {
    #[serde(rename = "DBInstanceId")]
    pub db_instance_id: String,
}

#[derive(Deserialize, PartialEq, Eq, Clone, Debug, Default)]
pub struct DescribeBackupPolicyResponse {
    #[serde(rename = "PreferredBackupTime", default)]
    pub preferred_backup_time: String,
    #[serde(rename = "PreferredBackupPeriod", default)]
    pub preferred_backup_period: String,
    #[serde(rename = "BackupRetentionPeriod", default)]
    pub backup_retention_period: String,
}

#[derive(Serialize, PartialEq, Eq, Clone, Debug)]
pub struct ModifyBackupPolicyRequest {
    #[serde(rename = "DBInstanceId")]
    pub db_instance_id: String,
    #[serde(rename = "PreferredBackupTime")]
    pub preferred_backup_time: String,
    #[serde(rename = "PreferredBackupPeriod")]
    pub preferred_backup_period: String,
}

// -----------------------------------------------------------------------------
// Security ips payloads

#[derive(Serialize, PartialEq, Eq, Clone, Debug)]
pub struct DescribeSecurityIpsRequest {
    #[serde(rename = "DBInstanceId")]
    pub db_instance_id: String,
}

#[derive(Deserialize, PartialEq, Eq, Clone, Debug, Default)]
pub struct DescribeSecurityIpsResponse {
    #[serde(rename = "SecurityIpGroups", default)]
    pub security_ip_groups: SecurityIpGroups,
}

#[derive(Deserialize, PartialEq, Eq, Clone, Debug, Default)]
pub struct SecurityIpGroups {
    #[serde(rename = "SecurityIpGroup", default)]
    pub security_ip_group: Vec<SecurityIpGroup>,
}

#[derive(Deserialize, PartialEq, Eq, Clone, Debug, Default)]
pub struct SecurityIpGroup {
    #[serde(rename = "SecurityIpGroupAttribute", default)]
    pub security_ip_group_attribute: String,
    #[serde(rename = "SecurityIpGroupName", default)]
    pub security_ip_group_name: String,
    #[serde(rename = "SecurityIpList", default)]
    pub security_ip_list: String,
}

#[derive(Serialize, PartialEq, Eq, Clone, Debug)]
pub struct ModifySecurityIpsRequest {
    #[serde(rename = "DBInstanceId")]
    pub db_instance_id: String,
    #[serde(rename = "SecurityIps")]
    pub security_ips: String,
}

// -----------------------------------------------------------------------------
// Modification payloads

#[derive(Serialize, PartialEq, Eq, Clone, Debug)]
pub struct ModifyDbInstanceDescriptionRequest {
    #[serde(rename = "DBInstanceId")]
    pub db_instance_id: String,
    #[serde(rename = "DBInstanceDescription")]
    pub db_instance_description: String,
}

#[derive(Serialize, PartialEq, Eq, Clone, Debug)]
pub struct ModifyDbInstanceMaintainTimeRequest {
    #[serde(rename = "DBInstanceId")]
    pub db_instance_id: String,
    #[serde(rename = "MaintainStartTime")]
    pub maintain_start_time: String,
    #[serde(rename = "MaintainEndTime")]
    pub maintain_end_time: String,
}

#[derive(Serialize, PartialEq, Eq, Clone, Debug)]
pub struct ResetAccountPasswordRequest {
    #[serde(rename = "DBInstanceId")]
    pub db_instance_id: String,
    #[serde(rename = "AccountName")]
    pub account_name: String,
    #[serde(rename = "AccountPassword")]
    pub account_password: String,
}

#[derive(Serialize, PartialEq, Eq, Clone, Debug)]
pub struct ModifyDbInstanceSpecRequest {
    #[serde(rename = "DBInstanceId")]
    pub db_instance_id: String,
    #[serde(rename = "DBInstanceClass")]
    pub db_instance_class: String,
    #[serde(rename = "DBInstanceStorage")]
    pub db_instance_storage: String,
    #[serde(rename = "ReplicationFactor", skip_serializing_if = "Option::is_none")]
    pub replication_factor: Option<String>,
}

#[derive(Serialize, PartialEq, Eq, Clone, Debug)]
pub struct DeleteDbInstanceRequest {
    #[serde(rename = "DBInstanceId")]
    pub db_instance_id: String,
}

/// Acknowledgement returned by mutating actions
#[derive(Deserialize, PartialEq, Eq, Clone, Debug, Default)]
pub struct OperationResponse {
    #[serde(rename = "RequestId", default)]
    pub request_id: String,
}

// -----------------------------------------------------------------------------
// DdsApi trait

#[async_trait]
pub trait DdsApi {
    async fn create_db_instance(
        &self,
        request: &CreateDbInstanceRequest,
    ) -> Result<CreateDbInstanceResponse, Error>;

    async fn describe_db_instance_attribute(
        &self,
        request: &DescribeDbInstanceAttributeRequest,
    ) -> Result<DescribeDbInstanceAttributeResponse, Error>;

    async fn describe_backup_policy(
        &self,
        request: &DescribeBackupPolicyRequest,
    ) -> Result<DescribeBackupPolicyResponse, Error>;

    async fn describe_security_ips(
        &self,
        request: &DescribeSecurityIpsRequest,
    ) -> Result<DescribeSecurityIpsResponse, Error>;

    async fn modify_backup_policy(
        &self,
        request: &ModifyBackupPolicyRequest,
    ) -> Result<OperationResponse, Error>;

    async fn modify_db_instance_description(
        &self,
        request: &ModifyDbInstanceDescriptionRequest,
    ) -> Result<OperationResponse, Error>;

    async fn modify_db_instance_maintain_time(
        &self,
        request: &ModifyDbInstanceMaintainTimeRequest,
    ) -> Result<OperationResponse, Error>;

    async fn modify_security_ips(
        &self,
        request: &ModifySecurityIpsRequest,
    ) -> Result<OperationResponse, Error>;

    async fn reset_account_password(
        &self,
        request: &ResetAccountPasswordRequest,
    ) -> Result<OperationResponse, Error>;

    async fn modify_db_instance_spec(
        &self,
        request: &ModifyDbInstanceSpecRequest,
    ) -> Result<OperationResponse, Error>;

    async fn delete_db_instance(
        &self,
        request: &DeleteDbInstanceRequest,
    ) -> Result<OperationResponse, Error>;
}

#[async_trait]
impl DdsApi for Client {
    async fn create_db_instance(
        &self,
        request: &CreateDbInstanceRequest,
    ) -> Result<CreateDbInstanceResponse, Error> {
        self.invoke(Product::Dds, action::CREATE_DB_INSTANCE, request)
            .await
    }

    async fn describe_db_instance_attribute(
        &self,
        request: &DescribeDbInstanceAttributeRequest,
    ) -> Result<DescribeDbInstanceAttributeResponse, Error> {
        self.invoke(Product::Dds, action::DESCRIBE_DB_INSTANCE_ATTRIBUTE, request)
            .await
    }

    async fn describe_backup_policy(
        &self,
        request: &DescribeBackupPolicyRequest,
    ) -> Result<DescribeBackupPolicyResponse, Error> {
        self.invoke(Product::Dds, action::DESCRIBE_BACKUP_POLICY, request)
            .await
    }

    async fn describe_security_ips(
        &self,
        request: &DescribeSecurityIpsRequest,
    ) -> Result<DescribeSecurityIpsResponse, Error> {
        self.invoke(Product::Dds, action::DESCRIBE_SECURITY_IPS, request)
            .await
    }

    async fn modify_backup_policy(
        &self,
        request: &ModifyBackupPolicyRequest,
    ) -> Result<OperationResponse, Error> {
        self.invoke(Product::Dds, action::MODIFY_BACKUP_POLICY, request)
            .await
    }

    async fn modify_db_instance_description(
        &self,
        request: &ModifyDbInstanceDescriptionRequest,
    ) -> Result<OperationResponse, Error> {
        self.invoke(Product::Dds, action::MODIFY_DB_INSTANCE_DESCRIPTION, request)
            .await
    }

    async fn modify_db_instance_maintain_time(
        &self,
        request: &ModifyDbInstanceMaintainTimeRequest,
    ) -> Result<OperationResponse, Error> {
        self.invoke(Product::Dds, action::MODIFY_DB_INSTANCE_MAINTAIN_TIME, request)
            .await
    }

    async fn modify_security_ips(
        &self,
        request: &ModifySecurityIpsRequest,
    ) -> Result<OperationResponse, Error> {
        self.invoke(Product::Dds, action::MODIFY_SECURITY_IPS, request)
            .await
    }

    async fn reset_account_password(
        &self,
        request: &ResetAccountPasswordRequest,
    ) -> Result<OperationResponse, Error> {
        self.invoke(Product::Dds, action::RESET_ACCOUNT_PASSWORD, request)
            .await
    }

    async fn modify_db_instance_spec(
        &self,
        request: &ModifyDbInstanceSpecRequest,
    ) -> Result<OperationResponse, Error> {
        self.invoke(Product::Dds, action::MODIFY_DB_INSTANCE_SPEC, request)
            .await
    }

    async fn delete_db_instance(
        &self,
        request: &DeleteDbInstanceRequest,
    ) -> Result<OperationResponse, Error> {
        self.invoke(Product::Dds, action::DELETE_DB_INSTANCE, request)
            .await
    }
}
