//! # Service module
//!
//! This module provides a domain level wrapper over the raw `dds` api. It
//! soaks the not-found answers of the describe calls, normalizes the allowed
//! ip list and exposes the mutations the lifecycle handlers rely on.

use tracing::debug;

use crate::svc::aliyun::{
    client::Error,
    dds::{
        CreateDbInstanceRequest, CreateDbInstanceResponse, DbInstance, DdsApi,
        DeleteDbInstanceRequest, DescribeBackupPolicyRequest, DescribeBackupPolicyResponse,
        DescribeDbInstanceAttributeRequest, DescribeSecurityIpsRequest, ModifyBackupPolicyRequest,
        ModifyDbInstanceDescriptionRequest, ModifyDbInstanceMaintainTimeRequest,
        ModifyDbInstanceSpecRequest, ModifySecurityIpsRequest, ResetAccountPasswordRequest,
    },
};

use super::ROOT_ACCOUNT;

// -----------------------------------------------------------------------------
// Constants

/// Ip groups flagged with this attribute are managed by the vendor and are
/// not part of the user facing allow list
pub const HIDDEN_GROUP_ATTRIBUTE: &str = "hidden";

// -----------------------------------------------------------------------------
// MongoDbService structure

pub struct MongoDbService<A> {
    api: A,
}

impl<A> MongoDbService<A>
where
    A: DdsApi + Send + Sync,
{
    pub fn new(api: A) -> Self {
        Self { api }
    }

    /// Fetch the instance, `None` once the remote api does not know it
    pub async fn describe_instance(&self, id: &str) -> Result<Option<DbInstance>, Error> {
        let request = DescribeDbInstanceAttributeRequest {
            db_instance_id: id.to_string(),
        };

        match self.api.describe_db_instance_attribute(&request).await {
            Ok(response) => Ok(response.db_instances.db_instance.into_iter().next()),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Fetch the current status of the instance, `None` once it is gone
    pub async fn status(&self, id: &str) -> Result<Option<String>, Error> {
        Ok(self
            .describe_instance(id)
            .await?
            .map(|instance| instance.db_instance_status))
    }

    pub async fn describe_backup_policy(
        &self,
        id: &str,
    ) -> Result<DescribeBackupPolicyResponse, Error> {
        let request = DescribeBackupPolicyRequest {
            db_instance_id: id.to_string(),
        };

        self.api.describe_backup_policy(&request).await
    }

    /// Fetch the allowed ip list, skipping the groups managed by the vendor
    /// and deduplicating entries while preserving their order
    pub async fn security_ips(&self, id: &str) -> Result<Vec<String>, Error> {
        let request = DescribeSecurityIpsRequest {
            db_instance_id: id.to_string(),
        };

        let response = self.api.describe_security_ips(&request).await?;

        let mut ips = Vec::new();
        for group in response.security_ip_groups.security_ip_group {
            if HIDDEN_GROUP_ATTRIBUTE == group.security_ip_group_attribute {
                continue;
            }

            for ip in group.security_ip_list.split(',') {
                let ip = ip.trim();
                if !ip.is_empty() && !ips.iter().any(|known| known == ip) {
                    ips.push(ip.to_string());
                }
            }
        }

        Ok(ips)
    }

    pub async fn create(
        &self,
        request: &CreateDbInstanceRequest,
    ) -> Result<CreateDbInstanceResponse, Error> {
        self.api.create_db_instance(request).await
    }

    pub async fn modify_backup_policy(
        &self,
        id: &str,
        backup_time: &str,
        backup_period: &[String],
    ) -> Result<(), Error> {
        let request = ModifyBackupPolicyRequest {
            db_instance_id: id.to_string(),
            preferred_backup_time: backup_time.to_string(),
            preferred_backup_period: backup_period.join(","),
        };

        let response = self.api.modify_backup_policy(&request).await?;

        debug!(request = response.request_id, "Backup policy modified");
        Ok(())
    }

    pub async fn modify_maintain_time(
        &self,
        id: &str,
        start: &str,
        end: &str,
    ) -> Result<(), Error> {
        let request = ModifyDbInstanceMaintainTimeRequest {
            db_instance_id: id.to_string(),
            maintain_start_time: start.to_string(),
            maintain_end_time: end.to_string(),
        };

        let response = self.api.modify_db_instance_maintain_time(&request).await?;

        debug!(request = response.request_id, "Maintenance window modified");
        Ok(())
    }

    pub async fn modify_description(&self, id: &str, name: &str) -> Result<(), Error> {
        let request = ModifyDbInstanceDescriptionRequest {
            db_instance_id: id.to_string(),
            db_instance_description: name.to_string(),
        };

        let response = self.api.modify_db_instance_description(&request).await?;

        debug!(request = response.request_id, "Description modified");
        Ok(())
    }

    pub async fn modify_security_ips(&self, id: &str, ips: &str) -> Result<(), Error> {
        let request = ModifySecurityIpsRequest {
            db_instance_id: id.to_string(),
            security_ips: ips.to_string(),
        };

        let response = self.api.modify_security_ips(&request).await?;

        debug!(request = response.request_id, "Allowed ip list modified");
        Ok(())
    }

    /// Reset the credential of the administrative account
    pub async fn reset_account_password(&self, id: &str, password: &str) -> Result<(), Error> {
        let request = ResetAccountPasswordRequest {
            db_instance_id: id.to_string(),
            account_name: ROOT_ACCOUNT.to_string(),
            account_password: password.to_string(),
        };

        let response = self.api.reset_account_password(&request).await?;

        debug!(request = response.request_id, "Account password reset");
        Ok(())
    }

    pub async fn modify_spec(
        &self,
        id: &str,
        instance_class: &str,
        storage: i64,
        replication_factor: Option<i64>,
    ) -> Result<(), Error> {
        let request = ModifyDbInstanceSpecRequest {
            db_instance_id: id.to_string(),
            db_instance_class: instance_class.to_string(),
            db_instance_storage: storage.to_string(),
            replication_factor: replication_factor.map(|factor| factor.to_string()),
        };

        let response = self.api.modify_db_instance_spec(&request).await?;

        debug!(request = response.request_id, "Instance class and storage modified");
        Ok(())
    }

    pub async fn delete(&self, id: &str) -> Result<(), Error> {
        let request = DeleteDbInstanceRequest {
            db_instance_id: id.to_string(),
        };

        let response = self.api.delete_db_instance(&request).await?;

        debug!(request = response.request_id, "Instance deletion accepted");
        Ok(())
    }
}

// -----------------------------------------------------------------------------
// unit tests
