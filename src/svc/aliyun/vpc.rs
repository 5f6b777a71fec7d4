//! # Virtual private cloud module
//!
//! This module provides typed payloads and the api trait for the `vpc`
//! product, used to resolve the network placement of an instance.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::svc::aliyun::client::{Client, Error, Product};

// -----------------------------------------------------------------------------
// Actions

pub mod action {
    pub const DESCRIBE_VSWITCH_ATTRIBUTES: &str = "DescribeVSwitchAttributes";
}

// -----------------------------------------------------------------------------
// DescribeVSwitchAttributes payloads

#[derive(Serialize, PartialEq, Eq, Clone, Debug)]
pub struct DescribeVSwitchAttributesRequest {
    #[serde(rename = "VSwitchId")]
    pub vswitch_id: String,
}

#[derive(Deserialize, PartialEq, Eq, Clone, Debug, Default)]
pub struct DescribeVSwitchAttributesResponse {
    #[serde(rename = "VSwitchId", default)]
    pub vswitch_id: String,
    #[serde(rename = "ZoneId", default)]
    pub zone_id: String,
    #[serde(rename = "VpcId", default)]
    pub vpc_id: String,
}

// -----------------------------------------------------------------------------
// VpcApi trait

#[async_trait]
pub trait VpcApi {
    async fn describe_vswitch_attributes(
        &self,
        request: &DescribeVSwitchAttributesRequest,
    ) -> Result<DescribeVSwitchAttributesResponse, Error>;
}

#[async_trait]
impl VpcApi for Client {
    async fn describe_vswitch_attributes(
        &self,
        request: &DescribeVSwitchAttributesRequest,
    ) -> Result<DescribeVSwitchAttributesResponse, Error> {
        self.invoke(Product::Vpc, action::DESCRIBE_VSWITCH_ATTRIBUTES, request)
            .await
    }
}
