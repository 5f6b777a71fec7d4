//! # Alibaba Cloud module
//!
//! This module provides structures and helpers to interact with Alibaba
//! Cloud's rpc-style openapi gateway, one submodule per product.

pub mod client;
pub mod dds;
pub mod kms;
pub mod vpc;
