//! # Services module
//!
//! This module provide services to interact with the cloud provider api and
//! helpers to reconcile managed instances.
pub mod aliyun;
pub mod cfg;
pub mod mongodb;
pub mod poll;
pub mod resource;
