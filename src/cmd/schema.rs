//! # Schema module
//!
//! This module provides the schema command line interface function
//! implementation, which dumps the json schema of the descriptor

use std::sync::Arc;

use async_trait::async_trait;
use clap::Subcommand;
use schemars::schema_for;

use crate::{
    cmd::Executor,
    svc::{cfg::Configuration, resource::Descriptor},
};

// -----------------------------------------------------------------------------
// Error enumeration

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("failed to serialize the descriptor schema, {0}")]
    Serialize(serde_yaml::Error),
}

// -----------------------------------------------------------------------------
// Schema enumeration

#[derive(Subcommand, Clone, Debug)]
pub enum Schema {
    /// View the descriptor schema
    #[command(name = "view", aliases = &["v"])]
    View,
}

#[async_trait]
impl Executor for Schema {
    type Error = Error;

    #[cfg_attr(feature = "trace", tracing::instrument(skip(config)))]
    async fn execute(&self, config: Arc<Configuration>) -> Result<(), Self::Error> {
        match self {
            Self::View => view(config).await,
        }
    }
}

// -----------------------------------------------------------------------------
// view function

#[cfg_attr(feature = "trace", tracing::instrument(skip(_config)))]
pub async fn view(_config: Arc<Configuration>) -> Result<(), Error> {
    let schema = schema_for!(Descriptor);
    let schema = serde_yaml::to_string(&schema).map_err(Error::Serialize)?;

    print!("{schema}");
    Ok(())
}
