//! # Import module
//!
//! This module provides the import command line interface function
//! implementation, which adopts an already existing instance

use std::{path::PathBuf, sync::Arc};

use async_trait::async_trait;
use tracing::info;

use crate::{
    cmd::Executor,
    svc::{
        aliyun::client::Client,
        cfg::Configuration,
        mongodb::{self, instance::Reconciler},
        resource::{self, Descriptor},
    },
};

// -----------------------------------------------------------------------------
// Error enumeration

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("failed to interact with the descriptor, {0}")]
    Descriptor(resource::Error),
    #[error("failed to import the instance, {0}")]
    Import(mongodb::Error),
}

// -----------------------------------------------------------------------------
// Import structure

#[derive(clap::Args, Clone, Debug)]
pub struct Import {
    /// Specify location of the descriptor
    #[arg(short = 'f', long = "file")]
    pub file: PathBuf,
    /// Identifier of the instance to adopt
    #[arg(value_name = "instance-id")]
    pub instance_id: String,
}

#[async_trait]
impl Executor for Import {
    type Error = Error;

    #[cfg_attr(feature = "trace", tracing::instrument(skip(config)))]
    async fn execute(&self, config: Arc<Configuration>) -> Result<(), Self::Error> {
        let mut descriptor = Descriptor::read_from(&self.file)
            .await
            .map_err(Error::Descriptor)?;

        let client = Client::from(config.as_ref());
        let reconciler = Reconciler::new(
            client.clone(),
            client.clone(),
            client,
            &config.api.region,
        );

        reconciler
            .import(&mut descriptor, &self.instance_id)
            .await
            .map_err(Error::Import)?;

        descriptor
            .write_to(&self.file)
            .await
            .map_err(Error::Descriptor)?;

        info!(
            file = self.file.display().to_string(),
            identifier = self.instance_id,
            "Instance is imported"
        );

        Ok(())
    }
}
