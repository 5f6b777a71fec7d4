//! # Destroy module
//!
//! This module provides the destroy command line interface function
//! implementation, which deletes the remote instance

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
    #[error("failed to delete the instance, {0}")]
    Delete(mongodb::Error),
}

// -----------------------------------------------------------------------------
// Destroy structure

#[derive(clap::Args, Clone, Debug)]
pub struct Destroy {
    /// Specify location of the descriptor
    #[arg(short = 'f', long = "file")]
    pub file: PathBuf,
}

#[async_trait]
impl Executor for Destroy {
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

        let outcome = reconciler.delete(&mut descriptor).await;

        // a cleared identity must not be replayed on the next pass
        descriptor
            .write_to(&self.file)
            .await
            .map_err(Error::Descriptor)?;

        outcome.map_err(Error::Delete)?;

        info!(
            file = self.file.display().to_string(),
            "Instance is destroyed"
        );

        Ok(())
    }
}
