//! # Apply module
//!
//! This module provides the apply command line interface function
//! implementation, which reconciles the remote instance with the descriptor

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
    #[error("failed to reconcile the instance, {0}")]
    Reconcile(mongodb::Error),
}

// -----------------------------------------------------------------------------
// Apply structure

#[derive(clap::Args, Clone, Debug)]
pub struct Apply {
    /// Specify location of the descriptor
    #[arg(short = 'f', long = "file")]
    pub file: PathBuf,
}

#[async_trait]
impl Executor for Apply {
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

        let outcome = match &descriptor.id {
            None => reconciler.create(&mut descriptor).await,
            Some(_) => match reconciler.read(&mut descriptor).await {
                // the remote instance vanished, recreate it
                Ok(()) if descriptor.id.is_none() => reconciler.create(&mut descriptor).await,
                Ok(()) => reconciler.update(&mut descriptor).await,
                Err(err) => Err(err),
            },
        };

        // the identifier and the groups applied so far survive a failed pass
        descriptor
            .write_to(&self.file)
            .await
            .map_err(Error::Descriptor)?;

        outcome.map_err(Error::Reconcile)?;

        info!(
            file = self.file.display().to_string(),
            "Instance is reconciled"
        );

        Ok(())
    }
}
