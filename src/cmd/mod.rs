//! # Command module
//!
//! This module provides command line interface structures and helpers

use std::{path::PathBuf, sync::Arc};

use async_trait::async_trait;
use clap::{ArgAction, Parser, Subcommand};

use crate::svc::cfg::Configuration;

pub mod apply;
pub mod destroy;
pub mod import;
pub mod schema;

// -----------------------------------------------------------------------------
// Executor trait

#[async_trait]
pub trait Executor {
    type Error;

    async fn execute(&self, config: Arc<Configuration>) -> Result<(), Self::Error>;
}

// -----------------------------------------------------------------------------
// Error enumeration

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("failed to execute command, {0}")]
    Apply(apply::Error),
    #[error("failed to execute command, {0}")]
    Destroy(destroy::Error),
    #[error("failed to execute command, {0}")]
    Import(import::Error),
    #[error("failed to execute command, {0}")]
    Schema(schema::Error),
    #[error("failed to execute command, no command was given")]
    MissingCommand,
}

// -----------------------------------------------------------------------------
// Command enumeration

#[derive(Subcommand, Clone, Debug)]
pub enum Command {
    /// Create the instance or drive it towards the descriptor
    Apply(apply::Apply),
    /// Delete the instance and forget its identity
    Destroy(destroy::Destroy),
    /// Adopt an instance created outside of the descriptor
    Import(import::Import),
    /// Interact with the descriptor schema
    #[command(subcommand)]
    Schema(schema::Schema),
}

#[async_trait]
impl Executor for Command {
    type Error = Error;

    async fn execute(&self, config: Arc<Configuration>) -> Result<(), Self::Error> {
        match self {
            Self::Apply(apply) => apply.execute(config).await.map_err(Error::Apply),
            Self::Destroy(destroy) => destroy.execute(config).await.map_err(Error::Destroy),
            Self::Import(import) => import.execute(config).await.map_err(Error::Import),
            Self::Schema(schema) => schema.execute(config).await.map_err(Error::Schema),
        }
    }
}

// -----------------------------------------------------------------------------
// Args structure

#[derive(Parser, Clone, Debug)]
#[command(version, about = env!("CARGO_PKG_DESCRIPTION"))]
pub struct Args {
    /// Increase log verbosity
    #[arg(short = 'v', long = "verbose", global = true, action = ArgAction::Count)]
    pub verbosity: u8,
    /// Specify location of configuration
    #[arg(short = 'c', long = "config", global = true)]
    pub config: Option<PathBuf>,
    /// Check if configuration is healthy
    #[arg(short = 't', long = "check", global = true)]
    pub check: bool,
    #[command(subcommand)]
    pub command: Option<Command>,
}
