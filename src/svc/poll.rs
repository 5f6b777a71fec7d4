//! # Polling module
//!
//! This module provides a generic polling helper used to wait for a remote
//! resource to reach an expected status. The remote api only exposes
//! point-in-time reads, so asynchronous transitions are observed by fetching
//! the status on a flat cadence until it lands in the target set.

use std::{future::Future, time::Duration};

use tokio::time::{sleep, Instant};

// -----------------------------------------------------------------------------
// Constants

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(60);

// -----------------------------------------------------------------------------
// Error enumeration

#[derive(thiserror::Error, Debug)]
pub enum Error<E> {
    #[error("failed to refresh resource status, {0}")]
    Refresh(E),
    #[error("failed to reach expected status, resource is gone")]
    Gone,
    #[error("failed to reach expected status, resource reported unexpected status '{0}'")]
    UnexpectedStatus(String),
    #[error("failed to reach expected status, timed out after {0:?}, last status seen was '{1}'")]
    Timeout(Duration, String),
}

// -----------------------------------------------------------------------------
// wait_for_status function

/// Poll the given refresh closure until the resource reaches one of the
/// `target` statuses.
///
/// The closure returns `None` once the resource does not exist anymore, which
/// is a success, if and only if the target set is empty. A status outside of
/// both the `pending` and `target` sets aborts the wait immediately.
pub async fn wait_for_status<F, Fut, E>(
    mut refresh: F,
    pending: &[&str],
    target: &[&str],
    timeout: Duration,
    interval: Duration,
) -> Result<(), Error<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<String>, E>>,
{
    let deadline = Instant::now() + timeout;
    let mut last_seen = String::new();

    loop {
        match refresh().await.map_err(Error::Refresh)? {
            None => {
                if target.is_empty() {
                    return Ok(());
                }

                return Err(Error::Gone);
            }
            Some(status) => {
                if target.contains(&status.as_str()) {
                    return Ok(());
                }

                if !pending.contains(&status.as_str()) {
                    return Err(Error::UnexpectedStatus(status));
                }

                last_seen = status;
            }
        }

        if deadline <= Instant::now() {
            return Err(Error::Timeout(timeout, last_seen));
        }

        sleep(interval).await;
    }
}

// -----------------------------------------------------------------------------
// unit tests
