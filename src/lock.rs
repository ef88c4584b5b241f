//! Best-effort distributed locking on top of an object store
//!
//! A lock on logical key `k` is the object `<prefix>/k.lock`. Its content is
//! an informational timestamp; only the store-assigned modification time
//! decides whether the lock is still held. A lock older than the expiration
//! window is considered abandoned and may be overwritten by the next
//! acquirer, so a crashed holder never blocks others for longer than that.
//!
//! Acquisition is check-then-write: the store has no atomic create-if-absent,
//! so two contenders that both see "no lock" will both write it and both
//! return success. Callers get reduced, not eliminated, write collisions.
//!
//! ```text
//!            ┌────────────── sleep(poll) ◄──────────────┐
//!            ▼                                          │
//!   cancelled? ──yes──► Cancelled                        │
//!            │ no                                       │
//!   HEAD lock ──error──► Backend error                   │
//!            │                                          │
//!   fresh? ──yes──► timed out? ──yes──► LockTimeout(Held)│
//!            │ no                  └──no────────────────┤
//!   PUT lock ──ok──► acquired                           │
//!            └──error──► timed out? ──yes──► LockTimeout(WriteFailed)
//!                             └──no─────────────────────┘
//! ```

use crate::backend::ObjectStore;
use crate::common::{timestamp_now, Contention, Error, KeyMapper, LockConfig, Result};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// What a probe of the lock object found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LockState {
    Free,
    Stale,
    Held(DateTime<Utc>),
}

/// Acquires and releases locks for logical keys
#[derive(Clone)]
pub struct LockManager {
    store: Arc<dyn ObjectStore>,
    keys: KeyMapper,
    config: LockConfig,
}

impl LockManager {
    pub fn new(store: Arc<dyn ObjectStore>, keys: KeyMapper, config: LockConfig) -> Self {
        Self {
            store,
            keys,
            config,
        }
    }

    pub fn config(&self) -> &LockConfig {
        &self.config
    }

    /// Acquire the lock for `key`, polling until it is free or stale.
    ///
    /// Fails with [`Error::LockTimeout`] once the acquisition timeout has
    /// passed, wrapping either the holder's lock time or the last write
    /// failure, and with [`Error::Cancelled`] as soon as `cancel` fires.
    pub async fn acquire(&self, key: &str, cancel: &CancellationToken) -> Result<()> {
        let lock_key = self.keys.lock_key(key);
        tracing::debug!("Attempting to lock {} ({})", key, lock_key);
        let started = Instant::now();

        loop {
            if cancel.is_cancelled() {
                tracing::debug!("Lock attempt for {} cancelled", key);
                return Err(Error::Cancelled {
                    key: key.to_string(),
                });
            }

            match self.probe(key, &lock_key).await? {
                LockState::Held(last_modified) => {
                    tracing::debug!(
                        "Lock for {} exists and is active (modified {})",
                        key,
                        last_modified
                    );
                    if started.elapsed() > self.config.timeout() {
                        return Err(Error::LockTimeout {
                            key: key.to_string(),
                            source: Contention::Held { last_modified },
                        });
                    }
                }
                state => {
                    if state == LockState::Stale {
                        tracing::debug!("Lock for {} is expired, attempting to overwrite", key);
                    } else {
                        tracing::debug!("Lock for {} does not exist, attempting to create", key);
                    }

                    let content = Bytes::from(timestamp_now());
                    let len = content.len() as u64;
                    match self.store.put(&lock_key, content, len).await {
                        Ok(()) => {
                            tracing::info!("Lock acquired for {}", key);
                            return Ok(());
                        }
                        Err(e) => {
                            tracing::error!("Failed to put lock file for {}, retrying: {}", key, e);
                            if started.elapsed() > self.config.timeout() {
                                return Err(Error::LockTimeout {
                                    key: key.to_string(),
                                    source: Contention::WriteFailed(e),
                                });
                            }
                        }
                    }
                }
            }

            self.pause(key, cancel).await?;
        }
    }

    /// Release the lock for `key`. Releasing a lock that is already gone is
    /// not an error.
    pub async fn release(&self, key: &str) -> Result<()> {
        let lock_key = self.keys.lock_key(key);
        tracing::debug!("Unlocking {} ({})", key, lock_key);

        match self.store.delete(&lock_key).await {
            Ok(()) => {
                tracing::info!("Lock released for {}", key);
                Ok(())
            }
            Err(e) if e.is_not_found() => {
                tracing::debug!(
                    "Lock file for {} not found on unlock, already released or never existed",
                    key
                );
                Ok(())
            }
            Err(e) => Err(Error::backend("unlocking", key, e)),
        }
    }

    async fn probe(&self, key: &str, lock_key: &str) -> Result<LockState> {
        match self.store.head(lock_key).await {
            Ok(meta) => match meta.last_modified {
                Some(last_modified) if self.is_fresh(last_modified) => {
                    Ok(LockState::Held(last_modified))
                }
                _ => Ok(LockState::Stale),
            },
            Err(e) if e.is_not_found() => Ok(LockState::Free),
            Err(e) => Err(Error::backend("checking lock for", key, e)),
        }
    }

    /// A lock modified in the future (clock skew) counts as fresh
    fn is_fresh(&self, last_modified: DateTime<Utc>) -> bool {
        let age = Utc::now()
            .signed_duration_since(last_modified)
            .to_std()
            .unwrap_or_default();
        age < self.config.expiration()
    }

    /// Sleep one poll interval, waking early on cancellation
    async fn pause(&self, key: &str, cancel: &CancellationToken) -> Result<()> {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::debug!("Lock attempt for {} cancelled while waiting", key);
                Err(Error::Cancelled { key: key.to_string() })
            }
            _ = tokio::time::sleep(self.config.poll_interval()) => Ok(()),
        }
    }
}
