//! Boot-time retrieval of the envelope-encryption data key.

use std::thread;
use std::time::Duration;

use rusqlite::Connection;

use crate::crypto::DataKey;
use crate::db::{DbPool, queries};
use crate::error::Result;
use crate::kms::KeyManagementClient;

pub const DEFAULT_RETRY_COUNT: u32 = 3;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(5);

pub struct DataKeyProvider<'a> {
    kms: &'a dyn KeyManagementClient,
    retry_count: u32,
    retry_delay: Duration,
}

impl<'a> DataKeyProvider<'a> {
    pub fn new(kms: &'a dyn KeyManagementClient) -> Self {
        Self {
            kms,
            retry_count: DEFAULT_RETRY_COUNT,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }

    /// `retry_count` is the total number of attempts, at least one.
    pub fn with_retry(mut self, retry_count: u32, retry_delay: Duration) -> Self {
        self.retry_count = retry_count.max(1);
        self.retry_delay = retry_delay;
        self
    }

    /// Unwrap the stored data key. `None` when no key has been created yet.
    pub fn get_data_key(&self, conn: &Connection) -> Result<Option<DataKey>> {
        match queries::get_data_key(conn)? {
            Some(encrypted) => Ok(Some(self.kms.decrypt_data_key(&encrypted)?)),
            None => Ok(None),
        }
    }

    /// Mint a key and persist only its wrapped form.
    pub fn create_data_key(&self, conn: &Connection) -> Result<DataKey> {
        let (key, wrapped) = self.kms.create_data_key()?;
        match queries::create_data_key(conn, &wrapped) {
            Ok(()) => {
                tracing::info!("Created new data key");
                Ok(key)
            }
            // Another instance won the race; use its key.
            Err(e) if e.is_unique_violation() => match self.get_data_key(conn)? {
                Some(existing) => Ok(existing),
                None => Err(e),
            },
            Err(e) => Err(e),
        }
    }

    /// Blocks the calling thread between attempts. Only failures while reading
    /// an existing key are retried; creating a missing key is attempted once.
    pub fn get_or_create_data_key(&self, pool: &DbPool) -> Result<DataKey> {
        let mut attempt = 1;
        loop {
            let fetched = pool
                .get()
                .map_err(Into::into)
                .and_then(|conn| self.get_data_key(&conn).map(|key| (conn, key)));

            match fetched {
                Ok((_, Some(key))) => {
                    tracing::info!("Loaded existing data key");
                    return Ok(key);
                }
                Ok((conn, None)) => return self.create_data_key(&conn),
                Err(e) if attempt < self.retry_count => {
                    tracing::warn!(
                        "Failed to get data key (attempt {}/{}): {}",
                        attempt,
                        self.retry_count,
                        e
                    );
                    attempt += 1;
                    thread::sleep(self.retry_delay);
                }
                Err(e) => {
                    tracing::error!(
                        "Giving up on data key after {} attempt(s): {}",
                        attempt,
                        e
                    );
                    return Err(e);
                }
            }
        }
    }
}
