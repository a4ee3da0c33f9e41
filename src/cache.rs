use crate::Response;

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use sha2::{Digest, Sha256};

/// Storage for responses of deterministic runs.
///
/// A miss is `Ok(None)`; errors are reserved for a broken store.
#[async_trait]
pub trait ResponseCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Response>>;

    async fn set(&self, key: &str, response: &Response) -> Result<()>;
}

/// Key under which the response for `body` is stored.
///
/// The toolchain version is part of the key so an upgrade never replays
/// results of the previous compiler.
pub fn cache_key(operation: &str, version: &str, body: &str) -> String {
    let digest = Sha256::digest(body.as_bytes());
    format!("{}-{}-{:x}", operation, version, digest)
}

/// Never stores anything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopCache;

#[async_trait]
impl ResponseCache for NoopCache {
    async fn get(&self, _key: &str) -> Result<Option<Response>> {
        Ok(None)
    }

    async fn set(&self, _key: &str, _response: &Response) -> Result<()> {
        Ok(())
    }
}

/// In-process cache holding at most `capacity` responses. The oldest
/// entry is evicted first.
#[derive(Debug)]
pub struct MemoryCache {
    capacity: usize,
    inner: Mutex<Entries>,
}

#[derive(Debug, Default)]
struct Entries {
    map: HashMap<String, Response>,
    order: VecDeque<String>,
}

impl MemoryCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            inner: Mutex::new(Entries::default()),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map_or(0, |entries| entries.map.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ResponseCache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<Response>> {
        let entries = self.inner.lock().map_err(|_| anyhow!("cache lock poisoned"))?;
        Ok(entries.map.get(key).cloned())
    }

    async fn set(&self, key: &str, response: &Response) -> Result<()> {
        if self.capacity == 0 {
            return Ok(());
        }
        let mut entries = self.inner.lock().map_err(|_| anyhow!("cache lock poisoned"))?;
        let Entries { map, order } = &mut *entries;

        // Last writer wins; the entry keeps its place in the eviction order.
        if map.insert(key.to_owned(), response.clone()).is_none() {
            order.push_back(key.to_owned());
        }
        while map.len() > self.capacity {
            match order.pop_front() {
                Some(oldest) => {
                    map.remove(&oldest);
                }
                None => break,
            }
        }
        Ok(())
    }
}
