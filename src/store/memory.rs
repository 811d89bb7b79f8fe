//! JSON-file-backed host store held in memory.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use macaddr::MacAddr6;
use tokio::sync::RwLock;
use tracing::info;

use crate::domain::{Host, HostLookup};
use crate::error::ConfigError;

#[derive(Debug, Default)]
struct HostIndex {
    by_mac: HashMap<MacAddr6, Arc<Host>>,
    hosts: usize,
}

impl HostIndex {
    fn build(hosts: Vec<Host>) -> Result<Self, ConfigError> {
        let mut by_mac = HashMap::new();
        let count = hosts.len();
        for host in hosts {
            let host = Arc::new(host);
            for nic in &host.interfaces {
                if let Some(existing) = by_mac.insert(nic.mac, host.clone()) {
                    return Err(ConfigError::Invalid(format!(
                        "MAC {} claimed by both {} and {}",
                        nic.mac, existing.name, host.name
                    )));
                }
            }
        }
        Ok(Self {
            by_mac,
            hosts: count,
        })
    }
}

/// Hosts indexed by interface MAC. Reads take a snapshot under a shared lock.
#[derive(Debug)]
pub struct HostStore {
    path: PathBuf,
    index: RwLock<HostIndex>,
}

impl HostStore {
    /// Load from a JSON array of hosts. A missing file is an empty store.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let index = HostIndex::build(read_hosts(path)?)?;
        info!(path = %path.display(), hosts = index.hosts, "Loaded host records");
        Ok(Self {
            path: path.to_path_buf(),
            index: RwLock::new(index),
        })
    }

    pub fn from_hosts(hosts: Vec<Host>) -> Result<Self, ConfigError> {
        Ok(Self {
            path: PathBuf::new(),
            index: RwLock::new(HostIndex::build(hosts)?),
        })
    }

    /// Re-read the backing file. On error the current records stay in place.
    pub async fn reload(&self) -> Result<usize, ConfigError> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => Some(content),
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => return Err(e.into()),
        };
        let index = HostIndex::build(parse_hosts(content.as_deref())?)?;
        let count = index.hosts;
        *self.index.write().await = index;
        info!(path = %self.path.display(), hosts = count, "Reloaded host records");
        Ok(count)
    }

    pub async fn len(&self) -> usize {
        self.index.read().await.hosts
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

fn read_hosts(path: &Path) -> Result<Vec<Host>, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => parse_hosts(Some(&content)),
        Err(e) if e.kind() == ErrorKind::NotFound => parse_hosts(None),
        Err(e) => Err(e.into()),
    }
}

/// `None` is a missing file, which holds no hosts.
fn parse_hosts(content: Option<&str>) -> Result<Vec<Host>, ConfigError> {
    match content {
        Some(content) => Ok(serde_json::from_str(content)?),
        None => Ok(Vec::new()),
    }
}

#[async_trait]
impl HostLookup for HostStore {
    async fn find_by_mac(&self, mac: MacAddr6) -> Option<Host> {
        self.index
            .read()
            .await
            .by_mac
            .get(&mac)
            .map(|host| host.as_ref().clone())
    }
}
