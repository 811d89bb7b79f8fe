use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::endpoints::EndpointBuilder;
use crate::error::ConfigError;

pub const DEFAULT_CONFIG_PATH: &str = "/etc/pxeward.conf";
const DEFAULT_HOSTS_FILE: &str = "/var/lib/pxeward/hosts.json";
const DEFAULT_LEASE_TIME: u32 = 86400;
const DEFAULT_MTU: u16 = 1500;
const DEFAULT_HTTP_PORT: u16 = 80;
const DEFAULT_SHUTDOWN_GRACE_MS: u64 = 5000;
const ENV_PREFIX: &str = "PXEWARD_";
const SECRET_ENV: &str = "PXEWARD_TOKEN_SECRET";

/// Every key the config file accepts; each may be overridden by `PXEWARD_<KEY>`.
const KEYS: &[&str] = &[
    "interfaces",
    "proxy_only",
    "pxe_listener",
    "lease_time",
    "default_mtu",
    "http_scheme",
    "http_port",
    "dns_servers",
    "domain_search",
    "hosts_file",
    "token_secret_file",
    "log_level",
    "shutdown_grace_ms",
];

/// An interface to listen on, optionally pinned to an address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceSpec {
    pub name: String,
    pub address: Option<Ipv4Addr>,
}

/// A bound interface and the address this server answers as on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceBinding {
    pub name: String,
    pub address: Ipv4Addr,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub interfaces: Vec<InterfaceSpec>,
    pub proxy_only: bool,
    pub pxe_listener: bool,
    pub lease_time: u32,
    pub default_mtu: u16,
    pub http_scheme: String,
    pub http_port: u16,
    pub dns_servers: Vec<Ipv4Addr>,
    pub domain_search: Vec<String>,
    pub hosts_file: PathBuf,
    pub token_secret_file: Option<PathBuf>,
    pub log_level: String,
    pub shutdown_grace: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            interfaces: Vec::new(),
            proxy_only: false,
            pxe_listener: false,
            lease_time: DEFAULT_LEASE_TIME,
            default_mtu: DEFAULT_MTU,
            http_scheme: "http".to_string(),
            http_port: DEFAULT_HTTP_PORT,
            dns_servers: Vec::new(),
            domain_search: Vec::new(),
            hosts_file: PathBuf::from(DEFAULT_HOSTS_FILE),
            token_secret_file: None,
            log_level: "info".to_string(),
            shutdown_grace: Duration::from_millis(DEFAULT_SHUTDOWN_GRACE_MS),
        }
    }
}

impl Config {
    /// Load from `path` if it exists, then apply environment overrides.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut config = if path.exists() {
            Self::parse(&std::fs::read_to_string(path)?)?
        } else {
            Self::default()
        };

        for key in KEYS {
            let var = format!("{}{}", ENV_PREFIX, key.to_uppercase());
            if let Ok(value) = std::env::var(&var) {
                config
                    .set(key, &value)
                    .map_err(|e| ConfigError::Invalid(format!("{}: {}", var, e)))?;
            }
        }

        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        for (lineno, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (key, value) = line.split_once('=').ok_or_else(|| {
                ConfigError::Invalid(format!("line {}: expected key = value", lineno + 1))
            })?;
            config
                .set(key.trim(), value.trim())
                .map_err(|e| ConfigError::Invalid(format!("line {}: {}", lineno + 1, e)))?;
        }
        Ok(config)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), String> {
        match key {
            "interfaces" => self.interfaces = parse_interfaces(value)?,
            "proxy_only" => self.proxy_only = parse_bool(value)?,
            "pxe_listener" => self.pxe_listener = parse_bool(value)?,
            "lease_time" => self.lease_time = parse_num(key, value)?,
            "default_mtu" => self.default_mtu = parse_num(key, value)?,
            "http_scheme" => self.http_scheme = value.to_string(),
            "http_port" => self.http_port = parse_num(key, value)?,
            "dns_servers" => {
                self.dns_servers = split_list(value)
                    .map(|s| s.parse().map_err(|_| format!("Invalid DNS server: {}", s)))
                    .collect::<Result<_, _>>()?
            }
            "domain_search" => self.domain_search = split_list(value).map(String::from).collect(),
            "hosts_file" => self.hosts_file = PathBuf::from(value),
            "token_secret_file" => self.token_secret_file = Some(PathBuf::from(value)),
            "log_level" => self.log_level = value.to_string(),
            "shutdown_grace_ms" => {
                self.shutdown_grace = Duration::from_millis(parse_num(key, value)?)
            }
            // Unknown keys are ignored so newer config files keep working.
            _ => {}
        }
        Ok(())
    }

    pub fn tracing_filter(&self) -> String {
        format!("pxeward={}", self.log_level)
    }

    pub fn endpoints(&self) -> EndpointBuilder {
        EndpointBuilder::new(self.http_scheme.clone(), self.http_port)
    }

    /// The token signing secret, from `token_secret_file` or `PXEWARD_TOKEN_SECRET`.
    pub fn token_secret(&self) -> Result<Vec<u8>, ConfigError> {
        let secret = match (&self.token_secret_file, std::env::var(SECRET_ENV)) {
            (Some(path), _) => std::fs::read_to_string(path)?.trim_end().to_string(),
            (None, Ok(value)) => value,
            (None, Err(_)) => {
                return Err(ConfigError::Invalid(format!(
                    "no token secret: set token_secret_file or {}",
                    SECRET_ENV
                )))
            }
        };
        if secret.is_empty() {
            return Err(ConfigError::Invalid("token secret is empty".to_string()));
        }
        Ok(secret.into_bytes())
    }
}

/// Per-process negotiation settings, read-only once built.
#[derive(Debug, Clone)]
pub struct ServerContext {
    /// One address per bound interface; each listener answers as its own.
    pub interfaces: Vec<InterfaceBinding>,
    pub proxy_only: bool,
    /// Combined mode: UNDI clients are answered by the port 4011 listener.
    pub pxe_listener: bool,
    pub lease_time: u32,
    pub default_mtu: u16,
    pub dns_servers: Vec<Ipv4Addr>,
    pub domain_search: Vec<String>,
    pub endpoints: EndpointBuilder,
}

impl ServerContext {
    pub fn new(config: &Config, interfaces: Vec<InterfaceBinding>) -> Self {
        Self {
            interfaces,
            proxy_only: config.proxy_only,
            pxe_listener: config.pxe_listener,
            lease_time: config.lease_time,
            default_mtu: config.default_mtu,
            dns_servers: config.dns_servers.clone(),
            domain_search: config.domain_search.clone(),
            endpoints: config.endpoints(),
        }
    }
}

impl Default for ServerContext {
    fn default() -> Self {
        Self::new(&Config::default(), Vec::new())
    }
}

fn parse_bool(value: &str) -> Result<bool, String> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        _ => Err(format!("Invalid boolean: {}", value)),
    }
}

fn parse_num<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, String> {
    value
        .parse()
        .map_err(|_| format!("Invalid {}: {}", key, value))
}

fn split_list(value: &str) -> impl Iterator<Item = &str> {
    value.split(',').map(str::trim).filter(|s| !s.is_empty())
}

fn parse_interfaces(value: &str) -> Result<Vec<InterfaceSpec>, String> {
    split_list(value)
        .map(|item| match item.split_once('=') {
            Some((name, addr)) => Ok(InterfaceSpec {
                name: name.trim().to_string(),
                address: Some(
                    addr.trim()
                        .parse()
                        .map_err(|_| format!("Invalid interface address: {}", item))?,
                ),
            }),
            None => Ok(InterfaceSpec {
                name: item.to_string(),
                address: None,
            }),
        })
        .collect()
}
