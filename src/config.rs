use std::{
    collections::BTreeMap,
    env::VarError,
    path::{Path, PathBuf},
};

use tracing::{debug, info, warn};

use crate::ProvisionError;

pub const SERVER_IP_KEY: &str = "SERVER_IP";
pub const SERVER_PORT_KEY: &str = "SERVER_PORT";
pub const DOCKER_EXPOSED_PORT_KEY: &str = "DOCKER_EXPOSED_PORT";

/// A key/value source of configuration. An absent key is `Ok(None)`, never an
/// error.
pub trait ConfigSource {
    fn get(&self, key: &str) -> Result<Option<String>, ProvisionError>;
}

/// The process environment layered over the variables of an env file. Like
/// dotenv, a variable already present in the process environment is never
/// overridden by the file, even if it is empty.
///
/// Loading does not modify the process environment.
#[derive(Debug, Clone, Default)]
pub struct EnvSource {
    /// The env file that was loaded, if any was found
    pub path: Option<PathBuf>,
    file_vars: BTreeMap<String, String>,
}

impl EnvSource {
    /// If `env_file` is `None`, this searches for a `.env` file in the current
    /// directory and its parents, and a missing file just means only the
    /// process environment is used. An explicit `env_file` must exist.
    pub fn load(env_file: Option<&Path>) -> Result<Self, ProvisionError> {
        match env_file {
            Some(path) => {
                let iter =
                    dotenvy::from_path_iter(path).map_err(|source| ProvisionError::EnvFile {
                        path: path.to_owned(),
                        source,
                    })?;
                let file_vars = collect_vars(iter, path)?;
                info!("loaded env file {path:?}");
                Ok(Self {
                    path: Some(path.to_owned()),
                    file_vars,
                })
            }
            None => match dotenvy::dotenv_iter() {
                Ok(iter) => {
                    let path = find_dotenv().unwrap_or_else(|| PathBuf::from(".env"));
                    let file_vars = collect_vars(iter, &path)?;
                    info!("loaded env file {path:?}");
                    Ok(Self {
                        path: Some(path),
                        file_vars,
                    })
                }
                Err(e) if e.not_found() => {
                    warn!("no .env file found, using only the process environment");
                    Ok(Self::default())
                }
                Err(source) => Err(ProvisionError::EnvFile {
                    path: PathBuf::from(".env"),
                    source,
                }),
            },
        }
    }
}

fn collect_vars<R: std::io::Read>(
    iter: dotenvy::Iter<R>,
    path: &Path,
) -> Result<BTreeMap<String, String>, ProvisionError> {
    let mut vars = BTreeMap::new();
    for item in iter {
        let (key, val) = item.map_err(|source| ProvisionError::EnvFile {
            path: path.to_owned(),
            source,
        })?;
        vars.insert(key, val);
    }
    Ok(vars)
}

/// Finds the `.env` file the way `dotenvy::dotenv_iter` does, only used for
/// reporting which file was loaded
fn find_dotenv() -> Option<PathBuf> {
    let mut dir = std::env::current_dir().ok()?;
    loop {
        let candidate = dir.join(".env");
        if candidate.is_file() {
            return Some(candidate)
        }
        if !dir.pop() {
            return None
        }
    }
}

impl ConfigSource for EnvSource {
    /// Values that are not valid unicode are rejected rather than passed on
    /// to the container tool altered
    fn get(&self, key: &str) -> Result<Option<String>, ProvisionError> {
        match std::env::var(key) {
            Ok(val) => Ok(Some(val)),
            Err(VarError::NotPresent) => Ok(self.file_vars.get(key).cloned()),
            Err(VarError::NotUnicode(_)) => Err(ProvisionError::NotUnicode {
                key: key.to_owned(),
            }),
        }
    }
}

/// An in-memory source
#[derive(Debug, Clone, Default)]
pub struct MapSource(pub BTreeMap<String, String>);

impl MapSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, val: impl Into<String>) -> Self {
        self.0.insert(key.into(), val.into());
        self
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for MapSource {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl ConfigSource for MapSource {
    fn get(&self, key: &str) -> Result<Option<String>, ProvisionError> {
        Ok(self.0.get(key).cloned())
    }
}

/// The network parameters of the provisioned container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionConfig {
    /// `SERVER_IP`, the host side address
    pub host_address: String,
    /// `SERVER_PORT`, the host side port
    pub host_port: String,
    /// `DOCKER_EXPOSED_PORT`, the container side port. This is not required,
    /// but the port mapping uses it regardless.
    pub container_port: Option<String>,
}

impl ProvisionConfig {
    /// Reads the three values from `source`. Fails with
    /// [ProvisionError::Configuration] naming every missing key if the host
    /// address or host port is absent or empty, or with the error of the
    /// source if a value cannot be read.
    pub fn from_source(source: &impl ConfigSource) -> Result<Self, ProvisionError> {
        let get = |key: &str| {
            source
                .get(key)
                .map(|val| val.filter(|val| !val.is_empty()))
        };
        let host_address = get(SERVER_IP_KEY)?;
        let host_port = get(SERVER_PORT_KEY)?;
        let container_port = get(DOCKER_EXPOSED_PORT_KEY)?;
        let (host_address, host_port) = match (host_address, host_port) {
            (Some(host_address), Some(host_port)) => (host_address, host_port),
            (host_address, host_port) => {
                let mut missing = vec![];
                if host_address.is_none() {
                    missing.push(SERVER_IP_KEY);
                }
                if host_port.is_none() {
                    missing.push(SERVER_PORT_KEY);
                }
                return Err(ProvisionError::Configuration { missing })
            }
        };
        debug!("found {SERVER_IP_KEY} = {host_address}, {SERVER_PORT_KEY} = {host_port}");
        if container_port.is_none() {
            warn!("{DOCKER_EXPOSED_PORT_KEY} is not set, the port mapping has no container side");
        }
        Ok(Self {
            host_address,
            host_port,
            container_port,
        })
    }

    /// The `-p` argument of the run command,
    /// `host_address:host_port:container_port`
    pub fn port_mapping(&self) -> String {
        format!(
            "{}:{}:{}",
            self.host_address,
            self.host_port,
            self.container_port.as_deref().unwrap_or_default()
        )
    }
}
