use std::{net::SocketAddr, path::PathBuf, str::FromStr};

use crate::graph::{DEFAULT_MAX_CONNECTIONS, DEFAULT_MAX_CONNECTION_RADIUS_M, GraphBuilderConfig};

pub const DEFAULT_DATASET_PATH: &str = "backend/data/sample_dataset.json";
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
pub const DEFAULT_GRAPH_CACHE_CAPACITY: usize = 16;
pub const DEFAULT_MAX_CUSTOM_NODES: usize = 5_000;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {name}: {value:?}")]
    Invalid { name: &'static str, value: String },
}

/// Server settings, read from the environment.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub dataset_path: PathBuf,
    pub bind_addr: SocketAddr,
    pub graph: GraphBuilderConfig,
    pub graph_cache_capacity: usize,
    /// Node cap for posted graphs.
    pub max_custom_nodes: usize,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Unset variables fall back to defaults, malformed ones are rejected.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let dataset_path = lookup("DATASET_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATASET_PATH));

        let bind_addr: SocketAddr = parse_value(
            "BIND_ADDR",
            lookup("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
        )?;

        let max_connection_radius_m: f64 = match lookup("MAX_CONNECTION_RADIUS_M") {
            Some(value) => parse_value("MAX_CONNECTION_RADIUS_M", value)?,
            None => DEFAULT_MAX_CONNECTION_RADIUS_M,
        };
        if !max_connection_radius_m.is_finite() || max_connection_radius_m < 0.0 {
            return Err(ConfigError::Invalid {
                name: "MAX_CONNECTION_RADIUS_M",
                value: max_connection_radius_m.to_string(),
            });
        }

        let max_connections = match lookup("MAX_CONNECTIONS") {
            Some(value) => parse_value("MAX_CONNECTIONS", value)?,
            None => DEFAULT_MAX_CONNECTIONS,
        };

        let graph_cache_capacity = match lookup("GRAPH_CACHE_CAPACITY") {
            Some(value) => parse_value("GRAPH_CACHE_CAPACITY", value)?,
            None => DEFAULT_GRAPH_CACHE_CAPACITY,
        };

        let max_custom_nodes = match lookup("MAX_CUSTOM_NODES") {
            Some(value) => parse_value("MAX_CUSTOM_NODES", value)?,
            None => DEFAULT_MAX_CUSTOM_NODES,
        };

        Ok(Self {
            dataset_path,
            bind_addr,
            graph: GraphBuilderConfig {
                max_connection_radius_m,
                max_connections,
            },
            graph_cache_capacity,
            max_custom_nodes,
        })
    }
}

fn parse_value<T: FromStr>(name: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Invalid { name, value })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.dataset_path, PathBuf::from(DEFAULT_DATASET_PATH));
        assert_eq!(config.bind_addr, DEFAULT_BIND_ADDR.parse().unwrap());
        assert_eq!(config.graph, GraphBuilderConfig::default());
        assert_eq!(config.graph_cache_capacity, DEFAULT_GRAPH_CACHE_CAPACITY);
        assert_eq!(config.max_custom_nodes, DEFAULT_MAX_CUSTOM_NODES);
    }

    #[test]
    fn overrides_are_applied() {
        let config = config_from(&[
            ("DATASET_PATH", "/data/culiacan.json"),
            ("BIND_ADDR", "127.0.0.1:3000"),
            ("MAX_CONNECTION_RADIUS_M", "250.5"),
            ("MAX_CONNECTIONS", " 3 "),
            ("GRAPH_CACHE_CAPACITY", "2"),
            ("MAX_CUSTOM_NODES", "800"),
        ])
        .unwrap();

        assert_eq!(config.dataset_path, PathBuf::from("/data/culiacan.json"));
        assert_eq!(config.bind_addr.port(), 3000);
        assert_eq!(config.graph.max_connection_radius_m, 250.5);
        assert_eq!(config.graph.max_connections, 3);
        assert_eq!(config.graph_cache_capacity, 2);
        assert_eq!(config.max_custom_nodes, 800);
    }

    #[test]
    fn malformed_values_are_rejected() {
        let err = config_from(&[("MAX_CONNECTIONS", "four")]).unwrap_err();
        assert_eq!(
            err,
            ConfigError::Invalid {
                name: "MAX_CONNECTIONS",
                value: "four".to_string()
            }
        );

        assert!(config_from(&[("BIND_ADDR", "localhost")]).is_err());
        assert!(config_from(&[("MAX_CONNECTION_RADIUS_M", "-5")]).is_err());
        assert!(config_from(&[("MAX_CONNECTION_RADIUS_M", "NaN")]).is_err());
    }
}
