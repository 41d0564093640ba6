use crate::domain::{Address, Amount, PoolConfig, BASIS_FRACTION};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_path: String,
    pub pool_address: Address,
    pub owner_address: Address,
    pub worker_address: Address,
    pub worker_fraction: Amount,
    pub deposits_enabled: bool,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

fn required<'a>(env_map: &'a HashMap<String, String>, key: &str) -> Result<&'a str, ConfigError> {
    env_map
        .get(key)
        .map(|s| s.as_str())
        .ok_or_else(|| ConfigError::MissingEnv(key.to_string()))
}

fn address(env_map: &HashMap<String, String>, key: &str) -> Result<Address, ConfigError> {
    required(env_map, key)?
        .parse::<Address>()
        .map_err(|e| ConfigError::InvalidValue(key.to_string(), e.to_string()))
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(std::env::vars().collect())
    }

    pub fn from_env_map(env_map: HashMap<String, String>) -> Result<Self, ConfigError> {
        let port = env_map
            .get("PORT")
            .map(|s| s.as_str())
            .unwrap_or("8080")
            .parse::<u16>()
            .map_err(|_| {
                ConfigError::InvalidValue("PORT".to_string(), "must be a valid u16".to_string())
            })?;

        let database_path = required(&env_map, "DATABASE_PATH")?.to_string();
        let pool_address = address(&env_map, "POOL_ADDRESS")?;
        let owner_address = address(&env_map, "OWNER_ADDRESS")?;
        let worker_address = address(&env_map, "WORKER_ADDRESS")?;

        let worker_fraction = env_map
            .get("WORKER_FRACTION")
            .map(|s| s.as_str())
            .unwrap_or("0")
            .parse::<Amount>()
            .ok()
            .filter(|f| *f <= BASIS_FRACTION)
            .ok_or_else(|| {
                ConfigError::InvalidValue(
                    "WORKER_FRACTION".to_string(),
                    format!("must be an integer between 0 and {}", BASIS_FRACTION),
                )
            })?;

        let deposits_enabled = match env_map
            .get("DEPOSITS_ENABLED")
            .map(|s| s.as_str())
            .unwrap_or("true")
        {
            "true" | "1" => true,
            "false" | "0" => false,
            other => {
                return Err(ConfigError::InvalidValue(
                    "DEPOSITS_ENABLED".to_string(),
                    format!("must be true or false, got {}", other),
                ))
            }
        };

        Ok(Config {
            port,
            database_path,
            pool_address,
            owner_address,
            worker_address,
            worker_fraction,
            deposits_enabled,
        })
    }

    pub fn pool_config(&self) -> PoolConfig {
        PoolConfig {
            address: self.pool_address.clone(),
            owner: self.owner_address.clone(),
            worker: self.worker_address.clone(),
            worker_fraction: self.worker_fraction,
            deposits_enabled: self.deposits_enabled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_required_env() -> HashMap<String, String> {
        let mut map = HashMap::new();
        map.insert("DATABASE_PATH".to_string(), "/tmp/test.db".to_string());
        map.insert(
            "POOL_ADDRESS".to_string(),
            "0x0101010101010101010101010101010101010101".to_string(),
        );
        map.insert(
            "OWNER_ADDRESS".to_string(),
            "0x0202020202020202020202020202020202020202".to_string(),
        );
        map.insert(
            "WORKER_ADDRESS".to_string(),
            "0x0303030303030303030303030303030303030303".to_string(),
        );
        map
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_env_map(setup_required_env()).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.worker_fraction, 0);
        assert!(config.deposits_enabled);
        assert_eq!(config.pool_config().owner, Address::from_bytes([2; 20]));
    }

    #[test]
    fn test_missing_database_path() {
        let mut env_map = setup_required_env();
        env_map.remove("DATABASE_PATH");
        let result = Config::from_env_map(env_map);
        match result {
            Err(ConfigError::MissingEnv(s)) => assert_eq!(s, "DATABASE_PATH"),
            _ => panic!("Expected MissingEnv error"),
        }
    }

    #[test]
    fn test_missing_worker_address() {
        let mut env_map = setup_required_env();
        env_map.remove("WORKER_ADDRESS");
        let result = Config::from_env_map(env_map);
        match result {
            Err(ConfigError::MissingEnv(s)) => assert_eq!(s, "WORKER_ADDRESS"),
            _ => panic!("Expected MissingEnv error"),
        }
    }

    #[test]
    fn test_invalid_pool_address() {
        let mut env_map = setup_required_env();
        env_map.insert("POOL_ADDRESS".to_string(), "0x123".to_string());
        let result = Config::from_env_map(env_map);
        match result {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "POOL_ADDRESS"),
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn test_invalid_port() {
        let mut env_map = setup_required_env();
        env_map.insert("PORT".to_string(), "not_a_number".to_string());
        let result = Config::from_env_map(env_map);
        match result {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "PORT"),
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn test_worker_fraction_above_basis() {
        let mut env_map = setup_required_env();
        env_map.insert("WORKER_FRACTION".to_string(), "101".to_string());
        let result = Config::from_env_map(env_map);
        match result {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "WORKER_FRACTION"),
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn test_invalid_deposits_enabled() {
        let mut env_map = setup_required_env();
        env_map.insert("DEPOSITS_ENABLED".to_string(), "maybe".to_string());
        let result = Config::from_env_map(env_map);
        match result {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "DEPOSITS_ENABLED"),
            _ => panic!("Expected InvalidValue error"),
        }
    }
}
