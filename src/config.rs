use crate::constants::*;

/// Runtime configuration, read once at startup from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub data_path: String,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        let host = std::env::var("HOST").unwrap_or_else(|_| DEFAULT_HOST.to_string());
        let port_raw = std::env::var("PORT").unwrap_or_else(|_| DEFAULT_PORT.to_string());
        let port = port_raw
            .parse::<u16>()
            .map_err(|_| format!("Invalid PORT '{}'", port_raw))?;
        let data_path = std::env::var("DATA_PATH").unwrap_or_else(|_| DEFAULT_DATA_PATH.to_string());

        if data_path.trim().is_empty() {
            return Err("DATA_PATH cannot be empty".to_string());
        }

        Ok(Config {
            host,
            port,
            data_path,
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
