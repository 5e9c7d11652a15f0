use clap::Parser;
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "inkpost", about = "A social blogging backend")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Host to bind to
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Path to data directory
    #[arg(long)]
    pub data_dir: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub pagination: PaginationConfig,
    pub threads: ThreadConfig,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct AuthConfig {
    pub cookie_name: String,
    pub session_hours: u64,
    pub min_password_length: usize,
    pub bcrypt_cost: u32,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct PaginationConfig {
    pub default_page_size: u32,
    /// Hard ceiling, a client asking for more gets this many.
    pub max_page_size: u32,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct ThreadConfig {
    /// Reply levels returned below the requested comment. Deeper replies are
    /// flagged with `has_more_replies` and fetched from their own thread.
    pub max_depth: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            cookie_name: "inkpost_session".to_string(),
            session_hours: 720,
            min_password_length: 6,
            bcrypt_cost: bcrypt::DEFAULT_COST,
        }
    }
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_page_size: 10,
            max_page_size: 100,
        }
    }
}

impl Default for ThreadConfig {
    fn default() -> Self {
        Self { max_depth: 50 }
    }
}

/// Upper bound for `threads.max_depth`; keeps nested serialization shallow.
pub const MAX_THREAD_DEPTH: usize = 200;

impl Config {
    pub fn load(cli: &Cli) -> anyhow::Result<Self> {
        let data_dir = Self::data_dir(cli)?;
        let config_path = cli
            .config
            .clone()
            .unwrap_or_else(|| data_dir.join("config.toml"));

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str(&content)?
        } else {
            Config::default()
        };

        // CLI overrides
        if let Some(ref host) = cli.host {
            config.server.host = host.clone();
        }
        if let Some(port) = cli.port {
            config.server.port = port;
        }

        if config.database.path.is_none() {
            config.database.path = Some(data_dir.join("inkpost.db"));
        }

        if config.pagination.max_page_size == 0 || config.pagination.max_page_size > 100 {
            anyhow::bail!("pagination.max_page_size must be between 1 and 100");
        }
        if config.pagination.default_page_size == 0
            || config.pagination.default_page_size > config.pagination.max_page_size
        {
            anyhow::bail!("pagination.default_page_size must be between 1 and max_page_size");
        }

        if config.threads.max_depth == 0 || config.threads.max_depth > MAX_THREAD_DEPTH {
            anyhow::bail!("threads.max_depth must be between 1 and {}", MAX_THREAD_DEPTH);
        }

        if !(4..=31).contains(&config.auth.bcrypt_cost) {
            anyhow::bail!("auth.bcrypt_cost must be between 4 and 31");
        }

        Ok(config)
    }

    pub fn data_dir(cli: &Cli) -> anyhow::Result<PathBuf> {
        match cli.data_dir.clone() {
            Some(dir) => Ok(dir),
            None => dirs::home_dir()
                .map(|home| home.join(".inkpost"))
                .ok_or_else(|| anyhow::anyhow!("Could not determine home directory")),
        }
    }

    pub fn db_path(&self) -> Option<&PathBuf> {
        self.database.path.as_ref()
    }
}
