use anyhow::anyhow;
use sqlx::postgres::PgSslMode;
use std::{env, net::SocketAddr, path::PathBuf, str::FromStr, time::Duration};

const DEFAULT_DATABASE_URL: &str = "postgres://localhost/users";
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
const DEFAULT_MAX_CONNECTIONS: u32 = 10;
const DEFAULT_ACQUIRE_TIMEOUT_SECONDS: u64 = 30;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub database_ssl_mode: PgSslMode,
    pub database_max_connections: u32,
    pub database_acquire_timeout: Duration,
    /// Runtime migration directory. `None` uses the migrations embedded at build time.
    pub migrations_dir: Option<PathBuf>,
    pub production_mode: bool,
    pub bind_addr: SocketAddr,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url =
            lookup("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string());

        let production_mode = lookup("APP_ENV")
            .map(|v| v.eq_ignore_ascii_case("production"))
            .unwrap_or(false);

        let database_ssl_mode = match lookup("DATABASE_SSL_MODE") {
            Some(raw) => parse_ssl_mode(&raw)?,
            None if production_mode => PgSslMode::Require,
            None => PgSslMode::Prefer,
        };

        let database_max_connections = parse_or_default(
            &lookup,
            "DATABASE_MAX_CONNECTIONS",
            DEFAULT_MAX_CONNECTIONS,
        )?;
        if database_max_connections == 0 {
            return Err(anyhow!("DATABASE_MAX_CONNECTIONS must be at least 1"));
        }

        let database_acquire_timeout = Duration::from_secs(parse_or_default(
            &lookup,
            "DATABASE_ACQUIRE_TIMEOUT_SECONDS",
            DEFAULT_ACQUIRE_TIMEOUT_SECONDS,
        )?);

        let migrations_dir = lookup("MIGRATIONS_DIR")
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from);

        let bind_addr_raw = lookup("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr: SocketAddr = bind_addr_raw
            .parse()
            .map_err(|_| anyhow!("Invalid BIND_ADDR value: {}", bind_addr_raw))?;

        Ok(Config {
            database_url,
            database_ssl_mode,
            database_max_connections,
            database_acquire_timeout,
            migrations_dir,
            production_mode,
            bind_addr,
        })
    }
}

fn parse_ssl_mode(raw: &str) -> anyhow::Result<PgSslMode> {
    PgSslMode::from_str(raw.trim())
        .map_err(|_| anyhow!("Invalid DATABASE_SSL_MODE value: {}", raw))
}

fn parse_or_default<F, T>(lookup: &F, key: &str, default: T) -> anyhow::Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| anyhow!("Invalid {} value: {}", key, raw)),
        None => Ok(default),
    }
}
