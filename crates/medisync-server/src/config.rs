use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

/// Minimum accepted length for the JWT signing secret.
pub const MIN_JWT_SECRET_LEN: usize = 16;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub auth: AuthSettings,
    #[serde(default)]
    pub realtime: RealtimeConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Initial admin user and default departments
    #[serde(default)]
    pub bootstrap: BootstrapConfig,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.server.port == 0 {
            return Err("server.port must be > 0".into());
        }
        if self.server.body_limit_bytes == 0 {
            return Err("server.body_limit_bytes must be > 0".into());
        }
        let lvl = self.logging.level.to_ascii_lowercase();
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&lvl.as_str()) {
            return Err(format!("logging.level must be one of {valid_levels:?}"));
        }
        if self.auth.jwt_secret.len() < MIN_JWT_SECRET_LEN {
            return Err(format!(
                "auth.jwt_secret must be at least {MIN_JWT_SECRET_LEN} characters"
            ));
        }
        if self.auth.token_ttl_days <= 0 {
            return Err("auth.token_ttl_days must be > 0".into());
        }
        if self.realtime.channel_capacity == 0 {
            return Err("realtime.channel_capacity must be > 0".into());
        }
        if let Some(admin) = &self.bootstrap.admin_user {
            if admin.email.trim().is_empty() {
                return Err("bootstrap.admin_user.email must not be empty".into());
            }
            if admin.password.chars().count() < 6 {
                return Err("bootstrap.admin_user.password must be at least 6 characters".into());
            }
        }
        Ok(())
    }

    pub fn addr(&self) -> SocketAddr {
        use std::net::{IpAddr, Ipv4Addr};
        let host: IpAddr = self
            .server
            .host
            .parse()
            .unwrap_or(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)));
        SocketAddr::from((host, self.server.port))
    }

    pub fn is_development(&self) -> bool {
        self.server.environment == Environment::Development
    }

    pub fn token_ttl(&self) -> time::Duration {
        time::Duration::days(self.auth.token_ttl_days)
    }
}

/// Runtime mode. Development exposes internal error detail in 500 bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    #[default]
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,
    #[serde(default)]
    pub environment: Environment,
}

fn default_host() -> String {
    "0.0.0.0".into()
}
fn default_port() -> u16 {
    5000
}
fn default_body_limit() -> usize {
    1024 * 1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            body_limit_bytes: default_body_limit(),
            environment: Environment::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSettings {
    /// HS256 signing secret. Prefer `MEDISYNC__AUTH__JWT_SECRET` over the file.
    #[serde(default)]
    pub jwt_secret: String,
    #[serde(default = "default_token_ttl_days")]
    pub token_ttl_days: i64,
    /// Whether `POST /api/users/register` is reachable without a token.
    #[serde(default = "default_true")]
    pub public_registration: bool,
}

fn default_token_ttl_days() -> i64 {
    30
}
fn default_true() -> bool {
    true
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            token_ttl_days: default_token_ttl_days(),
            public_registration: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeConfig {
    /// Events buffered per subscriber before it is reported as lagging.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

fn default_channel_capacity() -> usize {
    medisync_core::events::DEFAULT_BUFFER_SIZE
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            channel_capacity: default_channel_capacity(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BootstrapConfig {
    /// Creates an admin user on startup if no user has this email.
    #[serde(default)]
    pub admin_user: Option<AdminUserConfig>,
    /// Seeds the standard departments when none with the same code exist.
    #[serde(default = "default_true")]
    pub seed_departments: bool,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            admin_user: None,
            seed_departments: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminUserConfig {
    #[serde(default = "default_admin_name")]
    pub name: String,
    pub email: String,
    /// Plain text, hashed on bootstrap. Prefer
    /// `MEDISYNC__BOOTSTRAP__ADMIN_USER__PASSWORD`.
    pub password: String,
}

fn default_admin_name() -> String {
    "Administrator".into()
}

pub mod loader {
    use super::AppConfig;
    use config::{Config, Environment, File};
    use std::path::PathBuf;

    pub const DEFAULT_CONFIG_FILE: &str = "medisync.toml";

    pub fn load_config(path: Option<&str>) -> Result<AppConfig, String> {
        let mut builder = Config::builder();
        let pathbuf = PathBuf::from(path.unwrap_or(DEFAULT_CONFIG_FILE));
        if pathbuf.exists() {
            builder = builder.add_source(File::from(pathbuf));
        }
        // Environment variable overrides, e.g., MEDISYNC__SERVER__PORT=9090
        builder = builder.add_source(
            Environment::with_prefix("MEDISYNC")
                .prefix_separator("__")
                .try_parsing(true)
                .separator("__"),
        );
        let cfg = builder
            .build()
            .map_err(|e| format!("config build error: {e}"))?;
        let merged: AppConfig = cfg
            .try_deserialize()
            .map_err(|e| format!("config deserialize error: {e}"))?;
        merged.validate()?;
        Ok(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::{Config, File, FileFormat};

    fn parse(toml: &str) -> AppConfig {
        Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    fn valid() -> AppConfig {
        let mut cfg = AppConfig::default();
        cfg.auth.jwt_secret = "0123456789abcdef0123".into();
        cfg
    }

    #[test]
    fn defaults_are_sensible() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.server.port, 5000);
        assert_eq!(cfg.auth.token_ttl_days, 30);
        assert!(cfg.auth.public_registration);
        assert!(cfg.bootstrap.seed_departments);
        assert!(!cfg.is_development());
    }

    #[test]
    fn parses_sections_from_toml() {
        let cfg = parse(
            r#"
            [server]
            port = 8088
            environment = "development"

            [auth]
            jwt_secret = "a-very-long-test-secret"
            public_registration = false

            [bootstrap.admin_user]
            email = "admin@medisync.local"
            password = "changeme"
            "#,
        );
        assert_eq!(cfg.server.port, 8088);
        assert!(cfg.is_development());
        assert!(!cfg.auth.public_registration);
        let admin = cfg.bootstrap.admin_user.as_ref().unwrap();
        assert_eq!(admin.name, "Administrator");
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn validate_rejects_bad_values() {
        assert!(AppConfig::default().validate().is_err(), "empty secret");

        let mut cfg = valid();
        cfg.logging.level = "loud".into();
        assert!(cfg.validate().is_err());

        let mut cfg = valid();
        cfg.realtime.channel_capacity = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = valid();
        cfg.bootstrap.admin_user = Some(AdminUserConfig {
            name: "Admin".into(),
            email: "admin@medisync.local".into(),
            password: "123".into(),
        });
        assert!(cfg.validate().is_err());

        assert!(valid().validate().is_ok());
    }
}
