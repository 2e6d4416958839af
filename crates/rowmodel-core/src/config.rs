//! Database connection configuration.
//!
//! Bootstrap settings for the engine behind a `Database`. Every field has a
//! default and can be overridden independently from the environment:
//!
//! | Variable | Field | Default |
//! |---|---|---|
//! | `MYSQL_HOST` | `host` | `127.0.0.1` |
//! | `MYSQL_PORT` | `port` | `3306` |
//! | `MYSQL_USER` | `user` | `root` |
//! | `MYSQL_PASSWORD` | `password` | none |
//! | `MYSQL_DATABASE` | `database` | `convrrt` |
//! | `MYSQL_DEBUG` | `debug` | `false` |

use std::fmt;

/// Environment variable for the host.
pub const ENV_HOST: &str = "MYSQL_HOST";
/// Environment variable for the port.
pub const ENV_PORT: &str = "MYSQL_PORT";
/// Environment variable for the user.
pub const ENV_USER: &str = "MYSQL_USER";
/// Environment variable for the password.
pub const ENV_PASSWORD: &str = "MYSQL_PASSWORD";
/// Environment variable for the database name.
pub const ENV_DATABASE: &str = "MYSQL_DATABASE";
/// Environment variable for the statement-logging toggle.
pub const ENV_DEBUG: &str = "MYSQL_DEBUG";

/// Connection configuration.
#[derive(Clone, PartialEq, Eq)]
pub struct DbConfig {
    /// Hostname or IP address
    pub host: String,
    /// Port number (default: 3306)
    pub port: u16,
    /// Username for authentication
    pub user: String,
    /// Password for authentication
    pub password: Option<String>,
    /// Database name
    pub database: String,
    /// Log every rendered statement at debug level
    pub debug: bool,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3306,
            user: "root".to_string(),
            password: None,
            database: "convrrt".to_string(),
            debug: false,
        }
    }
}

impl fmt::Debug for DbConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("database", &self.database)
            .field("debug", &self.debug)
            .finish()
    }
}

impl DbConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read the configuration through `lookup`, falling back to the default for
    /// every variable that is unset, empty or unparsable.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());
        let defaults = Self::default();

        let port = get(ENV_PORT)
            .and_then(|v| v.trim().parse::<u16>().ok())
            .filter(|p| *p != 0)
            .unwrap_or(defaults.port);

        let config = Self {
            host: get(ENV_HOST).unwrap_or(defaults.host),
            port,
            user: get(ENV_USER).unwrap_or(defaults.user),
            password: get(ENV_PASSWORD),
            database: get(ENV_DATABASE).unwrap_or(defaults.database),
            debug: get(ENV_DEBUG).is_some_and(|v| v.eq_ignore_ascii_case("true")),
        };

        tracing::debug!(
            host = %config.host,
            port = config.port,
            database = %config.database,
            debug = config.debug,
            "Loaded database configuration"
        );

        config
    }

    /// Set the hostname.
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Set the port.
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the username.
    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.user = user.into();
        self
    }

    /// Set the password.
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Set the database.
    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }

    /// Enable or disable statement logging.
    pub fn debug(mut self, enabled: bool) -> Self {
        self.debug = enabled;
        self
    }

    /// Get the socket address string for connection.
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Connection URL. The password is included only when `with_password` is set.
    pub fn connection_url(&self, with_password: bool) -> String {
        let credentials = match (&self.password, with_password) {
            (Some(password), true) => format!("{}:{}", self.user, password),
            (Some(_), false) => format!("{}:***", self.user),
            (None, _) => self.user.clone(),
        };
        format!(
            "mysql://{}@{}:{}/{}",
            credentials, self.host, self.port, self.database
        )
    }
}
