//! Connection configuration.

use crate::log::LogRetention;
use serde::Deserialize;

/// Connection settings, consumed once when connecting.
///
/// The `prefix` participates in compilation: `#NAME#` markers in raw SQL
/// expand to `{prefix}name`, and the configured `dbname` qualifies
/// dot-named tables.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DbConfig {
    pub host: String,
    pub port: u16,
    /// Unix socket path; takes precedence over host/port when set.
    pub socket: Option<String>,
    pub dbname: Option<String>,
    pub username: String,
    pub password: Option<String>,
    pub charset: Option<String>,
    /// Table-name prefix substituted for `#NAME#` markers.
    pub prefix: Option<String>,
    /// Query-log retention policy.
    #[serde(skip)]
    pub log_mode: LogRetention,
    /// Bound for [`LogRetention::LastMax`].
    pub log_max: usize,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 3306,
            socket: None,
            dbname: None,
            username: "root".to_string(),
            password: None,
            charset: None,
            prefix: None,
            log_mode: LogRetention::LastOne,
            log_max: 100,
        }
    }
}

impl DbConfig {
    /// Start from defaults.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn socket(mut self, socket: impl Into<String>) -> Self {
        self.socket = Some(socket.into());
        self
    }

    pub fn dbname(mut self, dbname: impl Into<String>) -> Self {
        self.dbname = Some(dbname.into());
        self
    }

    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = username.into();
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn charset(mut self, charset: impl Into<String>) -> Self {
        self.charset = Some(charset.into());
        self
    }

    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn log_mode(mut self, mode: LogRetention) -> Self {
        self.log_mode = mode;
        self
    }

    pub fn log_max(mut self, max: usize) -> Self {
        self.log_max = max;
        self
    }

    /// Driver connect options for the sqlx MySQL backend.
    #[cfg(feature = "mysql")]
    pub fn connect_options(&self) -> sqlx::mysql::MySqlConnectOptions {
        let mut opts = sqlx::mysql::MySqlConnectOptions::new().username(&self.username);

        match &self.socket {
            Some(socket) => {
                opts = opts.socket(socket.as_str());
            }
            None => {
                opts = opts.host(&self.host).port(self.port);
            }
        }
        if let Some(password) = &self.password {
            opts = opts.password(password);
        }
        if let Some(dbname) = &self.dbname {
            opts = opts.database(dbname);
        }
        if let Some(charset) = &self.charset {
            opts = opts.charset(charset);
        }

        opts
    }
}
