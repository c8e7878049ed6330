//! Command-line configuration for the server.
//!
//! Flags follow the `--key value` convention. `--replicaof "HOST PORT"`
//! switches the server into follower mode; everything else configures the
//! listener and the snapshot location.

use std::net::Ipv4Addr;

use thiserror::Error;

/// Errors that can occur during command-line argument parsing.
#[derive(Error, Debug, PartialEq, Clone)]
pub enum CliError {
    #[error("unknown flag: {0}")]
    UnknownFlag(String),
    #[error("flag {0} expects a value")]
    MissingFlagValue(String),
    #[error("invalid port: {0}")]
    InvalidPort(String),
    #[error("invalid --replicaof value: {0:?}, expected \"HOST PORT\"")]
    InvalidReplicaOf(String),
}

/// The role this instance runs as.
///
/// A master accepts writes and fans them out to replicas; a replica connects
/// to the configured master, syncs a snapshot and then applies the streamed
/// command feed.
#[derive(Debug, PartialEq, Clone)]
pub enum Role {
    Master,
    Replica { host: String, port: u16 },
}

impl Role {
    /// Role name as reported by INFO (Redis calls replicas "slave").
    pub fn as_str(&self) -> &str {
        match self {
            Role::Master => "master",
            Role::Replica { .. } => "slave",
        }
    }
}

/// Parsed server configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// TCP listen port.
    pub port: u16,
    /// Directory containing the snapshot file.
    pub dir: String,
    /// Snapshot filename; empty means no snapshot is loaded at startup.
    pub dbfilename: String,
    pub role: Role,
}

impl Config {
    /// Parses the configuration from command-line arguments.
    ///
    /// The iterator is expected to start with the program name, the way
    /// `std::env::args()` does; that first element is skipped.
    ///
    /// # Flags
    ///
    /// * `--port <port>` - listen port (default 6379)
    /// * `--dir <path>` - snapshot directory (default ".")
    /// * `--dbfilename <name>` - snapshot filename (default empty, which
    ///   skips the startup load)
    /// * `--replicaof "<host> <port>"` - run as a replica of the given
    ///   master; host and port arrive as a single space-separated value
    ///
    /// # Errors
    ///
    /// Fails with a [`CliError`] naming the offending flag or value when a
    /// flag is unknown, is missing its value, or carries a value that does
    /// not validate (port outside 1-65535, malformed master address).
    ///
    /// # Examples
    ///
    /// ```ignore
    /// let config = Config::from_args([
    ///     "redlite".to_string(),
    ///     "--port".to_string(),
    ///     "7001".to_string(),
    ///     "--replicaof".to_string(),
    ///     "10.0.0.5 6379".to_string(),
    /// ])?;
    /// assert_eq!(config.port, 7001);
    /// ```
    pub fn from_args<I: IntoIterator<Item = String>>(args: I) -> Result<Self, CliError> {
        let mut config = Config {
            port: 6379,
            dir: ".".to_string(),
            dbfilename: String::new(),
            role: Role::Master,
        };

        let mut iter = args.into_iter().skip(1);

        while let Some(flag) = iter.next() {
            match flag.as_str() {
                "--port" => {
                    let value = flag_value(&mut iter, &flag)?;
                    config.port =
                        parse_port(&value).ok_or_else(|| CliError::InvalidPort(value.clone()))?;
                }
                "--dir" => config.dir = flag_value(&mut iter, &flag)?,
                "--dbfilename" => config.dbfilename = flag_value(&mut iter, &flag)?,
                "--replicaof" => {
                    let value = flag_value(&mut iter, &flag)?;
                    config.role = parse_replica_of(&value)?;
                }
                _ => return Err(CliError::UnknownFlag(flag)),
            }
        }

        Ok(config)
    }

    /// Path of the snapshot file, or `None` when no filename is configured.
    pub fn snapshot_path(&self) -> Option<std::path::PathBuf> {
        if self.dbfilename.is_empty() {
            return None;
        }

        Some(std::path::Path::new(&self.dir).join(&self.dbfilename))
    }
}

fn flag_value<I: Iterator<Item = String>>(iter: &mut I, flag: &str) -> Result<String, CliError> {
    iter.next()
        .ok_or_else(|| CliError::MissingFlagValue(flag.to_string()))
}

fn parse_port(value: &str) -> Option<u16> {
    match value.parse::<u16>() {
        Ok(port) if port != 0 => Some(port),
        _ => None,
    }
}

/// Splits a `--replicaof` value into host and port.
///
/// The host may be an IPv4 address or a hostname. A value made up entirely
/// of digits and dots is taken as an attempted address and must parse as
/// one; everything else is checked as a hostname (alphanumerics, `-`, `.`).
fn parse_replica_of(value: &str) -> Result<Role, CliError> {
    let invalid = || CliError::InvalidReplicaOf(value.to_string());

    let mut fields = value.split_whitespace();
    let (Some(host), Some(port)) = (fields.next(), fields.next()) else {
        return Err(invalid());
    };

    if fields.next().is_some() || !is_valid_host(host) {
        return Err(invalid());
    }

    let port = parse_port(port).ok_or_else(invalid)?;

    Ok(Role::Replica {
        host: host.to_string(),
        port,
    })
}

fn is_valid_host(host: &str) -> bool {
    if host.is_empty() {
        return false;
    }

    if host.bytes().all(|b| b.is_ascii_digit() || b == b'.') {
        return host.parse::<Ipv4Addr>().is_ok();
    }

    host.bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'.')
}
