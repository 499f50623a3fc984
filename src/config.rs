// Copyright 2015-2025 Deyan Ginev. See the LICENSE
// file at the top-level directory of this distribution.
//
// Licensed under the MIT license <LICENSE-MIT or http://opensource.org/licenses/MIT>.
// This file may not be copied, modified, or distributed
// except according to those terms.

//! Configuration for the requester and responder executables.
//!
//! Values are layered: built-in defaults, then an optional JSON file, then environment
//! variables (a `.env` file in the working directory is honoured), and finally whatever the
//! command line overrides.
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt::Display;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

use crate::client::ClientPolicy;
use crate::endpoint::Endpoint;
use crate::payload::{Payload, PayloadError};
use crate::transport::TransportOptions;

/// Problems reading or interpreting configuration
#[derive(Debug, Error)]
pub enum ConfigError {
  /// the configuration file could not be opened
  #[error("could not open config file {path:?}: {source}")]
  Io {
    /// config file path
    path: PathBuf,
    /// underlying IO error
    #[source]
    source: std::io::Error,
  },
  /// the configuration file is not valid JSON for this config
  #[error("malformed config file {path:?}: {source}")]
  Json {
    /// config file path
    path: PathBuf,
    /// underlying parse error
    #[source]
    source: serde_json::Error,
  },
  /// an environment variable holds an unusable value
  #[error("invalid value {value:?} for {variable}: {reason}")]
  Invalid {
    /// the variable name
    variable: String,
    /// its raw value
    value: String,
    /// why it was rejected
    reason: String,
  },
}

/// Settings for a requester run
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
  /// where the responder listens
  pub endpoint: Endpoint,
  /// file whose contents are sent with every request
  pub payload_path: PathBuf,
  /// number of exchanges
  pub count: usize,
  /// failure handling
  pub policy: ClientPolicy,
  /// socket options
  pub transport: TransportOptions,
}

impl Default for ClientConfig {
  fn default() -> ClientConfig {
    ClientConfig {
      endpoint: Endpoint::default(),
      payload_path: PathBuf::from("3mb.json"),
      count: 10,
      policy: ClientPolicy::default(),
      transport: TransportOptions::default(),
    }
  }
}

impl ClientConfig {
  /// Defaults, overlaid with `json_path` (if any), overlaid with the environment
  pub fn load(json_path: Option<&Path>) -> Result<Self, ConfigError> {
    let mut config = match json_path {
      Some(path) => read_json(path)?,
      None => ClientConfig::default(),
    };
    config.apply_env()?;
    config.validate()?;
    Ok(config)
  }

  /// Reads a JSON config file; missing fields keep their defaults
  pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> { read_json(path) }

  /// Overlays `REQUESTER_*` variables from the process environment and `.env`
  pub fn apply_env(&mut self) -> Result<(), ConfigError> {
    dotenv::dotenv().ok();
    self.apply_vars(|name| env::var(name).ok())
  }

  /// Overlays `REQUESTER_*` variables looked up through `lookup`
  pub fn apply_vars<F>(&mut self, lookup: F) -> Result<(), ConfigError>
  where F: Fn(&str) -> Option<String> {
    if let Some(endpoint) = lookup("REQUESTER_ENDPOINT") {
      self.endpoint = Endpoint::from(endpoint);
    }
    if let Some(path) = lookup("REQUESTER_PAYLOAD") {
      self.payload_path = PathBuf::from(path);
    }
    if let Some(count) = lookup("REQUESTER_COUNT") {
      self.count = parse_var("REQUESTER_COUNT", &count)?;
    }
    if let Some(timeout) = lookup("REQUESTER_RECEIVE_TIMEOUT_MS") {
      self.transport.receive_timeout_ms = Some(parse_timeout("REQUESTER_RECEIVE_TIMEOUT_MS", &timeout)?);
    }
    if let Some(timeout) = lookup("REQUESTER_SEND_TIMEOUT_MS") {
      self.transport.send_timeout_ms = Some(parse_timeout("REQUESTER_SEND_TIMEOUT_MS", &timeout)?);
    }
    if let Some(linger) = lookup("REQUESTER_LINGER_MS") {
      self.transport.linger_ms = parse_var("REQUESTER_LINGER_MS", &linger)?;
    }
    if let Some(retries) = lookup("REQUESTER_RETRIES") {
      self.policy.retries = parse_var("REQUESTER_RETRIES", &retries)?;
    }
    if let Some(on_error) = lookup("REQUESTER_ON_ERROR") {
      self.policy.on_error = parse_var("REQUESTER_ON_ERROR", &on_error)?;
    }
    if let Some(key) = lookup("REQUESTER_CURVE_SERVER_KEY") {
      self.transport.curve_server_key = Some(key);
    }
    Ok(())
  }

  /// Rejects settings libzmq would refuse or that make every exchange fail:
  /// timeouts must be positive (leave them unset to block), linger must be `-1` or more
  pub fn validate(&self) -> Result<(), ConfigError> {
    let timeouts = [
      ("receive_timeout_ms", self.transport.receive_timeout_ms),
      ("send_timeout_ms", self.transport.send_timeout_ms),
    ];
    for (variable, timeout) in timeouts.iter() {
      if let Some(ms) = *timeout {
        check_timeout(variable, ms)?;
      }
    }
    if self.transport.linger_ms < -1 {
      return Err(ConfigError::Invalid {
        variable: "linger_ms".to_string(),
        value: self.transport.linger_ms.to_string(),
        reason: "linger must be -1 (forever), 0 or a positive number of milliseconds".to_string(),
      });
    }
    Ok(())
  }

  /// Loads the configured payload file
  pub fn payload(&self) -> Result<Payload, PayloadError> { Payload::from_file(&self.payload_path) }
}

/// Settings for a responder
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResponderConfig {
  /// address to bind the REP socket to
  pub bind_address: String,
  /// fixed reply for every request
  pub reply: String,
  /// reply with the request itself instead of `reply`
  pub echo: bool,
  /// simulated processing time per request, in milliseconds
  pub work_delay_ms: u64,
  /// Z85-encoded (40 characters) server secret key; turns on the CURVE server role when set
  pub curve_secret_key: Option<String>,
}

impl Default for ResponderConfig {
  fn default() -> ResponderConfig {
    ResponderConfig {
      bind_address: "tcp://*:5555".to_string(),
      reply: "JSON Received".to_string(),
      echo: false,
      work_delay_ms: 0,
      curve_secret_key: None,
    }
  }
}

impl ResponderConfig {
  /// Defaults, overlaid with `json_path` (if any), overlaid with the environment
  pub fn load(json_path: Option<&Path>) -> Result<Self, ConfigError> {
    let mut config = match json_path {
      Some(path) => read_json(path)?,
      None => ResponderConfig::default(),
    };
    dotenv::dotenv().ok();
    config.apply_vars(|name| env::var(name).ok())?;
    Ok(config)
  }

  /// Overlays `RESPONDER_*` variables looked up through `lookup`
  pub fn apply_vars<F>(&mut self, lookup: F) -> Result<(), ConfigError>
  where F: Fn(&str) -> Option<String> {
    if let Some(address) = lookup("RESPONDER_BIND") {
      self.bind_address = address;
    }
    if let Some(reply) = lookup("RESPONDER_REPLY") {
      self.reply = reply;
    }
    if let Some(echo) = lookup("RESPONDER_ECHO") {
      self.echo = parse_var("RESPONDER_ECHO", &echo)?;
    }
    if let Some(delay) = lookup("RESPONDER_WORK_DELAY_MS") {
      self.work_delay_ms = parse_var("RESPONDER_WORK_DELAY_MS", &delay)?;
    }
    if let Some(key) = lookup("RESPONDER_CURVE_SECRET_KEY") {
      self.curve_secret_key = Some(key);
    }
    Ok(())
  }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
  let file = File::open(path).map_err(|source| ConfigError::Io {
    path: path.to_path_buf(),
    source,
  })?;
  serde_json::from_reader(BufReader::new(file)).map_err(|source| ConfigError::Json {
    path: path.to_path_buf(),
    source,
  })
}

fn parse_var<V>(variable: &str, value: &str) -> Result<V, ConfigError>
where
  V: FromStr,
  V::Err: Display,
{
  value.trim().parse::<V>().map_err(|e| ConfigError::Invalid {
    variable: variable.to_string(),
    value: value.to_string(),
    reason: e.to_string(),
  })
}

fn parse_timeout(variable: &str, value: &str) -> Result<i32, ConfigError> {
  let ms = parse_var(variable, value)?;
  check_timeout(variable, ms)?;
  Ok(ms)
}

fn check_timeout(variable: &str, ms: i32) -> Result<(), ConfigError> {
  if ms <= 0 {
    return Err(ConfigError::Invalid {
      variable: variable.to_string(),
      value: ms.to_string(),
      reason: "timeouts must be a positive number of milliseconds; leave unset to block".to_string(),
    });
  }
  Ok(())
}
