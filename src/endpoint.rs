// Copyright 2015-2025 Deyan Ginev. See the LICENSE
// file at the top-level directory of this distribution.
//
// Licensed under the MIT license <LICENSE-MIT or http://opensource.org/licenses/MIT>.
// This file may not be copied, modified, or distributed
// except according to those terms.

//! Addresses of remote peers
use serde::{Deserialize, Serialize};
use std::fmt;

/// An opaque address of the remote peer, e.g. `tcp://localhost:5555`.
/// The string is handed to the transport verbatim.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Endpoint(String);

impl Endpoint {
  /// Wraps an address string
  pub fn new<S: Into<String>>(address: S) -> Self { Endpoint(address.into()) }

  /// A `tcp://host:port` endpoint
  pub fn tcp(host: &str, port: u16) -> Self { Endpoint(format!("tcp://{}:{}", host, port)) }

  /// The address as handed to the transport
  pub fn as_str(&self) -> &str { &self.0 }
}

impl Default for Endpoint {
  fn default() -> Endpoint { Endpoint::tcp("localhost", 5555) }
}

impl fmt::Display for Endpoint {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result { f.write_str(&self.0) }
}

impl From<&str> for Endpoint {
  fn from(address: &str) -> Self { Endpoint::new(address) }
}

impl From<String> for Endpoint {
  fn from(address: String) -> Self { Endpoint(address) }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn tcp_endpoint_format() {
    assert_eq!(Endpoint::tcp("127.0.0.1", 5555).as_str(), "tcp://127.0.0.1:5555");
    assert_eq!(Endpoint::default().to_string(), "tcp://localhost:5555");
  }

  #[test]
  fn addresses_are_kept_verbatim() {
    let endpoint = Endpoint::from("ipc:///tmp/requester.sock");
    assert_eq!(endpoint.as_str(), "ipc:///tmp/requester.sock");
    let json = serde_json::to_string(&endpoint).unwrap();
    assert_eq!(json, "\"ipc:///tmp/requester.sock\"");
  }
}
