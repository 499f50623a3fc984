// Copyright 2015-2025 Deyan Ginev. See the LICENSE
// file at the top-level directory of this distribution.
//
// Licensed under the MIT license <LICENSE-MIT or http://opensource.org/licenses/MIT>.
// This file may not be copied, modified, or distributed
// except according to those terms.

//! Sends a file to a ZMQ responder a fixed number of times, printing every reply.
//! Example run: `$ cargo run --bin requester -- --endpoint tcp://localhost:5555 --count 10 3mb.json`
use clap::Parser;
use std::error::Error;
use std::path::PathBuf;
use std::process;

use requester::client::{ErrorPolicy, RequestClient};
use requester::config::ClientConfig;
use requester::endpoint::Endpoint;
use requester::logging;
use requester::transport::ZmqTransport;

#[derive(Parser)]
#[command(name = "requester", about = "Send a payload to a ZMQ REP server, N times in a row")]
struct Cli {
  /// File whose contents are sent with every request
  payload: Option<PathBuf>,
  /// JSON configuration file
  #[arg(long)]
  config: Option<PathBuf>,
  /// Responder address, e.g. tcp://localhost:5555
  #[arg(long)]
  endpoint: Option<String>,
  /// Number of exchanges
  #[arg(long, short = 'n')]
  count: Option<usize>,
  /// Give up on a reply after this many milliseconds
  #[arg(long)]
  timeout_ms: Option<i32>,
  /// Give up on handing a request to the socket after this many milliseconds
  #[arg(long)]
  send_timeout_ms: Option<i32>,
  /// How long a closed socket keeps flushing undelivered requests, in milliseconds
  #[arg(long, allow_hyphen_values = true)]
  linger_ms: Option<i32>,
  /// Re-attempts of a failed exchange over a fresh connection
  #[arg(long)]
  retries: Option<usize>,
  /// "continue" or "abort" after a failed exchange
  #[arg(long)]
  on_error: Option<ErrorPolicy>,
  /// Z85 server public key, enables CURVE encryption
  #[arg(long)]
  curve_server_key: Option<String>,
}

impl Cli {
  fn into_config(self) -> Result<ClientConfig, Box<dyn Error>> {
    let mut config = ClientConfig::load(self.config.as_deref())?;
    if let Some(payload) = self.payload {
      config.payload_path = payload;
    }
    if let Some(endpoint) = self.endpoint {
      config.endpoint = Endpoint::from(endpoint);
    }
    if let Some(count) = self.count {
      config.count = count;
    }
    if let Some(timeout) = self.timeout_ms {
      config.transport.receive_timeout_ms = Some(timeout);
    }
    if let Some(timeout) = self.send_timeout_ms {
      config.transport.send_timeout_ms = Some(timeout);
    }
    if let Some(linger) = self.linger_ms {
      config.transport.linger_ms = linger;
    }
    if let Some(retries) = self.retries {
      config.policy.retries = retries;
    }
    if let Some(on_error) = self.on_error {
      config.policy.on_error = on_error;
    }
    if let Some(key) = self.curve_server_key {
      config.transport.curve_server_key = Some(key);
    }
    config.validate()?;
    Ok(config)
  }
}

fn main() -> Result<(), Box<dyn Error>> {
  logging::init();
  let config = Cli::parse().into_config()?;
  let payload = config.payload()?;
  log::info!(
    "Sending {} ({} bytes) to {}, {} times",
    config.payload_path.display(),
    payload.len(),
    config.endpoint,
    config.count
  );

  let mut client = RequestClient::with_policy(ZmqTransport::new(config.transport.clone()), config.policy.clone());
  let report = client.run(&config.endpoint, &payload, config.count)?;
  for exchange in &report.exchanges {
    println!("{}", exchange);
  }
  if !report.is_complete(config.count) {
    log::error!(
      "{} of {} requests did not get a reply",
      config.count - report.replies().count(),
      config.count
    );
    process::exit(1);
  }
  Ok(())
}
