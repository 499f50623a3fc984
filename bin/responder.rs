// Copyright 2015-2025 Deyan Ginev. See the LICENSE
// file at the top-level directory of this distribution.
//
// Licensed under the MIT license <LICENSE-MIT or http://opensource.org/licenses/MIT>.
// This file may not be copied, modified, or distributed
// except according to those terms.

//! A ZMQ REP server replying to every request with a fixed message (or an echo)
use clap::Parser;
use std::error::Error;
use std::path::PathBuf;

use requester::config::ResponderConfig;
use requester::logging;
use requester::responder::Responder;

#[derive(Parser)]
#[command(name = "responder", about = "Answer ZMQ REQ clients with a fixed reply")]
struct Cli {
  /// JSON configuration file
  #[arg(long)]
  config: Option<PathBuf>,
  /// Address to bind, e.g. tcp://*:5555
  #[arg(long)]
  bind: Option<String>,
  /// Fixed reply text
  #[arg(long)]
  reply: Option<String>,
  /// Echo each request back instead of the fixed reply
  #[arg(long)]
  echo: bool,
  /// Simulated work per request, in milliseconds
  #[arg(long)]
  work_delay_ms: Option<u64>,
  /// Z85 server secret key, enables CURVE encryption
  #[arg(long)]
  curve_secret_key: Option<String>,
  /// Stop after answering this many requests
  #[arg(long)]
  limit: Option<usize>,
}

fn main() -> Result<(), Box<dyn Error>> {
  logging::init();
  let cli = Cli::parse();
  let mut config = ResponderConfig::load(cli.config.as_deref())?;
  if let Some(bind) = cli.bind {
    config.bind_address = bind;
  }
  if let Some(reply) = cli.reply {
    config.reply = reply;
  }
  if cli.echo {
    config.echo = true;
  }
  if let Some(delay) = cli.work_delay_ms {
    config.work_delay_ms = delay;
  }
  if let Some(key) = cli.curve_secret_key {
    config.curve_secret_key = Some(key);
  }

  let served = Responder::new(config).start(cli.limit)?;
  log::info!("Served {} requests", served);
  Ok(())
}
