// Copyright 2015-2025 Deyan Ginev. See the LICENSE
// file at the top-level directory of this distribution.
//
// Licensed under the MIT license <LICENSE-MIT or http://opensource.org/licenses/MIT>.
// This file may not be copied, modified, or distributed
// except according to those terms.

//! The reply side: a ZMQ `REP` server answering every request in turn
use std::thread;
use std::time::Duration;
use zmq::Error;

use crate::config::ResponderConfig;

/// Specifies the binding and reply behaviour of a ZMQ `REP` server
pub struct Responder {
  /// bind address, reply and simulated work settings
  pub config: ResponderConfig,
  context: zmq::Context,
}

/// A `Responder` whose socket is already bound and ready to serve
pub struct BoundResponder {
  config: ResponderConfig,
  socket: zmq::Socket,
  endpoint: String,
}

impl Default for Responder {
  fn default() -> Responder { Responder::new(ResponderConfig::default()) }
}

impl Responder {
  /// A responder with its own ZMQ context
  pub fn new(config: ResponderConfig) -> Self {
    Responder {
      config,
      context: zmq::Context::new(),
    }
  }

  /// Binds the `REP` socket. Wildcard ports (`tcp://127.0.0.1:*`) are resolved, see
  /// `BoundResponder::endpoint`. With a `curve_secret_key` configured the socket takes the
  /// CURVE server role and only talks to clients holding the matching public key.
  pub fn bind(&self) -> Result<BoundResponder, Error> {
    let socket = self.context.socket(zmq::REP)?;
    socket.set_linger(0)?;
    if let Some(ref secret_key) = self.config.curve_secret_key {
      // server options must be in place before bind
      if secret_key.len() != 40 {
        log::error!("CURVE secret key must be 40 Z85 characters, got {}", secret_key.len());
        return Err(Error::EINVAL);
      }
      socket.set_curve_server(true)?;
      socket.set_curve_secretkey(secret_key.as_bytes())?;
    }
    socket.bind(&self.config.bind_address)?;
    let endpoint = socket
      .get_last_endpoint()?
      .unwrap_or_else(|raw| String::from_utf8_lossy(&raw).into_owned());
    log::info!("Responder bound to {}", endpoint);
    Ok(BoundResponder {
      config: self.config.clone(),
      socket,
      endpoint,
    })
  }

  /// Binds and serves; see `BoundResponder::serve`
  pub fn start(&self, job_limit: Option<usize>) -> Result<usize, Error> { self.bind()?.serve(job_limit) }
}

impl BoundResponder {
  /// The concrete address the socket is bound to
  pub fn endpoint(&self) -> &str { &self.endpoint }

  /// Answers requests one at a time until `job_limit` of them were served (forever when
  /// `None`). Returns the number of requests answered.
  pub fn serve(&self, job_limit: Option<usize>) -> Result<usize, Error> {
    let work_delay = Duration::from_millis(self.config.work_delay_ms);
    let mut served: usize = 0;
    loop {
      if let Some(limit) = job_limit {
        if served >= limit {
          break;
        }
      }
      let request = self.socket.recv_multipart(0)?.concat();
      log::info!("Received request {} ({} bytes)", served, request.len());
      if !work_delay.is_zero() {
        thread::sleep(work_delay);
      }
      if self.config.echo {
        self.socket.send(&request[..], 0)?;
      } else {
        self.socket.send(self.config.reply.as_bytes(), 0)?;
      }
      served += 1;
    }
    log::info!("Responder at {} done after {} requests", self.endpoint, served);
    Ok(served)
  }
}
