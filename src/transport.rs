// Copyright 2015-2025 Deyan Ginev. See the LICENSE
// file at the top-level directory of this distribution.
//
// Licensed under the MIT license <LICENSE-MIT or http://opensource.org/licenses/MIT>.
// This file may not be copied, modified, or distributed
// except according to those terms.

//! The messaging substrate underneath a `RequestClient`.
//!
//! A `Transport` knows how to open a connection to an `Endpoint`, move raw
//! bytes over it in both directions, and close it again. Framing is entirely
//! the transport's business: the client only ever sees whole messages.
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::endpoint::Endpoint;

/// The three ways a transport can fail
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
  /// the connection could not be set up (bad address, bad socket options or keys).
  /// ZeroMQ connects in the background, so an unreachable peer is not reported here
  Connection,
  /// the transport failed while sending a request
  Send,
  /// the transport failed, timed out, or the peer went away before a reply arrived
  Receive,
}

impl fmt::Display for ErrorKind {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    f.write_str(match self {
      ErrorKind::Connection => "ConnectionError",
      ErrorKind::Send => "SendError",
      ErrorKind::Receive => "ReceiveError",
    })
  }
}

/// A transport failure, with a human-readable reason
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum TransportError {
  /// Could not establish a connection
  #[error("connection error: {0}")]
  Connection(String),
  /// Failed mid-send
  #[error("send error: {0}")]
  Send(String),
  /// Failed, or the peer closed, before a reply was received
  #[error("receive error: {0}")]
  Receive(String),
}

impl TransportError {
  /// The kind of failure, without its reason
  pub fn kind(&self) -> ErrorKind {
    match *self {
      TransportError::Connection(_) => ErrorKind::Connection,
      TransportError::Send(_) => ErrorKind::Send,
      TransportError::Receive(_) => ErrorKind::Receive,
    }
  }
}

/// Connect/send/receive/close primitives for synchronous request/reply messaging
pub trait Transport {
  /// An open connection, exclusively owned by whoever connected it
  type Connection;

  /// Opens a connection to `endpoint`
  fn connect(&mut self, endpoint: &Endpoint) -> Result<Self::Connection, TransportError>;
  /// Sends one whole request message
  fn send(&mut self, connection: &mut Self::Connection, data: &[u8]) -> Result<(), TransportError>;
  /// Blocks until one whole reply message arrives
  fn receive(&mut self, connection: &mut Self::Connection) -> Result<Vec<u8>, TransportError>;
  /// Releases the connection
  fn close(&mut self, connection: Self::Connection);
}

/// Socket options for `ZmqTransport`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportOptions {
  /// how long to wait for a reply, in milliseconds (`None` blocks forever)
  pub receive_timeout_ms: Option<i32>,
  /// how long a send may block, in milliseconds (`None` blocks forever)
  pub send_timeout_ms: Option<i32>,
  /// how long a closed socket keeps trying to deliver pending requests
  pub linger_ms: i32,
  /// Z85-encoded (40 characters) server public key; enables CURVE encryption when set
  pub curve_server_key: Option<String>,
}

impl Default for TransportOptions {
  fn default() -> TransportOptions {
    TransportOptions {
      receive_timeout_ms: None,
      send_timeout_ms: None,
      linger_ms: 0,
      curve_server_key: None,
    }
  }
}

/// A ZeroMQ `REQ` socket transport
pub struct ZmqTransport {
  context: zmq::Context,
  options: TransportOptions,
}

impl Default for ZmqTransport {
  fn default() -> ZmqTransport { ZmqTransport::new(TransportOptions::default()) }
}

impl ZmqTransport {
  /// A transport with its own ZMQ context
  pub fn new(options: TransportOptions) -> Self {
    ZmqTransport {
      context: zmq::Context::new(),
      options,
    }
  }

  /// The socket options in effect
  pub fn options(&self) -> &TransportOptions { &self.options }

  fn configure(&self, socket: &zmq::Socket) -> Result<(), zmq::Error> {
    socket.set_linger(self.options.linger_ms)?;
    socket.set_rcvtimeo(self.options.receive_timeout_ms.unwrap_or(-1))?;
    socket.set_sndtimeo(self.options.send_timeout_ms.unwrap_or(-1))?;
    Ok(())
  }

  fn enable_curve(&self, socket: &zmq::Socket, server_key: &str) -> Result<(), TransportError> {
    if server_key.len() != 40 {
      return Err(TransportError::Connection(format!(
        "CURVE server key must be 40 Z85 characters, got {}",
        server_key.len()
      )));
    }
    let connection_error = |e: zmq::Error| TransportError::Connection(e.to_string());
    // A fresh client keypair per connection; the server only needs to know its own key.
    let keypair = zmq::CurveKeyPair::new().map_err(connection_error)?;
    socket.set_curve_serverkey(server_key.as_bytes()).map_err(connection_error)?;
    socket.set_curve_publickey(&keypair.public_key).map_err(connection_error)?;
    socket.set_curve_secretkey(&keypair.secret_key).map_err(connection_error)?;
    Ok(())
  }
}

impl Transport for ZmqTransport {
  type Connection = zmq::Socket;

  fn connect(&mut self, endpoint: &Endpoint) -> Result<zmq::Socket, TransportError> {
    let connection_error = |e: zmq::Error| TransportError::Connection(e.to_string());
    let socket = self.context.socket(zmq::REQ).map_err(connection_error)?;
    self.configure(&socket).map_err(connection_error)?;
    if let Some(ref server_key) = self.options.curve_server_key {
      self.enable_curve(&socket, server_key)?;
    }
    socket.connect(endpoint.as_str()).map_err(|e| {
      TransportError::Connection(format!("{} ({})", e, endpoint))
    })?;
    // libzmq connects asynchronously: an absent peer surfaces later as a receive timeout
    log::debug!("connected REQ socket to {}", endpoint);
    Ok(socket)
  }

  fn send(&mut self, socket: &mut zmq::Socket, data: &[u8]) -> Result<(), TransportError> {
    socket.send(data, 0).map_err(|e| match e {
      zmq::Error::EAGAIN => TransportError::Send(format!(
        "request not accepted within {}ms",
        self.options.send_timeout_ms.unwrap_or(-1)
      )),
      other => TransportError::Send(other.to_string()),
    })
  }

  fn receive(&mut self, socket: &mut zmq::Socket) -> Result<Vec<u8>, TransportError> {
    let frames = socket.recv_multipart(0).map_err(|e| match e {
      zmq::Error::EAGAIN => TransportError::Receive(format!(
        "no reply within {}ms",
        self.options.receive_timeout_ms.unwrap_or(-1)
      )),
      other => TransportError::Receive(other.to_string()),
    })?;
    Ok(frames.concat())
  }

  fn close(&mut self, socket: zmq::Socket) {
    // linger governs whether pending requests are still flushed
    drop(socket);
  }
}
