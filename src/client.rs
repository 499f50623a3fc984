// Copyright 2015-2025 Deyan Ginev. See the LICENSE
// file at the top-level directory of this distribution.
//
// Licensed under the MIT license <LICENSE-MIT or http://opensource.org/licenses/MIT>.
// This file may not be copied, modified, or distributed
// except according to those terms.

//! A bounded-count, strictly sequential request/reply client
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::endpoint::Endpoint;
use crate::payload::Payload;
use crate::transport::{ErrorKind, Transport, TransportError};

/// What to do with the remaining exchanges once one of them fails
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorPolicy {
  /// record the failure and carry on with the next exchange
  #[default]
  ContinueOnError,
  /// record the failure and stop
  AbortOnFirstError,
}

impl FromStr for ErrorPolicy {
  type Err = String;
  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_lowercase().as_str() {
      "continue" | "continue-on-error" => Ok(ErrorPolicy::ContinueOnError),
      "abort" | "abort-on-first-error" => Ok(ErrorPolicy::AbortOnFirstError),
      other => Err(format!(
        "unknown error policy {:?}, expected \"continue\" or \"abort\"",
        other
      )),
    }
  }
}

/// Failure handling knobs for a `RequestClient`
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientPolicy {
  /// continue or abort after a failed exchange
  pub on_error: ErrorPolicy,
  /// how many times a failed exchange is re-attempted over a fresh connection
  pub retries: usize,
}

/// Lifecycle of a client run
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClientState {
  /// nothing connected yet
  Idle,
  /// connection open, no exchange outstanding
  Connected,
  /// a request is being handed to the transport
  Sending,
  /// a request is out, blocked on its reply
  AwaitingReply,
  /// the connection was released; the run is over
  Closed,
}

/// The result of a single exchange
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
  /// the reply bytes, as delivered by the transport
  Reply(Vec<u8>),
  /// the final transport failure for this exchange
  Failure(TransportError),
}

/// One request/reply round trip
#[derive(Clone, Debug)]
pub struct Exchange {
  /// 0-based position in the run
  pub index: usize,
  /// the payload that was sent
  pub request: Payload,
  /// how it ended
  pub outcome: Outcome,
}

impl Exchange {
  /// The reply, if the exchange succeeded
  pub fn reply(&self) -> Option<&[u8]> {
    match self.outcome {
      Outcome::Reply(ref bytes) => Some(bytes),
      Outcome::Failure(_) => None,
    }
  }

  /// The failure kind, if the exchange failed
  pub fn failure(&self) -> Option<ErrorKind> {
    match self.outcome {
      Outcome::Reply(_) => None,
      Outcome::Failure(ref e) => Some(e.kind()),
    }
  }
}

impl fmt::Display for Exchange {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    match self.outcome {
      Outcome::Reply(ref bytes) => write!(
        f,
        "Received reply {} [ {} ]",
        self.index,
        String::from_utf8_lossy(bytes)
      ),
      Outcome::Failure(ref e) => write!(f, "Failed request {} [ {} ]", self.index, e),
    }
  }
}

/// Ordered results of a completed run
#[derive(Clone, Debug, Default)]
pub struct RunReport {
  /// exchanges in index order
  pub exchanges: Vec<Exchange>,
  /// true if the run stopped before reaching the requested count
  pub aborted: bool,
}

impl RunReport {
  /// Successful replies, in order
  pub fn replies(&self) -> impl Iterator<Item = &[u8]> { self.exchanges.iter().filter_map(Exchange::reply) }

  /// Failed exchanges, in order
  pub fn failures(&self) -> impl Iterator<Item = &Exchange> {
    self.exchanges.iter().filter(|e| e.failure().is_some())
  }

  /// Did all `count` exchanges run and succeed?
  pub fn is_complete(&self, count: usize) -> bool {
    self.exchanges.len() == count && self.failures().next().is_none()
  }
}

/// A run that could not start
#[derive(Debug, Error)]
pub enum RunError {
  /// the initial connection failed; no exchange was attempted
  #[error("could not connect to {endpoint}: {source}")]
  Connect {
    /// where we tried to connect
    endpoint: Endpoint,
    /// the transport's reason
    #[source]
    source: TransportError,
  },
}

impl RunError {
  /// Always `ErrorKind::Connection` for now
  pub fn kind(&self) -> ErrorKind {
    match *self {
      RunError::Connect { ref source, .. } => source.kind(),
    }
  }
}

/// Issues a fixed number of request/reply exchanges over a single `Transport` connection,
/// one at a time.
pub struct RequestClient<T: Transport> {
  transport: T,
  policy: ClientPolicy,
  state: ClientState,
}

impl<T: Transport> RequestClient<T> {
  /// A client with the default policy: continue on error, no retries
  pub fn new(transport: T) -> Self { RequestClient::with_policy(transport, ClientPolicy::default()) }

  /// A client with an explicit failure policy
  pub fn with_policy(transport: T, policy: ClientPolicy) -> Self {
    RequestClient {
      transport,
      policy,
      state: ClientState::Idle,
    }
  }

  /// Current lifecycle state
  pub fn state(&self) -> ClientState { self.state }

  /// The failure policy in effect
  pub fn policy(&self) -> &ClientPolicy { &self.policy }

  /// The underlying transport
  pub fn transport(&self) -> &T { &self.transport }

  /// Releases the underlying transport
  pub fn into_transport(self) -> T { self.transport }

  /// Connects to `endpoint` and sends `payload` `count` times, waiting for each reply before
  /// the next send. Exchange failures are recorded in the report; only a failure to connect in
  /// the first place is returned as an error. The connection is closed on every exit path.
  pub fn run(
    &mut self,
    endpoint: &Endpoint,
    payload: &Payload,
    count: usize,
  ) -> Result<RunReport, RunError>
  {
    let state = &mut self.state;
    let policy = &self.policy;
    transition(state, ClientState::Idle);
    log::info!("Connecting to {} ...", endpoint);
    let mut session = match Session::open(&mut self.transport, endpoint) {
      Ok(session) => session,
      Err(source) => {
        transition(state, ClientState::Closed);
        return Err(RunError::Connect {
          endpoint: endpoint.clone(),
          source,
        });
      },
    };
    transition(state, ClientState::Connected);

    let mut report = RunReport {
      exchanges: Vec::with_capacity(count),
      aborted: false,
    };
    // A REQ-style connection that lost a reply can not be used for another request.
    let mut stale = false;
    for index in 0..count {
      let mut retries_left = policy.retries;
      let mut fatal = false;
      log::info!("Sending request {} ...", index);
      let outcome = loop {
        if stale {
          if let Err(e) = session.reopen(state) {
            log::error!("request {}: could not reconnect: {}", index, e);
            fatal = true;
            break Outcome::Failure(e);
          }
          stale = false;
        }
        match session.round_trip(state, payload.as_bytes()) {
          Ok(reply) => break Outcome::Reply(reply),
          Err(e) => {
            stale = true;
            if retries_left == 0 {
              break Outcome::Failure(e);
            }
            retries_left -= 1;
            log::warn!("request {}: {}, retrying ({} left)", index, e, retries_left);
          },
        }
      };
      let failed = match outcome {
        Outcome::Reply(ref bytes) => {
          log::info!("Received reply {} [ {} bytes ]", index, bytes.len());
          false
        },
        Outcome::Failure(ref e) => {
          log::warn!("Request {} failed: {}", index, e);
          true
        },
      };
      report.exchanges.push(Exchange {
        index,
        request: payload.clone(),
        outcome,
      });
      if fatal || (failed && policy.on_error == ErrorPolicy::AbortOnFirstError) {
        report.aborted = index + 1 < count;
        break;
      }
    }
    drop(session);
    transition(state, ClientState::Closed);
    Ok(report)
  }
}

fn transition(state: &mut ClientState, next: ClientState) {
  log::trace!("client state {:?} -> {:?}", state, next);
  *state = next;
}

/// Exclusive ownership of an open connection; closing it on drop
struct Session<'t, T: Transport> {
  transport: &'t mut T,
  endpoint: &'t Endpoint,
  connection: Option<T::Connection>,
}

impl<'t, T: Transport> Session<'t, T> {
  fn open(transport: &'t mut T, endpoint: &'t Endpoint) -> Result<Self, TransportError> {
    let connection = transport.connect(endpoint)?;
    Ok(Session {
      transport,
      endpoint,
      connection: Some(connection),
    })
  }

  /// Closes the current connection and opens a fresh one to the same endpoint
  fn reopen(&mut self, state: &mut ClientState) -> Result<(), TransportError> {
    if let Some(connection) = self.connection.take() {
      self.transport.close(connection);
    }
    log::debug!("reconnecting to {}", self.endpoint);
    let connection = self.transport.connect(self.endpoint)?;
    self.connection = Some(connection);
    transition(state, ClientState::Connected);
    Ok(())
  }

  fn round_trip(&mut self, state: &mut ClientState, data: &[u8]) -> Result<Vec<u8>, TransportError> {
    let Session {
      transport,
      connection,
      ..
    } = self;
    let connection = connection
      .as_mut()
      .ok_or_else(|| TransportError::Connection("connection already closed".to_string()))?;
    transition(state, ClientState::Sending);
    transport.send(connection, data)?;
    transition(state, ClientState::AwaitingReply);
    let reply = transport.receive(connection)?;
    transition(state, ClientState::Connected);
    Ok(reply)
  }
}

impl<'t, T: Transport> Drop for Session<'t, T> {
  fn drop(&mut self) {
    if let Some(connection) = self.connection.take() {
      self.transport.close(connection);
      log::debug!("closed connection to {}", self.endpoint);
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::collections::HashSet;

  #[derive(Clone, Debug, PartialEq)]
  enum Call {
    Connect,
    Send(Vec<u8>),
    Receive,
    Close,
  }

  struct MockConnection {
    pending: Option<Vec<u8>>,
  }

  /// Echoes each request with a suffix, failing on the scripted call numbers
  #[derive(Default)]
  struct MockTransport {
    suffix: Vec<u8>,
    calls: Vec<Call>,
    connects: usize,
    sends: usize,
    receives: usize,
    open_connections: usize,
    /// connect attempts numbered from this one on fail
    fail_connects_from: Option<usize>,
    fail_sends: HashSet<usize>,
    fail_receives: HashSet<usize>,
  }

  impl MockTransport {
    fn echo(suffix: &[u8]) -> Self {
      MockTransport {
        suffix: suffix.to_vec(),
        ..MockTransport::default()
      }
    }
    fn sent(&self) -> Vec<&Vec<u8>> {
      self
        .calls
        .iter()
        .filter_map(|c| match c {
          Call::Send(data) => Some(data),
          _ => None,
        })
        .collect()
    }
  }

  impl Transport for MockTransport {
    type Connection = MockConnection;

    fn connect(&mut self, _endpoint: &Endpoint) -> Result<MockConnection, TransportError> {
      self.calls.push(Call::Connect);
      let attempt = self.connects;
      self.connects += 1;
      if self.fail_connects_from.map_or(false, |from| attempt >= from) {
        return Err(TransportError::Connection("unreachable".to_string()));
      }
      self.open_connections += 1;
      Ok(MockConnection { pending: None })
    }

    fn send(&mut self, connection: &mut MockConnection, data: &[u8]) -> Result<(), TransportError> {
      self.calls.push(Call::Send(data.to_vec()));
      assert!(connection.pending.is_none(), "send issued while a reply is outstanding");
      let attempt = self.sends;
      self.sends += 1;
      if self.fail_sends.contains(&attempt) {
        return Err(TransportError::Send("broken pipe".to_string()));
      }
      connection.pending = Some(data.to_vec());
      Ok(())
    }

    fn receive(&mut self, connection: &mut MockConnection) -> Result<Vec<u8>, TransportError> {
      self.calls.push(Call::Receive);
      let request = connection
        .pending
        .take()
        .expect("receive without an outstanding request");
      let attempt = self.receives;
      self.receives += 1;
      if self.fail_receives.contains(&attempt) {
        return Err(TransportError::Receive("peer went away".to_string()));
      }
      let mut reply = request;
      reply.extend_from_slice(&self.suffix);
      Ok(reply)
    }

    fn close(&mut self, _connection: MockConnection) {
      self.calls.push(Call::Close);
      self.open_connections -= 1;
    }
  }

  fn endpoint() -> Endpoint { Endpoint::from("mock://server") }

  fn policy(on_error: ErrorPolicy, retries: usize) -> ClientPolicy { ClientPolicy { on_error, retries } }

  #[test]
  fn ten_echo_replies_in_order() {
    let mut client = RequestClient::new(MockTransport::echo(b" [ok]"));
    let report = client.run(&endpoint(), &Payload::from("x"), 10).unwrap();
    assert_eq!(report.exchanges.len(), 10);
    for (i, exchange) in report.exchanges.iter().enumerate() {
      assert_eq!(exchange.index, i);
      assert_eq!(exchange.reply(), Some(&b"x [ok]"[..]));
    }
    assert!(report.is_complete(10));
    assert!(!report.aborted);
    assert_eq!(client.state(), ClientState::Closed);
    assert_eq!(client.transport().open_connections, 0);
  }

  #[test]
  fn exchanges_never_overlap() {
    let mut client = RequestClient::new(MockTransport::echo(b"!"));
    client.run(&endpoint(), &Payload::from("ping"), 4).unwrap();
    let calls = &client.transport().calls;
    assert_eq!(calls.first(), Some(&Call::Connect));
    assert_eq!(calls.last(), Some(&Call::Close));
    let middle = &calls[1..calls.len() - 1];
    assert_eq!(middle.len(), 8);
    for pair in middle.chunks(2) {
      assert_eq!(pair[0], Call::Send(b"ping".to_vec()));
      assert_eq!(pair[1], Call::Receive);
    }
  }

  #[test]
  fn payload_is_sent_unmodified_every_time() {
    let payload = Payload::from(vec![0u8, 159, 146, 150, 255]);
    let mut client = RequestClient::new(MockTransport::echo(b""));
    let report = client.run(&endpoint(), &payload, 6).unwrap();
    let sent = client.transport().sent();
    assert_eq!(sent.len(), 6);
    assert!(sent.iter().all(|data| data.as_slice() == payload.as_bytes()));
    assert!(report.exchanges.iter().all(|e| e.request == payload));
    assert_eq!(report.replies().count(), 6);
  }

  #[test]
  fn zero_count_opens_and_closes_only() {
    let mut client = RequestClient::new(MockTransport::echo(b""));
    let report = client.run(&endpoint(), &Payload::from("x"), 0).unwrap();
    assert!(report.exchanges.is_empty());
    assert!(report.is_complete(0));
    assert_eq!(client.transport().calls, vec![Call::Connect, Call::Close]);
  }

  #[test]
  fn connect_failure_yields_no_exchanges() {
    let mut transport = MockTransport::echo(b"");
    transport.fail_connects_from = Some(0);
    let mut client = RequestClient::new(transport);
    let err = client.run(&endpoint(), &Payload::from("x"), 3).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Connection);
    assert_eq!(client.transport().calls, vec![Call::Connect]);
    assert_eq!(client.state(), ClientState::Closed);
  }

  #[test]
  fn abort_on_first_error_stops_sending() {
    let mut transport = MockTransport::echo(b"");
    transport.fail_receives.insert(2);
    let mut client = RequestClient::with_policy(transport, policy(ErrorPolicy::AbortOnFirstError, 0));
    let report = client.run(&endpoint(), &Payload::from("x"), 5).unwrap();
    assert_eq!(report.exchanges.len(), 3);
    assert!(report.exchanges[0].reply().is_some());
    assert!(report.exchanges[1].reply().is_some());
    assert_eq!(report.exchanges[2].failure(), Some(ErrorKind::Receive));
    assert!(report.aborted);
    assert_eq!(client.transport().sends, 3);
    assert_eq!(client.transport().open_connections, 0);
  }

  #[test]
  fn continue_on_error_reconnects_and_finishes() {
    let mut transport = MockTransport::echo(b"");
    transport.fail_receives.insert(2);
    let mut client = RequestClient::new(transport);
    let report = client.run(&endpoint(), &Payload::from("x"), 5).unwrap();
    assert_eq!(report.exchanges.len(), 5);
    let failed: Vec<usize> = report.failures().map(|e| e.index).collect();
    assert_eq!(failed, vec![2]);
    assert!(!report.is_complete(5));
    assert!(!report.aborted);
    assert_eq!(client.transport().connects, 2);
    assert_eq!(client.transport().sends, 5);
    assert_eq!(client.transport().open_connections, 0);
  }

  #[test]
  fn send_failures_are_recorded_per_index() {
    let mut transport = MockTransport::echo(b"");
    transport.fail_sends.insert(0);
    let mut client = RequestClient::new(transport);
    let report = client.run(&endpoint(), &Payload::from("x"), 2).unwrap();
    assert_eq!(report.exchanges[0].failure(), Some(ErrorKind::Send));
    assert_eq!(report.exchanges[1].reply(), Some(&b"x"[..]));
  }

  #[test]
  fn retries_recover_a_lost_reply() {
    let mut transport = MockTransport::echo(b"");
    transport.fail_receives.insert(2);
    let mut client = RequestClient::with_policy(transport, policy(ErrorPolicy::AbortOnFirstError, 1));
    let report = client.run(&endpoint(), &Payload::from("x"), 5).unwrap();
    assert!(report.is_complete(5));
    assert_eq!(client.transport().sends, 6);
    assert_eq!(client.transport().connects, 2);
  }

  #[test]
  fn retries_are_bounded() {
    let mut transport = MockTransport::echo(b"");
    transport.fail_receives.extend(vec![0, 1, 2]);
    let mut client = RequestClient::with_policy(transport, policy(ErrorPolicy::AbortOnFirstError, 2));
    let report = client.run(&endpoint(), &Payload::from("x"), 3).unwrap();
    assert_eq!(report.exchanges.len(), 1);
    assert_eq!(report.exchanges[0].failure(), Some(ErrorKind::Receive));
    assert_eq!(client.transport().sends, 3);
  }

  #[test]
  fn failed_reconnect_ends_the_run() {
    let mut transport = MockTransport::echo(b"");
    transport.fail_receives.insert(1);
    transport.fail_connects_from = Some(1);
    let mut client = RequestClient::new(transport);
    let report = client.run(&endpoint(), &Payload::from("x"), 5).unwrap();
    assert_eq!(report.exchanges.len(), 3);
    assert_eq!(report.exchanges[1].failure(), Some(ErrorKind::Receive));
    assert_eq!(report.exchanges[2].failure(), Some(ErrorKind::Connection));
    assert!(report.aborted);
    assert_eq!(client.transport().open_connections, 0);
  }

  #[test]
  fn error_policy_names() {
    assert_eq!("abort".parse::<ErrorPolicy>(), Ok(ErrorPolicy::AbortOnFirstError));
    assert_eq!(
      "continue-on-error".parse::<ErrorPolicy>(),
      Ok(ErrorPolicy::ContinueOnError)
    );
    assert!("sometimes".parse::<ErrorPolicy>().is_err());
  }
}
