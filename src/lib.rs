// Copyright 2015-2025 Deyan Ginev. See the LICENSE
// file at the top-level directory of this distribution.
//
// Licensed under the MIT license <LICENSE-MIT or http://opensource.org/licenses/MIT>.
// This file may not be copied, modified, or distributed
// except according to those terms.

//! A bounded-count synchronous request/reply client over ZeroMQ, with its reply server.
//!
//! ```no_run
//! use requester::client::RequestClient;
//! use requester::endpoint::Endpoint;
//! use requester::payload::Payload;
//! use requester::transport::ZmqTransport;
//!
//! let mut client = RequestClient::new(ZmqTransport::default());
//! let report = client
//!   .run(&Endpoint::tcp("localhost", 5555), &Payload::from("Hello"), 10)
//!   .unwrap();
//! for exchange in &report.exchanges {
//!   println!("{}", exchange);
//! }
//! ```
#![deny(missing_docs)]

pub mod client;
pub mod config;
pub mod endpoint;
pub mod logging;
pub mod payload;
pub mod responder;
pub mod transport;
