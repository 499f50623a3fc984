// Copyright 2015-2025 Deyan Ginev. See the LICENSE
// file at the top-level directory of this distribution.
//
// Licensed under the MIT license <LICENSE-MIT or http://opensource.org/licenses/MIT>.
// This file may not be copied, modified, or distributed
// except according to those terms.

//! Request payloads and where they come from
use bytes::Bytes;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Failure to load a payload from its source
#[derive(Debug, Error)]
#[error("could not read payload from {path:?}: {source}")]
pub struct PayloadError {
  /// the file that failed to load
  pub path: PathBuf,
  /// underlying IO error
  #[source]
  pub source: std::io::Error,
}

/// An immutable byte blob, sent unmodified with every request.
/// Clones share the same underlying buffer.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Payload(Bytes);

impl Payload {
  /// Reads the full contents of a file into a payload
  pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, PayloadError> {
    let path = path.as_ref();
    let wrap = |source| PayloadError {
      path: path.to_path_buf(),
      source,
    };
    let mut file = File::open(path).map_err(wrap)?;
    let mut data = Vec::new();
    file.read_to_end(&mut data).map_err(wrap)?;
    log::debug!("loaded {} byte payload from {:?}", data.len(), path);
    Ok(Payload(Bytes::from(data)))
  }

  /// The raw bytes
  pub fn as_bytes(&self) -> &[u8] { &self.0 }

  /// Size in bytes
  pub fn len(&self) -> usize { self.0.len() }

  /// Is this an empty payload?
  pub fn is_empty(&self) -> bool { self.0.is_empty() }
}

impl From<Vec<u8>> for Payload {
  fn from(data: Vec<u8>) -> Self { Payload(Bytes::from(data)) }
}

impl From<&'static [u8]> for Payload {
  fn from(data: &'static [u8]) -> Self { Payload(Bytes::from_static(data)) }
}

impl From<&'static str> for Payload {
  fn from(data: &'static str) -> Self { Payload(Bytes::from_static(data.as_bytes())) }
}

impl From<Bytes> for Payload {
  fn from(data: Bytes) -> Self { Payload(data) }
}

impl AsRef<[u8]> for Payload {
  fn as_ref(&self) -> &[u8] { &self.0 }
}
