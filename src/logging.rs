// Copyright 2015-2025 Deyan Ginev. See the LICENSE
// file at the top-level directory of this distribution.
//
// Licensed under the MIT license <LICENSE-MIT or http://opensource.org/licenses/MIT>.
// This file may not be copied, modified, or distributed
// except according to those terms.

//! Logger setup for the executables. The library itself only talks to the `log` facade.
use env_logger::{Builder, Env};

/// Installs `env_logger`, at `info` level unless `RUST_LOG` says otherwise.
/// Calling it twice is harmless.
pub fn init() {
  let _ = Builder::from_env(Env::default().default_filter_or("info"))
    .format_timestamp_millis()
    .try_init();
}
