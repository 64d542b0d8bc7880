//! Session multiplexer tests.

mod collect_test;
mod session_test;

use claude_session::{LaunchOptions, SessionConfig};

use crate::common::FakeCli;

/// Session config pointing at `fake`.
fn config_for(fake: &FakeCli) -> SessionConfig {
    SessionConfig::new(LaunchOptions::new().binary(fake.path()))
}
