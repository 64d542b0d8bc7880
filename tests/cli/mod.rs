//! Launcher tests.

mod launcher_test;
mod options_test;
mod transcript_test;
