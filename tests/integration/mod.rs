//! Integration tests for the tether generation client

mod config_loading;
mod dispatch_chain;
mod repair_parser;
mod streaming;
mod test_utils;

pub use test_utils::*;
