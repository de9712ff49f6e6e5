#[macro_use]
extern crate tracing;

pub mod builtins;
pub mod cmd;
pub mod config;
pub mod error;
pub mod history;
pub mod input;
pub mod parse;
pub mod prelude;
pub mod process;
pub mod shell;
pub mod state;
