//! CLI argument definitions and command dispatch

mod args;
mod dispatch;

pub use dispatch::run;
