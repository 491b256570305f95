//! Job-control core of `esh`.
//!
//! A parsed [`types::Pipeline`] is handed to [`eval::eval`], which offers it
//! to registered [`plugin::Plugin`]s, then to the built-ins (`jobs`, `fg`,
//! `bg`, `kill`, `stop`, `exit`) and finally launches it as one process
//! group, tracked in the job table of [`global::State`].
//!
//! Child state changes are only ever applied on the caller's thread: the
//! SIGCHLD handler of [`signals::ChildNotifier`] merely marks work pending,
//! and [`wait::reap_pending`] or the foreground wait consume it.

pub mod builtin;
pub mod config;
pub mod error;
pub mod eval;
pub mod global;
pub mod job;
pub mod parser;
pub mod plugin;
pub mod signals;
pub mod terminal;
pub mod types;
pub mod wait;

pub use error::{Error, Result};
pub use global::State;
