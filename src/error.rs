use std::{ffi, io};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
	#[error("{0}")]
	Nix(#[from] nix::Error),
	#[error("IO error: {0}")]
	Io(#[from] io::Error),
	#[error("Nul char error: {0}")]
	Nul(#[from] ffi::NulError),
	/// The controlling terminal could not be handed over.
	#[error("tcsetpgrp: {0}")]
	Terminal(#[source] nix::Error),
	#[error("{0}")]
	Parse(String),
	#[error("{0}: {1}")]
	Redirect(String, #[source] nix::Error),
	#[error("command not found")]
	NotFound,
	#[error("empty command")]
	EmptyCommand,
}

impl Error {
	/// Terminal ownership is the one resource the shell cannot recover
	/// from losing track of.
	pub fn is_fatal(&self) -> bool {
		match *self {
			Error::Terminal(_) => true,
			_ => false,
		}
	}
}

pub type Result<T> = std::result::Result<T, Error>;
