use std::os::unix::io::{BorrowedFd, RawFd};

use nix::errno::Errno;
use nix::sys::signal::{self, Signal};
use nix::sys::termios::{self, SetArg, Termios};
use nix::unistd::{self, Pid};
use tracing::debug;

use crate::error::{Error, Result};
use crate::job::Pgid;
use crate::signals::BlockGuard;

fn tcsetpgrp(fd: RawFd, pgid: Pgid) -> nix::Result<()> {
	Errno::result(unsafe { libc::tcsetpgrp(fd, pgid.as_pid().as_raw()) }).map(drop)
}

fn tcgetpgrp(fd: RawFd) -> nix::Result<Pid> {
	Errno::result(unsafe { libc::tcgetpgrp(fd) }).map(Pid::from_raw)
}

/// The controlling terminal and who may hold it.
///
/// A detached terminal (standard input is not a tty) turns every
/// transfer into a no-op; jobs still get their own process groups.
#[derive(Debug)]
pub struct Terminal {
	fd: RawFd,
	interactive: bool,
	shell_pgid: Pgid,
	shell_tmodes: Option<Termios>,
}

impl Terminal {
	/// Takes the terminal on shell start-up: waits until the shell runs in
	/// the foreground, moves it into its own process group and records its
	/// terminal modes.
	pub fn acquire() -> Result<Terminal> {
		let fd = libc::STDIN_FILENO;
		loop {
			let pgrp = unistd::getpgrp();
			if tcgetpgrp(fd).map_err(Error::Terminal)? == pgrp {
				break;
			}
			signal::killpg(pgrp, Signal::SIGTTIN)?;
		}

		let shell_pid = unistd::getpid();
		match unistd::setpgid(shell_pid, shell_pid) {
			// a session leader already leads its own group
			Ok(()) | Err(Errno::EPERM) => {},
			Err(e) => return Err(e.into()),
		}
		let shell_pgid = Pgid::of_leader(unistd::getpgrp());

		let mut terminal = Terminal { fd: fd, interactive: true, shell_pgid: shell_pgid, shell_tmodes: None };
		terminal.give_to(shell_pgid, None)?;
		terminal.shell_tmodes = terminal.snapshot()?;
		debug!(pgid = %shell_pgid, "terminal acquired");
		Ok(terminal)
	}

	pub fn detached() -> Terminal {
		Terminal {
			fd: libc::STDIN_FILENO,
			interactive: false,
			shell_pgid: Pgid::of_leader(unistd::getpgrp()),
			shell_tmodes: None,
		}
	}

	pub fn is_interactive(&self) -> bool {
		self.interactive
	}

	pub fn shell_pgid(&self) -> Pgid {
		self.shell_pgid
	}

	fn borrow_fd(&self) -> BorrowedFd<'_> {
		unsafe { BorrowedFd::borrow_raw(self.fd) }
	}

	/// Makes `pgid` the foreground process group, then restores `tmodes`
	/// if given. SIGTTOU stays blocked across the call since the caller is
	/// not necessarily in the foreground group.
	pub fn give_to(&self, pgid: Pgid, tmodes: Option<&Termios>) -> Result<()> {
		if !self.interactive {
			return Ok(());
		}
		let _blocked = BlockGuard::new(&[Signal::SIGTTOU])?;
		tcsetpgrp(self.fd, pgid).map_err(Error::Terminal)?;
		if let Some(tmodes) = tmodes {
			termios::tcsetattr(self.borrow_fd(), SetArg::TCSADRAIN, tmodes).map_err(Error::Terminal)?;
		}
		Ok(())
	}

	/// Hands the terminal back to the shell with the shell's own modes.
	pub fn reclaim(&self) -> Result<()> {
		self.give_to(self.shell_pgid, self.shell_tmodes.as_ref())
	}

	pub fn snapshot(&self) -> Result<Option<Termios>> {
		if !self.interactive {
			return Ok(None);
		}
		Ok(Some(termios::tcgetattr(self.borrow_fd())?))
	}
}
