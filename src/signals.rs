use std::io;
use std::sync::mpsc;
use std::thread;

use nix::sys::signal::{self, SigHandler, SigSet, SigmaskHow, Signal};
use signal_hook::consts::SIGCHLD;
use signal_hook::iterator::Signals;
use tracing::debug;

/// Signals an interactive shell must not act on itself; its jobs get
/// the defaults back before exec.
const JOB_CONTROL_SIGNALS: [Signal; 5] = [
	Signal::SIGINT,
	Signal::SIGQUIT,
	Signal::SIGTSTP,
	Signal::SIGTTIN,
	Signal::SIGTTOU,
];

/// Blocks a set of signals for the calling thread until dropped, then
/// puts the previous mask back.
#[must_use]
pub struct BlockGuard {
	old: SigSet,
}

impl BlockGuard {
	pub fn new(signals: &[Signal]) -> nix::Result<BlockGuard> {
		let mut set = SigSet::empty();
		for &sig in signals {
			set.add(sig);
		}
		let mut old = SigSet::empty();
		signal::pthread_sigmask(SigmaskHow::SIG_BLOCK, Some(&set), Some(&mut old))?;
		Ok(BlockGuard { old: old })
	}
}

impl Drop for BlockGuard {
	fn drop(&mut self) {
		let _ = signal::pthread_sigmask(SigmaskHow::SIG_SETMASK, Some(&self.old), None);
	}
}

pub fn ignore_job_control_signals() -> nix::Result<()> {
	for &sig in &JOB_CONTROL_SIGNALS {
		unsafe { signal::signal(sig, SigHandler::SigIgn) }?;
	}
	Ok(())
}

/// Called in a freshly forked child.
pub fn reset_job_control_signals() -> nix::Result<()> {
	for &sig in &JOB_CONTROL_SIGNALS {
		unsafe { signal::signal(sig, SigHandler::SigDfl) }?;
	}
	Ok(())
}

/// Turns SIGCHLD deliveries into "work pending" tokens for the main loop.
///
/// The handler never touches the job table: a watcher thread forwards a
/// token over a channel of capacity one, so any number of deliveries
/// between two polls collapse into a single pending flag, just as the
/// kernel coalesces the signal itself.
pub struct ChildNotifier {
	rx: mpsc::Receiver<()>,
}

impl ChildNotifier {
	pub fn spawn() -> io::Result<ChildNotifier> {
		let mut signals = Signals::new([SIGCHLD])?;
		let (tx, rx) = mpsc::sync_channel(1);
		thread::Builder::new().name("sigchld".to_string()).spawn(move || {
			for _ in signals.forever() {
				match tx.try_send(()) {
					Ok(()) | Err(mpsc::TrySendError::Full(())) => {},
					Err(mpsc::TrySendError::Disconnected(())) => break,
				}
			}
			debug!("child notifier stopped");
		})?;
		Ok(ChildNotifier { rx: rx })
	}

	/// Consumes the pending token, if any.
	pub fn take_pending(&self) -> bool {
		self.rx.try_recv().is_ok()
	}
}
