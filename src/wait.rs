use std::io::Write;

use nix::errno::Errno;
use nix::sys::wait::{self, WaitPidFlag, WaitStatus};
use tracing::{debug, warn};

use crate::error::Result;
use crate::global::State;
use crate::job::{ChildEvent, JobId, Status, Transition};

/// Applies one `waitpid` result to the job table and carries out what the
/// resulting transition asks for.
pub fn handle_status<W: Write + ?Sized>(state: &mut State, status: WaitStatus, out: &mut W) -> Result<Option<Transition>> {
	let event = match ChildEvent::classify(status) {
		Some(event) => event,
		None => return Ok(None),
	};
	let transition = state.job_set.apply(event);
	match &transition {
		None => debug!(?event, "no transition"),
		&Some(Transition::Stopped { id, was_foreground }) => {
			// a background job never held the terminal; leave it to
			// whoever is in the foreground now
			let tmodes = if was_foreground { state.terminal.snapshot()? } else { None };
			if let Some(job) = state.job_set.get_mut(id) {
				if tmodes.is_some() {
					job.saved_tty = tmodes;
				}
				debug!(job = %id, pgid = %job.pgid, was_foreground, "stopped");
				writeln!(out, "[{}]\tStopped\t\t\t{}", job.id, job.display())?;
				out.flush()?;
			}
			if was_foreground {
				state.terminal.reclaim()?;
			}
		},
		Some(Transition::Continued(id)) => debug!(job = %id, "continued"),
		Some(Transition::Finished(job)) => debug!(job = %job.id, status = job.status.label(), "finished"),
	}
	Ok(transition)
}

/// Drains every state change that is already pending without blocking.
pub fn reap_pending<W: Write + ?Sized>(state: &mut State, out: &mut W) -> Result<()> {
	let flags = WaitPidFlag::WNOHANG | WaitPidFlag::WUNTRACED | WaitPidFlag::WCONTINUED;
	loop {
		match wait::waitpid(None, Some(flags)) {
			Ok(WaitStatus::StillAlive) => return Ok(()),
			Ok(status) => { handle_status(state, status, out)?; },
			Err(Errno::EINTR) => {},
			Err(Errno::ECHILD) => return Ok(()),
			Err(e) => return Err(e.into()),
		}
	}
}

/// Blocks while job `id` is in the foreground and has live processes.
/// Events for other jobs reaped on the way are applied as well.
///
/// Returns the job's status on return; `Done` or `Terminated` once it has
/// left the table.
pub fn wait_for_job<W: Write + ?Sized>(state: &mut State, id: JobId, out: &mut W) -> Result<Status> {
	let mut finished = None;
	loop {
		match state.job_set.get(id) {
			Some(job) if job.status == Status::Foreground && !job.is_empty() => {},
			Some(job) => return Ok(job.status),
			None => return Ok(finished.unwrap_or(Status::Done)),
		}
		match wait::waitpid(None, Some(WaitPidFlag::WUNTRACED)) {
			Ok(status) => {
				if let Some(Transition::Finished(job)) = handle_status(state, status, out)? {
					if job.id == id {
						finished = Some(job.status);
					}
				}
			},
			Err(Errno::EINTR) => {},
			Err(Errno::ECHILD) => {
				warn!(job = %id, "no children left while waiting; dropping job");
				state.job_set.remove(id);
			},
			Err(e) => return Err(e.into()),
		}
	}
}
