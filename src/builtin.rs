use std::io::{self, Write};
use std::process;

use nix::sys::signal::{self, Signal};
use tracing::debug;

use crate::error::Result;
use crate::global::State;
use crate::job::{JobId, Status};
use crate::wait;

pub type Builtin = fn(&mut State, &[String], &mut dyn Write) -> Result<()>;

/// Picks the job a built-in acts on, or says there is none.
fn target(state: &State, name: &str, args: &[String], out: &mut dyn Write) -> Result<Option<JobId>> {
	let arg = args.first().map(String::as_str);
	match state.job_set.resolve(arg) {
		Some(id) => Ok(Some(id)),
		None => {
			writeln!(out, "esh:\t{}: {}: no such job", name, arg.unwrap_or("current"))?;
			out.flush()?;
			Ok(None)
		},
	}
}

fn signal_job(state: &State, id: JobId, sig: Signal) -> Result<()> {
	if let Some(job) = state.job_set.get(id) {
		debug!(job = %id, pgid = %job.pgid, signal = ?sig, "signalling job");
		signal::killpg(job.pgid.as_pid(), sig)?;
	}
	Ok(())
}

pub fn builtin_jobs(state: &mut State, _: &[String], out: &mut dyn Write) -> Result<()> {
	wait::reap_pending(state, out)?;
	state.job_set.purge_finished();
	let len = state.job_set.len();
	for (i, job) in state.job_set.iter().enumerate() {
		let mark = if i + 1 == len {
			"+"
		} else if i + 2 == len {
			"-"
		} else {
			""
		};
		writeln!(out, "[{}]{}\t{}\t\t\t{}", job.id, mark, job.status.label(), job.display())?;
	}
	out.flush()?;
	Ok(())
}

pub fn builtin_fg(state: &mut State, args: &[String], out: &mut dyn Write) -> Result<()> {
	wait::reap_pending(state, out)?;
	let id = match target(state, "fg", args, out)? {
		Some(id) => id,
		None => return Ok(()),
	};
	let (pgid, tmodes, text) = match state.job_set.get_mut(id) {
		Some(job) => {
			job.status = Status::Foreground;
			(job.pgid, job.saved_tty.clone(), job.display())
		},
		None => return Ok(()),
	};

	state.terminal.give_to(pgid, tmodes.as_ref())?;
	if let Err(e) = signal::killpg(pgid.as_pid(), Signal::SIGCONT) {
		state.terminal.reclaim()?;
		return Err(e.into());
	}
	writeln!(out, "{}", text)?;
	out.flush()?;

	let status = wait::wait_for_job(state, id, out)?;
	debug!(job = %id, status = status.label(), "fg wait over");
	state.terminal.reclaim()
}

pub fn builtin_bg(state: &mut State, args: &[String], out: &mut dyn Write) -> Result<()> {
	wait::reap_pending(state, out)?;
	let id = match target(state, "bg", args, out)? {
		Some(id) => id,
		None => return Ok(()),
	};
	if let Some(job) = state.job_set.get_mut(id) {
		job.status = Status::Background;
	}
	signal_job(state, id, Signal::SIGCONT)
}

pub fn builtin_kill(state: &mut State, args: &[String], out: &mut dyn Write) -> Result<()> {
	wait::reap_pending(state, out)?;
	match target(state, "kill", args, out)? {
		Some(id) => signal_job(state, id, Signal::SIGKILL),
		None => Ok(()),
	}
}

pub fn builtin_stop(state: &mut State, args: &[String], out: &mut dyn Write) -> Result<()> {
	wait::reap_pending(state, out)?;
	match target(state, "stop", args, out)? {
		Some(id) => signal_job(state, id, Signal::SIGSTOP),
		None => Ok(()),
	}
}

pub fn builtin_exit(_: &mut State, _: &[String], out: &mut dyn Write) -> Result<()> {
	let _ = out.flush();
	let _ = io::stdout().flush();
	process::exit(0)
}

pub fn match_builtin(name: &str) -> Option<Builtin> {
	match name {
		"jobs" => Some(builtin_jobs),
		"fg" => Some(builtin_fg),
		"bg" => Some(builtin_bg),
		"kill" => Some(builtin_kill),
		"stop" => Some(builtin_stop),
		"exit" => Some(builtin_exit),
		_ => None,
	}
}
