use std::fmt;

use nix::errno::Errno;
use nix::sys::signal::Signal;
use nix::sys::termios::Termios;
use nix::sys::wait::WaitStatus;
use nix::unistd::{self, Pid};
use tracing::debug;

use crate::types::Command;

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy)]
pub struct JobId(pub usize);

impl fmt::Display for JobId {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

/// A process group id. Distinct from `Pid` so that a group is never
/// signalled or compared as if it were one of its members.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub struct Pgid(Pid);

impl Pgid {
	pub fn of_leader(leader: Pid) -> Pgid {
		Pgid(leader)
	}

	pub fn as_pid(self) -> Pid {
		self.0
	}
}

impl fmt::Display for Pgid {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Status { Foreground, Background, Stopped, Done, Terminated }

impl Status {
	pub fn label(self) -> &'static str {
		match self {
			Status::Foreground => "Foreground",
			Status::Background => "Running",
			Status::Stopped => "Stopped",
			Status::Done => "Done",
			Status::Terminated => "Terminated",
		}
	}

	pub fn is_finished(self) -> bool {
		match self {
			Status::Done | Status::Terminated => true,
			_ => false,
		}
	}
}

/// A reaped child state change.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ChildEvent {
	Stopped(Pid, Signal),
	Continued(Pid),
	Exited(Pid, i32),
	Killed(Pid, Signal),
}

impl ChildEvent {
	/// `None` for statuses that carry no job-control meaning
	/// (`StillAlive`, ptrace stops).
	pub fn classify(status: WaitStatus) -> Option<ChildEvent> {
		match status {
			WaitStatus::Exited(pid, code) => Some(ChildEvent::Exited(pid, code)),
			WaitStatus::Signaled(pid, sig, _) => Some(ChildEvent::Killed(pid, sig)),
			WaitStatus::Stopped(pid, sig) => Some(ChildEvent::Stopped(pid, sig)),
			WaitStatus::Continued(pid) => Some(ChildEvent::Continued(pid)),
			_ => None,
		}
	}

	pub fn pid(self) -> Pid {
		match self {
			ChildEvent::Stopped(pid, _) => pid,
			ChildEvent::Continued(pid) => pid,
			ChildEvent::Exited(pid, _) => pid,
			ChildEvent::Killed(pid, _) => pid,
		}
	}
}

#[derive(Debug, Clone)]
pub struct Process {
	pub pid: Pid,
	pub command: Command,
}

#[derive(Debug)]
pub struct Job {
	pub id: JobId,
	pub pgid: Pgid,
	pub processes: Vec<Process>,
	pub is_background: bool,
	pub status: Status,
	/// Terminal modes captured when the job was stopped.
	pub saved_tty: Option<Termios>,
	text: String,
}

impl Job {
	/// `(cmd1 args | cmd2 args)`, as launched.
	pub fn display(&self) -> String {
		format!("({})", self.text)
	}

	pub fn is_empty(&self) -> bool {
		self.processes.is_empty()
	}

	fn contains(&self, pid: Pid) -> bool {
		self.processes.iter().any(|pr| pr.pid == pid)
	}
}

#[derive(Debug)]
pub struct JobBuilder {
	pgid: Option<Pgid>,
	processes: Vec<Process>,
	is_background: bool,
}

impl JobBuilder {
	pub fn new(size_hint: usize, is_background: bool) -> JobBuilder {
		JobBuilder { pgid: None, processes: Vec::with_capacity(size_hint), is_background: is_background }
	}

	pub fn pgid(&self) -> Option<Pgid> {
		self.pgid
	}

	pub fn is_empty(&self) -> bool {
		self.processes.is_empty()
	}

	/// Forks one stage. Both sides join the group so it is in place
	/// whichever of them runs first.
	pub fn push_fork(&mut self, command: &Command) -> nix::Result<unistd::ForkResult> {
		// SAFETY: the child only rewires descriptors and execs or _exits.
		let r = unsafe { unistd::fork() }?;
		match r {
			unistd::ForkResult::Parent { child } => {
				let pgid = *self.pgid.get_or_insert(Pgid::of_leader(child));
				match unistd::setpgid(child, pgid.as_pid()) {
					// the child already joined and exec'd, or is gone
					Ok(()) | Err(Errno::EACCES) | Err(Errno::ESRCH) => {},
					Err(e) => return Err(e),
				}
				debug!(pid = %child, pgid = %pgid, command = %command, "spawned");
				self.processes.push(Process { pid: child, command: command.clone() });
			},
			unistd::ForkResult::Child => {
				let pgid = self.pgid.map_or(Pid::from_raw(0), Pgid::as_pid);
				if unistd::setpgid(Pid::from_raw(0), pgid).is_err() {
					unsafe { libc::_exit(126) }
				}
			},
		}
		Ok(r)
	}

	pub fn build(self, id: JobId) -> Job {
		assert!(!self.processes.is_empty());
		let text = self.processes.iter().map(|pr| pr.command.to_string()).collect::<Vec<_>>().join(" | ");
		Job {
			id: id,
			pgid: self.pgid.unwrap_or(Pgid::of_leader(self.processes[0].pid)),
			processes: self.processes,
			is_background: self.is_background,
			status: if self.is_background { Status::Background } else { Status::Foreground },
			saved_tty: None,
			text: text,
		}
	}
}

/// What a reaped event did to the table.
#[derive(Debug)]
pub enum Transition {
	/// `was_foreground` tells whether the job held the terminal.
	Stopped { id: JobId, was_foreground: bool },
	Continued(JobId),
	/// The last process is gone; the job has left the table.
	Finished(Job),
}

/// Live jobs in creation order.
#[derive(Debug, Default)]
pub struct JobTable {
	jobs: Vec<Job>,
	last_id: usize,
}

impl JobTable {
	pub fn new() -> JobTable {
		JobTable::default()
	}

	/// The counter restarts at 1 whenever the table has emptied.
	pub fn next_id(&mut self) -> JobId {
		self.last_id = if self.jobs.is_empty() { 1 } else { self.last_id + 1 };
		JobId(self.last_id)
	}

	pub fn push(&mut self, job: Job) -> JobId {
		let id = job.id;
		self.jobs.push(job);
		id
	}

	pub fn len(&self) -> usize {
		self.jobs.len()
	}

	pub fn is_empty(&self) -> bool {
		self.jobs.is_empty()
	}

	pub fn iter(&self) -> std::slice::Iter<Job> {
		self.jobs.iter()
	}

	pub fn get(&self, id: JobId) -> Option<&Job> {
		self.jobs.iter().find(|job| job.id == id)
	}

	pub fn get_mut(&mut self, id: JobId) -> Option<&mut Job> {
		self.jobs.iter_mut().find(|job| job.id == id)
	}

	pub fn remove(&mut self, id: JobId) -> Option<Job> {
		let idx = self.jobs.iter().position(|job| job.id == id)?;
		Some(self.jobs.remove(idx))
	}

	/// The most recently created job, if any.
	pub fn current(&self) -> Option<&Job> {
		self.jobs.last()
	}

	/// Resolves a built-in's job argument. Without one, the current job.
	pub fn resolve(&self, arg: Option<&str>) -> Option<JobId> {
		match arg {
			None => self.current().map(|job| job.id),
			Some(arg) => {
				let n: usize = arg.trim_start_matches('%').parse().ok()?;
				self.get(JobId(n)).map(|job| job.id)
			},
		}
	}

	pub fn purge_finished(&mut self) {
		self.jobs.retain(|job| !job.status.is_finished());
	}

	/// Records one reaped event against the job owning its pid.
	pub fn apply(&mut self, event: ChildEvent) -> Option<Transition> {
		let pid = event.pid();
		let idx = match self.jobs.iter().position(|job| job.contains(pid)) {
			Some(idx) => idx,
			None => return None,
		};
		let job = &mut self.jobs[idx];
		match event {
			ChildEvent::Stopped(..) => {
				if job.status == Status::Stopped {
					return None;
				}
				let was_foreground = job.status == Status::Foreground;
				job.status = Status::Stopped;
				Some(Transition::Stopped { id: job.id, was_foreground: was_foreground })
			},
			ChildEvent::Continued(..) => {
				if job.status != Status::Stopped {
					return None;
				}
				job.status = Status::Background;
				Some(Transition::Continued(job.id))
			},
			ChildEvent::Exited(..) | ChildEvent::Killed(..) => {
				job.processes.retain(|pr| pr.pid != pid);
				if !job.processes.is_empty() {
					return None;
				}
				job.status = match event {
					ChildEvent::Killed(..) => Status::Terminated,
					_ => Status::Done,
				};
				Some(Transition::Finished(self.jobs.remove(idx)))
			},
		}
	}
}
