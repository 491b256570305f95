use std::convert::Infallible;
use std::ffi::CString;
use std::io::{self, Write};
use std::os::unix::ffi::OsStrExt;
use std::os::unix::io::{AsRawFd, OwnedFd, RawFd};

use nix::errno::Errno;
use nix::fcntl::{self, OFlag};
use nix::sys::stat::Mode;
use nix::unistd::{self, ForkResult};
use tracing::debug;

use crate::builtin;
use crate::error::{Error, Result};
use crate::global::State;
use crate::job::{JobBuilder, Pgid};
use crate::signals;
use crate::terminal::Terminal;
use crate::types::{Command, Pipeline};
use crate::wait;

/// A command converted to C strings before forking, so the child has
/// nothing left to allocate but the exec itself.
struct Prepared {
	argv: Vec<CString>,
	input: Option<CString>,
	output: Option<(CString, bool)>,
}

impl Prepared {
	fn new(command: &Command) -> Result<Prepared> {
		if command.argv.is_empty() {
			return Err(Error::EmptyCommand);
		}
		let argv = command.argv.iter().map(|a| CString::new(a.as_bytes())).collect::<std::result::Result<Vec<_>, _>>()?;
		let input = match command.input {
			Some(ref path) => Some(CString::new(path.as_os_str().as_bytes())?),
			None => None,
		};
		let output = match command.output {
			Some(ref redirect) => Some((CString::new(redirect.target.as_os_str().as_bytes())?, command.is_append())),
			None => None,
		};
		Ok(Prepared { argv: argv, input: input, output: output })
	}

	fn name(&self) -> String {
		self.argv[0].to_string_lossy().into_owned()
	}
}

fn redirect(path: &CString, flags: OFlag, to: RawFd) -> Result<()> {
	let fd = fcntl::open(path.as_c_str(), flags, Mode::from_bits_truncate(0o666))
		.map_err(|e| Error::Redirect(path.to_string_lossy().into_owned(), e))?;
	unistd::dup2(fd, to)?;
	unistd::close(fd)?;
	Ok(())
}

fn do_exec_command(terminal: &Terminal, foreground: Option<Pgid>, command: &Prepared,
                   stdin: Option<RawFd>, stdout: Option<RawFd>) -> Result<Infallible> {
	if let Some(pgid) = foreground {
		terminal.give_to(pgid, None)?;
	}
	if terminal.is_interactive() {
		signals::reset_job_control_signals()?;
	}

	if let Some(fd) = stdin {
		unistd::dup2(fd, libc::STDIN_FILENO)?;
	}
	if let Some(fd) = stdout {
		unistd::dup2(fd, libc::STDOUT_FILENO)?;
	}
	if let Some(ref path) = command.input {
		redirect(path, OFlag::O_RDONLY, libc::STDIN_FILENO)?;
	}
	if let Some((ref path, append)) = command.output {
		let mode = if append { OFlag::O_APPEND } else { OFlag::O_TRUNC };
		redirect(path, OFlag::O_WRONLY | OFlag::O_CREAT | mode, libc::STDOUT_FILENO)?;
	}

	match unistd::execvp(&command.argv[0], &command.argv) {
		Err(Errno::ENOENT) => Err(Error::NotFound),
		Err(e) => Err(e.into()),
		Ok(never) => match never {},
	}
}

/// Runs in the forked child and never returns into shell code.
fn exec_command(terminal: &Terminal, foreground: Option<Pgid>, command: &Prepared,
                stdin: Option<RawFd>, stdout: Option<RawFd>) -> ! {
	let s = match do_exec_command(terminal, foreground, command, stdin, stdout) {
		Ok(never) => match never {},
		Err(e) => {
			let _ = writeln!(io::stderr(), "esh: {}: {}", command.name(), e);
			match e {
				Error::NotFound => 127,
				_ => 126,
			}
		},
	};
	unsafe { libc::_exit(s) }
}

/// Forks every stage left to right. Only one pipe is open at a time: the
/// read end of the previous stage's pipe is carried into the next
/// iteration and the parent drops each end as soon as it is handed over.
fn spawn_commands(state: &State, pipeline: &Pipeline, job_builder: &mut JobBuilder) -> Result<()> {
	let prepared = pipeline.commands.iter().map(Prepared::new).collect::<Result<Vec<_>>>()?;
	let foreground = !pipeline.is_background;
	let last = pipeline.commands.len() - 1;
	let mut pipe_stdin: Option<OwnedFd> = None;

	for (i, command) in pipeline.commands.iter().enumerate() {
		let pipe_next = if i != last {
			Some(unistd::pipe2(OFlag::O_CLOEXEC)?)
		} else {
			None
		};
		match job_builder.push_fork(command)? {
			ForkResult::Parent { .. } => {
				if i == 0 && foreground {
					if let Some(pgid) = job_builder.pgid() {
						state.terminal.give_to(pgid, None)?;
					}
				}
				pipe_stdin = pipe_next.map(|(read, _write)| read);
			},
			ForkResult::Child => {
				let pgid = if foreground {
					Some(job_builder.pgid().unwrap_or(Pgid::of_leader(unistd::getpid())))
				} else {
					None
				};
				exec_command(&state.terminal, pgid, &prepared[i],
				             pipe_stdin.as_ref().map(AsRawFd::as_raw_fd),
				             pipe_next.as_ref().map(|(_, write)| write.as_raw_fd()));
			},
		}
	}
	Ok(())
}

fn launch(state: &mut State, pipeline: &Pipeline, out: &mut dyn Write) -> Result<()> {
	let mut job_builder = JobBuilder::new(pipeline.commands.len(), pipeline.is_background);
	let spawned = spawn_commands(state, pipeline, &mut job_builder);
	if job_builder.is_empty() {
		return spawned;
	}

	let id = state.job_set.next_id();
	let job = job_builder.build(id);
	let (pgid, background) = (job.pgid, job.is_background);
	state.job_set.push(job);
	debug!(job = %id, pgid = %pgid, background, "registered");

	if let Err(e) = spawned {
		if e.is_fatal() {
			return Err(e);
		}
		let _ = writeln!(io::stderr(), "esh: {}", e);
	}

	if background {
		writeln!(out, "[{}] {}", id, pgid)?;
		out.flush()?;
		return Ok(());
	}
	let status = wait::wait_for_job(state, id, out)?;
	debug!(job = %id, status = status.label(), "foreground wait over");
	state.terminal.reclaim()
}

/// Evaluates one pipeline: plugins first, then built-ins, then the
/// launcher. Foreground pipelines return once they finish or stop.
pub fn eval(state: &mut State, pipeline: &Pipeline, out: &mut dyn Write) -> Result<()> {
	if pipeline.commands.is_empty() {
		return Err(Error::EmptyCommand);
	}

	for plugin in state.plugins.iter_mut() {
		if plugin.process_builtin(pipeline) {
			debug!(plugin = plugin.name(), "claimed by plugin");
			return Ok(());
		}
	}

	let command = &pipeline.commands[0];
	if let Some(func) = builtin::match_builtin(command.name()) {
		return func(state, command.arguments(), out);
	}

	launch(state, pipeline, out)
}
