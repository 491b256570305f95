use std::io::{self, BufRead, IsTerminal, Write};
use std::process;

use anyhow::Context;
use tracing::debug;

use esh::config::{self, Args, Config};
use esh::signals::{self, ChildNotifier};
use esh::terminal::Terminal;
use esh::{eval, parser, wait, Error, State};

fn run(config: Config) -> anyhow::Result<()> {
	let interactive = io::stdin().is_terminal();
	let terminal = if interactive {
		let terminal = Terminal::acquire().context("cannot take the terminal")?;
		signals::ignore_job_control_signals().context("cannot ignore job-control signals")?;
		terminal
	} else {
		Terminal::detached()
	};
	let notifier = ChildNotifier::spawn().context("cannot watch SIGCHLD")?;
	let mut state = State::new(terminal, config.prompt);

	let mut stdout = io::stdout();
	let stdin = io::stdin();
	let mut stdin_locked = stdin.lock();
	loop {
		if notifier.take_pending() {
			wait::reap_pending(&mut state, &mut stdout)?;
		}
		state.terminal.reclaim()?;

		if interactive {
			let _ = stdout.write_all(state.build_prompt().as_bytes());
			let _ = stdout.flush();
		}
		let mut line = String::new();
		if stdin_locked.read_line(&mut line)? == 0 {
			if interactive {
				let _ = writeln!(stdout);
			}
			break;
		}

		let pipelines = match parser::parse(&line) {
			Ok(pipelines) => pipelines,
			Err(e) => {
				eprintln!("esh: {}", Error::Parse(e));
				continue;
			},
		};
		for pipeline in &pipelines {
			debug!(%pipeline, background = pipeline.is_background, "eval");
			if let Err(e) = eval::eval(&mut state, pipeline, &mut stdout) {
				if e.is_fatal() {
					return Err(e.into());
				}
				eprintln!("esh: {}", e);
			}
		}
	}
	Ok(())
}

fn main() {
	let args: Args = argh::from_env();
	let config = Config::from_args(args);
	config::init_logging(&config);

	if let Err(e) = run(config) {
		eprintln!("esh: {:#}", e);
		process::exit(1);
	}
}
