use std::io::Write;
use std::path::Path;
use std::process::{Child, Command, Output, Stdio};
use std::time::{Duration, Instant};
use std::{fs, thread};

/// Runs the shell on `script` with a pipe as stdin, so without a terminal
/// and without prompts.
fn esh(script: &str) -> Output {
	esh_paced(&[script], Duration::from_millis(0))
}

/// Writes `chunks` one at a time with a pause after each, then closes
/// stdin and collects the output.
fn feed(mut child: Child, chunks: &[&str], pause: Duration) -> Output {
	let mut stdin = child.stdin.take().unwrap();
	for chunk in chunks {
		stdin.write_all(chunk.as_bytes()).unwrap();
		stdin.flush().unwrap();
		thread::sleep(pause);
	}
	drop(stdin);
	child.wait_with_output().unwrap()
}

fn esh_paced(chunks: &[&str], pause: Duration) -> Output {
	let child = Command::new(env!("CARGO_BIN_EXE_esh"))
		.stdin(Stdio::piped())
		.stdout(Stdio::piped())
		.stderr(Stdio::piped())
		.spawn()
		.unwrap();
	feed(child, chunks, pause)
}

/// Same, but the shell runs interactively on a pseudo-terminal set up by
/// script(1). `None` when script(1) is not installed.
fn esh_on_pty(chunks: &[&str], pause: Duration) -> Option<String> {
	let child = Command::new("script")
		.args(&["-qfc", env!("CARGO_BIN_EXE_esh"), "/dev/null"])
		.stdin(Stdio::piped())
		.stdout(Stdio::piped())
		.stderr(Stdio::piped())
		.spawn();
	match child {
		Ok(child) => Some(String::from_utf8_lossy(&feed(child, chunks, pause).stdout).into_owned()),
		Err(e) => {
			eprintln!("skipping, script(1) unavailable: {}", e);
			None
		},
	}
}

/// The `pgid=` and `tpgid=` values of the first output line holding `tag`.
fn group_and_terminal(out: &str, tag: &str) -> (String, String) {
	let line = match out.lines().find(|l| l.contains(tag)) {
		Some(line) => line,
		None => panic!("no {:?} in {:?}", tag, out),
	};
	let value = |key: &str| line.split_whitespace()
		.find_map(|w| w.trim_end_matches('\r').strip_prefix(key).map(|v| v.to_string()))
		.unwrap();
	(value("pgid="), value("tpgid="))
}

fn write_script(dir: &Path, name: &str, body: &str) -> String {
	let path = dir.join(name);
	fs::write(&path, body).unwrap();
	path.display().to_string()
}

fn stdout_of(script: &str) -> String {
	let output = esh(script);
	assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
	String::from_utf8(output.stdout).unwrap()
}

#[test]
fn pipeline_wires_every_stage() {
	assert_eq!(stdout_of("echo hello world | tr a-z A-Z\n"), "HELLO WORLD\n");
	assert_eq!(stdout_of("seq 5 | sort -r | head -n 2 | tail -n 1\n"), "4\n");
}

#[test]
fn redirections_touch_only_the_ends() {
	let dir = tempfile::tempdir().unwrap();
	let input = dir.path().join("in.txt");
	let output = dir.path().join("out.txt");
	fs::write(&input, "one\ntwo\nthree\n").unwrap();

	let script = format!("grep t < {} | tr a-z A-Z > {}\n", input.display(), output.display());
	assert_eq!(stdout_of(&script), "");
	assert_eq!(fs::read_to_string(&output).unwrap(), "TWO\nTHREE\n");

	let script = format!("echo four >> {}\necho five > {}\ncat {}\n", output.display(), input.display(), input.display());
	assert_eq!(stdout_of(&script), "five\n");
	assert_eq!(fs::read_to_string(&output).unwrap(), "TWO\nTHREE\nfour\n");
}

#[test]
fn failures_stay_in_the_child() {
	let output = esh("no-such-command-esh\ncat < /no/such/file\necho still here\n");
	assert!(output.status.success());
	assert_eq!(String::from_utf8_lossy(&output.stdout), "still here\n");
	let stderr = String::from_utf8_lossy(&output.stderr);
	assert!(stderr.contains("esh: no-such-command-esh: command not found"), "{}", stderr);
	assert!(stderr.contains("/no/such/file"), "{}", stderr);
}

#[test]
fn parse_errors_are_reported() {
	let output = esh("ls |\necho ok\n");
	assert_eq!(String::from_utf8_lossy(&output.stdout), "ok\n");
	assert!(String::from_utf8_lossy(&output.stderr).contains("esh: empty command"));
}

#[test]
fn background_job_is_listed_and_killed() {
	let started = Instant::now();
	let out = stdout_of("sleep 30 | sleep 30 &\njobs\nkill\nfg\njobs\n");
	let lines: Vec<&str> = out.lines().collect();
	assert!(lines[0].starts_with("[1] "), "{}", out);
	assert_eq!(lines[1], "[1]+\tRunning\t\t\t(sleep 30 | sleep 30)");
	// killing the group ends both sleeps, so fg (if the job is still
	// there) returns and nothing is left for the second listing
	assert!(!lines[2 ..].iter().any(|l| l.contains("Running")), "{}", out);
	assert!(started.elapsed() < Duration::from_secs(20));
}

#[test]
fn job_ids_grow_and_markers_follow() {
	let out = stdout_of("sleep 30 &\nsleep 30 &\nsleep 30 &\njobs\nkill 1\nkill 2\nkill 3\n");
	let lines: Vec<&str> = out.lines().collect();
	assert!(lines[0].starts_with("[1] "));
	assert!(lines[1].starts_with("[2] "));
	assert!(lines[2].starts_with("[3] "));
	assert_eq!(&lines[3 ..], &[
		"[1]\tRunning\t\t\t(sleep 30)",
		"[2]-\tRunning\t\t\t(sleep 30)",
		"[3]+\tRunning\t\t\t(sleep 30)",
	]);
}

#[test]
fn missing_jobs() {
	let out = stdout_of("fg\nbg 3\nkill 1\nstop\njobs\n");
	assert_eq!(out, concat!(
		"esh:\tfg: current: no such job\n",
		"esh:\tbg: 3: no such job\n",
		"esh:\tkill: 1: no such job\n",
		"esh:\tstop: current: no such job\n",
	));
}

#[test]
fn jobs_sees_a_stop_without_waiting_for_the_prompt() {
	let output = esh_paced(&["sleep 30 &\nstop\n", "jobs\nkill\n"], Duration::from_millis(500));
	let out = String::from_utf8_lossy(&output.stdout);
	let lines: Vec<&str> = out.lines().collect();
	assert!(lines[0].starts_with("[1] "), "{}", out);
	assert_eq!(&lines[1 ..], &[
		"[1]\tStopped\t\t\t(sleep 30)",
		"[1]+\tStopped\t\t\t(sleep 30)",
	]);
}

#[test]
fn kill_skips_a_job_that_already_finished() {
	let output = esh_paced(&["true &\n", "kill\njobs\n"], Duration::from_millis(500));
	let out = String::from_utf8_lossy(&output.stdout);
	let lines: Vec<&str> = out.lines().collect();
	assert!(lines[0].starts_with("[1] "), "{}", out);
	assert_eq!(&lines[1 ..], &["esh:\tkill: current: no such job"]);
}

#[test]
fn stopped_job_resumes_to_completion() {
	let started = Instant::now();
	let output = esh_paced(&["sleep 1 &\nstop\n", "jobs\n", "bg\nfg\njobs\necho after\n"], Duration::from_millis(300));
	let out = String::from_utf8_lossy(&output.stdout);
	let lines: Vec<&str> = out.lines().collect();
	assert!(lines[0].starts_with("[1] "), "{}", out);
	assert_eq!(&lines[1 ..], &[
		"[1]\tStopped\t\t\t(sleep 1)",
		"[1]+\tStopped\t\t\t(sleep 1)",
		"(sleep 1)",
		"after",
	]);
	assert!(started.elapsed() < Duration::from_secs(20));
}

#[test]
fn stopped_background_job_leaves_the_terminal_alone() {
	let dir = tempfile::tempdir().unwrap();
	let reader = write_script(dir.path(), "reader.sh", "sleep 1; read x\n");
	let check = write_script(dir.path(), "check.sh",
		"sleep 2; set -- $(cat /proc/$$/stat); echo \"job pgid=$5 tpgid=$8\"\n");
	let first = format!("sh {} &\nsh {}\n", reader, check);
	let out = match esh_on_pty(&[&first, "kill 1\n", "exit\n"], Duration::from_millis(3500)) {
		Some(out) => out,
		None => return,
	};
	assert!(out.contains("Stopped"), "{}", out);
	let (pgid, tpgid) = group_and_terminal(&out, "job pgid=");
	assert_eq!(pgid, tpgid, "{}", out);
}

#[test]
fn terminal_returns_to_the_shell_after_a_stop() {
	let dir = tempfile::tempdir().unwrap();
	let stopper = write_script(dir.path(), "stopper.sh",
		"kill -STOP $$; set -- $(cat /proc/$$/stat); echo \"resumed pgid=$5 tpgid=$8\"\n");
	let check = write_script(dir.path(), "check.sh",
		"set -- $(cat /proc/$PPID/stat); shell=$5; set -- $(cat /proc/$$/stat); echo \"shell pgid=$shell tpgid=$8\"\n");
	let chunks = [format!("sh {}\n", stopper), format!("sh {} &\n", check), "fg 1\n".to_string(), "exit\n".to_string()];
	let chunks: Vec<&str> = chunks.iter().map(String::as_str).collect();
	let out = match esh_on_pty(&chunks, Duration::from_millis(1000)) {
		Some(out) => out,
		None => return,
	};
	assert!(out.contains("Stopped"), "{}", out);
	// at the prompt the shell's own group owns the terminal
	let (pgid, tpgid) = group_and_terminal(&out, "shell pgid=");
	assert_eq!(pgid, tpgid, "{}", out);
	// and fg hands it back to the resumed job
	let (pgid, tpgid) = group_and_terminal(&out, "resumed pgid=");
	assert_eq!(pgid, tpgid, "{}", out);
}

#[test]
fn foreground_waits_for_the_whole_pipeline() {
	let started = Instant::now();
	let out = stdout_of("sleep 1 | echo first\necho second\n");
	assert_eq!(out, "first\nsecond\n");
	assert!(started.elapsed() >= Duration::from_millis(900));
}

#[test]
fn exit_ignores_running_jobs() {
	let started = Instant::now();
	let output = esh("sleep 2 > /dev/null &\nexit\necho unreachable\n");
	assert!(output.status.success());
	let out = String::from_utf8_lossy(&output.stdout);
	assert!(out.starts_with("[1] "));
	assert!(!out.contains("unreachable"));
	assert!(started.elapsed() < Duration::from_secs(20));
}
