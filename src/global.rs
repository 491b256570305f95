use crate::job;
use crate::plugin::{self, Plugin};
use crate::terminal::Terminal;

/// Everything the shell core shares between the launcher, the reaper and
/// the built-ins. Only ever touched from the main flow.
pub struct State {
	pub job_set: job::JobTable,
	pub terminal: Terminal,
	pub plugins: Vec<Box<dyn Plugin>>,
	pub prompt: String,
}

impl State {
	pub fn new(terminal: Terminal, prompt: String) -> State {
		State { job_set: job::JobTable::new(), terminal: terminal, plugins: vec![], prompt: prompt }
	}

	pub fn register_plugin(&mut self, plugin: Box<dyn Plugin>) {
		self.plugins.push(plugin);
	}

	pub fn build_prompt(&self) -> String {
		plugin::build_prompt(&self.plugins, &self.prompt)
	}
}
