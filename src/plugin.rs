use crate::types::Pipeline;

/// Extension point for code that lives outside the shell core.
pub trait Plugin {
	fn name(&self) -> &str;

	/// Offered every pipeline before built-ins and the launcher see it.
	/// Returning `true` claims it; nothing else runs.
	fn process_builtin(&mut self, _pipeline: &Pipeline) -> bool {
		false
	}

	/// A fragment appended to the interactive prompt.
	fn make_prompt(&self) -> Option<String> {
		None
	}
}

pub fn build_prompt(plugins: &[Box<dyn Plugin>], default: &str) -> String {
	let mut prompt: Option<String> = None;
	for fragment in plugins.iter().filter_map(|p| p.make_prompt()) {
		prompt.get_or_insert_with(String::new).push_str(&fragment);
	}
	prompt.unwrap_or_else(|| default.to_string())
}
