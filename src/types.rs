use std::fmt;
use std::path::PathBuf;

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum RedirectType { Input, Output, Append }

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Redirect {
	pub target: PathBuf,
	pub typ: RedirectType,
}

/// One stage of a pipeline as handed over by the parser.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Command {
	pub argv: Vec<String>,
	pub input: Option<PathBuf>,
	/// Output target; the redirect type is either `Output` or `Append`.
	pub output: Option<Redirect>,
}

impl Command {
	pub fn new<I, S>(argv: I) -> Command where I: IntoIterator<Item = S>, S: Into<String> {
		Command { argv: argv.into_iter().map(Into::into).collect(), input: None, output: None }
	}

	pub fn name(&self) -> &str {
		self.argv.first().map_or("", String::as_str)
	}

	pub fn arguments(&self) -> &[String] {
		self.argv.get(1 ..).unwrap_or(&[])
	}

	pub fn is_append(&self) -> bool {
		self.output.as_ref().map_or(false, |r| r.typ == RedirectType::Append)
	}
}

impl fmt::Display for Command {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		f.write_str(&self.argv.join(" "))
	}
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Pipeline {
	pub commands: Vec<Command>,
	pub is_background: bool,
}

impl fmt::Display for Pipeline {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		for (i, command) in self.commands.iter().enumerate() {
			if i != 0 {
				f.write_str(" | ")?;
			}
			write!(f, "{}", command)?;
		}
		Ok(())
	}
}
