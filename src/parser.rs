use std::path::PathBuf;

use crate::types::*;

pub type ParseResult<T> = Result<T, String>;

struct Parser<'a> {
	line: &'a str,
	i: usize,
}

impl<'a> Parser<'a> {
	fn peek(&self) -> Option<u8> {
		self.line.as_bytes().get(self.i).cloned()
	}

	fn proceed_while<F>(&mut self, f: F) where F: Fn(u8) -> bool {
		while let Some(c) = self.peek() {
			if !f(c) { break; }
			self.i += 1;
		}
	}

	fn is_whitespace(c: u8) -> bool {
		match c {
			b' ' | b'\t' | b'\n' | b'\r' => true,
			_ => false,
		}
	}

	fn is_letter(c: u8) -> bool {
		match c {
			b'>' | b'<' | b'&' | b'|' | b';' => false,
			_ => !Parser::is_whitespace(c),
		}
	}

	fn skip_whitespaces(&mut self) {
		self.proceed_while(Parser::is_whitespace);
	}

	fn read_word(&mut self) -> &'a str {
		let orig = self.i;
		self.proceed_while(Parser::is_letter);
		&self.line[orig .. self.i]
	}

	fn parse_redirect(&mut self) -> ParseResult<Option<Redirect>> {
		let typ = match self.peek() {
			Some(b'<') => {
				self.i += 1;
				RedirectType::Input
			},
			Some(b'>') => if self.line.as_bytes().get(self.i + 1) == Some(&b'>') {
				self.i += 2;
				RedirectType::Append
			} else {
				self.i += 1;
				RedirectType::Output
			},
			_ => { return Ok(None); },
		};

		self.skip_whitespaces();
		let target = self.read_word();
		if target.is_empty() {
			return Err("empty redirect".to_string());
		}

		Ok(Some(Redirect { target: PathBuf::from(target), typ: typ }))
	}

	fn parse_command(&mut self) -> ParseResult<Command> {
		let mut command = Command::new(Vec::<String>::new());

		loop {
			self.skip_whitespaces();
			if let Some(redirect) = self.parse_redirect()? {
				match redirect.typ {
					RedirectType::Input => command.input = Some(redirect.target),
					_ => command.output = Some(redirect),
				}
				continue;
			}
			let word = self.read_word();
			if word.is_empty() {
				break;
			}
			command.argv.push(word.to_string());
		}

		if command.argv.is_empty() {
			return Err("empty command".to_string());
		}
		Ok(command)
	}

	fn parse_pipeline(&mut self) -> ParseResult<Pipeline> {
		let mut commands: Vec<Command> = vec![];
		let mut is_background = false;

		loop {
			commands.push(self.parse_command()?);
			match self.peek() {
				Some(b'|') => { self.i += 1; },
				Some(b'&') => {
					self.i += 1;
					is_background = true;
					break;
				},
				Some(b';') => {
					self.i += 1;
					break;
				},
				Some(c) => { return Err(format!("unknown command separator: '{}'", c as char)); },
				None => { break; },
			}
		}
		Ok(Pipeline { commands: commands, is_background: is_background })
	}

	fn parse_command_line(&mut self) -> ParseResult<Vec<Pipeline>> {
		let mut pipelines = vec![];
		loop {
			self.skip_whitespaces();
			if self.peek().is_none() {
				break;
			}
			pipelines.push(self.parse_pipeline()?);
		}
		Ok(pipelines)
	}
}

/// Splits one input line into the pipelines it contains, in order.
pub fn parse(line: &str) -> ParseResult<Vec<Pipeline>> {
	let mut parser = Parser { line: line, i: 0 };
	parser.parse_command_line()
}
