use std::collections::VecDeque;
use std::iter::Peekable;
use std::str::SplitAsciiWhitespace;

use tracing::trace;

use crate::error::{ParseError, ParseResult};
use crate::types::*;

const SEQUENCE_SEPARATOR: char = ';';
const PIPE_SEPARATOR: char = '|';

fn is_blank(s: &str) -> bool {
	s.bytes().all(|c| c.is_ascii_whitespace())
}

fn push_bounded<T>(v: &mut Vec<T>, item: T, cap: usize, overflow: ParseError) -> ParseResult<()> {
	if v.len() >= cap {
		return Err(overflow);
	}
	v.try_reserve(1)?;
	v.push(item);
	Ok(())
}

struct Parser<'a> {
	tokens: Peekable<SplitAsciiWhitespace<'a>>,
}

impl<'a> Parser<'a> {
	fn new(segment: &'a str) -> Parser<'a> {
		Parser { tokens: segment.split_ascii_whitespace().peekable() }
	}

	fn parse_redirect(&mut self, command: &mut Command) -> ParseResult<bool> {
		let typ = match self.tokens.peek().and_then(|t| RedirectType::from_token(t)) {
			Some(typ) => typ,
			None => { return Ok(false); },
		};
		self.tokens.next();

		let target = match self.tokens.next() {
			Some(t) => t.to_string(),
			None => { return Err(ParseError::MissingRedirectTarget(typ)); },
		};

		// a repeated redirection of the same stream replaces the earlier one
		match typ {
			RedirectType::Output => command.stdout_target = Some(OutputTarget { path: target, append: false }),
			RedirectType::Append => command.stdout_target = Some(OutputTarget { path: target, append: true }),
			RedirectType::Error => command.stderr_target = Some(target),
		}
		Ok(true)
	}

	fn parse_command(&mut self) -> ParseResult<Command> {
		let mut command = Command::new(Vec::new());

		loop {
			if self.parse_redirect(&mut command)? {
				continue;
			}
			match self.tokens.next() {
				Some(word) => push_bounded(&mut command.argv, word.to_string(), MAX_ARGS, ParseError::TooManyArgs)?,
				None => { break; },
			}
		}

		if command.argv.is_empty() {
			return Err(ParseError::MissingCommand);
		}
		Ok(command)
	}
}

fn parse_pipeline(raw: &str) -> ParseResult<Pipeline> {
	let mut commands: Vec<Command> = Vec::new();

	for segment in raw.split(PIPE_SEPARATOR) {
		if commands.len() >= MAX_COMMANDS {
			return Err(ParseError::TooManyCommands);
		}
		if is_blank(segment) {
			return Err(ParseError::MissingCommand);
		}
		let command = Parser::new(segment).parse_command()?;
		push_bounded(&mut commands, command, MAX_COMMANDS, ParseError::TooManyCommands)?;
	}

	if let Some(last) = commands.last_mut() {
		last.is_last = true;
	}

	let mut raw_text = String::new();
	raw_text.try_reserve_exact(raw.len())?;
	raw_text.push_str(raw);

	Ok(Pipeline { commands: commands, raw_text: raw_text, is_background: false })
}

/// Parses one input line into a sequence of pipelines.
///
/// Nothing built before an error survives it: partially parsed pipelines are
/// dropped along with the error return.
pub fn parse(line: &str) -> ParseResult<Sequence> {
	if is_blank(line) {
		return Err(ParseError::EmptyInput);
	}

	let mut pipelines: VecDeque<Pipeline> = VecDeque::new();
	for raw in line.split(SEQUENCE_SEPARATOR) {
		if pipelines.len() >= MAX_SEQUENCE_LEN {
			return Err(ParseError::TooManyPipelines);
		}
		if is_blank(raw) {
			return Err(ParseError::MissingCommand);
		}
		let pipeline = parse_pipeline(raw)?;
		trace!(raw = raw, commands = pipeline.commands.len(), "parsed pipeline");
		pipelines.try_reserve(1)?;
		pipelines.push_back(pipeline);
	}

	Ok(Sequence { pipelines: pipelines })
}

#[cfg(test)]
mod tests {
	use super::*;
	use pretty_assertions::assert_eq;

	fn argv0s(pipeline: &Pipeline) -> Vec<&str> {
		pipeline.commands().iter().map(|c| c.program()).collect()
	}

	fn words(n: usize) -> String {
		(0..n).map(|i| format!("w{}", i)).collect::<Vec<_>>().join(" ")
	}

	#[test]
	fn three_stage_pipeline() {
		let mut seq = parse("a | b | c").unwrap();
		assert_eq!(seq.len(), 1);
		let p = seq.take_next_pipeline().unwrap();
		assert_eq!(argv0s(&p), vec!["a", "b", "c"]);
		let last: Vec<bool> = p.commands().iter().map(|c| c.is_last_in_pipeline()).collect();
		assert_eq!(last, vec![false, false, true]);
		assert!(!p.is_background);
		assert!(seq.take_next_pipeline().is_none());
	}

	#[test]
	fn sequence_is_fifo() {
		let mut seq = parse("a ; b").unwrap();
		assert_eq!(seq.len(), 2);
		let first = seq.take_next_pipeline().unwrap();
		assert_eq!(argv0s(&first), vec!["a"]);
		assert!(first.commands()[0].is_last_in_pipeline());
		let second = seq.take_next_pipeline().unwrap();
		assert_eq!(argv0s(&second), vec!["b"]);
		assert!(seq.is_empty());
	}

	#[test]
	fn blank_inputs() {
		assert_eq!(parse("").unwrap_err(), ParseError::EmptyInput);
		assert_eq!(parse(" \t ").unwrap_err(), ParseError::EmptyInput);
		for line in [";", " ; ", "|", " | ", ";|;", "||"] {
			assert_eq!(parse(line).unwrap_err(), ParseError::MissingCommand, "{:?}", line);
		}
	}

	#[test]
	fn missing_command_around_pipes() {
		assert_eq!(parse("a | | b").unwrap_err(), ParseError::MissingCommand);
		assert_eq!(parse("This |\t| Test").unwrap_err(), ParseError::MissingCommand);
		assert_eq!(parse("| a").unwrap_err(), ParseError::MissingCommand);
		assert_eq!(parse("a |").unwrap_err(), ParseError::MissingCommand);
		assert_eq!(parse("a ; ").unwrap_err(), ParseError::MissingCommand);
		assert_eq!(parse("a ;; b").unwrap_err(), ParseError::MissingCommand);
	}

	#[test]
	fn stdout_redirect() {
		let mut seq = parse("a 1> out.txt").unwrap();
		let p = seq.take_next_pipeline().unwrap();
		let c = &p.commands()[0];
		assert_eq!(c.argv(), &["a".to_string()]);
		assert_eq!(c.stdout_target(), Some(&OutputTarget { path: "out.txt".to_string(), append: false }));
		assert_eq!(c.stderr_target(), None);
	}

	#[test]
	fn append_and_stderr_redirects() {
		let mut seq = parse("a x 1>> log 2> err y").unwrap();
		let p = seq.take_next_pipeline().unwrap();
		let c = &p.commands()[0];
		assert_eq!(c.argv(), &["a".to_string(), "x".to_string(), "y".to_string()]);
		assert_eq!(c.stdout_target(), Some(&OutputTarget { path: "log".to_string(), append: true }));
		assert_eq!(c.stderr_target(), Some("err"));
	}

	#[test]
	fn last_redirect_wins() {
		let mut seq = parse("a 1> first 1>> second").unwrap();
		let p = seq.take_next_pipeline().unwrap();
		assert_eq!(p.commands()[0].stdout_target(), Some(&OutputTarget { path: "second".to_string(), append: true }));
	}

	#[test]
	fn redirect_without_target() {
		assert_eq!(parse("a 1>").unwrap_err(), ParseError::MissingRedirectTarget(RedirectType::Output));
		assert_eq!(parse("a 2> | b").unwrap_err(), ParseError::MissingRedirectTarget(RedirectType::Error));
	}

	#[test]
	fn redirect_only_command() {
		assert_eq!(parse("1> out").unwrap_err(), ParseError::MissingCommand);
		let mut seq = parse("1> out ls").unwrap();
		let p = seq.take_next_pipeline().unwrap();
		assert_eq!(p.commands()[0].argv(), &["ls".to_string()]);
	}

	#[test]
	fn argument_capacity() {
		assert!(parse(&words(MAX_ARGS)).is_ok());
		assert_eq!(parse(&words(MAX_ARGS + 1)).unwrap_err(), ParseError::TooManyArgs);
		assert_eq!(parse("hey arg1 arg2 arg3 arg4 arg5 arg6 arg7 arg8 arg9 arg10 arg11 arg12 arg13 arg14 arg15 arg16").unwrap_err(),
		           ParseError::TooManyArgs);
		// redirection tokens do not count as arguments
		assert!(parse(&format!("{} 1> out 2> err", words(MAX_ARGS))).is_ok());
	}

	#[test]
	fn command_capacity() {
		let line = |n: usize| (0..n).map(|i| i.to_string()).collect::<Vec<_>>().join(" | ");
		assert_eq!(parse(&line(MAX_COMMANDS)).unwrap().take_next_pipeline().unwrap().commands().len(), MAX_COMMANDS);
		assert_eq!(parse(&line(MAX_COMMANDS + 1)).unwrap_err(), ParseError::TooManyCommands);
	}

	#[test]
	fn sequence_capacity() {
		let line = |n: usize| vec!["true"; n].join(" ; ");
		assert_eq!(parse(&line(MAX_SEQUENCE_LEN)).unwrap().len(), MAX_SEQUENCE_LEN);
		assert_eq!(parse(&line(MAX_SEQUENCE_LEN + 1)).unwrap_err(), ParseError::TooManyPipelines);
	}

	#[test]
	fn raw_text_is_verbatim() {
		let mut seq = parse("  ls  -l  ;echo  hi |  wc").unwrap();
		let first = seq.take_next_pipeline().unwrap();
		assert_eq!(first.raw_text(), "  ls  -l  ");
		assert_eq!(first.commands()[0].argv(), &["ls".to_string(), "-l".to_string()]);
		assert_eq!(seq.take_next_pipeline().unwrap().raw_text(), "echo  hi |  wc");
	}

	#[test]
	fn builtin_names_are_plain_commands() {
		let mut seq = parse("cd /tmp | exit").unwrap();
		let p = seq.take_next_pipeline().unwrap();
		assert_eq!(argv0s(&p), vec!["cd", "exit"]);
	}
}
