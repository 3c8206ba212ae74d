use std::any::Any;
use std::collections::VecDeque;
use std::fmt;

/// Maximum number of argv entries (program name included) of one command.
pub const MAX_ARGS: usize = 16;
/// Maximum number of commands chained by `|` in one pipeline.
pub const MAX_COMMANDS: usize = 16;
/// Maximum number of pipelines separated by `;` on one line.
pub const MAX_SEQUENCE_LEN: usize = 17;
/// Number of slots in the suspended job table.
pub const MAX_SUSPENDED_JOBS: usize = 16;

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum RedirectType { Output, Append, Error }

impl RedirectType {
	pub fn from_token(token: &str) -> Option<RedirectType> {
		match token {
			"1>" => Some(RedirectType::Output),
			"1>>" => Some(RedirectType::Append),
			"2>" => Some(RedirectType::Error),
			_ => None,
		}
	}

	pub fn token(self) -> &'static str {
		match self {
			RedirectType::Output => "1>",
			RedirectType::Append => "1>>",
			RedirectType::Error => "2>",
		}
	}
}

impl fmt::Display for RedirectType {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		f.write_str(self.token())
	}
}

/// Standard output redirection target.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct OutputTarget {
	pub path: String,
	pub append: bool,
}

struct Attachment {
	data: Option<Box<dyn Any + Send>>,
	release: Option<Box<dyn FnOnce(Box<dyn Any + Send>) + Send>>,
}

impl Drop for Attachment {
	fn drop(&mut self) {
		if let (Some(data), Some(release)) = (self.data.take(), self.release.take()) {
			release(data);
		}
	}
}

/// One executable invocation: `argv[0]` is the program name.
pub struct Command {
	pub(crate) argv: Vec<String>,
	pub(crate) stdout_target: Option<OutputTarget>,
	pub(crate) stderr_target: Option<String>,
	pub(crate) is_last: bool,
	attachment: Option<Attachment>,
}

impl Command {
	pub(crate) fn new(argv: Vec<String>) -> Command {
		Command { argv: argv, stdout_target: None, stderr_target: None, is_last: false, attachment: None }
	}

	pub fn program(&self) -> &str {
		&self.argv[0]
	}

	pub fn argv(&self) -> &[String] {
		&self.argv
	}

	pub fn arguments(&self) -> &[String] {
		&self.argv[1..]
	}

	pub fn stdout_target(&self) -> Option<&OutputTarget> {
		self.stdout_target.as_ref()
	}

	pub fn stderr_target(&self) -> Option<&str> {
		self.stderr_target.as_ref().map(|s| s.as_str())
	}

	pub fn is_last_in_pipeline(&self) -> bool {
		self.is_last
	}

	/// Attaches caller data to this command.
	///
	/// `release` runs exactly once: when the data is replaced by another
	/// `put_data` call or when the command is dropped.
	pub fn put_data<T, F>(&mut self, data: T, release: F)
		where T: Any + Send, F: FnOnce(T) + Send + 'static
	{
		let release = move |data: Box<dyn Any + Send>| {
			if let Ok(data) = data.downcast::<T>() {
				release(*data);
			}
		};
		// the old attachment is dropped here, releasing its data
		self.attachment = Some(Attachment { data: Some(Box::new(data)), release: Some(Box::new(release)) });
	}

	pub fn data<T: Any>(&self) -> Option<&T> {
		self.attachment.as_ref()
			.and_then(|a| a.data.as_ref())
			.and_then(|d| d.downcast_ref::<T>())
	}
}

impl fmt::Debug for Command {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		f.debug_struct("Command")
			.field("argv", &self.argv)
			.field("stdout_target", &self.stdout_target)
			.field("stderr_target", &self.stderr_target)
			.field("is_last", &self.is_last)
			.field("has_data", &self.attachment.is_some())
			.finish()
	}
}

/// A chain of commands connected by pipes.
#[derive(Debug)]
pub struct Pipeline {
	pub(crate) commands: Vec<Command>,
	pub(crate) raw_text: String,
	pub is_background: bool,
}

impl Pipeline {
	pub fn commands(&self) -> &[Command] {
		&self.commands
	}

	pub fn commands_mut(&mut self) -> &mut [Command] {
		&mut self.commands
	}

	/// The `;`-delimited substring this pipeline was parsed from, verbatim.
	pub fn raw_text(&self) -> &str {
		&self.raw_text
	}

	pub fn last_command(&self) -> &Command {
		&self.commands[self.commands.len() - 1]
	}
}

/// Pipelines from one input line, consumed front to back.
#[derive(Debug)]
pub struct Sequence {
	pub(crate) pipelines: VecDeque<Pipeline>,
}

impl Sequence {
	pub fn take_next_pipeline(&mut self) -> Option<Pipeline> {
		self.pipelines.pop_front()
	}

	pub fn len(&self) -> usize {
		self.pipelines.len()
	}

	pub fn is_empty(&self) -> bool {
		self.pipelines.is_empty()
	}
}
