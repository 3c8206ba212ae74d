use std::env;
use std::path::PathBuf;

use crate::job;

pub struct State {
	/// Directory a bare `cd` changes to.
	pub home: Option<PathBuf>,
	pub foreground: &'static job::Foreground,
	pub suspended: job::SuspendedJobs,
}

impl State {
	pub fn new() -> State {
		let home = env::var_os("HOME").map(PathBuf::from);
		State { home: home, foreground: &job::FOREGROUND, suspended: job::SuspendedJobs::new() }
	}

	/// State reporting to its own foreground tracker instead of the one the
	/// signal handlers use.
	pub fn with_foreground(foreground: &'static job::Foreground) -> State {
		State { foreground: foreground, ..State::new() }
	}
}

impl Default for State {
	fn default() -> State {
		State::new()
	}
}
