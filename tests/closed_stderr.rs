use std::fs;

use nix::unistd;
use tempfile::TempDir;

use msh::{eval, global, parser};

// Closes the test process's fd 2, so it lives alone in this binary.
#[test]
fn stderr_redirect_with_stderr_closed() {
	let dir = TempDir::new().unwrap();
	let err = dir.path().join("err");

	let saved = unistd::dup(libc::STDERR_FILENO).unwrap();
	unistd::close(libc::STDERR_FILENO).unwrap();

	let mut state = global::State::new();
	let line = format!("ls /nonexistent-msh-dir 2> {}", err.display());
	let pipeline = parser::parse(&line).unwrap().take_next_pipeline().unwrap();
	let status = eval::execute(&mut state, pipeline);

	unistd::dup2(saved, libc::STDERR_FILENO).unwrap();
	unistd::close(saved).unwrap();

	assert_ne!(status, 0);
	assert!(!fs::read_to_string(&err).unwrap().is_empty());
}
