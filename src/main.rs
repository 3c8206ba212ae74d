use std::io;
use std::io::{BufRead, IsTerminal, Write};
use std::process::ExitCode;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use msh::{eval, global, job, parser, ExecError};

const PROMPT: &[u8] = b"msh> ";

fn main() -> ExitCode {
	tracing_subscriber::registry()
		.with(fmt::layer().with_writer(io::stderr))
		.with(EnvFilter::from_default_env())
		.init();

	if let Err(e) = job::init() {
		eprintln!("msh: failed to install signal handlers: {}", e);
		return ExitCode::FAILURE;
	}

	let mut state = global::State::new();
	let mut stdout = io::stdout();
	let stdin = io::stdin();
	let interactive = stdin.is_terminal();
	let mut stdin_locked = stdin.lock();
	loop {
		if interactive {
			let _ = stdout.write_all(PROMPT);
			let _ = stdout.flush();
		}
		let mut line: Vec<u8> = vec![];
		match stdin_locked.read_until(b'\n', &mut line) {
			Ok(0) => { break; },
			Ok(_) => {},
			Err(e) => {
				eprintln!("msh: read error: {}", ExecError::from(e));
				return ExitCode::FAILURE;
			},
		}
		let line = String::from_utf8_lossy(&line);
		let line = line.trim_end_matches(&['\n', '\r'][..]);
		if line.trim().is_empty() {
			continue;
		}
		match parser::parse(line) {
			Ok(mut sequence) => {
				while let Some(pipeline) = sequence.take_next_pipeline() {
					eval::execute(&mut state, pipeline);
				}
			},
			Err(e) => eprintln!("msh: {}", e),
		}
	}
	ExitCode::SUCCESS
}
