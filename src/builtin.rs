use std::path::Path;
use std::process;

use nix::unistd;

use crate::error::ExecError;
use crate::global;

pub type Builtin = fn(&mut global::State, &[String]) -> Result<(), ExecError>;

pub fn builtin_cd(state: &mut global::State, args: &[String]) -> Result<(), ExecError> {
	let dir = match args.first() {
		Some(dir) => Path::new(dir),
		None => state.home.as_deref().ok_or(ExecError::HomeNotSet)?,
	};
	unistd::chdir(dir)?;
	Ok(())
}

pub fn builtin_exit(_: &mut global::State, _: &[String]) -> Result<(), ExecError> {
	process::exit(0)
}

pub fn match_builtin(name: &str) -> Option<Builtin> {
	match name {
		"cd" => Some(builtin_cd as Builtin),
		"exit" => Some(builtin_exit as Builtin),
		_ => None,
	}
}
