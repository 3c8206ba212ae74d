use std::collections::TryReserveError;
use std::{ffi, io};

use thiserror::Error;

use crate::types::{RedirectType, MAX_ARGS, MAX_COMMANDS, MAX_SEQUENCE_LEN};

#[derive(Error, Debug, PartialEq, Eq, Clone)]
pub enum ParseError {
	#[error("empty input")]
	EmptyInput,

	#[error("too many commands in pipeline (max {})", MAX_COMMANDS)]
	TooManyCommands,

	#[error("too many pipelines on one line (max {})", MAX_SEQUENCE_LEN)]
	TooManyPipelines,

	#[error("missing command")]
	MissingCommand,

	#[error("too many arguments (max {})", MAX_ARGS)]
	TooManyArgs,

	#[error("missing target after '{0}'")]
	MissingRedirectTarget(RedirectType),

	#[error("allocation failure: {0}")]
	AllocationFailure(#[from] TryReserveError),
}

pub type ParseResult<T> = Result<T, ParseError>;

#[derive(Error, Debug)]
pub enum ExecError {
	#[error("{0}")]
	Nix(#[from] nix::Error),

	#[error("{0}")]
	Io(#[from] io::Error),

	#[error("nul byte in argument: {0}")]
	Nul(#[from] ffi::NulError),

	#[error("HOME not set")]
	HomeNotSet,

	#[error("no space left to store suspended job")]
	JobTableFull,
}
