use std::ffi::{CStr, CString};
use std::io;
use std::os::fd::{AsRawFd, OwnedFd, RawFd};
use std::ptr;

use libc::c_char;
use nix::errno::Errno;
use nix::fcntl::{self, OFlag};
use nix::sys::signal::{self, Signal};
use nix::sys::stat::Mode;
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::{self, ForkResult, Pid};
use tracing::{debug, trace, warn};

use crate::builtin;
use crate::error::ExecError;
use crate::global;
use crate::job::{self, WaitStatusExt};
use crate::types::{Command, Pipeline};

/// Status of a child whose program could not be executed.
pub const EXEC_FAILURE: u8 = 127;
/// Status of a child whose redirection target could not be opened.
pub const REDIRECT_FAILURE: u8 = 1;

struct Redirection {
	path: CString,
	flags: OFlag,
	to: RawFd,
	report: Vec<u8>,
}

impl Redirection {
	fn new(path: &str, flags: OFlag, to: RawFd) -> Result<Redirection, ExecError> {
		Ok(Redirection {
			path: CString::new(path)?,
			flags: flags,
			to: to,
			report: format!("msh: {}: ", path).into_bytes(),
		})
	}

	fn apply(&self) -> nix::Result<()> {
		let fd = fcntl::open(self.path.as_c_str(), self.flags, Mode::S_IRWXU)?;
		// open reuses the target slot when it was closed
		if fd == self.to {
			return Ok(());
		}
		unistd::dup2(fd, self.to)?;
		unistd::close(fd)
	}
}

// Everything a child needs, allocated before fork.
struct LaunchPlan {
	argv: Vec<CString>,
	argv_ptrs: Vec<*const c_char>,
	redirects: Vec<Redirection>,
	report: Vec<u8>,
}

impl LaunchPlan {
	fn new(command: &Command) -> Result<LaunchPlan, ExecError> {
		let argv = command.argv().iter()
			.map(|s| CString::new(s.as_bytes()))
			.collect::<Result<Vec<CString>, _>>()?;
		let mut argv_ptrs: Vec<*const c_char> = argv.iter().map(|s| s.as_ptr()).collect();
		argv_ptrs.push(ptr::null());

		let mut redirects = vec![];
		if let Some(target) = command.stdout_target() {
			let mode = if target.append { OFlag::O_APPEND } else { OFlag::O_TRUNC };
			redirects.push(Redirection::new(&target.path, OFlag::O_WRONLY | OFlag::O_CREAT | mode, libc::STDOUT_FILENO)?);
		}
		if let Some(path) = command.stderr_target() {
			redirects.push(Redirection::new(path, OFlag::O_WRONLY | OFlag::O_CREAT | OFlag::O_TRUNC, libc::STDERR_FILENO)?);
		}

		Ok(LaunchPlan {
			argv: argv,
			argv_ptrs: argv_ptrs,
			redirects: redirects,
			report: format!("msh: {}: ", command.program()).into_bytes(),
		})
	}

	fn program(&self) -> &CStr {
		&self.argv[0]
	}
}

// Only async-signal-safe calls from here on: the parent may be multithreaded.
fn child_fail(report: &[u8], errno: Errno, status: u8) -> ! {
	let stderr = io::stderr();
	let _ = unistd::write(&stderr, report);
	let _ = unistd::write(&stderr, errno.desc().as_bytes());
	let _ = unistd::write(&stderr, b"\n");
	unsafe { libc::_exit(status as libc::c_int) }
}

fn exec_child(plan: &LaunchPlan, stdin: Option<RawFd>, stdout: Option<RawFd>) -> ! {
	if let Some(fd) = stdin {
		if let Err(e) = unistd::dup2(fd, libc::STDIN_FILENO) {
			child_fail(&plan.report, e, EXEC_FAILURE);
		}
	}
	if let Some(fd) = stdout {
		if let Err(e) = unistd::dup2(fd, libc::STDOUT_FILENO) {
			child_fail(&plan.report, e, EXEC_FAILURE);
		}
	}
	// file redirections override the pipe
	for redirect in &plan.redirects {
		if let Err(e) = redirect.apply() {
			child_fail(&redirect.report, e, REDIRECT_FAILURE);
		}
	}
	unsafe { libc::execvp(plan.program().as_ptr(), plan.argv_ptrs.as_ptr()) };
	child_fail(&plan.report, Errno::last(), EXEC_FAILURE)
}

// Kills and reaps stages already launched for a pipeline that failed to start.
fn abandon(spawned: &[Pid]) {
	for &pid in spawned {
		warn!(pid = pid.as_raw(), "killing stage of unlaunched pipeline");
		let _ = signal::kill(pid, Signal::SIGKILL);
		loop {
			match waitpid(pid, None) {
				Err(Errno::EINTR) => continue,
				_ => break,
			}
		}
	}
}

fn launch_stage(is_last: bool) -> nix::Result<(ForkResult, Option<(OwnedFd, OwnedFd)>)> {
	let pipe = if is_last { None } else { Some(unistd::pipe2(OFlag::O_CLOEXEC)?) };
	let fork = unsafe { unistd::fork() }?;
	Ok((fork, pipe))
}

fn spawn_commands(pipeline: &mut Pipeline) -> Result<Option<Pid>, ExecError> {
	let plans = pipeline.commands().iter()
		.map(LaunchPlan::new)
		.collect::<Result<Vec<LaunchPlan>, _>>()?;

	let mut pipe_stdin: Option<OwnedFd> = None;
	let mut spawned: Vec<Pid> = Vec::with_capacity(plans.len());
	for (i, plan) in plans.iter().enumerate() {
		let is_last = i + 1 == plans.len();
		let (fork, pipe) = match launch_stage(is_last) {
			Ok(r) => r,
			Err(e) => {
				abandon(&spawned);
				return Err(e.into());
			},
		};

		match fork {
			ForkResult::Child => {
				exec_child(plan,
				           pipe_stdin.as_ref().map(|fd| fd.as_raw_fd()),
				           pipe.as_ref().map(|(_, write)| write.as_raw_fd()));
			},
			ForkResult::Parent { child } => {
				debug!(pid = child.as_raw(), program = ?plan.program(), "spawned");
				pipeline.commands_mut()[i].put_data(child, |pid: Pid| trace!(pid = pid.as_raw(), "released"));
				// both ends now belong to the children; keep only the next stage's input
				pipe_stdin = pipe.map(|(read, _write)| read);
				spawned.push(child);
			},
		}
	}
	Ok(spawned.last().copied())
}

fn wait_foreground(foreground: &job::Foreground, pid: Pid) -> nix::Result<WaitStatus> {
	foreground.set(pid);
	let status = loop {
		match waitpid(pid, Some(WaitPidFlag::WUNTRACED)) {
			Err(Errno::EINTR) => continue,
			r => break r,
		}
	};
	foreground.clear();
	status
}

fn report(context: &str, e: &ExecError) {
	warn!(context = context, error = %e, "command failed");
	eprintln!("msh: {}: {}", context, e);
}

fn suspend(state: &mut global::State, pipeline: Pipeline) {
	match state.suspended.file(pipeline) {
		Ok(slot) => {
			debug!(slot = slot, "job suspended");
			if let Some(p) = state.suspended.get(slot) {
				eprintln!("[{}] Stopped\t{}", slot + 1, p.raw_text().trim());
			}
		},
		Err(pipeline) => report(pipeline.raw_text().trim(), &ExecError::JobTableFull),
	}
}

/// Runs `pipeline` in the foreground and returns its exit status.
///
/// The pipeline is consumed: it is dropped when the run completes, or moved
/// into the suspended job table when its final process stops. Only the final
/// process is waited for.
pub fn execute(state: &mut global::State, mut pipeline: Pipeline) -> u8 {
	if let [command] = pipeline.commands() {
		if let Some(builtin) = builtin::match_builtin(command.program()) {
			return match builtin(state, command.arguments()) {
				Ok(()) => 0,
				Err(e) => {
					report(command.program(), &e);
					1
				},
			};
		}
	}

	let pid = match spawn_commands(&mut pipeline) {
		Ok(Some(pid)) => pid,
		Ok(None) => { return 0; },
		Err(e) => {
			report(pipeline.raw_text().trim(), &e);
			return EXEC_FAILURE;
		},
	};

	match wait_foreground(state.foreground, pid) {
		Ok(status) => {
			debug!(pid = pid.as_raw(), ?status, "foreground finished");
			if status.state() == job::State::Stopped {
				suspend(state, pipeline);
			}
			status.code()
		},
		Err(e) => {
			report(pipeline.raw_text().trim(), &ExecError::from(e));
			EXEC_FAILURE
		},
	}
}
