use std::sync::atomic::{AtomicI32, Ordering};

use libc::c_int;
use nix::sys::signal::{self, SaFlags, SigAction, SigHandler, SigSet, Signal};
use nix::sys::wait::WaitStatus;
use nix::unistd::Pid;

use crate::types::{Pipeline, MAX_SUSPENDED_JOBS};

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy)]
pub enum State { Active, Stopped, Terminated }

pub trait WaitStatusExt {
	fn state(self) -> State;
	fn code(self) -> u8;
}

impl WaitStatusExt for WaitStatus {
	fn state(self) -> State {
		match self {
			WaitStatus::Exited(..) => State::Terminated,
			WaitStatus::Signaled(..) => State::Terminated,
			WaitStatus::Stopped(..) => State::Stopped,
			#[cfg(any(target_os = "linux", target_os = "android"))]
			WaitStatus::PtraceEvent(..) => State::Stopped,
			#[cfg(any(target_os = "linux", target_os = "android"))]
			WaitStatus::PtraceSyscall(..) => State::Stopped,
			WaitStatus::Continued(..) => State::Active,
			WaitStatus::StillAlive => State::Active,
		}
	}
	fn code(self) -> u8 {
		match self {
			WaitStatus::Exited(_, code) => code as u8,
			WaitStatus::Signaled(_, sig, _) => 128u8.wrapping_add(sig as i32 as u8),
			WaitStatus::Stopped(_, sig) => 128u8.wrapping_add(sig as i32 as u8),
			_ => 0,
		}
	}
}

/// The process currently eligible for forwarded terminate/stop requests.
///
/// Signal handlers read and clear this through a single atomic swap; nothing
/// here allocates or blocks.
#[derive(Debug)]
pub struct Foreground {
	pid: AtomicI32,
}

impl Foreground {
	pub const fn new() -> Foreground {
		Foreground { pid: AtomicI32::new(0) }
	}

	pub fn set(&self, pid: Pid) {
		self.pid.store(pid.as_raw(), Ordering::SeqCst);
	}

	pub fn get(&self) -> Option<Pid> {
		match self.pid.load(Ordering::SeqCst) {
			p if p > 0 => Some(Pid::from_raw(p)),
			_ => None,
		}
	}

	pub fn clear(&self) {
		self.pid.store(0, Ordering::SeqCst);
	}

	fn forward(&self, sig: Signal) -> bool {
		let raw = self.pid.swap(0, Ordering::SeqCst);
		if raw <= 0 {
			return false;
		}
		let _ = signal::kill(Pid::from_raw(raw), sig);
		true
	}

	/// Sends SIGTERM to the foreground process, if any, and forgets it.
	pub fn request_terminate(&self) -> bool {
		self.forward(Signal::SIGTERM)
	}

	/// Sends SIGTSTP to the foreground process, if any, and forgets it.
	/// The executor files the job once its wait observes the stop.
	pub fn request_stop(&self) -> bool {
		self.forward(Signal::SIGTSTP)
	}
}

impl Default for Foreground {
	fn default() -> Foreground {
		Foreground::new()
	}
}

pub static FOREGROUND: Foreground = Foreground::new();

extern "C" fn handle_signal(signo: c_int) {
	match Signal::try_from(signo) {
		Ok(Signal::SIGINT) | Ok(Signal::SIGTERM) => { FOREGROUND.request_terminate(); },
		Ok(Signal::SIGTSTP) => { FOREGROUND.request_stop(); },
		_ => {},
	}
}

/// Installs the terminate (SIGINT, SIGTERM) and stop (SIGTSTP) handlers.
/// Call once before executing anything.
pub fn init() -> nix::Result<()> {
	let action = SigAction::new(SigHandler::Handler(handle_signal), SaFlags::SA_RESTART, SigSet::empty());
	for &sig in &[Signal::SIGINT, Signal::SIGTERM, Signal::SIGTSTP] {
		unsafe { signal::sigaction(sig, &action)?; }
	}
	Ok(())
}

/// Fixed-slot table of stopped pipelines. Insertion is first-fit; slots are
/// only freed by `remove`.
#[derive(Debug)]
pub struct SuspendedJobs {
	slots: [Option<Pipeline>; MAX_SUSPENDED_JOBS],
}

impl SuspendedJobs {
	pub fn new() -> SuspendedJobs {
		SuspendedJobs { slots: std::array::from_fn(|_| None) }
	}

	/// Stores `pipeline` in the first free slot, handing it back when the
	/// table is full.
	pub fn file(&mut self, pipeline: Pipeline) -> Result<usize, Pipeline> {
		match self.slots.iter_mut().enumerate().find(|(_, s)| s.is_none()) {
			Some((i, space)) => {
				*space = Some(pipeline);
				Ok(i)
			},
			None => Err(pipeline),
		}
	}

	pub fn get(&self, slot: usize) -> Option<&Pipeline> {
		self.slots.get(slot).and_then(|s| s.as_ref())
	}

	pub fn remove(&mut self, slot: usize) -> Option<Pipeline> {
		self.slots.get_mut(slot).and_then(|s| s.take())
	}

	pub fn len(&self) -> usize {
		self.slots.iter().filter(|s| s.is_some()).count()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	pub fn is_full(&self) -> bool {
		self.slots.iter().all(|s| s.is_some())
	}

	pub fn iter(&self) -> impl Iterator<Item = (usize, &Pipeline)> {
		self.slots.iter().enumerate().filter_map(|(i, s)| s.as_ref().map(|p| (i, p)))
	}
}

impl Default for SuspendedJobs {
	fn default() -> SuspendedJobs {
		SuspendedJobs::new()
	}
}
