//! Process liveness

/// Answers whether a process id belongs to a running process.
pub trait ProcessProbe {
    fn is_running(&self, pid: u32) -> bool;
}

/// Liveness check against the host OS.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemProbe;

impl ProcessProbe for SystemProbe {
    #[cfg(unix)]
    fn is_running(&self, pid: u32) -> bool {
        use nix::errno::Errno;
        use nix::sys::signal::kill;
        use nix::unistd::Pid;

        let Ok(raw) = i32::try_from(pid) else {
            return false;
        };
        if raw <= 0 {
            return false;
        }

        // Signal 0 (None) checks existence; EPERM means it exists but belongs
        // to another user.
        matches!(kill(Pid::from_raw(raw), None), Ok(()) | Err(Errno::EPERM))
    }

    #[cfg(not(unix))]
    fn is_running(&self, _pid: u32) -> bool {
        // No probe on this platform: never reclaim another instance's file.
        true
    }
}

impl<F> ProcessProbe for F
where
    F: Fn(u32) -> bool,
{
    fn is_running(&self, pid: u32) -> bool {
        self(pid)
    }
}
