//! Signal names used by the tracked services' stop protocols.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use std::str::FromStr;

/// A POSIX signal that can be delivered to a tracked service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum StopSignal {
    Term,
    Quit,
    Int,
    Hup,
    Usr1,
    Usr2,
    Winch,
    Kill,
}

impl StopSignal {
    /// Short name without the `SIG` prefix, as used in configuration files.
    pub fn name(&self) -> &'static str {
        match self {
            StopSignal::Term => "TERM",
            StopSignal::Quit => "QUIT",
            StopSignal::Int => "INT",
            StopSignal::Hup => "HUP",
            StopSignal::Usr1 => "USR1",
            StopSignal::Usr2 => "USR2",
            StopSignal::Winch => "WINCH",
            StopSignal::Kill => "KILL",
        }
    }

    pub fn as_raw(&self) -> libc::c_int {
        match self {
            StopSignal::Term => libc::SIGTERM,
            StopSignal::Quit => libc::SIGQUIT,
            StopSignal::Int => libc::SIGINT,
            StopSignal::Hup => libc::SIGHUP,
            StopSignal::Usr1 => libc::SIGUSR1,
            StopSignal::Usr2 => libc::SIGUSR2,
            StopSignal::Winch => libc::SIGWINCH,
            StopSignal::Kill => libc::SIGKILL,
        }
    }

    /// Deliver this signal to `pid`.
    pub fn send(&self, pid: u32) -> io::Result<()> {
        let pid = libc::pid_t::try_from(pid)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "pid out of range"))?;
        // SAFETY: kill(2) has no memory-safety preconditions.
        let rc = unsafe { libc::kill(pid, self.as_raw()) };
        if rc == 0 {
            Ok(())
        } else {
            Err(io::Error::last_os_error())
        }
    }
}

impl fmt::Display for StopSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SIG{}", self.name())
    }
}

impl FromStr for StopSignal {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        let name = upper.strip_prefix("SIG").unwrap_or(&upper);
        match name {
            "TERM" => Ok(StopSignal::Term),
            "QUIT" => Ok(StopSignal::Quit),
            "INT" => Ok(StopSignal::Int),
            "HUP" => Ok(StopSignal::Hup),
            "USR1" => Ok(StopSignal::Usr1),
            "USR2" => Ok(StopSignal::Usr2),
            "WINCH" => Ok(StopSignal::Winch),
            "KILL" => Ok(StopSignal::Kill),
            _ => Err(format!("unknown signal name '{}'", s)),
        }
    }
}

impl TryFrom<String> for StopSignal {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<StopSignal> for String {
    fn from(signal: StopSignal) -> Self {
        signal.name().to_string()
    }
}
