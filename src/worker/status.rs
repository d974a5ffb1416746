use std::os::unix::process::ExitStatusExt;
use std::process::ExitStatus;

use nix::sys::signal::Signal;

/// How a child process left the worker's supervision.
///
/// The `128 + signal` convention used by shells and coreutils is applied to
/// every signal-shaped outcome so the monitoring side sees a plain exit code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Termination {
    Exited(i32),
    Signaled(i32),
    Stopped(i32),
    Continued,
    Other(String),
}

impl Termination {
    /// Classify a raw wait status.
    pub fn classify(status: ExitStatus) -> Self {
        if let Some(code) = status.code() {
            Termination::Exited(code)
        } else if let Some(sig) = status.signal() {
            Termination::Signaled(sig)
        } else if let Some(sig) = status.stopped_signal() {
            Termination::Stopped(sig)
        } else if status.continued() {
            Termination::Continued
        } else {
            Termination::Other(format!("unrecognized wait status {:?}", status))
        }
    }

    /// Exit code reported in the response.
    pub fn exit_code(&self) -> i64 {
        match self {
            Termination::Exited(code) => i64::from(*code),
            Termination::Signaled(sig) | Termination::Stopped(sig) => 128 + i64::from(*sig),
            Termination::Continued => 128 + i64::from(libc::SIGCONT),
            Termination::Other(_) => 128,
        }
    }

    /// Annotation appended to the merged output, if any.
    pub fn annotation(&self) -> Option<String> {
        match self {
            Termination::Exited(_) => None,
            Termination::Signaled(sig) | Termination::Stopped(sig) => {
                Some(format!("<Terminated by signal {}.>", signal_name(*sig)))
            }
            Termination::Continued => Some(format!(
                "<Terminated by signal {}.>",
                signal_name(libc::SIGCONT)
            )),
            Termination::Other(message) => Some(format!("<{}>", message)),
        }
    }

    /// Whether a child actually ran to produce this status.
    pub fn child_ran(&self) -> bool {
        !matches!(self, Termination::Other(_))
    }
}

fn signal_name(sig: i32) -> String {
    match Signal::try_from(sig) {
        Ok(signal) => signal.to_string(),
        Err(_) => sig.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Raw wait statuses follow the POSIX layout: exit code in the high
    // byte, termination signal in the low byte, 0x7f marking a stop.
    fn status(raw: i32) -> ExitStatus {
        ExitStatusExt::from_raw(raw)
    }

    #[test]
    fn clean_exit_is_code_zero() {
        let term = Termination::classify(status(0));
        assert_eq!(term, Termination::Exited(0));
        assert_eq!(term.exit_code(), 0);
        assert_eq!(term.annotation(), None);
    }

    #[test]
    fn nonzero_exit_keeps_child_code() {
        let term = Termination::classify(status(42 << 8));
        assert_eq!(term, Termination::Exited(42));
        assert_eq!(term.exit_code(), 42);
    }

    #[test]
    fn sigkill_maps_to_137() {
        let term = Termination::classify(status(libc::SIGKILL));
        assert_eq!(term, Termination::Signaled(libc::SIGKILL));
        assert_eq!(term.exit_code(), 137);
        assert_eq!(
            term.annotation().unwrap(),
            "<Terminated by signal SIGKILL.>"
        );
    }

    #[test]
    fn sigsegv_maps_to_139() {
        let term = Termination::classify(status(libc::SIGSEGV));
        assert_eq!(term.exit_code(), 139);
        assert_eq!(
            term.annotation().unwrap(),
            "<Terminated by signal SIGSEGV.>"
        );
    }

    #[test]
    fn stop_signal_uses_same_encoding() {
        let term = Termination::classify(status((libc::SIGSTOP << 8) | 0x7f));
        assert_eq!(term, Termination::Stopped(libc::SIGSTOP));
        assert_eq!(term.exit_code(), 128 + i64::from(libc::SIGSTOP));
        assert!(term
            .annotation()
            .unwrap()
            .starts_with("<Terminated by signal"));
    }

    #[test]
    fn continued_reports_sigcont() {
        let term = Termination::classify(status(0xffff));
        assert_eq!(term, Termination::Continued);
        assert_eq!(term.exit_code(), 128 + i64::from(libc::SIGCONT));
        assert_eq!(
            term.annotation().unwrap(),
            "<Terminated by signal SIGCONT.>"
        );
    }

    #[test]
    fn other_falls_back_to_128() {
        let term = Termination::Other("wait failed".to_string());
        assert_eq!(term.exit_code(), 128);
        assert_eq!(term.annotation().unwrap(), "<wait failed>");
        assert!(!term.child_ran());
    }
}
