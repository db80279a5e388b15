use std::io::{self, BufRead, Write};

use pos_core::{Confirm, NoticeKind, Notify};
use tracing::warn;

/// Asks on stderr and reads the answer from stdin. `assume_yes` answers for
/// the operator.
pub struct PromptConfirm {
    pub assume_yes: bool,
}

impl Confirm for PromptConfirm {
    fn confirm(&self, message: &str) -> bool {
        if self.assume_yes {
            return true;
        }

        let mut stderr = io::stderr().lock();
        if write!(stderr, "{message} [y/N] ").and_then(|_| stderr.flush()).is_err() {
            return false;
        }

        let mut answer = String::new();
        if let Err(error) = io::stdin().lock().read_line(&mut answer) {
            warn!(%error, "could not read confirmation");
            return false;
        }
        is_yes(&answer)
    }
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

/// Prints notices to stderr so stdout stays machine readable.
pub struct ConsoleNotifier {
    pub quiet: bool,
}

impl Notify for ConsoleNotifier {
    fn notify(&self, kind: NoticeKind, message: &str) {
        match kind {
            NoticeKind::Success if self.quiet => {}
            NoticeKind::Success => eprintln!("ok: {message}"),
            NoticeKind::Warning => eprintln!("warning: {message}"),
            NoticeKind::Error => eprintln!("error: {message}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_explicit_yes_confirms() {
        assert!(is_yes("y\n"));
        assert!(is_yes(" YES "));
        assert!(!is_yes("\n"));
        assert!(!is_yes("no"));
        assert!(!is_yes("yep"));
    }

    #[test]
    fn assume_yes_skips_the_prompt() {
        assert!(PromptConfirm { assume_yes: true }.confirm("Delete?"));
    }
}
