//! Ctrl-C handling.
//!
//! The signal handler never exits the process. It raises a flag and prints
//! the confirmation prompt; the shell treats the next line it reads as the
//! answer.

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub const EXIT_CONFIRM_PROMPT: &str = "Received interrupt. Exit? [y/N]: ";

/// Shared "interrupt pending" flag.
#[derive(Debug, Clone, Default)]
pub struct InterruptFlag(Arc<AtomicBool>);

impl InterruptFlag {
    pub fn raise(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Clears the flag, returning whether it was set.
    pub fn take(&self) -> bool {
        self.0.swap(false, Ordering::SeqCst)
    }
}

/// Installs the process-wide Ctrl-C handler.
pub fn install() -> Result<InterruptFlag, ctrlc::Error> {
    let flag = InterruptFlag::default();
    let handler_flag = flag.clone();
    ctrlc::set_handler(move || {
        handler_flag.raise();
        let mut stdout = std::io::stdout();
        let _ = write!(stdout, "\n{EXIT_CONFIRM_PROMPT}");
        let _ = stdout.flush();
    })?;
    Ok(flag)
}

#[cfg(test)]
mod tests {
    use super::InterruptFlag;

    #[test]
    fn take_clears_the_flag() {
        let flag = InterruptFlag::default();
        assert!(!flag.take());
        flag.clone().raise();
        assert!(flag.take());
        assert!(!flag.take());
    }
}
