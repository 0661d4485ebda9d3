// src/engine/cancel.rs

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// One-way cancellation flag for a single run.
///
/// Setting it never interrupts anything by itself; user logic reads it via
/// [`is_cancelled`](Self::is_cancelled), and the command runner polls it to
/// decide when to terminate a subprocess.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag {
    flag: Arc<AtomicBool>,
}

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the flag. Returns `true` only for the call that set it.
    pub fn cancel(&self) -> bool {
        !self.flag.swap(true, Ordering::SeqCst)
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// A `Fn() -> bool` view suitable for [`CommandRunner::run`](crate::exec::CommandRunner::run).
    pub fn checker(&self) -> impl Fn() -> bool + Send + Sync + 'static {
        let flag = self.flag.clone();
        move || flag.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_is_one_way_and_reports_first_setter() {
        let flag = CancelFlag::new();
        let check = flag.checker();
        assert!(!flag.is_cancelled());
        assert!(!check());

        assert!(flag.cancel());
        assert!(!flag.clone().cancel());
        assert!(flag.is_cancelled());
        assert!(check());
    }
}
