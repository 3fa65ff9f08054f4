//! Termination signals turned into a quit request.
//!
//! In raw mode Ctrl+C arrives as a key, but SIGINT, SIGTERM and SIGHUP sent
//! from outside would otherwise kill the process with the terminal still in
//! raw mode. The guard raises a flag instead; [`crate::runtime::CrosstermInput`]
//! reports it as [`crate::runtime::InputEvent::Quit`] so the run ends through
//! the normal game-over path.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::warn;

#[derive(Debug)]
pub struct InterruptGuard {
    flag: Arc<AtomicBool>,
    #[cfg(unix)]
    handle: signal_hook::iterator::Handle,
    #[cfg(unix)]
    thread: Option<std::thread::JoinHandle<()>>,
}

impl InterruptGuard {
    #[cfg(unix)]
    pub fn install() -> io::Result<Self> {
        use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGTERM};
        use signal_hook::iterator::Signals;

        let flag = Arc::new(AtomicBool::new(false));
        let mut signals = Signals::new([SIGINT, SIGTERM, SIGHUP]).map_err(io::Error::other)?;
        let handle = signals.handle();
        let raised = Arc::clone(&flag);
        let thread = std::thread::spawn(move || {
            for signal in signals.forever() {
                warn!(signal, "termination signal received, quitting");
                raised.store(true, Ordering::SeqCst);
            }
        });
        Ok(Self {
            flag,
            handle,
            thread: Some(thread),
        })
    }

    #[cfg(not(unix))]
    pub fn install() -> io::Result<Self> {
        Ok(Self {
            flag: Arc::default(),
        })
    }

    pub fn flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.flag)
    }

    pub fn raised(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

#[cfg(unix)]
impl Drop for InterruptGuard {
    fn drop(&mut self) {
        self.handle.close();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}
