use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
#[cfg(unix)]
use std::thread::{self, JoinHandle};

use concierge::CancellationSignal;

/// Exit status after an interrupt, as shells report SIGINT.
pub const INTERRUPTED_EXIT_CODE: i32 = 130;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptAction {
    CancelStream,
    Exit,
}

/// Ctrl-C policy: the first interrupt during a stream cancels it, any other
/// interrupt exits.
#[derive(Debug, Clone, Default)]
pub struct Interrupts {
    cancel: CancellationSignal,
    streaming: Arc<AtomicBool>,
}

impl Interrupts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel_signal(&self) -> &CancellationSignal {
        &self.cancel
    }

    pub fn begin_stream(&self) {
        self.cancel.store(false, Ordering::Release);
        self.streaming.store(true, Ordering::Release);
    }

    pub fn end_stream(&self) {
        self.streaming.store(false, Ordering::Release);
        self.cancel.store(false, Ordering::Release);
    }

    pub fn on_interrupt(&self) -> InterruptAction {
        if self.streaming.load(Ordering::Acquire) && !self.cancel.swap(true, Ordering::AcqRel) {
            InterruptAction::CancelStream
        } else {
            InterruptAction::Exit
        }
    }

    /// Listen for SIGINT on a background thread until the guard drops.
    #[cfg(unix)]
    pub fn install(&self) -> io::Result<InterruptGuard> {
        use signal_hook::consts::SIGINT;
        use signal_hook::iterator::Signals;

        let mut signals = Signals::new([SIGINT])?;
        let handle = signals.handle();
        let interrupts = self.clone();
        let thread = thread::spawn(move || {
            for _ in signals.forever() {
                if interrupts.on_interrupt() == InterruptAction::Exit {
                    eprintln!();
                    std::process::exit(INTERRUPTED_EXIT_CODE);
                }
                tracing::info!("interrupt received; cancelling the current reply");
            }
        });

        Ok(InterruptGuard {
            handle,
            thread: Some(thread),
        })
    }

    #[cfg(not(unix))]
    pub fn install(&self) -> io::Result<InterruptGuard> {
        Ok(InterruptGuard {})
    }
}

/// Stops the signal thread on drop.
pub struct InterruptGuard {
    #[cfg(unix)]
    handle: signal_hook::iterator::Handle,
    #[cfg(unix)]
    thread: Option<JoinHandle<()>>,
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
