//! Signal handling for the long-running `run` command.
//!
//! A background thread turns process signals into [`SignalMessage`]s on a
//! channel the runtime loop drains between timer dispatches:
//!
//! - SIGINT, SIGTERM: shut down (also clears the `running` flag)
//! - SIGUSR1: manual trigger of every node
//! - SIGHUP, SIGUSR2: reload the configuration

use anyhow::{Context, Result};
use signal_hook::{
    consts::signal::{SIGHUP, SIGINT, SIGTERM, SIGUSR1, SIGUSR2},
    iterator::Signals,
};
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
    mpsc::{Receiver, Sender, channel},
};
use std::thread;

/// Message delivered to the runtime loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalMessage {
    Shutdown,
    Trigger,
    Reload,
}

/// Signal handling state shared with the runtime loop.
pub struct SignalState {
    /// Cleared when the process should stop.
    pub running: Arc<AtomicBool>,
    pub receiver: Receiver<SignalMessage>,
}

impl SignalState {
    /// State with no signal thread behind it, fed through the returned sender.
    pub fn detached() -> (Self, Sender<SignalMessage>) {
        let (sender, receiver) = channel();
        let state = Self {
            running: Arc::new(AtomicBool::new(true)),
            receiver,
        };
        (state, sender)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

/// Install handlers and spawn the forwarding thread.
pub fn setup_signal_handler() -> Result<SignalState> {
    let (state, sender) = SignalState::detached();
    let mut signals = Signals::new([SIGINT, SIGTERM, SIGHUP, SIGUSR1, SIGUSR2])
        .context("failed to register signal handlers")?;
    let running = state.running.clone();

    thread::spawn(move || {
        for sig in signals.forever() {
            let message = match sig {
                SIGUSR1 => SignalMessage::Trigger,
                SIGHUP | SIGUSR2 => SignalMessage::Reload,
                _ => {
                    running.store(false, Ordering::SeqCst);
                    SignalMessage::Shutdown
                }
            };
            if sender.send(message).is_err() || message == SignalMessage::Shutdown {
                break;
            }
        }
    });

    Ok(state)
}
