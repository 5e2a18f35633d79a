use std::sync::mpsc::{Receiver, Sender};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Signal {
    Wake,
    Stop,
}

/// Wakes a [`DispatcherThread`](super::DispatcherThread) ahead of its next
/// poll. Cheap to clone; sending never blocks.
#[derive(Clone, Debug)]
pub struct CommitSignal {
    tx: Sender<Signal>,
}

impl CommitSignal {
    pub(crate) fn new(tx: Sender<Signal>) -> Self {
        Self { tx }
    }

    /// A signal with no dispatcher listening.
    pub fn detached() -> Self {
        let (tx, _rx) = std::sync::mpsc::channel();
        Self { tx }
    }

    pub fn notify(&self) {
        // A stopped dispatcher has dropped its receiver; nothing to wake.
        let _ = self.tx.send(Signal::Wake);
    }
}

/// Drain queued signals without blocking. Returns `true` if a stop was seen
/// or every sender is gone.
pub(crate) fn drain(rx: &Receiver<Signal>) -> bool {
    loop {
        match rx.try_recv() {
            Ok(Signal::Wake) => continue,
            Ok(Signal::Stop) => return true,
            Err(std::sync::mpsc::TryRecvError::Empty) => return false,
            Err(std::sync::mpsc::TryRecvError::Disconnected) => return true,
        }
    }
}
