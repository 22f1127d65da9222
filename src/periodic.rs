//! Cancellable timer-driven worker threads.
//!
//! Each periodic task runs on its own named thread and waits on two channels:
//! a tick source and a cancel signal. Cancellation is observed between ticks,
//! never in the middle of one. Dropping every `CancelToken` also stops the task.

use crossbeam_channel::{Receiver, Sender, TryRecvError, bounded, select};
use log::debug;
use std::io;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Wake {
    Tick(Instant),
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct CancelToken {
    tx: Sender<()>,
}

impl CancelToken {
    pub fn cancel(&self) {
        // capacity 1: a pending signal is as good as a second one
        let _ = self.tx.try_send(());
    }
}

/// Tick source firing every `interval`, first tick after one full interval.
pub fn interval_ticks(interval: Duration) -> Receiver<Instant> {
    crossbeam_channel::tick(interval)
}

/// Block until the next tick or cancellation. A pending cancel always wins.
pub fn next_wake(ticks: &Receiver<Instant>, cancel: &Receiver<()>) -> Wake {
    match cancel.try_recv() {
        Ok(()) | Err(TryRecvError::Disconnected) => return Wake::Cancelled,
        Err(TryRecvError::Empty) => {}
    }
    select! {
        recv(cancel) -> _ => Wake::Cancelled,
        recv(ticks) -> msg => match msg {
            Ok(at) => Wake::Tick(at),
            Err(_) => Wake::Cancelled,
        },
    }
}

pub struct TaskHandle<T> {
    name: String,
    cancel: CancelToken,
    join: JoinHandle<T>,
}

impl<T: Send + 'static> TaskHandle<T> {
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Wait for the task to end on its own. A panic inside the task is re-raised here.
    pub fn join(self) -> T {
        match self.join.join() {
            Ok(v) => v,
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }

    /// Request cancellation and wait for the task to wind down.
    pub fn stop(self) -> T {
        debug!("Stopping {}", self.name);
        self.cancel();
        self.join()
    }
}

/// Spawn `body` on a named thread, handing it the cancel receiver.
pub fn spawn_task<T, F>(name: &str, body: F) -> io::Result<TaskHandle<T>>
where
    T: Send + 'static,
    F: FnOnce(Receiver<()>) -> T + Send + 'static,
{
    let (tx, rx) = bounded(1);
    let join = thread::Builder::new().name(name.to_string()).spawn(move || body(rx))?;
    Ok(TaskHandle {
        name: name.to_string(),
        cancel: CancelToken { tx },
        join,
    })
}
