use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Cancel-and-reschedule timer: each `push` replaces the pending value and restarts the wait,
/// so at most one value is emitted per quiet period.
#[derive(Debug)]
pub struct Debouncer<T> {
    delay: Duration,
    tx: mpsc::UnboundedSender<T>,
    pending: Option<JoinHandle<()>>,
}

impl<T: Send + 'static> Debouncer<T> {
    pub fn new(delay: Duration) -> (Self, mpsc::UnboundedReceiver<T>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                delay,
                tx,
                pending: None,
            },
            rx,
        )
    }

    pub fn push(&mut self, value: T) {
        self.cancel();
        let tx = self.tx.clone();
        let delay = self.delay;
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(value);
        }));
    }

    pub fn emit_now(&mut self, value: T) {
        self.cancel();
        let _ = self.tx.send(value);
    }

    pub fn cancel(&mut self) -> bool {
        match self.pending.take() {
            Some(handle) if !handle.is_finished() => {
                handle.abort();
                true
            }
            _ => false,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl<T> Drop for Debouncer<T> {
    fn drop(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }
}

#[derive(Debug)]
pub struct SearchInput {
    value: String,
    debouncer: Debouncer<String>,
}

impl SearchInput {
    pub fn new(delay: Duration) -> (Self, mpsc::UnboundedReceiver<String>) {
        let (debouncer, rx) = Debouncer::new(delay);
        (
            Self {
                value: String::new(),
                debouncer,
            },
            rx,
        )
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn is_pending(&self) -> bool {
        self.debouncer.is_pending()
    }

    pub fn on_change(&mut self, value: impl Into<String>) {
        self.value = value.into();
        self.debouncer.push(self.value.clone());
    }

    pub fn clear(&mut self) {
        self.value.clear();
        self.debouncer.emit_now(String::new());
    }
}
