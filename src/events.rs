//! Purpose: Process-wide event listener plus the internal periodic event loop.
//! Exports: `EventListener`, `EventNotifier`, `notifier`, `start_internal_event_loop`.
//! Role: Lets bindings register one callback that receives SDK events as strings.
//! Invariants: At most one listener is installed; notifying without one is a no-op.
//! Invariants: The internal loop is spawned at most once per process.
use crate::core::error::{Error, ErrorKind};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock, PoisonError, RwLock};
use std::time::Duration;
use tokio::runtime::Runtime;

pub const INTERNAL_EVENT: &str = "Internal event triggered";
pub const INTERNAL_EVENT_PERIOD: Duration = Duration::from_secs(2);

pub trait EventListener: Send + Sync {
    fn on_event_occurred(&self, event_data: String);
}

#[derive(Default)]
pub struct EventNotifier {
    listener: RwLock<Option<Arc<dyn EventListener>>>,
}

impl EventNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_listener(&self, listener: Arc<dyn EventListener>) {
        let mut slot = self.listener.write().unwrap_or_else(PoisonError::into_inner);
        *slot = Some(listener);
    }

    pub fn remove_listener(&self) {
        let mut slot = self.listener.write().unwrap_or_else(PoisonError::into_inner);
        *slot = None;
    }

    pub fn has_listener(&self) -> bool {
        self.listener
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    pub fn notify_event(&self, event_data: impl Into<String>) {
        // Clone out of the lock so a listener may re-enter the notifier.
        let listener = self
            .listener
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(listener) = listener {
            listener.on_event_occurred(event_data.into());
        }
    }
}

pub fn notifier() -> &'static EventNotifier {
    static NOTIFIER: OnceLock<EventNotifier> = OnceLock::new();
    NOTIFIER.get_or_init(EventNotifier::new)
}

/// Shared multi-threaded runtime for background SDK work.
pub(crate) fn runtime() -> Result<&'static Runtime, Error> {
    static RUNTIME: OnceLock<Runtime> = OnceLock::new();
    if let Some(runtime) = RUNTIME.get() {
        return Ok(runtime);
    }
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .thread_name("pubkycore-events")
        .enable_time()
        .build()
        .map_err(|err| {
            Error::new(ErrorKind::Internal)
                .with_message("failed to start event runtime")
                .with_source(err)
        })?;
    // A concurrent initializer may win; its runtime is used and ours is dropped.
    let _ = RUNTIME.set(runtime);
    RUNTIME.get().ok_or_else(|| {
        Error::new(ErrorKind::Internal).with_message("event runtime unavailable")
    })
}

/// Starts the periodic internal event loop. Returns `Ok(false)` if it was already running.
pub fn start_internal_event_loop() -> Result<bool, Error> {
    static STARTED: AtomicBool = AtomicBool::new(false);
    if STARTED
        .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
        .is_err()
    {
        return Ok(false);
    }
    let runtime = match runtime() {
        Ok(runtime) => runtime,
        Err(err) => {
            STARTED.store(false, Ordering::Release);
            return Err(err);
        }
    };
    runtime.spawn(async {
        let mut interval = tokio::time::interval(INTERNAL_EVENT_PERIOD);
        // The first tick completes immediately.
        interval.tick().await;
        loop {
            interval.tick().await;
            notifier().notify_event(INTERNAL_EVENT);
        }
    });
    tracing::info!(period_ms = INTERNAL_EVENT_PERIOD.as_millis() as u64, "internal event loop started");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::{EventListener, EventNotifier, runtime, start_internal_event_loop};
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<String>>,
    }

    impl EventListener for Recorder {
        fn on_event_occurred(&self, event_data: String) {
            self.events.lock().expect("lock").push(event_data);
        }
    }

    #[test]
    fn notifies_installed_listener_only() {
        let notifier = EventNotifier::new();
        notifier.notify_event("dropped");

        let recorder = Arc::new(Recorder::default());
        notifier.set_listener(recorder.clone());
        assert!(notifier.has_listener());
        notifier.notify_event("first");
        notifier.remove_listener();
        notifier.notify_event("second");

        assert_eq!(*recorder.events.lock().expect("lock"), vec!["first"]);
        assert!(!notifier.has_listener());
    }

    #[test]
    fn replacing_the_listener_redirects_events() {
        let notifier = EventNotifier::new();
        let first = Arc::new(Recorder::default());
        let second = Arc::new(Recorder::default());
        notifier.set_listener(first.clone());
        notifier.set_listener(second.clone());
        notifier.notify_event("x");
        assert!(first.events.lock().expect("lock").is_empty());
        assert_eq!(second.events.lock().expect("lock").len(), 1);
    }

    #[test]
    fn event_loop_starts_once() {
        start_internal_event_loop().expect("start");
        assert!(!start_internal_event_loop().expect("start again"));
        assert!(runtime().is_ok());
    }
}
