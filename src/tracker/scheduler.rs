//! Two polling loops over one shared model.
//!
//! The refresh loop pulls authoritative snapshots; the event loop long-polls
//! the event stream between them. Fetches always complete into owned values
//! before the model lock is taken, so cancelling a loop mid-fetch discards the
//! fetch and leaves the model untouched.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::{sleep, sleep_until, timeout, Instant};
use tracing::{debug, info, warn};

use crate::syncthing_client::SyncthingApi;
use crate::types::TrackerError;

use super::dispatcher::EventDispatcher;
use super::model::SharedModel;
use super::notifier::NotifierHub;

/// Lower bound on how long one fetch may take, whatever the interval.
const MIN_FETCH_TIMEOUT: Duration = Duration::from_secs(5);

/// Extra time granted to an event long poll beyond its server-side timeout.
const EVENT_FETCH_GRACE: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Foreground,
    Background,
}

/// Refresh-loop state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Fetching,
    Waiting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshIntervals {
    pub foreground: Duration,
    pub background: Duration,
}

impl RefreshIntervals {
    pub fn for_visibility(&self, visibility: Visibility) -> Duration {
        match visibility {
            Visibility::Foreground => self.foreground,
            Visibility::Background => self.background,
        }
    }
}

pub struct PollingScheduler {
    api: Arc<dyn SyncthingApi>,
    model: SharedModel,
    notifier: Arc<NotifierHub>,
    intervals: RefreshIntervals,
}

/// Control surface of running loops. Dropping it without calling
/// [`shutdown`](Self::shutdown) also stops them.
pub struct SchedulerHandle {
    visibility: watch::Sender<Visibility>,
    state: watch::Receiver<SchedulerState>,
    refresh: Arc<Notify>,
    resume: watch::Sender<u64>,
    shutdown: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl PollingScheduler {
    pub fn new(
        api: Arc<dyn SyncthingApi>,
        model: SharedModel,
        notifier: Arc<NotifierHub>,
        intervals: RefreshIntervals,
    ) -> Self {
        Self {
            api,
            model,
            notifier,
            intervals,
        }
    }

    /// Spawns both loops on the current tokio runtime.
    pub fn start(self, visibility: Visibility) -> SchedulerHandle {
        let (visibility_tx, visibility_rx) = watch::channel(visibility);
        let (state_tx, state_rx) = watch::channel(SchedulerState::Idle);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (resume_tx, resume_rx) = watch::channel(0);
        let refresh = Arc::new(Notify::new());

        let refresh_loop = RefreshLoop {
            api: Arc::clone(&self.api),
            model: Arc::clone(&self.model),
            notifier: Arc::clone(&self.notifier),
            intervals: self.intervals,
            visibility: visibility_rx.clone(),
            state: state_tx,
            refresh: Arc::clone(&refresh),
            shutdown: shutdown_rx.clone(),
        };
        let event_loop = EventLoop {
            api: self.api,
            dispatcher: EventDispatcher::new(Arc::clone(&self.model), Arc::clone(&self.notifier)),
            model: self.model,
            notifier: self.notifier,
            intervals: self.intervals,
            visibility: visibility_rx,
            refresh: Arc::clone(&refresh),
            resume: resume_rx,
            shutdown: shutdown_rx,
            primed: false,
        };

        info!(?visibility, "Starting Syncthing polling");
        SchedulerHandle {
            visibility: visibility_tx,
            state: state_rx,
            refresh,
            resume: resume_tx,
            shutdown: shutdown_tx,
            tasks: vec![tokio::spawn(refresh_loop.run()), tokio::spawn(event_loop.run())],
        }
    }
}

impl SchedulerHandle {
    /// Switches between the foreground and background refresh interval.
    pub fn set_visibility(&self, visibility: Visibility) {
        self.visibility.send_if_modified(|current| {
            let changed = *current != visibility;
            *current = visibility;
            changed
        });
    }

    pub fn visibility(&self) -> Visibility {
        *self.visibility.borrow()
    }

    /// Starts the next full refresh now. Also resumes loops parked after an
    /// authentication failure.
    pub fn refresh_now(&self) {
        self.refresh.notify_one();
        self.resume.send_modify(|generation| *generation += 1);
    }

    pub fn state(&self) -> SchedulerState {
        *self.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<SchedulerState> {
        self.state.clone()
    }

    /// Cancels in-flight fetches and waits for both loops to exit.
    pub async fn shutdown(mut self) {
        let _ = self.shutdown.send(true);
        for task in self.tasks.drain(..) {
            if let Err(err) = task.await {
                warn!(error = %err, "Polling task ended abnormally");
            }
        }
        info!("Syncthing polling stopped");
    }
}

impl Drop for SchedulerHandle {
    fn drop(&mut self) {
        let _ = self.shutdown.send(true);
    }
}

async fn stopped(shutdown: &mut watch::Receiver<bool>) {
    // A dropped sender also means stop.
    let _ = shutdown.wait_for(|stop| *stop).await;
}

fn fetch_timeout(interval: Duration) -> Duration {
    interval.max(MIN_FETCH_TIMEOUT)
}

struct RefreshLoop {
    api: Arc<dyn SyncthingApi>,
    model: SharedModel,
    notifier: Arc<NotifierHub>,
    intervals: RefreshIntervals,
    visibility: watch::Receiver<Visibility>,
    state: watch::Sender<SchedulerState>,
    refresh: Arc<Notify>,
    shutdown: watch::Receiver<bool>,
}

impl RefreshLoop {
    async fn run(mut self) {
        loop {
            self.state.send_replace(SchedulerState::Fetching);
            let interval = self.current_interval();
            let limit = fetch_timeout(interval);

            let fetched = tokio::select! {
                biased;
                _ = stopped(&mut self.shutdown) => break,
                fetched = timeout(limit, self.api.full_refresh()) => fetched,
            };

            let result = fetched.unwrap_or_else(|_| {
                Err(TrackerError::TimedOut {
                    endpoint: "full refresh".to_string(),
                    timeout: limit,
                })
            });

            match result {
                Ok(refresh) => {
                    self.model.write().await.apply_full_refresh(refresh);
                    self.notifier.notify();
                    debug!("Full refresh applied");
                }
                Err(err) => {
                    let parked = matches!(err, TrackerError::AuthenticationFailed { .. });
                    self.record_failure(err).await;
                    if parked {
                        self.state.send_replace(SchedulerState::Idle);
                        if !self.wait_for_manual_refresh().await {
                            break;
                        }
                        continue;
                    }
                }
            }

            self.state.send_replace(SchedulerState::Waiting);
            if !self.wait_next_tick().await {
                break;
            }
        }
        self.state.send_replace(SchedulerState::Idle);
    }

    fn current_interval(&self) -> Duration {
        let visibility = *self.visibility.borrow();
        self.intervals.for_visibility(visibility)
    }

    async fn record_failure(&self, err: TrackerError) {
        warn!(error = %err, retryable = err.is_retryable(), "Full refresh failed");
        let recorded = self.model.write().await.record_failure(&err);
        if recorded {
            self.notifier.notify();
        }
    }

    /// Waits out the current interval. Returns false when the loop should stop.
    async fn wait_next_tick(&mut self) -> bool {
        let started = Instant::now();
        loop {
            let deadline = started + self.current_interval();
            tokio::select! {
                biased;
                _ = stopped(&mut self.shutdown) => return false,
                _ = self.refresh.notified() => return true,
                _ = sleep_until(deadline) => return true,
                changed = self.visibility.changed() => {
                    if changed.is_err() {
                        return false;
                    }
                    debug!("Visibility changed, rescheduling refresh");
                }
            }
        }
    }

    async fn wait_for_manual_refresh(&mut self) -> bool {
        info!("Polling paused until the API key is fixed or a refresh is requested");
        tokio::select! {
            biased;
            _ = stopped(&mut self.shutdown) => false,
            _ = self.refresh.notified() => true,
        }
    }
}

struct EventLoop {
    api: Arc<dyn SyncthingApi>,
    dispatcher: EventDispatcher,
    model: SharedModel,
    notifier: Arc<NotifierHub>,
    intervals: RefreshIntervals,
    visibility: watch::Receiver<Visibility>,
    refresh: Arc<Notify>,
    /// Bumped by every manual refresh.
    resume: watch::Receiver<u64>,
    shutdown: watch::Receiver<bool>,
    primed: bool,
}

impl EventLoop {
    async fn run(mut self) {
        loop {
            let interval = self.intervals.for_visibility(*self.visibility.borrow());

            let epoch = self.model.read().await.daemon_epoch().map(str::to_string);
            if self.dispatcher.observe_epoch(epoch.as_deref()) {
                self.primed = false;
                self.refresh.notify_one();
            }

            let result = if self.primed {
                self.poll(interval).await
            } else {
                self.prime(interval).await
            };

            match result {
                Some(Ok(())) => {}
                Some(Err(err)) => {
                    let parked = matches!(err, TrackerError::AuthenticationFailed { .. });
                    self.record_failure(err).await;
                    let resumed = if parked {
                        self.wait_for_manual_refresh().await
                    } else {
                        self.back_off(interval).await
                    };
                    if !resumed {
                        break;
                    }
                }
                None => break,
            }
        }
        debug!(watermark = self.dispatcher.last_event_id(), "Event loop stopped");
    }

    async fn record_failure(&self, err: TrackerError) {
        warn!(error = %err, retryable = err.is_retryable(), "Event poll failed");
        let recorded = self.model.write().await.record_failure(&err);
        if recorded {
            self.notifier.notify();
        }
    }

    async fn back_off(&mut self, interval: Duration) -> bool {
        tokio::select! {
            biased;
            _ = stopped(&mut self.shutdown) => false,
            _ = sleep(interval) => true,
        }
    }

    /// Requests made before the failure do not count.
    async fn wait_for_manual_refresh(&mut self) -> bool {
        self.resume.borrow_and_update();
        info!("Event polling paused until a refresh is requested");
        tokio::select! {
            biased;
            _ = stopped(&mut self.shutdown) => false,
            resumed = self.resume.changed() => resumed.is_ok(),
        }
    }

    /// Starts from the newest event id so history is not replayed.
    async fn prime(&mut self, interval: Duration) -> Option<Result<(), TrackerError>> {
        let limit = fetch_timeout(interval);
        let fetched = tokio::select! {
            biased;
            _ = stopped(&mut self.shutdown) => return None,
            fetched = timeout(limit, self.api.events_since(0, Some(1), Duration::ZERO)) => fetched,
        };
        match fetched {
            Ok(Ok(events)) => {
                if let Some(latest) = events.iter().map(|event| event.id).max() {
                    self.dispatcher.prime(latest);
                }
                self.primed = true;
                Some(Ok(()))
            }
            Ok(Err(err)) => Some(Err(err)),
            Err(_) => Some(Err(TrackerError::TimedOut {
                endpoint: "/rest/events".to_string(),
                timeout: limit,
            })),
        }
    }

    async fn poll(&mut self, interval: Duration) -> Option<Result<(), TrackerError>> {
        let since = self.dispatcher.last_event_id();
        let long_poll = Duration::from_secs(interval.as_secs().max(1));
        let limit = long_poll + EVENT_FETCH_GRACE;
        let fetched = tokio::select! {
            biased;
            _ = stopped(&mut self.shutdown) => return None,
            fetched = timeout(limit, self.api.events_since(since, None, long_poll)) => fetched,
        };
        match fetched {
            Ok(Ok(events)) => {
                let outcome = self.dispatcher.consume(events).await;
                if outcome.refresh_requested {
                    self.refresh.notify_one();
                }
                if outcome.skipped > 0 {
                    debug!(skipped = outcome.skipped, "Skipped stale events");
                }
                Some(Ok(()))
            }
            Ok(Err(err)) => Some(Err(err)),
            Err(_) => Some(Err(TrackerError::TimedOut {
                endpoint: "/rest/events".to_string(),
                timeout: limit,
            })),
        }
    }
}
