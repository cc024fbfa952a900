//! Activity poller: keeps the page's "now playing" container fresh.
//!
//! ## Cycle
//!
//!   Idle -> Fetching -> Succeeded | Failed -> Scheduled -> Idle ...
//!
//! One fetch per cycle. The next fetch is scheduled only once the current one
//! has settled, and the delay is counted from that moment: `base_interval`
//! after a success, `backoff_interval` after a failure. Nothing stops the loop
//! except the handle's cancellation token.
//!
//! ## Diffing
//!
//! Status header, track title and artists are compared as trimmed text:
//!   - title or artists differ -> cross-fade replacement of the whole node
//!   - only the header differs -> header sub-element swapped in place
//!   - nothing differs         -> no mutation
//!
//! The cross-fade runs after the next deadline is fixed, so its delays never
//! push the following fetch back.

use std::sync::Arc;
use std::time::Duration;

use activity_proto::config::PollingConfig;
use activity_proto::fragment::{ActivityFragment, ActivitySelectors, Change};
use chrono::{DateTime, Local};
use tokio::sync::{watch, Notify};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::client::{ActivitySource, FetchError};
use crate::page::Page;

#[derive(Debug, thiserror::Error)]
pub enum PollError {
    #[error(transparent)]
    Transport(#[from] FetchError),

    #[error("activity endpoint answered {status}: {message}")]
    Application { status: u16, message: String },
}

/// Delays driving the loop and the cross-fade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollTiming {
    pub base_interval: Duration,
    pub backoff_interval: Duration,
    pub fade_out: Duration,
    pub fade_in: Duration,
}

impl Default for PollTiming {
    fn default() -> Self {
        Self::from(&PollingConfig::default())
    }
}

impl From<&PollingConfig> for PollTiming {
    fn from(cfg: &PollingConfig) -> Self {
        Self {
            base_interval: cfg.base_interval(),
            backoff_interval: cfg.backoff_interval(),
            fade_out: cfg.fade_out(),
            fade_in: cfg.fade_in(),
        }
    }
}

/// What a settled poll did to the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollUpdate {
    /// The page has no activity container; nothing was fetched.
    NoContainer,
    /// The body had no anchor element; nothing to update.
    NoAnchor,
    Unchanged,
    HeaderReplaced,
    Replaced,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollPhase {
    Idle,
    Fetching,
    Succeeded,
    Failed,
    Scheduled,
}

/// Snapshot published on every phase change.
#[derive(Debug, Clone, PartialEq)]
pub struct PollReport {
    pub phase: PollPhase,
    /// Delay applied after the last settled poll.
    pub interval: Duration,
    pub consecutive_failures: u32,
    pub last_error: Option<String>,
    pub last_success: Option<DateTime<Local>>,
}

/// When the next fetch starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NextPoll {
    pub delay: Duration,
    pub at: Instant,
}

/// Result of one full cycle, as returned by [`ActivityPoller::tick`].
#[derive(Debug)]
pub struct PollCycle {
    pub outcome: Result<PollUpdate, PollError>,
    pub next: NextPoll,
}

/// Page-lifetime state of the loop.
#[derive(Debug, Clone)]
struct PollState {
    interval: Duration,
    consecutive_failures: u32,
    last_error: Option<String>,
    last_success: Option<DateTime<Local>>,
}

/// Fetch-and-compare result before any cosmetic delay.
struct Settled {
    update: PollUpdate,
    cross_fade: Option<ActivityFragment>,
}

impl Settled {
    fn done(update: PollUpdate) -> Self {
        Self {
            update,
            cross_fade: None,
        }
    }
}

pub struct ActivityPoller<S, P> {
    source: S,
    page: P,
    selectors: ActivitySelectors,
    timing: PollTiming,
    state: PollState,
    reports: watch::Sender<PollReport>,
}

impl<S: ActivitySource, P: Page> ActivityPoller<S, P> {
    pub fn new(source: S, page: P, selectors: ActivitySelectors, timing: PollTiming) -> Self {
        let state = PollState {
            interval: timing.base_interval,
            consecutive_failures: 0,
            last_error: None,
            last_success: None,
        };
        let (reports, _) = watch::channel(PollReport {
            phase: PollPhase::Idle,
            interval: state.interval,
            consecutive_failures: 0,
            last_error: None,
            last_success: None,
        });
        Self {
            source,
            page,
            selectors,
            timing,
            state,
            reports,
        }
    }

    pub fn page(&self) -> &P {
        &self.page
    }

    pub fn report(&self) -> PollReport {
        self.reports.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<PollReport> {
        self.reports.subscribe()
    }

    /// One poll: fetch, compare, mutate the page. Includes the cross-fade
    /// delays when the track changed. Does not touch the retry interval.
    pub async fn poll(&mut self) -> Result<PollUpdate, PollError> {
        let settled = self.fetch_and_compare().await?;
        if let Some(next) = settled.cross_fade {
            self.cross_fade(next).await;
        }
        Ok(settled.update)
    }

    /// One full cycle: poll, record the outcome and fix the next deadline.
    pub async fn tick(&mut self) -> PollCycle {
        self.publish(PollPhase::Fetching);
        let settled = self.fetch_and_compare().await;
        self.settle(settled).await
    }

    /// Loop until `shutdown` is cancelled. `refresh` cuts the current wait
    /// short; it is only awaited between polls, so it never starts a second
    /// fetch while one is in flight.
    pub async fn run(mut self, shutdown: CancellationToken, refresh: Arc<Notify>) -> Self {
        info!(
            "[poll] starting: base={:?} backoff={:?}",
            self.timing.base_interval, self.timing.backoff_interval
        );

        loop {
            self.publish(PollPhase::Fetching);
            let settled = tokio::select! {
                _ = shutdown.cancelled() => break,
                settled = self.fetch_and_compare() => settled,
            };
            let cycle = self.settle(settled).await;

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep_until(cycle.next.at) => {}
                _ = refresh.notified() => debug!("[poll] refresh requested"),
            }
            self.publish(PollPhase::Idle);
        }

        self.publish(PollPhase::Idle);
        info!("[poll] stopped");
        self
    }

    pub fn spawn(self) -> PollerHandle<S, P>
    where
        S: 'static,
        P: 'static,
    {
        let shutdown = CancellationToken::new();
        let refresh = Arc::new(Notify::new());
        let reports = self.subscribe();
        let task = tokio::spawn(self.run(shutdown.clone(), Arc::clone(&refresh)));
        PollerHandle {
            shutdown,
            refresh,
            reports,
            task,
        }
    }

    async fn fetch_and_compare(&mut self) -> Result<Settled, PollError> {
        let Some(container) = self.page.container() else {
            return Ok(Settled::done(PollUpdate::NoContainer));
        };
        let current = container.fragment().fields.clone();
        let has_header = container.fragment().header.is_some();

        let response = self.source.fetch().await?;

        if !response.is_success() {
            let message = response.error_message();
            self.page.show_error(&message);
            return Err(PollError::Application {
                status: response.status,
                message,
            });
        }

        let Some(next) = self.selectors.extract(&response.body) else {
            debug!("[poll] no activity anchor in response, leaving page as is");
            return Ok(Settled::done(PollUpdate::NoAnchor));
        };

        let update = match current.compare(&next.fields) {
            Change::Unchanged => PollUpdate::Unchanged,
            Change::Header => match next.header.clone() {
                Some(header) if has_header => {
                    debug!("[poll] status changed: {:?}", header.status);
                    self.page.replace_header(header);
                    PollUpdate::HeaderReplaced
                }
                // No header element to swap on one side: replace the node
                _ => {
                    return Ok(Settled {
                        update: PollUpdate::Replaced,
                        cross_fade: Some(next),
                    })
                }
            },
            Change::Track => {
                return Ok(Settled {
                    update: PollUpdate::Replaced,
                    cross_fade: Some(next),
                })
            }
        };

        self.page.attach_listeners();
        Ok(Settled::done(update))
    }

    async fn cross_fade(&mut self, next: ActivityFragment) {
        info!(
            "[poll] now playing: {}",
            next.fields.now_playing().as_deref().unwrap_or("?")
        );
        self.page.set_opacity(0.0);
        tokio::time::sleep(self.timing.fade_out).await;
        self.page.replace_container(next);
        self.page.set_opacity(0.0);
        tokio::time::sleep(self.timing.fade_in).await;
        self.page.set_opacity(1.0);
        self.page.attach_listeners();
    }

    async fn settle(&mut self, settled: Result<Settled, PollError>) -> PollCycle {
        match settled {
            Ok(settled) => {
                let next = self.record_success();
                if let Some(fragment) = settled.cross_fade {
                    self.cross_fade(fragment).await;
                }
                PollCycle {
                    outcome: Ok(settled.update),
                    next,
                }
            }
            Err(e) => {
                let next = self.record_failure(&e);
                PollCycle {
                    outcome: Err(e),
                    next,
                }
            }
        }
    }

    fn record_success(&mut self) -> NextPoll {
        self.state.interval = self.timing.base_interval;
        self.state.consecutive_failures = 0;
        self.state.last_error = None;
        self.state.last_success = Some(Local::now());
        self.publish(PollPhase::Succeeded);
        self.schedule()
    }

    fn record_failure(&mut self, e: &PollError) -> NextPoll {
        self.state.interval = self.timing.backoff_interval;
        self.state.consecutive_failures += 1;
        self.state.last_error = Some(e.to_string());
        warn!(
            "[poll] {} (failure #{}, retrying in {:?})",
            e, self.state.consecutive_failures, self.state.interval
        );
        self.publish(PollPhase::Failed);
        self.schedule()
    }

    fn schedule(&mut self) -> NextPoll {
        let delay = self.state.interval;
        self.publish(PollPhase::Scheduled);
        NextPoll {
            delay,
            at: Instant::now() + delay,
        }
    }

    fn publish(&self, phase: PollPhase) {
        self.reports.send_replace(PollReport {
            phase,
            interval: self.state.interval,
            consecutive_failures: self.state.consecutive_failures,
            last_error: self.state.last_error.clone(),
            last_success: self.state.last_success,
        });
    }
}

/// Control surface of a spawned poller.
pub struct PollerHandle<S, P> {
    shutdown: CancellationToken,
    refresh: Arc<Notify>,
    reports: watch::Receiver<PollReport>,
    task: JoinHandle<ActivityPoller<S, P>>,
}

impl<S, P> PollerHandle<S, P> {
    /// Start the next poll as soon as the current cycle settles. Repeated
    /// requests before that coalesce into one.
    pub fn refresh_now(&self) {
        self.refresh.notify_one();
    }

    pub fn reports(&self) -> watch::Receiver<PollReport> {
        self.reports.clone()
    }

    /// Cancel the loop and hand the poller back.
    pub async fn stop(self) -> Result<ActivityPoller<S, P>, JoinError> {
        self.shutdown.cancel();
        self.task.await
    }
}
