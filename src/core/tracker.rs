//! The single control loop that owns the session.
//!
//! Producers (stdin reader, idle poller) only send [`Inbound`] messages; the
//! loop batches whatever is available into an [`EventQueue`], applies events
//! in timestamp order and persists each transition before the next one.

use crate::config::Config;
use crate::core::durability::{Persister, RetryPolicy};
use crate::core::machine::{Policy, SessionMachine, Step};
use crate::core::queue::EventQueue;
use crate::core::recovery::{Recovery, reconcile};
use crate::errors::{AppError, AppResult};
use crate::models::{QueuedEvent, Session, SessionEvent, SessionState, SystemEvent, Timestamp};
use crate::sources::clock::Clock;
use crate::store::Persistence;
use crossbeam_channel::{Receiver, RecvTimeoutError};
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Messages accepted by the control loop.
#[derive(Debug, Clone)]
pub enum Inbound {
    Event(QueuedEvent),
    /// Print the current state once pending events are applied.
    Status,
    /// New configuration; threshold and grace apply from the next event.
    Reconfigure(Box<Config>),
}

/// What the loop tells its caller, for user-facing output.
#[derive(Debug)]
pub enum Report<'a> {
    Applied {
        event: SessionEvent,
        step: &'a Step,
        state: SessionState,
    },
    Rejected(&'a AppError),
    /// Retries exhausted; the transition stays queued in memory.
    PersistFailed(&'a AppError),
    Status {
        session: Option<&'a Session>,
        state: SessionState,
        now: Timestamp,
        pending_writes: usize,
    },
}

pub struct Tracker<P: Persistence, C: Clock> {
    machine: SessionMachine,
    persister: Persister<P>,
    clock: C,
    config: Config,
    queue: EventQueue,
    last_persist_error: Option<String>,
}

impl<P: Persistence, C: Clock> Tracker<P, C> {
    /// Reconcile persisted state and build a tracker ready for live events.
    /// Never fails: unreadable inputs degrade to the log fallback or a fresh
    /// start, and unwritten recovery records stay pending.
    pub fn recover(store: P, clock: C, config: Config) -> (Self, Recovery) {
        let policy = Policy::from_config(&config);
        let mut persister = Persister::new(store, RetryPolicy::from_config(&config));
        let now = clock.now();

        let read = persister.store_mut().read_heartbeat();
        let tail = match persister.store_mut().read_log_tail(config.log_tail_entries) {
            Ok(tail) => tail,
            Err(e) => {
                warn!(error = %e, "activity log unreadable; recovering without it");
                Vec::new()
            }
        };

        let recovery = reconcile(read, &tail, now, &policy);
        info!(
            outcome = ?recovery.outcome,
            source = recovery.source.as_str(),
            gap = ?recovery.gap_secs,
            "recovery finished"
        );

        let mut last_persist_error = None;
        if let Err(e) = persister.commit(
            recovery.entries.clone(),
            recovery.closed.clone(),
            recovery.heartbeat.clone(),
        ) {
            error!(error = %e, "recovery records not yet durable");
            last_persist_error = Some(e.to_string());
        }

        let summary = format!("{:?} from {}", recovery.outcome, recovery.source.as_str());
        let target = recovery
            .closed
            .as_ref()
            .or(recovery.session.as_ref())
            .map(|s| s.id.clone())
            .unwrap_or_default();
        persister.store_mut().note("recover", &target, &summary);

        let machine = SessionMachine::with_session(recovery.session.clone(), policy, recovery.since);
        let tracker = Self {
            machine,
            persister,
            clock,
            config,
            queue: EventQueue::new(),
            last_persist_error,
        };
        (tracker, recovery)
    }

    pub fn state(&self) -> SessionState {
        self.machine.state()
    }

    pub fn session(&self) -> Option<&Session> {
        self.machine.session()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &P {
        self.persister.store()
    }

    pub fn into_store(self) -> P {
        self.persister.into_store()
    }

    pub fn is_durable(&self) -> bool {
        self.persister.is_durable()
    }

    pub fn last_persist_error(&self) -> Option<&str> {
        self.last_persist_error.as_deref()
    }

    pub fn reconfigure(&mut self, config: Config) {
        self.machine.set_policy(Policy::from_config(&config));
        self.persister.set_retry(RetryPolicy::from_config(&config));
        self.config = config;
    }

    /// Queue an event for the next [`Tracker::process`].
    pub fn submit(&mut self, ev: QueuedEvent) {
        self.queue.push(ev);
    }

    fn persist(&mut self, step: &Step) -> AppResult<()> {
        let at = self.machine.watermark().unwrap_or_else(|| self.clock.now());
        let heartbeat = self.machine.heartbeat(at);
        let res = self
            .persister
            .commit(step.entries.clone(), step.closed.clone(), heartbeat);
        self.last_persist_error = res.as_ref().err().map(|e| e.to_string());
        res
    }

    /// Apply one event and persist its transition.
    ///
    /// Returns `InvalidTransition` for commands that do not fit the current
    /// state. A persistence failure does not undo the transition: it stays
    /// queued (see [`Tracker::is_durable`]) and is reported separately.
    pub fn dispatch(&mut self, ev: QueuedEvent) -> AppResult<Step> {
        let step = self.machine.handle(ev)?;
        if !step.is_empty()
            && let Err(e) = self.persist(&step)
        {
            error!(error = %e, "transition applied but not yet durable");
        }
        Ok(step)
    }

    /// Apply every queued event in order, reporting each outcome.
    pub fn process(&mut self, report: &mut impl FnMut(Report<'_>)) {
        for ev in self.queue.drain_ordered() {
            match self.machine.handle(ev) {
                Ok(step) if step.is_empty() => {
                    debug!(event = %ev.event, "event ignored in current state");
                }
                Ok(step) => {
                    let persisted = self.persist(&step);
                    report(Report::Applied {
                        event: ev.event,
                        step: &step,
                        state: self.machine.state(),
                    });
                    if let Err(e) = persisted {
                        report(Report::PersistFailed(&e));
                    }
                }
                Err(e) => {
                    warn!(error = %e, "event discarded");
                    report(Report::Rejected(&e));
                }
            }
        }
    }

    /// Periodic work: refresh the heartbeat of a running session and retry
    /// writes left pending by earlier failures.
    pub fn tick(&mut self, now: Timestamp) -> AppResult<()> {
        let at = match self.machine.watermark() {
            Some(w) => now.max(w),
            None => now,
        };

        let res = match self.machine.state() {
            SessionState::Working | SessionState::OnBreak => {
                let heartbeat = self.machine.heartbeat(at);
                self.persister.commit(Vec::new(), None, heartbeat)
            }
            _ if !self.persister.is_durable() => self.persister.flush(),
            _ => Ok(()),
        };

        self.last_persist_error = res.as_ref().err().map(|e| e.to_string());
        res
    }

    fn status_report(&self, report: &mut impl FnMut(Report<'_>)) {
        report(Report::Status {
            session: self.machine.session(),
            state: self.machine.state(),
            now: self.clock.now(),
            pending_writes: self.persister.pending(),
        });
    }

    /// Consume `rx` until a shutdown request has been applied or every
    /// producer is gone.
    pub fn run(&mut self, rx: &Receiver<Inbound>, mut report: impl FnMut(Report<'_>)) {
        let mut last_tick = Instant::now();

        loop {
            let poll = self.config.poll_interval();
            let wait = poll.saturating_sub(last_tick.elapsed());
            let mut stop = false;
            let mut status = false;

            let first = match rx.recv_timeout(wait) {
                Ok(msg) => Some(msg),
                Err(RecvTimeoutError::Timeout) => None,
                Err(RecvTimeoutError::Disconnected) => {
                    info!("all producers gone; shutting down");
                    self.submit(QueuedEvent::system(
                        self.clock.now(),
                        SystemEvent::ShutdownRequested,
                    ));
                    stop = true;
                    None
                }
            };

            for msg in first.into_iter().chain(rx.try_iter()) {
                match msg {
                    Inbound::Event(ev) => {
                        stop |= ev.event == SessionEvent::System(SystemEvent::ShutdownRequested);
                        self.submit(ev);
                    }
                    Inbound::Status => status = true,
                    Inbound::Reconfigure(cfg) => {
                        info!("configuration reloaded");
                        self.reconfigure(*cfg);
                    }
                }
            }

            self.process(&mut report);
            if status {
                self.status_report(&mut report);
            }

            if last_tick.elapsed() >= poll {
                if let Err(e) = self.tick(self.clock.now()) {
                    report(Report::PersistFailed(&e));
                }
                last_tick = Instant::now();
            }

            if stop {
                break;
            }
        }

        if !self.persister.is_durable()
            && let Err(e) = self.persister.flush()
        {
            error!(error = %e, "exiting with writes still pending");
            report(Report::PersistFailed(&e));
        }
    }
}
