use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::auth::{Credentials, Readiness, SessionContext};
use crate::bus::{BusListener, EventBus, EventKind, Subscription, TrackerEvent, WidgetId};
use crate::client::{MonitorApi, TrackerAction};
use crate::clock::{Checkpoint, Clock, SystemClock};
use crate::error::FetchError;
use crate::format::format_hms;
use crate::models::{ProjectId, TrackedSession, TrackerStatus};
use crate::ticker::Ticker;

static NEXT_WIDGET_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disabled {
    NotAuthenticated,
    NoProject,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Uninitialized,
    Disabled(Disabled),
    Loading,
    Active,
    Paused,
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Affordance {
    Start,
    Pause,
    Busy,
    Unavailable,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrackerView {
    pub label: String,
    pub phase: Phase,
    pub project: Option<ProjectId>,
    pub seconds: u64,
    pub display: String,
    pub affordance: Affordance,
    pub error: Option<String>,
    pub last_sync: Option<DateTime<Utc>>,
}

impl TrackerView {
    pub fn is_active(&self) -> bool {
        self.phase == Phase::Active
    }
}

pub trait Render: Send + Sync {
    fn render(&self, view: &TrackerView);
}

pub struct NullRender;

impl Render for NullRender {
    fn render(&self, _view: &TrackerView) {}
}

pub struct Mount {
    label: String,
    context: SessionContext,
    api: Arc<dyn MonitorApi>,
    bus: EventBus,
    clock: Arc<dyn Clock>,
    render: Arc<dyn Render>,
    tick_interval: Duration,
}

impl Mount {
    pub fn new(
        label: impl Into<String>,
        context: SessionContext,
        api: Arc<dyn MonitorApi>,
        bus: EventBus,
    ) -> Self {
        Mount {
            label: label.into(),
            context,
            api,
            bus,
            clock: Arc::new(SystemClock),
            render: Arc::new(NullRender),
            tick_interval: Duration::from_secs(1),
        }
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn render(mut self, render: Arc<dyn Render>) -> Self {
        self.render = render;
        self
    }

    pub fn tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    pub fn mount(self) -> Arc<TrackerWidget> {
        let Mount {
            label,
            context,
            api,
            bus,
            clock,
            render,
            tick_interval,
        } = self;

        let widget = Arc::new_cyclic(|weak: &Weak<TrackerWidget>| {
            let tick_target = weak.clone();
            let ticker = Ticker::new(
                tick_interval,
                Arc::new(move || {
                    if let Some(widget) = tick_target.upgrade() {
                        widget.emit();
                    }
                }),
            );
            let now = clock.now();

            TrackerWidget {
                id: WidgetId(NEXT_WIDGET_ID.fetch_add(1, Ordering::Relaxed)),
                label,
                context,
                api,
                bus,
                clock,
                render,
                ticker,
                state: Mutex::new(State {
                    phase: Phase::Uninitialized,
                    checkpoint: Checkpoint::zero(now),
                    error: None,
                    in_flight: 0,
                    last_sync: None,
                }),
                issued: AtomicU64::new(0),
                ticker_gate: Mutex::new(()),
                subscription: Mutex::new(None),
            }
        });

        // A late mount catches up through the replayed event, which already
        // triggers a fetch.
        let listener: Arc<dyn BusListener> = widget.clone();
        let subscription = widget.bus.subscribe_replaying(Arc::downgrade(&listener));
        *widget
            .subscription
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(subscription);

        debug!(widget = widget.id.0, label = %widget.label, "tracker mounted");
        if widget.phase() == Phase::Uninitialized {
            widget.refresh();
        }
        widget
    }
}

struct State {
    phase: Phase,
    checkpoint: Checkpoint,
    error: Option<FetchError>,
    in_flight: usize,
    last_sync: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Applied {
    Applied,
    Stale,
    Unmounted,
}

pub struct TrackerWidget {
    id: WidgetId,
    label: String,
    context: SessionContext,
    api: Arc<dyn MonitorApi>,
    bus: EventBus,
    clock: Arc<dyn Clock>,
    render: Arc<dyn Render>,
    ticker: Ticker,
    state: Mutex<State>,
    issued: AtomicU64,
    ticker_gate: Mutex<()>,
    subscription: Mutex<Option<Subscription>>,
}

impl TrackerWidget {
    pub fn id(&self) -> WidgetId {
        self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn phase(&self) -> Phase {
        self.lock_state().phase
    }

    pub fn ticker(&self) -> &Ticker {
        &self.ticker
    }

    pub fn last_error(&self) -> Option<FetchError> {
        self.lock_state().error.clone()
    }

    pub fn view(&self) -> TrackerView {
        let now = self.clock.now();
        let state = self.lock_state();

        let seconds = match state.phase {
            Phase::Uninitialized | Phase::Disabled(_) => 0,
            _ => state.checkpoint.seconds_at(now),
        };
        let affordance = match state.phase {
            Phase::Uninitialized | Phase::Disabled(_) | Phase::Stopped => Affordance::Unavailable,
            _ if state.in_flight > 0 => Affordance::Busy,
            Phase::Loading => Affordance::Busy,
            Phase::Active => Affordance::Pause,
            Phase::Paused => Affordance::Start,
        };

        TrackerView {
            label: self.label.clone(),
            phase: state.phase,
            project: self.context.project(),
            seconds,
            display: format_hms(seconds),
            affordance,
            error: state.error.as_ref().map(ToString::to_string),
            last_sync: state.last_sync,
        }
    }

    pub fn refresh(&self) -> TrackerView {
        let Some(creds) = self.ready_credentials() else {
            return self.view();
        };
        let Some(seq) = self.begin_request(true) else {
            return self.view();
        };
        self.emit();

        let result = self.api.session(TrackerAction::Status, &creds);
        self.finish(seq, TrackerAction::Status, result);
        self.view()
    }

    pub fn toggle(&self) -> TrackerView {
        let action = match self.phase() {
            Phase::Active => TrackerAction::Stop,
            Phase::Paused => TrackerAction::Start,
            _ => return self.view(),
        };
        self.send(action)
    }

    pub fn start(&self) -> TrackerView {
        self.send(TrackerAction::Start)
    }

    pub fn stop(&self) -> TrackerView {
        self.send(TrackerAction::Stop)
    }

    pub fn unmount(&self) {
        {
            let mut state = self.lock_state();
            if state.phase == Phase::Stopped {
                return;
            }
            state.phase = Phase::Stopped;
        }
        self.subscription
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        self.sync_ticker();
        debug!(
            widget = self.id.0,
            label = %self.label,
            ticks = self.ticker.ticks(),
            intervals = self.ticker.intervals_started(),
            "tracker unmounted"
        );
    }

    fn send(&self, action: TrackerAction) -> TrackerView {
        let Some(creds) = self.ready_credentials() else {
            return self.view();
        };
        let Some(seq) = self.begin_request(false) else {
            return self.view();
        };
        self.emit();

        let result = self.api.session(action, &creds);
        let confirmed = result.as_ref().ok().cloned();
        let applied = self.finish(seq, action, result);

        if let (Some(session), true) = (confirmed, applied != Applied::Unmounted) {
            info!(
                widget = self.id.0,
                project = creds.project,
                %action,
                status = %session.status,
                total_seconds = session.total_seconds,
                "tracker toggled"
            );
            self.bus.publish(TrackerEvent {
                origin: Some(self.id),
                kind: EventKind::SessionChanged(session),
            });
        }
        self.view()
    }

    fn ready_credentials(&self) -> Option<Credentials> {
        let disabled = match self.context.readiness() {
            Readiness::Ready(creds) => return Some(creds),
            Readiness::MissingAuth => Disabled::NotAuthenticated,
            Readiness::MissingProject => Disabled::NoProject,
        };

        {
            let mut state = self.lock_state();
            if state.phase == Phase::Stopped {
                return None;
            }
            state.phase = Phase::Disabled(disabled);
        }
        debug!(widget = self.id.0, reason = ?disabled, "tracker disabled; no request made");
        self.sync_ticker();
        self.emit();
        None
    }

    fn begin_request(&self, loading: bool) -> Option<u64> {
        let mut state = self.lock_state();
        if state.phase == Phase::Stopped {
            return None;
        }
        let seq = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        state.in_flight += 1;
        if loading {
            state.phase = Phase::Loading;
        }
        Some(seq)
    }

    /// Applies a response if it answers the latest request.
    fn finish(
        &self,
        seq: u64,
        action: TrackerAction,
        result: Result<TrackedSession, FetchError>,
    ) -> Applied {
        let now = self.clock.now();
        {
            let mut state = self.lock_state();
            state.in_flight = state.in_flight.saturating_sub(1);

            if state.phase == Phase::Stopped {
                return Applied::Unmounted;
            }
            if seq != self.issued.load(Ordering::SeqCst) {
                debug!(widget = self.id.0, seq, %action, "discarding stale response");
                return Applied::Stale;
            }

            match result {
                Ok(session) => {
                    state.checkpoint = Checkpoint::from_session(&session, now);
                    state.phase = match session.status {
                        TrackerStatus::Active => Phase::Active,
                        TrackerStatus::Paused => Phase::Paused,
                    };
                    state.error = None;
                    state.last_sync = Some(now);
                }
                Err(err) => {
                    warn!(widget = self.id.0, %action, error = %err, "tracker request failed");
                    state.checkpoint = Checkpoint::zero(now);
                    state.phase = Phase::Paused;
                    state.error = Some(err);
                }
            }
        }

        self.sync_ticker();
        self.emit();
        Applied::Applied
    }

    fn sync_ticker(&self) {
        let _gate = self
            .ticker_gate
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if self.phase() == Phase::Active {
            self.ticker.start();
        } else {
            self.ticker.stop();
        }
    }

    fn emit(&self) {
        let view = self.view();
        if view.phase != Phase::Stopped {
            self.render.render(&view);
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl BusListener for TrackerWidget {
    fn on_event(&self, event: &TrackerEvent) {
        // The originator already applied the server's answer.
        if event.origin == Some(self.id) {
            return;
        }
        debug!(widget = self.id.0, origin = ?event.origin, "resyncing after tracker event");
        self.refresh();
    }
}
