//! Dashboard controller: rate polling, trend refresh on selection, and the
//! state snapshots the views render from.

use super::config::{DashboardConfig, ErrorPolicy};
use super::rates::RatesProvider;
use super::types::{AggregatedRate, Timeframe, TrendData};
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

pub const RATES_ERROR: &str = "Failed to fetch current rates";
pub const TRENDS_ERROR: &str = "Failed to fetch trend data";

const MIN_POLL_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub currency: String,
    pub timeframe: Timeframe,
}

impl Default for Selection {
    fn default() -> Self {
        Selection {
            currency: "EUR".to_string(),
            timeframe: Timeframe::Daily,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DashboardStatus {
    Loading,
    Error(String),
    Ready,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DashboardState {
    pub rates: Vec<AggregatedRate>,
    pub trend: Option<TrendData>,
    pub selection: Selection,
    pub rates_loading: bool,
    pub trend_loading: bool,
    pub error: Option<String>,
}

impl DashboardState {
    /// A standing error hides everything else.
    pub fn status(&self) -> DashboardStatus {
        if let Some(message) = &self.error {
            DashboardStatus::Error(message.clone())
        } else if self.rates_loading || self.trend_loading {
            DashboardStatus::Loading
        } else {
            DashboardStatus::Ready
        }
    }

    fn begin_attempt(&mut self, policy: ErrorPolicy) {
        if policy == ErrorPolicy::ClearOnAttempt {
            self.error = None;
        }
    }

    pub fn begin_rates(&mut self, policy: ErrorPolicy) {
        self.rates_loading = true;
        self.begin_attempt(policy);
    }

    pub fn begin_trend(&mut self, selection: Selection, policy: ErrorPolicy) {
        self.selection = selection;
        self.trend_loading = true;
        self.begin_attempt(policy);
    }

    pub fn apply_rates(&mut self, result: Result<Vec<AggregatedRate>>, policy: ErrorPolicy) {
        self.rates_loading = false;
        match result {
            Ok(rates) => {
                self.rates = rates;
                if policy == ErrorPolicy::ClearOnSuccess {
                    self.error = None;
                }
            }
            Err(e) => {
                error!(error = %format!("{e:#}"), "Error fetching rates");
                self.error = Some(RATES_ERROR.to_string());
            }
        }
    }

    pub fn apply_trend(&mut self, result: Result<TrendData>, policy: ErrorPolicy) {
        self.trend_loading = false;
        match result {
            Ok(trend) => {
                self.trend = Some(trend);
                if policy == ErrorPolicy::ClearOnSuccess {
                    self.error = None;
                }
            }
            Err(e) => {
                error!(error = %format!("{e:#}"), "Error fetching trends");
                self.error = Some(TRENDS_ERROR.to_string());
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct DashboardSettings {
    pub selection: Selection,
    pub poll_interval: Duration,
    pub error_policy: ErrorPolicy,
}

impl Default for DashboardSettings {
    fn default() -> Self {
        Self::from(&DashboardConfig::default())
    }
}

impl From<&DashboardConfig> for DashboardSettings {
    fn from(config: &DashboardConfig) -> Self {
        DashboardSettings {
            selection: Selection {
                currency: config.currency.to_uppercase(),
                timeframe: config.timeframe,
            },
            poll_interval: Duration::from_secs(config.poll_interval_secs),
            error_policy: config.error_policy,
        }
    }
}

/// Owns the background tasks of a running dashboard.
///
/// Dropping the handle cancels the tasks; [`DashboardHandle::shutdown`] also
/// waits for them to finish.
pub struct DashboardHandle {
    state_rx: watch::Receiver<DashboardState>,
    selection_tx: watch::Sender<Selection>,
    shutdown_tx: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl DashboardHandle {
    pub fn subscribe(&self) -> watch::Receiver<DashboardState> {
        self.state_rx.clone()
    }

    pub fn state(&self) -> DashboardState {
        self.state_rx.borrow().clone()
    }

    pub fn selection(&self) -> Selection {
        self.selection_tx.borrow().clone()
    }

    /// Requests trends for `currency`, keeping the current timeframe.
    pub fn select_currency(&self, currency: &str) {
        let currency = currency.trim().to_uppercase();
        debug!(%currency, "Currency selected");
        self.selection_tx.send_modify(|s| s.currency = currency);
    }

    /// Requests trends for `timeframe`, keeping the current currency.
    pub fn select_timeframe(&self, timeframe: Timeframe) {
        debug!(%timeframe, "Timeframe selected");
        self.selection_tx.send_modify(|s| s.timeframe = timeframe);
    }

    pub async fn shutdown(mut self) {
        self.shutdown_tx.send_replace(true);
        for task in self.tasks.drain(..) {
            if let Err(e) = task.await {
                debug!(error = %e, "Dashboard task ended abnormally");
            }
        }
        info!("Dashboard stopped");
    }
}

impl Drop for DashboardHandle {
    fn drop(&mut self) {
        self.shutdown_tx.send_replace(true);
        for task in &self.tasks {
            task.abort();
        }
    }
}

pub struct Dashboard;

impl Dashboard {
    /// Spawns the rate polling and trend tasks. Must be called from within a
    /// tokio runtime.
    pub fn start(provider: Arc<dyn RatesProvider>, settings: DashboardSettings) -> DashboardHandle {
        info!(
            currency = %settings.selection.currency,
            timeframe = %settings.selection.timeframe,
            "Dashboard starting"
        );

        let initial = DashboardState {
            selection: settings.selection.clone(),
            ..DashboardState::default()
        };
        let (state_tx, state_rx) = watch::channel(initial);
        let state_tx = Arc::new(state_tx);
        let (selection_tx, selection_rx) = watch::channel(settings.selection);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let rates_task = tokio::spawn(poll_rates(
            Arc::clone(&provider),
            Arc::clone(&state_tx),
            settings.poll_interval.max(MIN_POLL_INTERVAL),
            settings.error_policy,
            shutdown_rx.clone(),
        ));
        let trends_task = tokio::spawn(refresh_trends(
            provider,
            state_tx,
            selection_rx,
            settings.error_policy,
            shutdown_rx,
        ));

        DashboardHandle {
            state_rx,
            selection_tx,
            shutdown_tx,
            tasks: vec![rates_task, trends_task],
        }
    }
}

/// Resolves once shutdown is requested or the handle is gone.
async fn cancelled(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stopped| *stopped).await;
}

async fn poll_rates(
    provider: Arc<dyn RatesProvider>,
    state: Arc<watch::Sender<DashboardState>>,
    interval: Duration,
    policy: ErrorPolicy,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = cancelled(&mut shutdown) => break,
        }

        state.send_modify(|s| s.begin_rates(policy));
        tokio::select! {
            result = provider.get_current_rates() => {
                state.send_modify(|s| s.apply_rates(result, policy));
            }
            _ = cancelled(&mut shutdown) => break,
        }
    }
    debug!("Rate polling stopped");
}

async fn refresh_trends(
    provider: Arc<dyn RatesProvider>,
    state: Arc<watch::Sender<DashboardState>>,
    mut selection_rx: watch::Receiver<Selection>,
    policy: ErrorPolicy,
    mut shutdown: watch::Receiver<bool>,
) {
    'outer: loop {
        let selection = selection_rx.borrow_and_update().clone();
        state.send_modify(|s| s.begin_trend(selection.clone(), policy));

        tokio::select! {
            result = provider.get_trends(&selection.currency, selection.timeframe) => {
                state.send_modify(|s| s.apply_trend(result, policy));
            }
            changed = selection_rx.changed() => {
                if changed.is_err() {
                    break 'outer;
                }
                // Response for the old selection is no longer wanted.
                debug!(currency = %selection.currency, timeframe = %selection.timeframe, "Dropping stale trend request");
                continue 'outer;
            }
            _ = cancelled(&mut shutdown) => break 'outer,
        }

        tokio::select! {
            changed = selection_rx.changed() => {
                if changed.is_err() {
                    break 'outer;
                }
            }
            _ = cancelled(&mut shutdown) => break 'outer,
        }
    }
    debug!("Trend refresh stopped");
}
