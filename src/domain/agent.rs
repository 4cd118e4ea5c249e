//! The trading agent and its decision cycle.
//!
//! One cycle runs per timeframe boundary: deadline and pause checks, operator
//! commands, then fetch, enrich, decide, execute, record. Every collaborator
//! failure degrades the cycle (hold, skip or drop) and the loop keeps going.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use crate::domain::agent_state::{AgentState, PauseOutcome, SharedState};
use crate::domain::command::{Command, HELP_TEXT};
use crate::domain::decision::{Action, Thresholds, decide};
use crate::domain::dispatch::NotificationDispatcher;
use crate::domain::dual_strategy::DualStrategyTracker;
use crate::domain::error::AgentError;
use crate::domain::indicator::{self, EnrichedBar};
use crate::domain::market_feed::MarketFeed;
use crate::domain::metrics::{PerformanceMetrics, format_performance, format_trade_counts};
use crate::domain::ohlcv::Bar;
use crate::domain::position::{PositionState, ProtectiveLevels};
use crate::domain::retry::RetryPolicy;
use crate::domain::schedule::{Timeframe, plan_sleep, until_boundary};
use crate::domain::signal::{CycleOutcome, Signal, SignalAssembler, TIME_FORMAT};
use crate::domain::sizing;
use crate::domain::window::{BarWindow, DEFAULT_CAPACITY};
use crate::ports::clock_port::Clock;
use crate::ports::command_port::CommandPort;
use crate::ports::execution_port::ExecutionPort;
use crate::ports::market_data_port::MarketDataPort;
use crate::ports::notifier_port::NotifierPort;
use crate::ports::signal_store_port::SignalStorePort;

#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub symbol: String,
    pub timeframe: Timeframe,
    /// Quote amount spent per buy.
    pub notional: f64,
    pub thresholds: Thresholds,
    /// Relative run time, recomputed on every start.
    pub stop_after: Option<Duration>,
    /// Absolute deadline; wins over `stop_after` at boot.
    pub stop_at: Option<DateTime<Utc>>,
    pub window_capacity: usize,
    pub fetch_retry: RetryPolicy,
    pub store_retry: RetryPolicy,
    pub notify_retry: RetryPolicy,
}

impl AgentConfig {
    pub fn new(symbol: &str, timeframe: Timeframe, notional: f64) -> Self {
        Self {
            symbol: symbol.to_string(),
            timeframe,
            notional,
            thresholds: Thresholds::default(),
            stop_after: None,
            stop_at: None,
            window_capacity: DEFAULT_CAPACITY,
            fetch_retry: RetryPolicy::fetch(),
            store_retry: RetryPolicy::store(),
            notify_retry: RetryPolicy::notify(),
        }
    }

    /// Deadline for an agent booted at `now`.
    pub fn deadline(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.stop_at.or_else(|| {
            self.stop_after
                .and_then(|after| chrono::Duration::from_std(after).ok())
                .and_then(|after| now.checked_add_signed(after))
        })
    }
}

/// The external systems the agent drives.
pub struct Collaborators<'a> {
    pub market: &'a dyn MarketDataPort,
    pub venue: &'a dyn ExecutionPort,
    pub store: &'a dyn SignalStorePort,
    pub commands: &'a dyn CommandPort,
    pub clock: Arc<dyn Clock>,
}

pub struct TradingAgent<'a> {
    config: AgentConfig,
    venue: &'a dyn ExecutionPort,
    store: &'a dyn SignalStorePort,
    commands: &'a dyn CommandPort,
    clock: Arc<dyn Clock>,
    feed: MarketFeed<'a>,
    state: SharedState,
    window: BarWindow,
    enriched: Vec<EnrichedBar>,
    tracker: DualStrategyTracker,
    assembler: SignalAssembler,
    notifications: Option<NotificationDispatcher>,
    metrics: PerformanceMetrics,
    total_profit: f64,
}

impl<'a> TradingAgent<'a> {
    /// Build the agent. With no notifier, non-hold cycles are only logged.
    pub fn new(
        config: AgentConfig,
        io: Collaborators<'a>,
        notifier: Option<Box<dyn NotifierPort>>,
    ) -> Result<Self, AgentError> {
        let notifications = notifier
            .map(|n| NotificationDispatcher::spawn(n, config.notify_retry, Arc::clone(&io.clock)))
            .transpose()?;
        let feed = MarketFeed::new(
            io.market,
            &config.symbol,
            config.timeframe.label(),
            config.fetch_retry,
        );
        let state = SharedState::new(AgentState::new(config.deadline(io.clock.now())));
        let assembler = SignalAssembler::new(&config.symbol, config.timeframe.label());
        let window = BarWindow::new(config.window_capacity);

        Ok(Self {
            config,
            venue: io.venue,
            store: io.store,
            commands: io.commands,
            clock: io.clock,
            feed,
            state,
            window,
            enriched: Vec::new(),
            tracker: DualStrategyTracker::new(),
            assembler,
            notifications,
            metrics: PerformanceMetrics::default(),
            total_profit: 0.0,
        })
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Handle to the run state and position shared with command intake.
    pub fn state(&self) -> &SharedState {
        &self.state
    }

    pub fn tracker(&self) -> &DualStrategyTracker {
        &self.tracker
    }

    pub fn metrics(&self) -> &PerformanceMetrics {
        &self.metrics
    }

    pub fn total_profit(&self) -> f64 {
        self.total_profit
    }

    pub fn window(&self) -> &BarWindow {
        &self.window
    }

    /// Load stored metrics, record the startup signal and seed the window.
    pub fn bootstrap(&mut self) {
        let now = self.clock.now();
        info!(
            symbol = %self.config.symbol,
            timeframe = self.config.timeframe.label(),
            "initializing agent"
        );
        self.metrics = self.store.performance_metrics().unwrap_or_else(|err| {
            warn!(%err, "could not load stored metrics, starting from zero");
            PerformanceMetrics::default()
        });
        let startup = self.assembler.startup(now);
        self.persist(&startup);
        self.seed_window();
    }

    /// Drive cycles until `max_cycles` have run, or forever.
    pub fn run(&mut self, max_cycles: Option<u64>) {
        self.bootstrap();
        let timeframe = self.config.timeframe.clone();
        self.clock.sleep(until_boundary(self.clock.now(), &timeframe));

        let mut cycles: u64 = 0;
        while max_cycles.is_none_or(|max| cycles < max) {
            let started = self.clock.now();
            self.step();
            cycles += 1;

            let processing = (self.clock.now() - started).to_std().unwrap_or_default();
            let plan = plan_sleep(started, processing, &timeframe);
            if plan.overrun {
                warn!(
                    processing_ms = processing.as_millis() as u64,
                    timeframe = timeframe.label(),
                    "cycle overran its timeframe, continuing immediately"
                );
            } else if plan.sleep.is_zero() {
                debug!(
                    processing_ms = processing.as_millis() as u64,
                    "cycle crossed its wake boundary, continuing immediately"
                );
            }
            if max_cycles.is_none_or(|max| cycles < max) {
                self.clock.sleep(plan.sleep);
            }
        }
        info!(cycles, total_profit = self.total_profit, "agent loop finished");
        self.shutdown();
    }

    /// Run one cycle and return every signal it recorded.
    pub fn step(&mut self) -> Vec<Signal> {
        let now = self.clock.now();
        let mut signals = Vec::new();
        let mut quote = None;

        if let Some(closed) = self.state.transition(|s| s.check_deadline(now)) {
            info!("stop deadline reached, agent stopped");
            if let Some(position) = closed {
                signals.extend(self.liquidate(now, position, &mut quote, "Agent stopped at deadline"));
            }
        }
        if self.state.transition(|s| s.resume_if_due(now)) {
            info!("pause elapsed, agent resumed");
            self.reply("Agent resumed after pause.");
        }
        signals.extend(self.process_commands(now, &mut quote));

        let snapshot = self.state.snapshot();
        if !snapshot.is_running() {
            debug!(status = %snapshot.status_text(now), "agent not running, no trading this cycle");
            return signals;
        }
        if self.window.is_empty() && !self.seed_window() {
            return signals;
        }
        let latest = self.quote(&mut quote);
        if !latest.has_price() {
            warn!(symbol = %self.config.symbol, "no price data, skipping cycle");
            return signals;
        }
        signals.extend(self.trade(now, latest));
        signals
    }

    /// Flush queued notifications and stop the worker.
    pub fn shutdown(&mut self) {
        if let Some(mut notifications) = self.notifications.take() {
            notifications.shutdown();
        }
    }

    fn seed_window(&mut self) -> bool {
        match self.feed.window(self.clock.as_ref(), self.window.capacity()) {
            Ok(bars) => {
                info!(bars = bars.len(), "loaded price window");
                self.window.reset(bars);
                self.enriched = indicator::enrich(self.window.bars());
                true
            }
            Err(err) => {
                error!(%err, "no usable price window, skipping cycle");
                false
            }
        }
    }

    /// The cycle's latest bar, fetched at most once.
    fn quote(&mut self, cached: &mut Option<Bar>) -> Bar {
        cached
            .get_or_insert_with(|| self.feed.latest(self.clock.as_ref()))
            .clone()
    }

    fn trade(&mut self, now: DateTime<Utc>, latest: Bar) -> Option<Signal> {
        // window rows are keyed by cycle time so fallback repeats stay ordered
        let latest = Bar {
            timestamp: now,
            ..latest
        };
        let price = latest.close;
        self.window.push(latest.clone());
        self.enriched = indicator::enrich(self.window.bars());
        let position = self.state.snapshot().position;
        let decision = decide(self.enriched.last()?, position, &self.config.thresholds);

        let (mut action, order_id) = self.execute(decision.action, price);
        if action != Action::Hold {
            let next = match action {
                Action::Buy => PositionState::Long { entry_price: price },
                _ => PositionState::Flat,
            };
            if !self.state.compare_and_set_position(position, next) {
                error!(
                    order_id = order_id.as_deref().unwrap_or("N/A"),
                    "agent state changed while the order was in flight, recording hold"
                );
                action = Action::Hold;
            }
        }

        let profit = match action {
            Action::Sell => position.profit_at(price),
            _ => 0.0,
        };
        self.total_profit += profit;
        let tracked = self.tracker.record(action, price, profit);
        let order_ref = order_id.as_deref().unwrap_or("N/A");
        let symbol = &self.config.symbol;
        let message = match action {
            Action::Buy => format!(
                "BUY {symbol} at {price:.2}, Order ID: {order_ref}{}",
                tracked.message_suffix()
            ),
            Action::Sell => format!(
                "SELL {symbol} at {price:.2}, Profit: {profit:.2}, Order ID: {order_ref}{}{}",
                tracked.message_suffix(),
                decision.rule.map_or("", |rule| rule.annotation())
            ),
            Action::Hold => format!("HOLD {symbol} at {price:.2}"),
        };
        let levels = match action {
            Action::Buy => Some(self.levels_from(price)),
            _ => decision.levels,
        };

        let signal = self.assembler.assemble(CycleOutcome {
            time: now,
            action,
            price,
            latest: &latest,
            window: &self.enriched,
            levels,
            profit,
            total_profit: self.total_profit,
            return_profit: tracked.return_profit(),
            total_return_profit: self.tracker.cumulative_return_profit(),
            message,
            order_id,
        });
        self.publish(&signal);
        Some(signal)
    }

    /// Place the order behind `action`. Any failure holds instead.
    fn execute(&self, action: Action, price: f64) -> (Action, Option<String>) {
        match action {
            Action::Hold => (Action::Hold, None),
            Action::Buy => match self.place_buy(price) {
                Ok(order_id) => (Action::Buy, Some(order_id)),
                Err(err) => {
                    warn!(%err, "buy downgraded to hold");
                    (Action::Hold, None)
                }
            },
            Action::Sell => match self.place_sell() {
                Ok(Some(order_id)) => (Action::Sell, Some(order_id)),
                Ok(None) => {
                    warn!(symbol = %self.config.symbol, "no free balance to sell, holding");
                    (Action::Hold, None)
                }
                Err(err) => {
                    warn!(%err, "sell downgraded to hold");
                    (Action::Hold, None)
                }
            },
        }
    }

    fn place_buy(&self, price: f64) -> Result<String, AgentError> {
        let symbol = &self.config.symbol;
        let precision = self.venue.quantity_precision(symbol)?;
        let quantity = sizing::buy_quantity(self.config.notional, price, precision)?;
        let order_id = self.venue.market_buy(symbol, quantity)?;
        info!(%symbol, quantity, price, %order_id, "market buy placed");
        Ok(order_id)
    }

    /// Sell the whole free base balance. `None` when there is nothing to sell.
    fn place_sell(&self) -> Result<Option<String>, AgentError> {
        let symbol = &self.config.symbol;
        let precision = self.venue.quantity_precision(symbol)?;
        let balance = self.venue.free_balance(sizing::base_asset(symbol))?;
        let quantity = sizing::sell_quantity(balance, precision);
        if quantity <= 0.0 {
            return Ok(None);
        }
        let order_id = self.venue.market_sell(symbol, quantity)?;
        info!(%symbol, quantity, %order_id, "market sell placed");
        Ok(Some(order_id))
    }

    /// Record the forced close of `position`. The sell is recorded even when
    /// the venue order fails.
    fn liquidate(
        &mut self,
        now: DateTime<Utc>,
        position: PositionState,
        quote: &mut Option<Bar>,
        reason: &str,
    ) -> Option<Signal> {
        let latest = self.quote(quote);
        if !latest.has_price() {
            error!(?position, "no price to record the liquidation, position closed unrecorded");
            return None;
        }
        let price = latest.close;
        let order_id = self.place_sell().unwrap_or_else(|err| {
            error!(%err, "liquidation order failed");
            None
        });
        let profit = position.profit_at(price);
        self.total_profit += profit;
        let tracked = self.tracker.on_sell(price, profit);
        let message = format!(
            "{reason}: SELL {} at {price:.2}, Profit: {profit:.2}, Order ID: {}{}",
            self.config.symbol,
            order_id.as_deref().unwrap_or("N/A"),
            tracked.message_suffix()
        );
        let levels = position.entry_price().map(|entry| self.levels_from(entry));

        let signal = self.assembler.assemble(CycleOutcome {
            time: now,
            action: Action::Sell,
            price,
            latest: &latest,
            window: &self.enriched,
            levels,
            profit,
            total_profit: self.total_profit,
            return_profit: tracked.return_profit(),
            total_return_profit: self.tracker.cumulative_return_profit(),
            message,
            order_id,
        });
        self.publish(&signal);
        Some(signal)
    }

    fn levels_from(&self, entry_price: f64) -> ProtectiveLevels {
        let thresholds = &self.config.thresholds;
        ProtectiveLevels::from_entry(
            entry_price,
            thresholds.stop_loss_pct,
            thresholds.take_profit_pct,
        )
    }

    fn process_commands(&mut self, now: DateTime<Utc>, quote: &mut Option<Bar>) -> Vec<Signal> {
        let texts = match self.commands.poll() {
            Ok(texts) => texts,
            Err(err) => {
                warn!(%err, "command poll failed");
                return Vec::new();
            }
        };

        let mut signals = Vec::new();
        for text in texts {
            let command = match text.parse::<Command>() {
                Ok(command) => command,
                Err(reason) => {
                    info!(%reason, "ignoring command");
                    self.reply(&format!("Unknown command. {HELP_TEXT}"));
                    continue;
                }
            };
            info!(?command, "command received");
            match command {
                Command::Help => self.reply(HELP_TEXT),
                Command::Stop => {
                    if let Some(position) = self.state.transition(|s| s.stop()) {
                        signals.extend(self.liquidate(now, position, quote, "Agent stopped"));
                    }
                    self.reply("Agent stopped.");
                }
                Command::Pause { multiples } => {
                    let duration = self.config.timeframe.multiple(multiples);
                    match self.state.transition(|s| s.pause(now, duration)) {
                        PauseOutcome::Paused { resume_at, closed } => {
                            if let Some(position) = closed {
                                signals.extend(self.liquidate(now, position, quote, "Agent paused"));
                            }
                            self.reply(&format!(
                                "Agent paused for {} seconds, resuming at {}.",
                                duration.as_secs(),
                                resume_at.format(TIME_FORMAT)
                            ));
                        }
                        PauseOutcome::RefusedWhileStopped => {
                            self.reply("Agent is stopped. Use /start first.")
                        }
                    }
                }
                Command::Start => {
                    let stop_after = self.config.stop_after;
                    if self.state.transition(|s| s.start(now, stop_after)) {
                        self.reply("Agent started.");
                    } else {
                        self.reply("Agent is already running.");
                    }
                }
                Command::Status => {
                    let status = self.state.snapshot().status_text(now);
                    self.reply(&format!("Agent is {status}."));
                }
                Command::Performance => {
                    let text = match self.store.timeframe_performance() {
                        Ok(groups) => format_performance(&groups),
                        Err(err) => format!("Error fetching performance data: {err}"),
                    };
                    self.reply(&text);
                }
                Command::Count => {
                    let text = match self.store.trade_counts() {
                        Ok(groups) => format_trade_counts(&groups),
                        Err(err) => format!("Error fetching trade counts: {err}"),
                    };
                    self.reply(&text);
                }
            }
        }
        signals
    }

    fn reply(&self, text: &str) {
        if let Err(err) = self.commands.reply(text) {
            warn!(%err, "command reply failed");
        }
    }

    /// Persist, then notify for anything but a hold.
    fn publish(&mut self, signal: &Signal) {
        self.persist(signal);
        info!(
            action = %signal.action,
            price = signal.price,
            message = %signal.message,
            "cycle recorded"
        );
        if signal.action != Action::Hold {
            if let Some(notifications) = &self.notifications {
                notifications.dispatch(signal.notification_text());
            }
        }
    }

    fn persist(&mut self, signal: &Signal) {
        self.metrics.record(signal.action, signal.profit);
        let stored = self.config.store_retry.run(self.clock.as_ref(), "store_signal", || {
            self.store.store_signal(signal, &self.metrics)
        });
        if stored.is_err() {
            error!(
                time = %signal.time.format(TIME_FORMAT),
                action = %signal.action,
                "signal record dropped"
            );
        }
    }
}

impl Drop for TradingAgent<'_> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
