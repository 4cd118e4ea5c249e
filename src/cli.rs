//! CLI definition and dispatch.

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use crate::adapters::clock::SimulatedClock;
use crate::adapters::csv_replay_adapter::{CsvReplay, DEFAULT_WARMUP_BARS};
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::log_notifier::LogNotifier;
use crate::adapters::memory_signal_store::MemorySignalStore;
use crate::adapters::paper_venue::{MarkingSource, PaperVenue};
use crate::adapters::stdin_commands::NoCommands;
use crate::domain::agent::{AgentConfig, Collaborators, TradingAgent};
use crate::domain::config_validation::{DEFAULT_INTERVAL_SECONDS, validate_agent_config};
use crate::domain::decision::Thresholds;
use crate::domain::error::AgentError;
use crate::domain::metrics::{format_performance, format_trade_counts};
use crate::domain::retry::RetryPolicy;
use crate::domain::schedule::Timeframe;
use crate::domain::signal::TIME_FORMAT;
use crate::domain::window::DEFAULT_CAPACITY;
use crate::ports::clock_port::Clock;
use crate::ports::command_port::CommandPort;
use crate::ports::config_port::ConfigPort;
use crate::ports::market_data_port::MarketDataPort;
use crate::ports::notifier_port::NotifierPort;
use crate::ports::signal_store_port::SignalStorePort;

#[derive(Parser, Debug)]
#[command(name = "kdjtrader", about = "KDJ and Supertrend spot trading agent")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the trading agent
    Run {
        #[arg(short, long)]
        config: PathBuf,
        /// Replay bars from a CSV file instead of polling the exchange
        #[arg(long)]
        replay: Option<PathBuf>,
        /// Stop after this many cycles
        #[arg(long)]
        max_cycles: Option<u64>,
    },
    /// Show the most recent recorded cycles
    Trades {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },
    /// Show performance statistics per timeframe
    Performance {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Show trade counts per timeframe
    Count {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Validate an agent configuration
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Run {
            config,
            replay,
            max_cycles,
        } => match replay {
            Some(replay) => run_replay(&config, &replay, max_cycles),
            None => run_live(&config, max_cycles),
        },
        Command::Trades { config, limit } => run_trades(&config, limit),
        Command::Performance { config } => run_report(&config, Report::Performance),
        Command::Count { config } => run_report(&config, Report::Count),
        Command::Validate { config } => run_validate(&config),
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|e| {
        eprintln!("error: {e}");
        ExitCode::from(&e)
    })
}

/// Validate `[agent]` and `[retry]` and build the agent configuration.
pub fn build_agent_config(config: &dyn ConfigPort) -> Result<AgentConfig, AgentError> {
    validate_agent_config(config)?;

    let symbol = required(config, "agent", "symbol")?;
    let label = required(config, "agent", "timeframe")?;
    let interval = config
        .get_int("agent", "interval_seconds", DEFAULT_INTERVAL_SECONDS)
        .max(1) as u64;
    let timeframe = Timeframe::parse(&label, interval);
    let notional = config.get_double("agent", "notional", 0.0);

    let defaults = Thresholds::default();
    let thresholds = Thresholds {
        stop_loss_pct: config.get_double("agent", "stop_loss_pct", defaults.stop_loss_pct),
        take_profit_pct: config.get_double("agent", "take_profit_pct", defaults.take_profit_pct),
    };

    let stop_after = match config.get_int("agent", "stop_after_seconds", 0) {
        secs if secs > 0 => Some(Duration::from_secs(secs as u64)),
        _ => None,
    };
    let stop_at = config
        .get_string("agent", "stop_at")
        .map(|text| parse_stop_at(&text))
        .transpose()?;

    let window_capacity = config
        .get_int("agent", "window_capacity", DEFAULT_CAPACITY as i64)
        .max(1) as usize;

    Ok(AgentConfig {
        thresholds,
        stop_after,
        stop_at,
        window_capacity,
        fetch_retry: retry_policy(config, "fetch", RetryPolicy::fetch()),
        store_retry: retry_policy(config, "store", RetryPolicy::store()),
        notify_retry: retry_policy(config, "notify", RetryPolicy::notify()),
        ..AgentConfig::new(&symbol, timeframe, notional)
    })
}

fn required(config: &dyn ConfigPort, section: &str, key: &str) -> Result<String, AgentError> {
    config
        .get_string(section, key)
        .ok_or_else(|| AgentError::ConfigMissing {
            section: section.to_string(),
            key: key.to_string(),
        })
}

fn parse_stop_at(text: &str) -> Result<DateTime<Utc>, AgentError> {
    DateTime::parse_from_rfc3339(text.trim())
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| AgentError::config_invalid("agent", "stop_at", e.to_string()))
}

/// `[retry] {prefix}_attempts` and `{prefix}_delay_seconds`.
fn retry_policy(config: &dyn ConfigPort, prefix: &str, default: RetryPolicy) -> RetryPolicy {
    let attempts = config
        .get_int("retry", &format!("{prefix}_attempts"), default.max_attempts as i64)
        .clamp(1, u32::MAX as i64) as u32;
    let delay = config.get_seconds(
        "retry",
        &format!("{prefix}_delay_seconds"),
        default.delay.as_secs_f64(),
    );
    RetryPolicy::new(attempts, delay)
}

/// The SQLite store when `[sqlite] path` is set, otherwise an in-memory one.
pub fn open_store(config: &dyn ConfigPort) -> Result<Box<dyn SignalStorePort>, AgentError> {
    #[cfg(feature = "sqlite")]
    {
        use crate::adapters::sqlite_signal_store::SqliteSignalStore;

        if config.get_string("sqlite", "path").is_some() {
            let store = SqliteSignalStore::from_config(config)?;
            store.initialize_schema()?;
            return Ok(Box::new(store));
        }
    }

    #[cfg(not(feature = "sqlite"))]
    {
        if config.get_string("sqlite", "path").is_some() {
            warn!("sqlite feature is disabled, ignoring [sqlite] path");
        }
    }

    warn!("no signal database configured, records are kept in memory only");
    Ok(Box::new(MemorySignalStore::new()))
}

/// Everything one agent run borrows.
struct RunParts<'a> {
    market: &'a dyn MarketDataPort,
    venue: &'a PaperVenue,
    store: &'a dyn SignalStorePort,
    commands: &'a dyn CommandPort,
    clock: Arc<dyn Clock>,
    notifier: Box<dyn NotifierPort>,
}

fn drive(agent_config: AgentConfig, parts: RunParts<'_>, max_cycles: Option<u64>) -> ExitCode {
    let io = Collaborators {
        market: parts.market,
        venue: parts.venue,
        store: parts.store,
        commands: parts.commands,
        clock: parts.clock,
    };
    let mut agent = match TradingAgent::new(agent_config, io, Some(parts.notifier)) {
        Ok(a) => a,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    agent.run(max_cycles);

    let metrics = agent.metrics();
    eprintln!("\nRun finished.");
    eprintln!("  Buys:                {}", metrics.buys);
    eprintln!("  Sells:               {}", metrics.sells);
    eprintln!("  Wins / Losses:       {} / {}", metrics.wins, metrics.losses);
    eprintln!("  Total Profit:        {:.2}", agent.total_profit());
    eprintln!(
        "  Total Return Profit: {:.2}",
        agent.tracker().cumulative_return_profit()
    );
    eprintln!("  Quote Balance:       {:.2}", parts.venue.quote_balance());
    eprintln!("  Base Balance:        {}", parts.venue.base_balance());
    ExitCode::SUCCESS
}

fn run_replay(config_path: &Path, replay_path: &Path, max_cycles: Option<u64>) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };
    let agent_config = match build_agent_config(&config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    let warmup = config
        .get_int("replay", "warmup_bars", DEFAULT_WARMUP_BARS as i64)
        .max(0) as usize;
    eprintln!("Loading replay bars from {}", replay_path.display());
    let replay = match CsvReplay::from_path(replay_path, warmup) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };
    let Some(start) = replay.start_time() else {
        let e = AgentError::NoData {
            symbol: agent_config.symbol.clone(),
            timeframe: agent_config.timeframe.label().to_string(),
        };
        eprintln!("error: {e}");
        return (&e).into();
    };

    let store = match open_store(&config) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    let cycles = max_cycles.unwrap_or(replay.remaining() as u64);
    eprintln!(
        "Replaying {} cycles of {} on {} from {}",
        cycles,
        agent_config.symbol,
        agent_config.timeframe.label(),
        start.format(TIME_FORMAT)
    );

    let venue = PaperVenue::from_config(&agent_config.symbol, &config);
    let market = MarkingSource::new(&replay, &venue);
    let parts = RunParts {
        market: &market,
        venue: &venue,
        store: store.as_ref(),
        commands: &NoCommands,
        clock: Arc::new(SimulatedClock::new(start)),
        notifier: Box::new(LogNotifier),
    };
    drive(agent_config, parts, Some(cycles))
}

fn run_live(config_path: &Path, max_cycles: Option<u64>) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };
    let agent_config = match build_agent_config(&config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    #[cfg(feature = "live")]
    {
        use crate::adapters::binance_adapter::BinanceMarketData;
        use crate::adapters::clock::SystemClock;
        use crate::adapters::stdin_commands::StdinCommands;
        use crate::adapters::telegram_adapter::TelegramBot;

        let binance = match BinanceMarketData::from_config(&config) {
            Ok(b) => b,
            Err(e) => {
                eprintln!("error: {e}");
                return (&e).into();
            }
        };
        let (commands, notifier): (Box<dyn CommandPort>, Box<dyn NotifierPort>) =
            match TelegramBot::from_config(&config) {
                Ok(Some(bot)) => (Box::new(bot.clone()), Box::new(bot)),
                Ok(None) => {
                    warn!("no [telegram] bot_token, reading commands from stdin");
                    match StdinCommands::spawn() {
                        Ok(c) => (Box::new(c), Box::new(LogNotifier)),
                        Err(e) => {
                            eprintln!("error: {e}");
                            return (&e).into();
                        }
                    }
                }
                Err(e) => {
                    eprintln!("error: {e}");
                    return (&e).into();
                }
            };
        let store = match open_store(&config) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("error: {e}");
                return (&e).into();
            }
        };

        eprintln!(
            "Trading {} on {} with {:.2} per buy",
            agent_config.symbol,
            agent_config.timeframe.label(),
            agent_config.notional
        );

        let venue = PaperVenue::from_config(&agent_config.symbol, &config);
        let market = MarkingSource::new(&binance, &venue);
        let parts = RunParts {
            market: &market,
            venue: &venue,
            store: store.as_ref(),
            commands: commands.as_ref(),
            clock: Arc::new(SystemClock),
            notifier,
        };
        drive(agent_config, parts, max_cycles)
    }

    #[cfg(not(feature = "live"))]
    {
        let _ = (agent_config, max_cycles);
        eprintln!("error: live feature is required for live runs, use --replay");
        ExitCode::FAILURE
    }
}

fn open_report_store(config_path: &Path) -> Result<Box<dyn SignalStorePort>, ExitCode> {
    let config = load_config(config_path)?;
    if config.get_string("sqlite", "path").is_none() {
        let e = AgentError::ConfigMissing {
            section: "sqlite".to_string(),
            key: "path".to_string(),
        };
        eprintln!("error: {e}");
        return Err((&e).into());
    }
    open_store(&config).map_err(|e| {
        eprintln!("error: {e}");
        ExitCode::from(&e)
    })
}

fn run_trades(config_path: &Path, limit: usize) -> ExitCode {
    let store = match open_report_store(config_path) {
        Ok(s) => s,
        Err(code) => return code,
    };
    let trades = match store.latest_trades(limit) {
        Ok(t) => t,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    if trades.is_empty() {
        println!("No trades recorded.");
        return ExitCode::SUCCESS;
    }
    println!(
        "{:<19}  {:<9}  {:<4}  {:>12}  {:>10}  Message",
        "Time", "Timeframe", "Side", "Price", "Profit"
    );
    for trade in &trades {
        println!(
            "{:<19}  {:<9}  {:<4}  {:>12.2}  {:>10.2}  {}",
            trade.time.format(TIME_FORMAT),
            trade.timeframe,
            trade.action.as_str(),
            trade.price,
            trade.profit,
            trade.message
        );
    }
    ExitCode::SUCCESS
}

enum Report {
    Performance,
    Count,
}

fn run_report(config_path: &Path, report: Report) -> ExitCode {
    let store = match open_report_store(config_path) {
        Ok(s) => s,
        Err(code) => return code,
    };
    let text = match report {
        Report::Performance => store
            .timeframe_performance()
            .map(|groups| format_performance(&groups)),
        Report::Count => store.trade_counts().map(|groups| format_trade_counts(&groups)),
    };
    match text {
        Ok(text) => {
            println!("{text}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

fn run_validate(config_path: &Path) -> ExitCode {
    eprintln!("Validating config: {}", config_path.display());
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };
    let agent_config = match build_agent_config(&config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    eprintln!("\nAgent:");
    eprintln!("  Symbol:      {}", agent_config.symbol);
    eprintln!(
        "  Timeframe:   {} ({}s)",
        agent_config.timeframe.label(),
        agent_config.timeframe.seconds()
    );
    eprintln!("  Notional:    {:.2}", agent_config.notional);
    eprintln!(
        "  Stop-Loss:   {:.2}%",
        agent_config.thresholds.stop_loss_pct
    );
    eprintln!(
        "  Take-Profit: {:.2}%",
        agent_config.thresholds.take_profit_pct
    );
    if let Some(at) = agent_config.stop_at {
        eprintln!("  Stop At:     {}", at.format(TIME_FORMAT));
    } else if let Some(after) = agent_config.stop_after {
        eprintln!("  Stop After:  {}s", after.as_secs());
    }

    eprintln!("\nConfiguration is valid.");
    ExitCode::SUCCESS
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const INI: &str = "
[agent]
symbol = BTC/USDT
timeframe = 15m
notional = 15
stop_loss_pct = 1.5
take_profit_pct = 4
stop_after_seconds = 3600

[retry]
fetch_attempts = 5
fetch_delay_seconds = 0.5
store_attempts = 2
";

    #[test]
    fn builds_agent_config_from_ini() {
        let config = FileConfigAdapter::from_string(INI).unwrap();
        let agent = build_agent_config(&config).unwrap();

        assert_eq!(agent.symbol, "BTC/USDT");
        assert_eq!(agent.timeframe.label(), "15m");
        assert_eq!(agent.timeframe.seconds(), 900);
        assert_eq!(agent.notional, 15.0);
        assert_eq!(agent.thresholds.stop_loss_pct, 1.5);
        assert_eq!(agent.thresholds.take_profit_pct, 4.0);
        assert_eq!(agent.stop_after, Some(Duration::from_secs(3600)));
        assert_eq!(agent.stop_at, None);
        assert_eq!(agent.window_capacity, DEFAULT_CAPACITY);
        assert_eq!(
            agent.fetch_retry,
            RetryPolicy::new(5, Duration::from_millis(500))
        );
        assert_eq!(agent.store_retry.max_attempts, 2);
        assert_eq!(agent.store_retry.delay, RetryPolicy::store().delay);
        assert_eq!(agent.notify_retry, RetryPolicy::notify());
    }

    #[test]
    fn unknown_timeframe_uses_interval() {
        let ini = "[agent]\nsymbol = ETH/USDT\ntimeframe = 7m\ninterval_seconds = 420\nnotional = 10\n";
        let config = FileConfigAdapter::from_string(ini).unwrap();
        let agent = build_agent_config(&config).unwrap();
        assert_eq!(agent.timeframe.seconds(), 420);
        assert_eq!(agent.stop_after, None);
    }

    #[test]
    fn parses_absolute_stop() {
        let ini = "[agent]\nsymbol = BTC/USDT\ntimeframe = 1m\nnotional = 10\n\
                   stop_at = 2024-06-01T12:00:00Z\n";
        let config = FileConfigAdapter::from_string(ini).unwrap();
        let agent = build_agent_config(&config).unwrap();
        assert_eq!(
            agent.stop_at,
            Some(Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap())
        );
    }

    #[test]
    fn rejects_missing_symbol() {
        let config = FileConfigAdapter::from_string("[agent]\ntimeframe = 1m\nnotional = 10\n").unwrap();
        assert!(matches!(
            build_agent_config(&config),
            Err(AgentError::ConfigMissing { .. })
        ));
    }

    #[test]
    fn memory_store_without_sqlite_path() {
        let config = FileConfigAdapter::from_string(INI).unwrap();
        let store = open_store(&config).unwrap();
        assert!(store.latest_signal().unwrap().is_none());
    }

    #[test]
    fn cli_parses_run_with_replay() {
        let cli = Cli::try_parse_from([
            "kdjtrader",
            "run",
            "--config",
            "agent.ini",
            "--replay",
            "bars.csv",
            "--max-cycles",
            "3",
        ])
        .unwrap();
        match cli.command {
            Command::Run {
                config,
                replay,
                max_cycles,
            } => {
                assert_eq!(config, PathBuf::from("agent.ini"));
                assert_eq!(replay, Some(PathBuf::from("bars.csv")));
                assert_eq!(max_cycles, Some(3));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn trades_limit_defaults_to_ten() {
        let cli = Cli::try_parse_from(["kdjtrader", "trades", "-c", "agent.ini"]).unwrap();
        assert!(matches!(cli.command, Command::Trades { limit: 10, .. }));
    }
}
