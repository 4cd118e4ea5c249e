//! CLI integration tests.
//!
//! Tests cover:
//! - Config parsing from INI files on disk (build_agent_config)
//! - Validate command outcomes
//! - Full replay run into a SQLite signal database, then the report commands

#![cfg(feature = "sqlite")]

use kdjtrader::adapters::file_config_adapter::FileConfigAdapter;
use kdjtrader::adapters::sqlite_signal_store::SqliteSignalStore;
use kdjtrader::cli::{self, Cli, Command};
use kdjtrader::domain::decision::Action;
use kdjtrader::domain::error::AgentError;
use kdjtrader::domain::signal::StrategyTag;
use kdjtrader::ports::signal_store_port::SignalStorePort;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tempfile::TempDir;

fn is_success(code: ExitCode) -> bool {
    format!("{code:?}") == format!("{:?}", ExitCode::SUCCESS)
}

fn write_ini(dir: &Path, body: &str) -> PathBuf {
    let path = dir.join("agent.ini");
    fs::write(&path, body).unwrap();
    path
}

fn agent_ini(db: Option<&Path>) -> String {
    let mut ini = String::from(
        "[agent]\n\
         symbol = BTC/USDT\n\
         timeframe = 1m\n\
         notional = 15\n\
         \n\
         [retry]\n\
         fetch_attempts = 1\n\
         store_delay_seconds = 0\n\
         notify_delay_seconds = 0\n\
         \n\
         [replay]\n\
         warmup_bars = 20\n",
    );
    if let Some(db) = db {
        write!(ini, "\n[sqlite]\npath = {}\n", db.display()).unwrap();
    }
    ini
}

/// 20 flat warm-up bars, a three-bar slide that triggers a buy at 85, a
/// rebound that takes profit at 90, then two quiet bars.
fn replay_csv() -> String {
    let mut csv = String::from("timestamp,open,high,low,close,volume\n");
    let mut minute = 0;
    let mut row = |open: f64, high: f64, low: f64, close: f64| {
        writeln!(
            csv,
            "2024-03-01 08:{minute:02}:00,{open},{high},{low},{close},10"
        )
        .unwrap();
        minute += 1;
    };
    for _ in 0..20 {
        row(100.0, 100.5, 99.5, 100.0);
    }
    row(100.0, 100.0, 94.5, 95.0);
    row(95.0, 95.0, 89.5, 90.0);
    row(90.0, 90.0, 84.5, 85.0);
    row(85.0, 90.5, 84.5, 90.0);
    row(90.0, 90.5, 89.5, 90.0);
    row(90.0, 90.5, 89.5, 90.0);
    csv
}

mod config_loading {
    use super::*;

    #[test]
    fn build_agent_config_from_file() {
        let dir = TempDir::new().unwrap();
        let path = write_ini(dir.path(), &agent_ini(None));
        let adapter = FileConfigAdapter::from_file(&path).unwrap();
        let config = cli::build_agent_config(&adapter).unwrap();

        assert_eq!(config.symbol, "BTC/USDT");
        assert_eq!(config.timeframe.seconds(), 60);
        assert_eq!(config.fetch_retry.max_attempts, 1);
        assert_eq!(config.store_retry.delay, std::time::Duration::ZERO);
    }

    #[test]
    fn bad_stop_at_is_invalid() {
        let ini = "[agent]\nsymbol = BTC/USDT\ntimeframe = 1m\nnotional = 15\nstop_at = tomorrow\n";
        let adapter = FileConfigAdapter::from_string(ini).unwrap();
        assert!(matches!(
            cli::build_agent_config(&adapter),
            Err(AgentError::ConfigInvalid { .. })
        ));
    }

    #[test]
    fn missing_config_file_fails() {
        assert!(cli::load_config(Path::new("/nonexistent/agent.ini")).is_err());
    }
}

mod validate {
    use super::*;

    #[test]
    fn valid_config_passes() {
        let dir = TempDir::new().unwrap();
        let config = write_ini(dir.path(), &agent_ini(None));
        let code = cli::run(Cli {
            command: Command::Validate { config },
        });
        assert!(is_success(code));
    }

    #[test]
    fn non_positive_notional_fails() {
        let dir = TempDir::new().unwrap();
        let config = write_ini(
            dir.path(),
            "[agent]\nsymbol = BTC/USDT\ntimeframe = 1m\nnotional = 0\n",
        );
        let code = cli::run(Cli {
            command: Command::Validate { config },
        });
        assert!(!is_success(code));
    }
}

mod replay {
    use super::*;

    fn run_replay(dir: &Path) -> (PathBuf, PathBuf) {
        let db = dir.join("signals.db");
        let config = write_ini(dir, &agent_ini(Some(&db)));
        let bars = dir.join("bars.csv");
        fs::write(&bars, replay_csv()).unwrap();

        let code = cli::run(Cli {
            command: Command::Run {
                config: config.clone(),
                replay: Some(bars),
                max_cycles: None,
            },
        });
        assert!(is_success(code));
        (config, db)
    }

    #[test]
    fn replay_records_every_cycle() {
        let dir = TempDir::new().unwrap();
        let (config, _) = run_replay(dir.path());

        let adapter = FileConfigAdapter::from_file(&config).unwrap();
        let store = SqliteSignalStore::from_config(&adapter).unwrap();
        let mut trades = store.latest_trades(50).unwrap();
        trades.reverse();

        assert_eq!(trades.len(), 7);
        assert_eq!(trades[0].strategy, StrategyTag::Startup);
        let actions: Vec<Action> = trades[1..].iter().map(|t| t.action).collect();
        assert_eq!(
            actions,
            vec![
                Action::Hold,
                Action::Hold,
                Action::Buy,
                Action::Sell,
                Action::Hold,
                Action::Hold,
            ]
        );
        assert!(trades[3].order_id.as_deref().unwrap().starts_with("paper-"));
        assert!(trades[4].message.ends_with(" (Take-Profit)"));
        assert!((trades[4].profit - 5.0).abs() < 1e-9);

        let counts = store.trade_counts().unwrap();
        assert_eq!(counts.len(), 1);
        assert_eq!(counts[0].timeframe, "1m");
        assert_eq!(counts[0].buys, 1);
        assert_eq!(counts[0].sells, 1);
        assert_eq!(counts[0].wins, 1);

        let metrics = store.performance_metrics().unwrap();
        assert_eq!(metrics.buys, 1);
        assert_eq!(metrics.sells, 1);
        assert!((metrics.total_winning - 5.0).abs() < 1e-9);
    }

    #[test]
    fn report_commands_read_the_database() {
        let dir = TempDir::new().unwrap();
        let (config, _) = run_replay(dir.path());

        for command in [
            Command::Trades {
                config: config.clone(),
                limit: 3,
            },
            Command::Performance {
                config: config.clone(),
            },
            Command::Count {
                config: config.clone(),
            },
        ] {
            assert!(is_success(cli::run(Cli { command })));
        }
    }

    #[test]
    fn reports_need_a_database() {
        let dir = TempDir::new().unwrap();
        let config = write_ini(dir.path(), &agent_ini(None));
        let code = cli::run(Cli {
            command: Command::Trades { config, limit: 5 },
        });
        assert!(!is_success(code));
    }

    #[test]
    fn max_cycles_limits_the_run() {
        let dir = TempDir::new().unwrap();
        let db = dir.path().join("signals.db");
        let config = write_ini(dir.path(), &agent_ini(Some(&db)));
        let bars = dir.path().join("bars.csv");
        fs::write(&bars, replay_csv()).unwrap();

        let code = cli::run(Cli {
            command: Command::Run {
                config: config.clone(),
                replay: Some(bars),
                max_cycles: Some(2),
            },
        });
        assert!(is_success(code));

        let adapter = FileConfigAdapter::from_file(&config).unwrap();
        let store = SqliteSignalStore::from_config(&adapter).unwrap();
        assert_eq!(store.latest_trades(50).unwrap().len(), 3);
    }
}
