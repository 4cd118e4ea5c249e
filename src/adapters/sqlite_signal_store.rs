//! SQLite signal store.
//!
//! Two tables: `signals` holds one compact row per cycle with the running
//! performance metrics, `trades` holds the full record with every indicator.

use crate::domain::error::AgentError;
use crate::domain::metrics::{PerformanceMetrics, TimeframePerformance, TradeCounts};
use crate::domain::signal::{IndicatorSnapshot, Signal};
use crate::ports::config_port::ConfigPort;
use crate::ports::signal_store_port::SignalStorePort;
use chrono::{DateTime, SecondsFormat, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{OptionalExtension, Row, named_params, params};

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS signals (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        time TEXT NOT NULL,
        action TEXT NOT NULL,
        symbol TEXT NOT NULL,
        price REAL NOT NULL,
        message TEXT NOT NULL,
        timeframe TEXT NOT NULL,
        strategy TEXT NOT NULL,
        order_id TEXT,
        profit REAL NOT NULL,
        total_profit REAL NOT NULL,
        return_profit REAL NOT NULL,
        total_return_profit REAL NOT NULL,
        wins INTEGER NOT NULL,
        losses INTEGER NOT NULL,
        holds INTEGER NOT NULL,
        buys INTEGER NOT NULL,
        sells INTEGER NOT NULL,
        total_winning REAL NOT NULL,
        total_losing REAL NOT NULL
    );
    CREATE TABLE IF NOT EXISTS trades (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        time TEXT NOT NULL,
        action TEXT NOT NULL,
        symbol TEXT NOT NULL,
        price REAL NOT NULL,
        open_price REAL NOT NULL,
        close_price REAL NOT NULL,
        volume REAL NOT NULL,
        percent_change REAL NOT NULL,
        stop_loss REAL,
        take_profit REAL,
        profit REAL NOT NULL,
        total_profit REAL NOT NULL,
        return_profit REAL NOT NULL,
        total_return_profit REAL NOT NULL,
        ema_fast REAL NOT NULL,
        ema_slow REAL NOT NULL,
        rsi REAL NOT NULL,
        kdj_k REAL NOT NULL,
        kdj_d REAL NOT NULL,
        kdj_j REAL NOT NULL,
        body REAL NOT NULL,
        ema_spread REAL NOT NULL,
        macd_spread REAL NOT NULL,
        kdj_spread REAL NOT NULL,
        macd REAL NOT NULL,
        macd_signal REAL NOT NULL,
        macd_hist REAL NOT NULL,
        macd_hollow REAL NOT NULL,
        ema_fast_delta REAL NOT NULL,
        supertrend REAL NOT NULL,
        supertrend_trend INTEGER NOT NULL,
        stoch_rsi REAL NOT NULL,
        stoch_k REAL NOT NULL,
        stoch_d REAL NOT NULL,
        obv REAL NOT NULL,
        message TEXT NOT NULL,
        timeframe TEXT NOT NULL,
        order_id TEXT,
        strategy TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_trades_timeframe ON trades(timeframe);";

pub struct SqliteSignalStore {
    pool: Pool<SqliteConnectionManager>,
}

impl SqliteSignalStore {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, AgentError> {
        let db_path =
            config
                .get_string("sqlite", "path")
                .ok_or_else(|| AgentError::ConfigMissing {
                    section: "sqlite".into(),
                    key: "path".into(),
                })?;

        let pool_size = config.get_int("sqlite", "pool_size", 4).max(1) as u32;

        let manager = SqliteConnectionManager::file(&db_path);
        let pool = Pool::builder()
            .max_size(pool_size)
            .build(manager)
            .map_err(|e: r2d2::Error| AgentError::Database {
                reason: e.to_string(),
            })?;

        Ok(Self { pool })
    }

    pub fn in_memory() -> Result<Self, AgentError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(|e: r2d2::Error| AgentError::Database {
                reason: e.to_string(),
            })?;

        Ok(Self { pool })
    }

    pub fn initialize_schema(&self) -> Result<(), AgentError> {
        self.conn()?
            .execute_batch(SCHEMA)
            .map_err(|e: rusqlite::Error| AgentError::DatabaseQuery {
                reason: e.to_string(),
            })
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, AgentError> {
        self.pool.get().map_err(|e: r2d2::Error| AgentError::Database {
            reason: e.to_string(),
        })
    }

    fn query_signals(&self, sql: &str, limit: usize) -> Result<Vec<Signal>, AgentError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(sql)
            .map_err(|e: rusqlite::Error| AgentError::DatabaseQuery {
                reason: e.to_string(),
            })?;

        let rows = stmt
            .query_map(params![limit as i64], signal_from_row)
            .map_err(|e: rusqlite::Error| AgentError::DatabaseQuery {
                reason: e.to_string(),
            })?;

        let mut signals = Vec::new();
        for row in rows {
            signals.push(row.map_err(|e: rusqlite::Error| AgentError::DatabaseQuery {
                reason: e.to_string(),
            })?);
        }
        Ok(signals)
    }
}

fn format_time(time: &DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn conversion_error(column: usize, reason: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        column,
        rusqlite::types::Type::Text,
        Box::from(reason),
    )
}

fn parse_time(column: usize, text: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| conversion_error(column, format!("bad timestamp '{text}': {e}")))
}

fn signal_from_row(row: &Row<'_>) -> rusqlite::Result<Signal> {
    let time: String = row.get("time")?;
    let action: String = row.get("action")?;
    let strategy: String = row.get("strategy")?;

    Ok(Signal {
        time: parse_time(0, &time)?,
        action: action.parse().map_err(|e| conversion_error(1, e))?,
        symbol: row.get("symbol")?,
        price: row.get("price")?,
        open_price: row.get("open_price")?,
        close_price: row.get("close_price")?,
        volume: row.get("volume")?,
        percent_change: row.get("percent_change")?,
        stop_loss: row.get("stop_loss")?,
        take_profit: row.get("take_profit")?,
        profit: row.get("profit")?,
        total_profit: row.get("total_profit")?,
        return_profit: row.get("return_profit")?,
        total_return_profit: row.get("total_return_profit")?,
        indicators: IndicatorSnapshot {
            ema_fast: row.get("ema_fast")?,
            ema_slow: row.get("ema_slow")?,
            rsi: row.get("rsi")?,
            kdj_k: row.get("kdj_k")?,
            kdj_d: row.get("kdj_d")?,
            kdj_j: row.get("kdj_j")?,
            body: row.get("body")?,
            ema_spread: row.get("ema_spread")?,
            macd_spread: row.get("macd_spread")?,
            kdj_spread: row.get("kdj_spread")?,
            macd: row.get("macd")?,
            macd_signal: row.get("macd_signal")?,
            macd_hist: row.get("macd_hist")?,
            macd_hollow: row.get("macd_hollow")?,
            ema_fast_delta: row.get("ema_fast_delta")?,
            supertrend: row.get("supertrend")?,
            supertrend_trend: row.get("supertrend_trend")?,
            stoch_rsi: row.get("stoch_rsi")?,
            stoch_k: row.get("stoch_k")?,
            stoch_d: row.get("stoch_d")?,
            obv: row.get("obv")?,
        },
        message: row.get("message")?,
        timeframe: row.get("timeframe")?,
        order_id: row.get("order_id")?,
        strategy: strategy.parse().map_err(|e| conversion_error(2, e))?,
    })
}

impl SignalStorePort for SqliteSignalStore {
    fn store_signal(
        &self,
        signal: &Signal,
        metrics: &PerformanceMetrics,
    ) -> Result<(), AgentError> {
        let mut conn = self.conn()?;
        let tx = conn
            .transaction()
            .map_err(|e: rusqlite::Error| AgentError::DatabaseQuery {
                reason: e.to_string(),
            })?;

        let time = format_time(&signal.time);
        let ind = &signal.indicators;

        tx.execute(
            "INSERT INTO signals (time, action, symbol, price, message, timeframe, strategy,
                order_id, profit, total_profit, return_profit, total_return_profit,
                wins, losses, holds, buys, sells, total_winning, total_losing)
             VALUES (:time, :action, :symbol, :price, :message, :timeframe, :strategy,
                :order_id, :profit, :total_profit, :return_profit, :total_return_profit,
                :wins, :losses, :holds, :buys, :sells, :total_winning, :total_losing)",
            named_params! {
                ":time": time,
                ":action": signal.action.as_str(),
                ":symbol": signal.symbol,
                ":price": signal.price,
                ":message": signal.message,
                ":timeframe": signal.timeframe,
                ":strategy": signal.strategy.as_str(),
                ":order_id": signal.order_id,
                ":profit": signal.profit,
                ":total_profit": signal.total_profit,
                ":return_profit": signal.return_profit,
                ":total_return_profit": signal.total_return_profit,
                ":wins": metrics.wins as i64,
                ":losses": metrics.losses as i64,
                ":holds": metrics.holds as i64,
                ":buys": metrics.buys as i64,
                ":sells": metrics.sells as i64,
                ":total_winning": metrics.total_winning,
                ":total_losing": metrics.total_losing,
            },
        )
        .map_err(|e: rusqlite::Error| AgentError::DatabaseQuery {
            reason: e.to_string(),
        })?;

        tx.execute(
            "INSERT INTO trades (time, action, symbol, price, open_price, close_price, volume,
                percent_change, stop_loss, take_profit, profit, total_profit, return_profit,
                total_return_profit, ema_fast, ema_slow, rsi, kdj_k, kdj_d, kdj_j, body,
                ema_spread, macd_spread, kdj_spread, macd, macd_signal, macd_hist, macd_hollow,
                ema_fast_delta, supertrend, supertrend_trend, stoch_rsi, stoch_k, stoch_d, obv,
                message, timeframe, order_id, strategy)
             VALUES (:time, :action, :symbol, :price, :open_price, :close_price, :volume,
                :percent_change, :stop_loss, :take_profit, :profit, :total_profit, :return_profit,
                :total_return_profit, :ema_fast, :ema_slow, :rsi, :kdj_k, :kdj_d, :kdj_j, :body,
                :ema_spread, :macd_spread, :kdj_spread, :macd, :macd_signal, :macd_hist, :macd_hollow,
                :ema_fast_delta, :supertrend, :supertrend_trend, :stoch_rsi, :stoch_k, :stoch_d, :obv,
                :message, :timeframe, :order_id, :strategy)",
            named_params! {
                ":time": time,
                ":action": signal.action.as_str(),
                ":symbol": signal.symbol,
                ":price": signal.price,
                ":open_price": signal.open_price,
                ":close_price": signal.close_price,
                ":volume": signal.volume,
                ":percent_change": signal.percent_change,
                ":stop_loss": signal.stop_loss,
                ":take_profit": signal.take_profit,
                ":profit": signal.profit,
                ":total_profit": signal.total_profit,
                ":return_profit": signal.return_profit,
                ":total_return_profit": signal.total_return_profit,
                ":ema_fast": ind.ema_fast,
                ":ema_slow": ind.ema_slow,
                ":rsi": ind.rsi,
                ":kdj_k": ind.kdj_k,
                ":kdj_d": ind.kdj_d,
                ":kdj_j": ind.kdj_j,
                ":body": ind.body,
                ":ema_spread": ind.ema_spread,
                ":macd_spread": ind.macd_spread,
                ":kdj_spread": ind.kdj_spread,
                ":macd": ind.macd,
                ":macd_signal": ind.macd_signal,
                ":macd_hist": ind.macd_hist,
                ":macd_hollow": ind.macd_hollow,
                ":ema_fast_delta": ind.ema_fast_delta,
                ":supertrend": ind.supertrend,
                ":supertrend_trend": ind.supertrend_trend,
                ":stoch_rsi": ind.stoch_rsi,
                ":stoch_k": ind.stoch_k,
                ":stoch_d": ind.stoch_d,
                ":obv": ind.obv,
                ":message": signal.message,
                ":timeframe": signal.timeframe,
                ":order_id": signal.order_id,
                ":strategy": signal.strategy.as_str(),
            },
        )
        .map_err(|e: rusqlite::Error| AgentError::DatabaseQuery {
            reason: e.to_string(),
        })?;

        tx.commit()
            .map_err(|e: rusqlite::Error| AgentError::DatabaseQuery {
                reason: e.to_string(),
            })
    }

    fn latest_trades(&self, limit: usize) -> Result<Vec<Signal>, AgentError> {
        self.query_signals("SELECT * FROM trades ORDER BY id DESC LIMIT ?1", limit)
    }

    fn latest_signal(&self) -> Result<Option<Signal>, AgentError> {
        Ok(self.latest_trades(1)?.into_iter().next())
    }

    fn performance_metrics(&self) -> Result<PerformanceMetrics, AgentError> {
        let conn = self.conn()?;
        let query = "SELECT wins, losses, holds, buys, sells, total_winning, total_losing
                     FROM signals ORDER BY id DESC LIMIT 1";

        let metrics = conn
            .query_row(query, [], |row| {
                Ok(PerformanceMetrics {
                    wins: row.get::<_, i64>(0)? as u64,
                    losses: row.get::<_, i64>(1)? as u64,
                    holds: row.get::<_, i64>(2)? as u64,
                    buys: row.get::<_, i64>(3)? as u64,
                    sells: row.get::<_, i64>(4)? as u64,
                    total_winning: row.get(5)?,
                    total_losing: row.get(6)?,
                })
            })
            .optional()
            .map_err(|e: rusqlite::Error| AgentError::DatabaseQuery {
                reason: e.to_string(),
            })?;

        Ok(metrics.unwrap_or_default())
    }

    fn timeframe_performance(&self) -> Result<Vec<TimeframePerformance>, AgentError> {
        let conn = self.conn()?;
        let query = "SELECT timeframe,
                MIN(CASE WHEN action = 'sell' THEN time END),
                MAX(CASE WHEN action = 'sell' THEN time END),
                SUM(CASE WHEN action = 'sell' AND profit > 0 THEN 1 ELSE 0 END),
                SUM(CASE WHEN action = 'sell' AND profit < 0 THEN 1 ELSE 0 END),
                COALESCE(SUM(CASE WHEN action = 'sell' THEN profit END), 0.0),
                COALESCE(SUM(CASE WHEN action = 'sell' THEN return_profit END), 0.0)
             FROM trades
             GROUP BY timeframe
             ORDER BY MIN(id)";

        let mut stmt = conn
            .prepare(query)
            .map_err(|e: rusqlite::Error| AgentError::DatabaseQuery {
                reason: e.to_string(),
            })?;

        let rows = stmt
            .query_map([], |row| {
                let first: Option<String> = row.get(1)?;
                let last: Option<String> = row.get(2)?;
                Ok(TimeframePerformance {
                    timeframe: row.get(0)?,
                    first_sell: first.as_deref().map(|t| parse_time(1, t)).transpose()?,
                    last_sell: last.as_deref().map(|t| parse_time(2, t)).transpose()?,
                    win_trades: row.get::<_, i64>(3)? as u64,
                    loss_trades: row.get::<_, i64>(4)? as u64,
                    total_profit: row.get(5)?,
                    total_return_profit: row.get(6)?,
                })
            })
            .map_err(|e: rusqlite::Error| AgentError::DatabaseQuery {
                reason: e.to_string(),
            })?;

        let mut groups = Vec::new();
        for row in rows {
            groups.push(row.map_err(|e: rusqlite::Error| AgentError::DatabaseQuery {
                reason: e.to_string(),
            })?);
        }
        Ok(groups)
    }

    fn trade_counts(&self) -> Result<Vec<TradeCounts>, AgentError> {
        let conn = self.conn()?;
        let query = "SELECT timeframe,
                COUNT(*),
                SUM(CASE WHEN action = 'buy' THEN 1 ELSE 0 END),
                SUM(CASE WHEN action = 'sell' THEN 1 ELSE 0 END),
                SUM(CASE WHEN action = 'sell' AND profit > 0 THEN 1 ELSE 0 END),
                SUM(CASE WHEN action = 'sell' AND profit < 0 THEN 1 ELSE 0 END),
                COALESCE(SUM(profit), 0.0),
                COALESCE(SUM(return_profit), 0.0)
             FROM trades
             GROUP BY timeframe
             ORDER BY MIN(id)";

        let mut stmt = conn
            .prepare(query)
            .map_err(|e: rusqlite::Error| AgentError::DatabaseQuery {
                reason: e.to_string(),
            })?;

        let rows = stmt
            .query_map([], |row| {
                Ok(TradeCounts {
                    timeframe: row.get(0)?,
                    total: row.get::<_, i64>(1)? as u64,
                    buys: row.get::<_, i64>(2)? as u64,
                    sells: row.get::<_, i64>(3)? as u64,
                    wins: row.get::<_, i64>(4)? as u64,
                    losses: row.get::<_, i64>(5)? as u64,
                    total_profit: row.get(6)?,
                    total_return_profit: row.get(7)?,
                })
            })
            .map_err(|e: rusqlite::Error| AgentError::DatabaseQuery {
                reason: e.to_string(),
            })?;

        let mut groups = Vec::new();
        for row in rows {
            groups.push(row.map_err(|e: rusqlite::Error| AgentError::DatabaseQuery {
                reason: e.to_string(),
            })?);
        }
        Ok(groups)
    }
}
