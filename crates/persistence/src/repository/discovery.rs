//! Discovery backtests repository: read access to the knowledge base

use crate::schema::RECORD_COLUMNS;
use crate::DbResult;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use tracing::debug;

/// A single discovery backtest row. Statistics stay as stored TEXT; the
/// compiler parses them leniently.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DiscoveryBacktestRecord {
    pub id: Option<i64>,
    pub params_hash: String,
    pub strategy_type: String,
    pub strategy_name: String,
    pub strategy_params: String,
    pub symbol: String,
    pub days: i64,
    pub sizing_mode: String,
    pub composite_score: String,
    pub net_pnl: String,
    pub gross_pnl: String,
    pub total_fees: String,
    pub win_rate: String,
    pub total_trades: i64,
    pub sharpe_ratio: String,
    pub max_drawdown_pct: String,
    pub profit_factor: String,
    pub avg_trade_pnl: String,
    pub hit_rate: Option<String>,
    pub avg_locked_profit: Option<String>,
    pub discovery_run_id: Option<String>,
    pub phase: Option<String>,
    // Advanced metrics (NULL on rows written before they existed)
    pub sortino_ratio: Option<String>,
    pub max_consecutive_losses: Option<i64>,
    pub avg_win_pnl: Option<String>,
    pub avg_loss_pnl: Option<String>,
    pub total_volume: Option<String>,
    pub annualized_return_pct: Option<String>,
    pub annualized_sharpe: Option<String>,
    pub strategy_confidence: Option<String>,
}

/// Repository for discovery backtest results
pub struct DiscoveryRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> DiscoveryRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Get one backtest record by row id
    pub async fn get_by_id(&self, id: i64) -> DbResult<Option<DiscoveryBacktestRecord>> {
        let sql = format!("SELECT {RECORD_COLUMNS} FROM discovery_backtests WHERE id = ?");
        let record = sqlx::query_as::<_, DiscoveryBacktestRecord>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?;

        if record.is_none() {
            debug!(id, "no discovery backtest with this id");
        }
        Ok(record)
    }

    /// Top unique strategies (best row per strategy_name), sorted by
    /// `sort_by` (`net_pnl`, `win_rate`, default `composite_score`)
    pub async fn get_top_unique_strategies(
        &self,
        limit: i64,
        sort_by: Option<&str>,
    ) -> DbResult<Vec<DiscoveryBacktestRecord>> {
        let order_col = match sort_by {
            Some("net_pnl") => "CAST(net_pnl AS REAL)",
            Some("win_rate") => "CAST(win_rate AS REAL)",
            _ => "CAST(composite_score AS REAL)",
        };

        let sql = format!(
            r#"
            WITH best_ids AS (
              SELECT id,
                ROW_NUMBER() OVER (PARTITION BY strategy_name ORDER BY {order_col} DESC, id) as rn
              FROM discovery_backtests
            )
            SELECT {RECORD_COLUMNS}
            FROM discovery_backtests
            WHERE id IN (SELECT id FROM best_ids WHERE rn = 1)
            ORDER BY {order_col} DESC, id
            LIMIT ?
            "#
        );

        let records = sqlx::query_as::<_, DiscoveryBacktestRecord>(&sql)
            .bind(limit)
            .fetch_all(self.pool)
            .await?;

        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;

    async fn insert(db: &Database, hash: &str, name: &str, score: &str, pnl: &str) -> i64 {
        sqlx::query(
            r#"
            INSERT INTO discovery_backtests (
                params_hash, strategy_type, strategy_name, strategy_params,
                symbol, days, sizing_mode, composite_score, net_pnl, total_trades,
                max_consecutive_losses
            ) VALUES (?, 'rsi', ?, '{"type":"rsi","period":14}', 'BTCUSDT', 90, 'fixed', ?, ?, 40, 4)
            "#,
        )
        .bind(hash)
        .bind(name)
        .bind(score)
        .bind(pnl)
        .execute(db.pool())
        .await
        .unwrap()
        .last_insert_rowid()
    }

    #[tokio::test]
    async fn test_get_by_id() {
        let db = Database::in_memory().await.unwrap();
        let id = insert(&db, "h1", "RSI", "71.5", "120.5").await;
        let repo = DiscoveryRepository::new(db.pool());

        let record = repo.get_by_id(id).await.unwrap().unwrap();
        assert_eq!(record.id, Some(id));
        assert_eq!(record.strategy_type, "rsi");
        assert_eq!(record.net_pnl, "120.5");
        assert_eq!(record.max_consecutive_losses, Some(4));
        assert_eq!(record.sortino_ratio, None);

        assert!(repo.get_by_id(id + 100).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_top_unique_strategies_dedupes_by_name() {
        let db = Database::in_memory().await.unwrap();
        insert(&db, "h1", "RSI", "40", "10").await;
        insert(&db, "h2", "RSI", "90", "5").await;
        insert(&db, "h3", "MACD", "60", "50").await;
        let repo = DiscoveryRepository::new(db.pool());

        let top = repo.get_top_unique_strategies(10, None).await.unwrap();
        let names: Vec<(&str, &str)> = top
            .iter()
            .map(|r| (r.strategy_name.as_str(), r.composite_score.as_str()))
            .collect();
        assert_eq!(names, vec![("RSI", "90"), ("MACD", "60")]);

        let by_pnl = repo
            .get_top_unique_strategies(1, Some("net_pnl"))
            .await
            .unwrap();
        assert_eq!(by_pnl.len(), 1);
        assert_eq!(by_pnl[0].strategy_name, "MACD");
    }
}
