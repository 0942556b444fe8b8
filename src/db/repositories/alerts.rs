use log::{debug, info};
use rusqlite::{params, OptionalExtension, Row};

use crate::db::{
    helpers::{
        capture_time, column, format_timestamp, parse_datetime, sql_limit, write_transaction,
    },
    models::{Alert, NewAlert},
    Collection, Database, DEFAULT_RECENT_LIMIT,
};
use crate::error::StoreError;

fn row_to_alert(row: &Row<'_>) -> Result<Alert, StoreError> {
    let timestamp: String = column(row, "timestamp")?;

    Ok(Alert {
        id: column(row, "id")?,
        timestamp: parse_datetime(&timestamp, "timestamp")?,
        kind: column(row, "kind")?,
        message: column(row, "message")?,
        acknowledged: column(row, "acknowledged")?,
    })
}

impl Database {
    pub async fn add_alert(&self, alert: NewAlert) -> Result<i64, StoreError> {
        alert.validate()?;
        let clock = self.clock();

        let id = self
            .execute(Collection::Alerts, move |conn| {
                let timestamp = capture_time(clock.now());
                let tx = write_transaction(conn)?;
                tx.execute(
                    "INSERT INTO alerts (timestamp, kind, message, acknowledged)
                     VALUES (?1, ?2, ?3, 0)",
                    params![format_timestamp(&timestamp), alert.kind, alert.message],
                )
                .map_err(StoreError::write)?;
                let id = tx.last_insert_rowid();
                tx.commit().map_err(StoreError::write)?;
                Ok(id)
            })
            .await?;

        debug!("Stored alert {id}");
        Ok(id)
    }

    pub async fn recent_alerts(&self, limit: Option<usize>) -> Result<Vec<Alert>, StoreError> {
        self.query_alerts(limit, false).await
    }

    /// Most recent alerts that have not been acknowledged yet, newest first.
    pub async fn unacknowledged_alerts(
        &self,
        limit: Option<usize>,
    ) -> Result<Vec<Alert>, StoreError> {
        self.query_alerts(limit, true).await
    }

    /// Marks an alert as acknowledged. Acknowledging twice is a no-op.
    pub async fn acknowledge_alert(&self, alert_id: i64) -> Result<(), StoreError> {
        let changed = self
            .execute(Collection::Alerts, move |conn| {
                let tx = write_transaction(conn)?;
                let acknowledged: Option<bool> = tx
                    .query_row(
                        "SELECT acknowledged FROM alerts WHERE id = ?1",
                        params![alert_id],
                        |row| row.get(0),
                    )
                    .optional()
                    .map_err(StoreError::write)?;

                match acknowledged {
                    None => Err(StoreError::NotFound {
                        collection: Collection::Alerts,
                        id: alert_id,
                    }),
                    Some(true) => Ok(false),
                    Some(false) => {
                        tx.execute(
                            "UPDATE alerts SET acknowledged = 1 WHERE id = ?1",
                            params![alert_id],
                        )
                        .map_err(StoreError::write)?;
                        tx.commit().map_err(StoreError::write)?;
                        Ok(true)
                    }
                }
            })
            .await?;

        if changed {
            info!("Alert {alert_id} acknowledged");
        }
        Ok(())
    }

    async fn query_alerts(
        &self,
        limit: Option<usize>,
        unacknowledged_only: bool,
    ) -> Result<Vec<Alert>, StoreError> {
        let limit = limit.unwrap_or(DEFAULT_RECENT_LIMIT);
        if limit == 0 {
            return Ok(Vec::new());
        }

        let sql = if unacknowledged_only {
            "SELECT id, timestamp, kind, message, acknowledged
             FROM alerts
             WHERE acknowledged = 0
             ORDER BY timestamp DESC, id DESC
             LIMIT ?1"
        } else {
            "SELECT id, timestamp, kind, message, acknowledged
             FROM alerts
             ORDER BY timestamp DESC, id DESC
             LIMIT ?1"
        };

        self.execute(Collection::Alerts, move |conn| {
            let mut stmt = conn.prepare_cached(sql).map_err(StoreError::read)?;
            let mut rows = stmt.query(params![sql_limit(limit)]).map_err(StoreError::read)?;
            let mut alerts = Vec::new();
            while let Some(row) = rows.next().map_err(StoreError::read)? {
                alerts.push(row_to_alert(row)?);
            }
            Ok(alerts)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open(dir: &tempfile::TempDir) -> Database {
        Database::open(dir.path().join("tracker.sqlite3")).unwrap()
    }

    #[tokio::test]
    async fn new_alerts_start_unacknowledged() {
        let dir = tempfile::tempdir().unwrap();
        let db = open(&dir);

        let id = db
            .add_alert(NewAlert::new("steps", "Sudden step count change: 600 steps"))
            .await
            .unwrap();
        let alerts = db.recent_alerts(None).await.unwrap();

        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].id, id);
        assert_eq!(alerts[0].kind, "steps");
        assert!(!alerts[0].acknowledged);
    }

    #[tokio::test]
    async fn acknowledge_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let db = open(&dir);
        let id = db.add_alert(NewAlert::new("emotion", "x")).await.unwrap();

        db.acknowledge_alert(id).await.unwrap();
        db.acknowledge_alert(id).await.unwrap();

        let alerts = db.recent_alerts(None).await.unwrap();
        assert!(alerts[0].acknowledged);
    }

    #[tokio::test]
    async fn acknowledging_unknown_alert_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let db = open(&dir);

        let err = db.acknowledge_alert(42).await.unwrap_err();

        assert!(matches!(
            err,
            StoreError::NotFound {
                collection: Collection::Alerts,
                id: 42
            }
        ));
    }

    #[tokio::test]
    async fn unacknowledged_filter_skips_acknowledged_alerts() {
        let dir = tempfile::tempdir().unwrap();
        let db = open(&dir);
        let first = db.add_alert(NewAlert::new("steps", "a")).await.unwrap();
        let second = db.add_alert(NewAlert::new("steps", "b")).await.unwrap();
        db.acknowledge_alert(first).await.unwrap();

        let pending = db.unacknowledged_alerts(None).await.unwrap();

        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, second);
    }

    #[tokio::test]
    async fn blank_kind_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let db = open(&dir);

        let err = db.add_alert(NewAlert::new("", "m")).await.unwrap_err();

        assert!(matches!(err, StoreError::InvalidRecord(_)));
    }
}
