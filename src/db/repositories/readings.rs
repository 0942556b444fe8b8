use log::debug;
use rusqlite::{params, Row};

use crate::db::{
    helpers::{
        capture_time, column, format_timestamp, parse_datetime, sql_limit, to_i64, to_u64,
        write_transaction,
    },
    models::{NewReading, Reading},
    Collection, Database, DEFAULT_RECENT_LIMIT,
};
use crate::error::StoreError;

fn row_to_reading(row: &Row<'_>) -> Result<Reading, StoreError> {
    let timestamp: String = column(row, "timestamp")?;
    let step_count: i64 = column(row, "step_count")?;

    Ok(Reading {
        id: column(row, "id")?,
        timestamp: parse_datetime(&timestamp, "timestamp")?,
        emotion_label: column(row, "emotion_label")?,
        confidence: column(row, "confidence")?,
        step_count: to_u64(step_count, "step_count")?,
    })
}

impl Database {
    /// Stamps and persists one reading, returning its id.
    pub async fn add_reading(&self, reading: NewReading) -> Result<i64, StoreError> {
        reading.validate()?;
        let step_count = to_i64(reading.step_count, "step_count")?;
        let clock = self.clock();

        let id = self
            .execute(Collection::Readings, move |conn| {
                // Stamped on the worker so capture order and id order agree.
                let timestamp = capture_time(clock.now());
                let tx = write_transaction(conn)?;
                tx.execute(
                    "INSERT INTO readings (timestamp, emotion_label, confidence, step_count)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![
                        format_timestamp(&timestamp),
                        reading.emotion_label,
                        reading.confidence,
                        step_count,
                    ],
                )
                .map_err(StoreError::write)?;
                let id = tx.last_insert_rowid();
                tx.commit().map_err(StoreError::write)?;
                Ok(id)
            })
            .await?;

        debug!("Stored reading {id}");
        Ok(id)
    }

    /// Most recent readings, newest first. `None` means the default window.
    pub async fn recent_readings(&self, limit: Option<usize>) -> Result<Vec<Reading>, StoreError> {
        let limit = limit.unwrap_or(DEFAULT_RECENT_LIMIT);
        if limit == 0 {
            return Ok(Vec::new());
        }

        self.execute(Collection::Readings, move |conn| {
            let mut stmt = conn
                .prepare_cached(
                    "SELECT id, timestamp, emotion_label, confidence, step_count
                     FROM readings
                     ORDER BY timestamp DESC, id DESC
                     LIMIT ?1",
                )
                .map_err(StoreError::read)?;

            let mut rows = stmt.query(params![sql_limit(limit)]).map_err(StoreError::read)?;
            let mut readings = Vec::new();
            while let Some(row) = rows.next().map_err(StoreError::read)? {
                readings.push(row_to_reading(row)?);
            }

            Ok(readings)
        })
        .await
    }

    pub async fn latest_reading(&self) -> Result<Option<Reading>, StoreError> {
        Ok(self.recent_readings(Some(1)).await?.into_iter().next())
    }
}
