use log::debug;

use crate::db::{
    models::{Collection, NewRecord, Record},
    Database,
};
use crate::error::StoreError;

/// Kind-generic entry points over the two collections.
impl Database {
    pub async fn append(&self, record: impl Into<NewRecord>) -> Result<i64, StoreError> {
        let record = record.into();
        let collection = record.collection();
        let id = match record {
            NewRecord::Reading(reading) => self.add_reading(reading).await?,
            NewRecord::Alert(alert) => self.add_alert(alert).await?,
        };
        debug!("Appended {collection} record {id}");
        Ok(id)
    }

    pub async fn recent(
        &self,
        collection: Collection,
        limit: Option<usize>,
    ) -> Result<Vec<Record>, StoreError> {
        Ok(match collection {
            Collection::Readings => self
                .recent_readings(limit)
                .await?
                .into_iter()
                .map(Record::Reading)
                .collect(),
            Collection::Alerts => self
                .recent_alerts(limit)
                .await?
                .into_iter()
                .map(Record::Alert)
                .collect(),
        })
    }

    pub async fn count(&self, collection: Collection) -> Result<u64, StoreError> {
        let sql = match collection {
            Collection::Readings => "SELECT COUNT(*) FROM readings",
            Collection::Alerts => "SELECT COUNT(*) FROM alerts",
        };

        self.execute(collection, move |conn| {
            let count: i64 = conn
                .query_row(sql, [], |row| row.get(0))
                .map_err(StoreError::read)?;
            Ok(count.max(0) as u64)
        })
        .await
    }
}
