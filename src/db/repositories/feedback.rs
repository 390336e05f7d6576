use anyhow::Result;
use rusqlite::{params, Row};

use crate::db::{
    connection::Database,
    helpers::parse_datetime,
    models::{FeedbackRecord, FEEDBACK_NAMESPACE},
};
use crate::models::GeoPoint;

fn row_to_feedback(row: &Row) -> Result<FeedbackRecord> {
    let recorded_at: String = row.get("recorded_at")?;

    Ok(FeedbackRecord {
        moment_id: row.get("moment_id")?,
        timestamp: row.get("moment_timestamp")?,
        location: GeoPoint::new(row.get("latitude")?, row.get("longitude")?),
        confirmed: row.get("confirmed")?,
        nearby_place_name: row.get("nearby_place_name")?,
        recorded_at: parse_datetime(&recorded_at, "recorded_at")?,
    })
}

impl Database {
    /// Append one feedback row. Existing rows are never rewritten.
    pub async fn append_feedback(&self, record: &FeedbackRecord) -> Result<()> {
        let record = record.clone();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO feedback_records (
                    namespace,
                    moment_id,
                    moment_timestamp,
                    latitude,
                    longitude,
                    confirmed,
                    nearby_place_name,
                    recorded_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    FEEDBACK_NAMESPACE,
                    record.moment_id,
                    record.timestamp,
                    record.location.latitude,
                    record.location.longitude,
                    record.confirmed,
                    record.nearby_place_name,
                    record.recorded_at.to_rfc3339(),
                ],
            )?;
            Ok(())
        })
        .await
    }

    /// All feedback rows, oldest first.
    pub async fn load_feedback(&self) -> Result<Vec<FeedbackRecord>> {
        self.execute(|conn| {
            let mut stmt = conn.prepare(
                "SELECT moment_id, moment_timestamp, latitude, longitude, confirmed,
                        nearby_place_name, recorded_at
                 FROM feedback_records
                 WHERE namespace = ?1
                 ORDER BY id ASC",
            )?;

            let mut rows = stmt.query(params![FEEDBACK_NAMESPACE])?;
            let mut records = Vec::new();
            while let Some(row) = rows.next()? {
                records.push(row_to_feedback(row)?);
            }
            Ok(records)
        })
        .await
    }

    pub async fn feedback_count(&self) -> Result<usize> {
        self.execute(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM feedback_records WHERE namespace = ?1",
                params![FEEDBACK_NAMESPACE],
                |row| row.get(0),
            )?;
            Ok(count as usize)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn record(id: &str, confirmed: bool, place: Option<&str>) -> FeedbackRecord {
        FeedbackRecord {
            moment_id: id.to_string(),
            timestamp: 1_700_000_000_000,
            location: GeoPoint::new(52.3676, 4.9041),
            confirmed,
            nearby_place_name: place.map(str::to_string),
            recorded_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn append_then_load_preserves_order() {
        let db = Database::in_memory().unwrap();
        db.append_feedback(&record("a", true, Some("Hortus Botanicus")))
            .await
            .unwrap();
        db.append_feedback(&record("b", false, None)).await.unwrap();
        db.append_feedback(&record("a", false, None)).await.unwrap();

        let loaded = db.load_feedback().await.unwrap();
        assert_eq!(loaded.len(), 3);
        assert_eq!(loaded[0], record("a", true, Some("Hortus Botanicus")));
        assert_eq!(loaded[1].moment_id, "b");
        assert!(!loaded[2].confirmed);
        assert_eq!(db.feedback_count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn records_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("zen.sqlite3");

        {
            let db = Database::new(path.clone()).unwrap();
            db.append_feedback(&record("a", true, None)).await.unwrap();
        }

        let db = Database::new(path).unwrap();
        assert_eq!(db.load_feedback().await.unwrap(), vec![record("a", true, None)]);
    }
}
