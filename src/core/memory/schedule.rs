use anyhow::Result;
use std::sync::Arc;
use tracing::{debug, error, warn};

use super::types::Schedule;
use super::{KvStore, SCHEDULES_KEY};

/// The persisted schedule list. Every mutation rewrites the whole list.
#[derive(Clone)]
pub struct ScheduleBook {
    store: Arc<dyn KvStore>,
}

impl ScheduleBook {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    /// Stored schedules in insertion order. Unreadable data yields an empty
    /// list.
    pub async fn load(&self) -> Vec<Schedule> {
        match self.try_load().await {
            Ok(schedules) => schedules,
            Err(e) => {
                warn!("Failed to load schedules: {}", e);
                Vec::new()
            }
        }
    }

    async fn try_load(&self) -> Result<Vec<Schedule>> {
        match self.store.get(SCHEDULES_KEY).await? {
            Some(raw) if !raw.trim().is_empty() => Ok(serde_json::from_str(&raw)?),
            _ => Ok(Vec::new()),
        }
    }

    /// Persist `schedules`. Failures are logged, not returned.
    pub async fn save(&self, schedules: &[Schedule]) {
        let result: Result<()> = async {
            let json = serde_json::to_string(schedules)?;
            self.store.set(SCHEDULES_KEY, &json).await
        }
        .await;
        match result {
            Ok(()) => debug!("Saved {} schedules", schedules.len()),
            Err(e) => error!("Failed to save schedules: {}", e),
        }
    }

    pub async fn add(&self, schedule: Schedule) -> Vec<Schedule> {
        let mut schedules = self.load().await;
        schedules.push(schedule);
        self.save(&schedules).await;
        schedules
    }

    /// Drop every schedule whose id is in `ids`; returns the removed ones.
    pub async fn remove_ids(&self, ids: &[String]) -> Vec<Schedule> {
        let (removed, kept): (Vec<_>, Vec<_>) = self
            .load()
            .await
            .into_iter()
            .partition(|s| ids.contains(&s.id));
        if !removed.is_empty() {
            self.save(&kept).await;
        }
        removed
    }

    /// Returns how many schedules were wiped.
    pub async fn clear(&self) -> usize {
        let count = self.load().await.len();
        self.save(&[]).await;
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::memory::SqliteKvStore;
    use chrono::{Local, TimeZone};

    fn book() -> (Arc<SqliteKvStore>, ScheduleBook) {
        let store = Arc::new(SqliteKvStore::open_in_memory().unwrap());
        (store.clone(), ScheduleBook::new(store))
    }

    fn schedule(id: &str, title: &str, hour: u32, location: Option<&str>) -> Schedule {
        Schedule {
            id: id.to_string(),
            title: title.to_string(),
            date: Local.with_ymd_and_hms(2026, 10, 18, hour, 30, 0).unwrap(),
            location: location.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn persisted_list_reloads_equal() {
        let (_, book) = book();
        let items = vec![
            schedule("a", "팀 회의", 15, Some("본사 3층")),
            schedule("b", "치과", 9, None),
        ];
        book.save(&items).await;
        assert_eq!(book.load().await, items);
    }

    #[tokio::test]
    async fn corrupt_blob_loads_as_empty() {
        let (store, book) = book();
        store.set(SCHEDULES_KEY, "{not json").await.unwrap();
        assert!(book.load().await.is_empty());
    }

    #[tokio::test]
    async fn remove_ids_keeps_the_rest_in_order() {
        let (_, book) = book();
        for (id, hour) in [("a", 9), ("b", 10), ("c", 11)] {
            book.add(schedule(id, id, hour, None)).await;
        }
        let removed = book.remove_ids(&["b".to_string(), "zzz".to_string()]).await;
        assert_eq!(removed.len(), 1);
        let ids: Vec<_> = book.load().await.into_iter().map(|s| s.id).collect();
        assert_eq!(ids, vec!["a", "c"]);
    }

    #[tokio::test]
    async fn clear_wipes_everything() {
        let (_, book) = book();
        book.add(schedule("a", "x", 9, None)).await;
        book.add(schedule("b", "y", 9, None)).await;
        assert_eq!(book.clear().await, 2);
        assert!(book.load().await.is_empty());
    }
}
