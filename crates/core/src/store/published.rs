//! Read access to the published corpus used for similarity scoring.

use super::connection::Store;
use super::{enum_col, to_db, ts_col};
use crate::Error;
use crate::models::{NewPublishedItem, PublicationStatus, PublishedItem};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

impl Store {
    /// Insert a published (or draft) item.
    pub async fn insert_published(&self, item: &NewPublishedItem) -> Result<PublishedItem, Error> {
        let item = item.clone();
        self.conn
            .call(move |conn| -> Result<PublishedItem, Error> {
                conn.execute(
                    "INSERT INTO published_items (title, content, status, published_at) VALUES (?1, ?2, ?3, ?4)",
                    params![&item.title, &item.content, item.status.as_str(), to_db(&item.published_at)],
                )?;
                Ok(PublishedItem {
                    id: conn.last_insert_rowid(),
                    title: item.title,
                    content: item.content,
                    status: item.status,
                    published_at: item.published_at,
                })
            })
            .await
            .map_err(Error::from)
    }

    /// Bodies of the `limit` most recently published items, most recent first.
    ///
    /// Equal timestamps are ordered by id, newest insert first.
    pub async fn recent_published_contents(&self, limit: usize) -> Result<Vec<String>, Error> {
        let limit = limit as i64;
        self.conn
            .call(move |conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT content FROM published_items
                     WHERE status = ?1
                     ORDER BY published_at DESC, id DESC
                     LIMIT ?2",
                )?;
                let rows = stmt.query_map(params![PublicationStatus::Published.as_str(), limit], |row| row.get(0))?;
                Ok(rows.collect::<Result<Vec<String>, _>>()?)
            })
            .await
            .map_err(Error::from)
    }

    /// Get a published item by id.
    pub async fn get_published(&self, id: i64) -> Result<Option<PublishedItem>, Error> {
        self.conn
            .call(move |conn| -> Result<Option<PublishedItem>, Error> {
                let result = conn.query_row(
                    "SELECT id, title, content, status, published_at FROM published_items WHERE id = ?1",
                    params![id],
                    |row| {
                        Ok(PublishedItem {
                            id: row.get(0)?,
                            title: row.get(1)?,
                            content: row.get(2)?,
                            status: enum_col(row, 3)?,
                            published_at: ts_col(row, 4)?,
                        })
                    },
                );
                match result {
                    Ok(item) => Ok(Some(item)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, Utc};

    fn item(content: &str, status: PublicationStatus, published_at: DateTime<Utc>) -> NewPublishedItem {
        NewPublishedItem { title: content.to_uppercase(), content: content.into(), status, published_at }
    }

    #[tokio::test]
    async fn test_recent_order_and_limit() {
        let store = Store::open_in_memory().await.unwrap();
        let now = Utc::now();
        store.insert_published(&item("oldest", PublicationStatus::Published, now - Duration::days(3))).await.unwrap();
        store.insert_published(&item("newest", PublicationStatus::Published, now)).await.unwrap();
        store.insert_published(&item("middle", PublicationStatus::Published, now - Duration::days(1))).await.unwrap();
        store.insert_published(&item("draft", PublicationStatus::Draft, now + Duration::days(1))).await.unwrap();

        let recent = store.recent_published_contents(2).await.unwrap();
        assert_eq!(recent, vec!["newest".to_string(), "middle".to_string()]);

        let all = store.recent_published_contents(100).await.unwrap();
        assert_eq!(all.len(), 3);
        assert!(!all.contains(&"draft".to_string()));
    }

    #[tokio::test]
    async fn test_equal_timestamps_break_on_id() {
        let store = Store::open_in_memory().await.unwrap();
        let at = Utc::now();
        store.insert_published(&item("first", PublicationStatus::Published, at)).await.unwrap();
        store.insert_published(&item("second", PublicationStatus::Published, at)).await.unwrap();

        let recent = store.recent_published_contents(1).await.unwrap();
        assert_eq!(recent, vec!["second".to_string()]);
    }

    #[tokio::test]
    async fn test_get_published() {
        let store = Store::open_in_memory().await.unwrap();
        let inserted = store.insert_published(&item("body", PublicationStatus::Published, Utc::now())).await.unwrap();
        let fetched = store.get_published(inserted.id).await.unwrap().unwrap();
        assert_eq!(fetched.title, "BODY");
        assert!(store.get_published(inserted.id + 1).await.unwrap().is_none());
    }
}
