// Session items: { id: S, joinedAt: S }, key id.
// History items: { id: S, startAt: S, endAt: S, duration: N }, key (id, startAt).

use super::{HistorySink, SessionStore, StoreError};
use crate::clock::Timestamp;
use crate::interval::WorkInterval;
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_dynamodb::Client;
use aws_sdk_dynamodb::config::Region;
use aws_sdk_dynamodb::error::DisplayErrorContext;
use aws_sdk_dynamodb::types::AttributeValue;
use std::collections::HashMap;
use tracing::debug;

type Item = HashMap<String, AttributeValue>;

/// Builds a client from the default AWS provider chain, optionally pinned
/// to `region`.
pub async fn connect(region: Option<&str>) -> Client {
    let mut loader = aws_config::defaults(BehaviorVersion::latest());
    if let Some(region) = region {
        loader = loader.region(Region::new(region.to_string()));
    }
    Client::new(&loader.load().await)
}

fn backend_error<E>(operation: &'static str, table: &str, err: E) -> StoreError
where
    E: std::error::Error,
{
    StoreError::Backend {
        operation,
        table: table.to_string(),
        message: DisplayErrorContext(&err).to_string(),
    }
}

// An item without joinedAt counts as no session.
fn session_from_item(
    id: &str,
    table: &str,
    item: Option<&Item>,
) -> Result<Option<Timestamp>, StoreError> {
    let Some(value) = item.and_then(|item| item.get("joinedAt")) else {
        return Ok(None);
    };

    let malformed = |reason: String| StoreError::Malformed {
        id: id.to_string(),
        table: table.to_string(),
        reason,
    };
    let joined_at = value
        .as_s()
        .map_err(|other| malformed(format!("joinedAt is not a string: {other:?}")))?;
    joined_at
        .parse::<Timestamp>()
        .map(Some)
        .map_err(|e| malformed(format!("joinedAt {joined_at:?}: {e}")))
}

fn history_item(interval: &WorkInterval) -> Item {
    HashMap::from([
        ("id".to_string(), AttributeValue::S(interval.id.clone())),
        ("startAt".to_string(), AttributeValue::S(interval.start_at.to_string())),
        ("endAt".to_string(), AttributeValue::S(interval.end_at.to_string())),
        ("duration".to_string(), AttributeValue::N(interval.duration.to_string())),
    ])
}

pub struct DynamoSessionStore {
    client: Client,
    table: String,
}

impl DynamoSessionStore {
    pub fn new(client: Client, table: &str) -> Self {
        Self {
            client,
            table: table.to_string(),
        }
    }
}

#[async_trait]
impl SessionStore for DynamoSessionStore {
    async fn get(&self, id: &str) -> Result<Option<Timestamp>, StoreError> {
        let output = self
            .client
            .get_item()
            .table_name(&self.table)
            .key("id", AttributeValue::S(id.to_string()))
            .send()
            .await
            .map_err(|e| backend_error("get_item", &self.table, e))?;

        session_from_item(id, &self.table, output.item())
    }

    async fn put(&self, id: &str, joined_at: Timestamp) -> Result<(), StoreError> {
        self.client
            .put_item()
            .table_name(&self.table)
            .item("id", AttributeValue::S(id.to_string()))
            .item("joinedAt", AttributeValue::S(joined_at.to_string()))
            .send()
            .await
            .map_err(|e| backend_error("put_item", &self.table, e))?;
        debug!(table = %self.table, identity = id, joined_at = %joined_at, "session stored");
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        self.client
            .delete_item()
            .table_name(&self.table)
            .key("id", AttributeValue::S(id.to_string()))
            .send()
            .await
            .map_err(|e| backend_error("delete_item", &self.table, e))?;
        Ok(())
    }
}

pub struct DynamoHistorySink {
    client: Client,
    table: String,
}

impl DynamoHistorySink {
    pub fn new(client: Client, table: &str) -> Self {
        Self {
            client,
            table: table.to_string(),
        }
    }
}

#[async_trait]
impl HistorySink for DynamoHistorySink {
    async fn put(&self, interval: &WorkInterval) -> Result<(), StoreError> {
        self.client
            .put_item()
            .table_name(&self.table)
            .set_item(Some(history_item(interval)))
            .send()
            .await
            .map_err(|e| backend_error("put_item", &self.table, e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(s: &str) -> Timestamp {
        s.parse().unwrap()
    }

    fn item(pairs: &[(&str, AttributeValue)]) -> Item {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn missing_item_or_attribute_is_no_session() {
        assert_eq!(session_from_item("A", "online", None).unwrap(), None);

        let without_join = item(&[("id", AttributeValue::S("A".into()))]);
        assert_eq!(session_from_item("A", "online", Some(&without_join)).unwrap(), None);
    }

    #[test]
    fn stored_join_time_is_decoded() {
        let stored = item(&[
            ("id", AttributeValue::S("A".into())),
            ("joinedAt", AttributeValue::S("2024-01-01 23:50:00".into())),
        ]);
        assert_eq!(
            session_from_item("A", "online", Some(&stored)).unwrap(),
            Some(ts("2024-01-01 23:50:00"))
        );
    }

    #[test]
    fn non_string_join_time_is_malformed() {
        let stored = item(&[("joinedAt", AttributeValue::N("1704153000".into()))]);
        let err = session_from_item("A", "online", Some(&stored)).unwrap_err();
        assert!(matches!(err, StoreError::Malformed { ref id, ref table, .. }
            if id == "A" && table == "online"));
    }

    #[test]
    fn unparseable_join_time_is_malformed() {
        let stored = item(&[("joinedAt", AttributeValue::S("2024-01-01T23:50:00Z".into()))]);
        let err = session_from_item("A", "online", Some(&stored)).unwrap_err();
        assert!(matches!(err, StoreError::Malformed { .. }));
    }

    #[test]
    fn history_item_carries_key_and_numeric_duration() {
        let interval = WorkInterval {
            id: "B".into(),
            start_at: ts("2024-03-05 10:00:00"),
            end_at: ts("2024-03-05 10:45:30"),
            duration: 45.5,
        };
        let item = history_item(&interval);

        assert_eq!(item.len(), 4);
        assert_eq!(item.get("id"), Some(&AttributeValue::S("B".into())));
        assert_eq!(item.get("startAt"), Some(&AttributeValue::S("2024-03-05 10:00:00".into())));
        assert_eq!(item.get("endAt"), Some(&AttributeValue::S("2024-03-05 10:45:30".into())));
        assert_eq!(item.get("duration"), Some(&AttributeValue::N("45.5".into())));
    }
}
