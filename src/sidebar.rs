use crate::{error::ApiError, store::Store, user::User};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// One sidebar row: the contact plus the timestamp of the most recent
/// message exchanged with the viewer. Contacts with no shared history sit
/// at the epoch and therefore sort last.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SidebarEntry {
    #[serde(flatten)]
    pub user: User,
    pub last_message_at: DateTime<Utc>,
}

/// Build the viewer's sidebar: all other users, most recent conversation
/// first.
///
/// One `last_activity` lookup per candidate, issued sequentially; the
/// listing is re-derived on every request (no cache). The sort is stable,
/// so candidates without history keep the directory's order.
pub async fn sidebar(store: &Store, viewer_id: &str) -> Result<Vec<SidebarEntry>, ApiError> {
    let candidates = store.list_users_except(viewer_id).await?;

    let mut entries = Vec::with_capacity(candidates.len());
    for user in candidates {
        let last_message_at = store
            .last_activity(viewer_id, &user.id)
            .await?
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
        entries.push(SidebarEntry {
            user,
            last_message_at,
        });
    }

    entries.sort_by(|a, b| b.last_message_at.cmp(&a.last_message_at));

    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    async fn store_with_users(users: &[(&str, &str)]) -> Store {
        let store = Store::in_memory().await.unwrap();
        store.init().await.unwrap();
        let base = Utc::now();
        for (i, (id, name)) in users.iter().enumerate() {
            store
                .upsert_user(&User {
                    id: (*id).into(),
                    username: (*name).into(),
                    // Spread registration times so directory order is fixed.
                    created_at: base + Duration::seconds(i as i64),
                })
                .await
                .unwrap();
        }
        store
    }

    #[tokio::test]
    async fn orders_by_recency_with_epoch_default() {
        let store =
            store_with_users(&[("me", "viewer"), ("u1", "old"), ("u2", "fresh"), ("u3", "never")])
                .await;

        let now = Utc::now();
        store
            .append_message_at("me", "u1", "a while ago", now - Duration::hours(2))
            .await
            .unwrap();
        store
            .append_message_at("u2", "me", "just now", now - Duration::minutes(5))
            .await
            .unwrap();

        let entries = sidebar(&store, "me").await.unwrap();
        let ids: Vec<_> = entries.iter().map(|e| e.user.id.as_str()).collect();

        assert_eq!(ids, ["u2", "u1", "u3"]);
        assert_eq!(entries[2].last_message_at, DateTime::<Utc>::UNIX_EPOCH);
    }

    #[tokio::test]
    async fn contacts_without_history_keep_directory_order() {
        let store =
            store_with_users(&[("me", "viewer"), ("a", "first"), ("b", "second"), ("c", "third")])
                .await;

        let entries = sidebar(&store, "me").await.unwrap();
        let ids: Vec<_> = entries.iter().map(|e| e.user.id.as_str()).collect();

        // All at the epoch; the stable sort preserves registration order.
        assert_eq!(ids, ["a", "b", "c"]);
    }

    #[tokio::test]
    async fn direction_of_last_message_does_not_matter() {
        let store = store_with_users(&[("me", "viewer"), ("u1", "one"), ("u2", "two")]).await;

        let now = Utc::now();
        // u1 last wrote to me; I last wrote to u2. Both count as activity.
        store
            .append_message_at("u1", "me", "hi", now - Duration::minutes(10))
            .await
            .unwrap();
        store
            .append_message_at("me", "u2", "hello", now - Duration::minutes(1))
            .await
            .unwrap();

        let entries = sidebar(&store, "me").await.unwrap();
        let ids: Vec<_> = entries.iter().map(|e| e.user.id.as_str()).collect();

        assert_eq!(ids, ["u2", "u1"]);
    }
}
