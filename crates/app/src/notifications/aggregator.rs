//! Activity feed aggregation
//!
//! Four unrelated backend tables feed the notification bell. Each row is
//! tagged with its source, mapped to a `NotificationItem` and overlaid with
//! the actor's read receipts, keyed by `{kind}-{source id}`.

use std::collections::HashSet;
use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, instrument, warn};
use uuid::Uuid;
use youthnet_core::{
    ActionKind, DataProvider, NotificationItem, NotificationSource, ReadReceipt, Result,
};

/// How many rows to pull from each feed
#[derive(Debug, Clone, PartialEq)]
pub struct FeedLimits {
    pub new_members: u32,
    pub security_alerts: u32,
    pub posts: u32,
    pub registrations: u32,
}

impl Default for FeedLimits {
    fn default() -> Self {
        Self {
            new_members: 10,
            security_alerts: 5,
            posts: 5,
            registrations: 5,
        }
    }
}

pub struct NotificationAggregator {
    data: Arc<dyn DataProvider>,
    limits: FeedLimits,
}

impl NotificationAggregator {
    pub fn new(data: Arc<dyn DataProvider>, limits: FeedLimits) -> Self {
        Self { data, limits }
    }

    /// Build the feed for an actor, newest first.
    ///
    /// Any failing query yields an empty feed rather than a partial one.
    #[instrument(skip(self))]
    pub async fn fetch_notifications(&self, actor: Option<Uuid>) -> Vec<NotificationItem> {
        match self.collect(actor).await {
            Ok(items) => {
                debug!(count = items.len(), "Notifications fetched");
                items
            }
            Err(e) => {
                warn!(error = %e, "Failed to fetch notifications");
                Vec::new()
            }
        }
    }

    async fn collect(&self, actor: Option<Uuid>) -> Result<Vec<NotificationItem>> {
        let limits = &self.limits;
        let receipts = async {
            match actor {
                Some(actor) => self.data.read_receipts(actor).await,
                None => Ok(Vec::new()),
            }
        };

        let (members, alerts, posts, registrations, receipts) = tokio::try_join!(
            self.data.recent_new_members(limits.new_members),
            self.data
                .recent_admin_actions(ActionKind::security_alerts(), limits.security_alerts),
            self.data.recent_published_posts(limits.posts),
            self.data.recent_event_registrations(limits.registrations),
            receipts,
        )?;

        let sources = members
            .into_iter()
            .map(NotificationSource::NewMember)
            .chain(alerts.into_iter().map(NotificationSource::SecurityAlert))
            .chain(posts.into_iter().map(NotificationSource::PublishedPost))
            .chain(
                registrations
                    .into_iter()
                    .map(NotificationSource::EventRegistration),
            );

        let read: HashSet<String> = receipts.iter().map(ReadReceipt::notification_id).collect();

        let mut items: Vec<NotificationItem> = sources
            .map(|source| {
                let mut item = source.into_item();
                item.read = read.contains(&item.id);
                item
            })
            .collect();
        items.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(items)
    }

    /// Mark one item read. The receipt upsert is best-effort; the returned
    /// list reflects the change either way.
    #[instrument(skip(self, items))]
    pub async fn mark_as_read(
        &self,
        items: &[NotificationItem],
        notification_id: &str,
        actor: Option<Uuid>,
    ) -> Vec<NotificationItem> {
        if let (Some(actor), Some(item)) = (actor, items.iter().find(|i| i.id == notification_id)) {
            self.upsert_receipt(actor, item).await;
        }

        items
            .iter()
            .cloned()
            .map(|mut item| {
                if item.id == notification_id {
                    item.read = true;
                }
                item
            })
            .collect()
    }

    /// Mark every unread item read, upserting all receipts concurrently
    #[instrument(skip(self, items))]
    pub async fn mark_all_as_read(
        &self,
        items: &[NotificationItem],
        actor: Option<Uuid>,
    ) -> Vec<NotificationItem> {
        if let Some(actor) = actor {
            let unread = items.iter().filter(|item| !item.read);
            let written = join_all(unread.map(|item| self.upsert_receipt(actor, item))).await;
            debug!(count = written.len(), "Read receipts issued");
        }

        items
            .iter()
            .cloned()
            .map(|mut item| {
                item.read = true;
                item
            })
            .collect()
    }

    async fn upsert_receipt(&self, actor: Uuid, item: &NotificationItem) {
        if let Err(e) = self
            .data
            .mark_notification_read(actor, item.source_kind, &item.source_id)
            .await
        {
            warn!(id = %item.id, error = %e, "Failed to record read receipt");
        }
    }
}

/// Number of unread items
pub fn unread_count(items: &[NotificationItem]) -> usize {
    items.iter().filter(|item| !item.read).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockData;
    use chrono::{DateTime, Duration as ChronoDuration, Utc};
    use std::time::Duration;
    use youthnet_core::{
        AdminActionRow, BlogPostRow, EventRef, EventRegistrationRow, NewMemberRow, SourceKind,
    };

    fn at(now: DateTime<Utc>, minutes_ago: i64) -> DateTime<Utc> {
        now - ChronoDuration::minutes(minutes_ago)
    }

    fn member(created_at: DateTime<Utc>) -> NewMemberRow {
        NewMemberRow {
            id: Uuid::new_v4(),
            full_name: Some("Ada".to_string()),
            email: None,
            created_at,
        }
    }

    fn post(created_at: DateTime<Utc>) -> BlogPostRow {
        BlogPostRow {
            id: Uuid::new_v4(),
            title: "Summer recap".to_string(),
            author: None,
            created_at,
        }
    }

    fn registration(created_at: DateTime<Utc>) -> EventRegistrationRow {
        EventRegistrationRow {
            id: Uuid::new_v4(),
            full_name: Some("Sam".to_string()),
            email: None,
            created_at,
            event: Some(EventRef {
                title: "Hackathon".to_string(),
            }),
        }
    }

    fn alert(kind: ActionKind, created_at: DateTime<Utc>) -> AdminActionRow {
        AdminActionRow {
            id: Uuid::new_v4(),
            user_id: None,
            action: kind,
            details: serde_json::json!({ "email": "x@example.com" }),
            created_at,
        }
    }

    fn aggregator(data: &Arc<MockData>) -> NotificationAggregator {
        NotificationAggregator::new(data.clone(), FeedLimits::default())
    }

    #[tokio::test]
    async fn test_feed_is_sorted_newest_first() {
        let now = Utc::now();
        let data = Arc::new(MockData::new());
        data.set_members(vec![member(at(now, 3))]);
        data.set_posts(vec![post(at(now, 1))]);
        data.set_registrations(vec![registration(at(now, 2))]);

        let items = aggregator(&data).fetch_notifications(None).await;

        let times: Vec<_> = items.iter().map(|i| i.timestamp).collect();
        assert_eq!(times, vec![at(now, 1), at(now, 2), at(now, 3)]);
        assert_eq!(items[0].source_kind, SourceKind::Blog);
        assert_eq!(items[2].source_kind, SourceKind::Profile);
    }

    #[tokio::test]
    async fn test_only_security_alerts_are_included() {
        let now = Utc::now();
        let data = Arc::new(MockData::new());
        data.set_alerts(vec![
            alert(ActionKind::FailedLogin, at(now, 1)),
            alert(ActionKind::Login, at(now, 2)),
            alert(ActionKind::AccessDenied, at(now, 3)),
        ]);

        let items = aggregator(&data).fetch_notifications(None).await;

        assert_eq!(items.len(), 2);
        assert!(items.iter().all(|i| i.source_kind == SourceKind::Action));
        assert_eq!(items[0].title, "Failed login attempt");
        assert_eq!(items[1].title, "Unauthorized access attempt");
    }

    #[tokio::test]
    async fn test_read_receipts_overlay() {
        let now = Utc::now();
        let data = Arc::new(MockData::new());
        let read_post = post(at(now, 1));
        data.set_posts(vec![read_post.clone(), post(at(now, 2))]);
        data.set_receipts(vec![ReadReceipt {
            notification_type: SourceKind::Blog,
            source_id: read_post.id.to_string(),
        }]);
        let agg = aggregator(&data);

        let anonymous = agg.fetch_notifications(None).await;
        assert_eq!(unread_count(&anonymous), 2);

        let actor = Some(Uuid::new_v4());
        let first = agg.fetch_notifications(actor).await;
        let second = agg.fetch_notifications(actor).await;
        assert_eq!(first[0].id, format!("blog-{}", read_post.id));
        assert!(first[0].read);
        assert!(!first[1].read);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_any_failure_yields_empty_feed() {
        let data = Arc::new(MockData::new());
        data.set_posts(vec![post(Utc::now())]);
        data.set_fail_feeds(true);
        assert!(aggregator(&data).fetch_notifications(None).await.is_empty());

        data.set_fail_feeds(false);
        data.set_fail_receipts(true);
        let agg = aggregator(&data);
        assert!(agg.fetch_notifications(Some(Uuid::new_v4())).await.is_empty());
        assert_eq!(agg.fetch_notifications(None).await.len(), 1);
    }

    #[tokio::test]
    async fn test_mark_as_read_with_actor() {
        let data = Arc::new(MockData::new());
        let row = post(Utc::now());
        data.set_posts(vec![row.clone(), post(Utc::now())]);
        let agg = aggregator(&data);
        let actor = Uuid::new_v4();
        let items = agg.fetch_notifications(Some(actor)).await;

        let id = format!("blog-{}", row.id);
        let updated = agg.mark_as_read(&items, &id, Some(actor)).await;

        assert_eq!(updated.len(), 2);
        assert!(updated.iter().find(|i| i.id == id).unwrap().read);
        assert_eq!(unread_count(&updated), 1);
        assert_eq!(
            data.upserts(),
            vec![(actor, SourceKind::Blog, row.id.to_string())]
        );
    }

    #[tokio::test]
    async fn test_mark_as_read_survives_upsert_failure() {
        let data = Arc::new(MockData::new());
        data.set_posts(vec![post(Utc::now())]);
        data.set_fail_upserts(true);
        let agg = aggregator(&data);
        let items = agg.fetch_notifications(None).await;

        let updated = agg
            .mark_as_read(&items, &items[0].id, Some(Uuid::new_v4()))
            .await;

        assert!(updated[0].read);
        assert!(data.upserts().is_empty());
    }

    #[tokio::test]
    async fn test_mark_as_read_without_actor_is_local() {
        let data = Arc::new(MockData::new());
        data.set_posts(vec![post(Utc::now())]);
        let agg = aggregator(&data);
        let items = agg.fetch_notifications(None).await;

        let updated = agg.mark_as_read(&items, &items[0].id, None).await;

        assert!(updated[0].read);
        assert!(!items[0].read);
        assert!(data.upserts().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_mark_all_as_read_upserts_concurrently() {
        let now = Utc::now();
        let data = Arc::new(MockData::new());
        data.set_members(vec![member(at(now, 1)), member(at(now, 2))]);
        data.set_posts(vec![post(at(now, 3)), post(at(now, 4))]);
        data.set_registrations(vec![registration(at(now, 5))]);
        let agg = aggregator(&data);
        let actor = Uuid::new_v4();

        let mut items = agg.fetch_notifications(Some(actor)).await;
        assert_eq!(items.len(), 5);
        items[0].read = true;
        items[3].read = true;
        assert_eq!(unread_count(&items), 3);

        data.set_upsert_delay(Duration::from_secs(1));
        let start = tokio::time::Instant::now();
        let updated = agg.mark_all_as_read(&items, Some(actor)).await;

        assert!(start.elapsed() < Duration::from_secs(2));
        assert_eq!(updated.len(), 5);
        assert_eq!(unread_count(&updated), 0);

        let mut written: Vec<String> = data.upserts().into_iter().map(|(_, _, id)| id).collect();
        let mut expected: Vec<String> = [1, 2, 4]
            .iter()
            .map(|&i| items[i].source_id.clone())
            .collect();
        written.sort();
        expected.sort();
        assert_eq!(written, expected);
    }
}
