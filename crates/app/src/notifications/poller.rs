//! Background refresh of the notification feed

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;
use youthnet_core::{Capability, NotificationItem};

use super::NotificationAggregator;
use crate::state::AuthState;

/// Keeps a feed fresh for whoever is signed in
pub struct NotificationPoller;

impl NotificationPoller {
    /// Fetch as soon as an actor allowed to view notifications is signed
    /// in, then every `interval`. The feed is emptied when they go away.
    pub fn spawn(
        aggregator: Arc<NotificationAggregator>,
        mut auth: watch::Receiver<AuthState>,
        interval: Duration,
        cancel: CancellationToken,
    ) -> (JoinHandle<()>, watch::Receiver<Vec<NotificationItem>>) {
        let (feed, feed_rx) = watch::channel(Vec::new());

        let handle = tokio::spawn(async move {
            let mut actor = viewer(&auth.borrow_and_update());
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(interval = ?interval, "Notification poller started");

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    changed = auth.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let next = viewer(&auth.borrow_and_update());
                        if next == actor {
                            continue;
                        }
                        actor = next;
                        match actor {
                            Some(actor) => {
                                refresh(&aggregator, &feed, actor).await;
                                ticker.reset();
                            }
                            None => {
                                feed.send_replace(Vec::new());
                            }
                        }
                    }
                    _ = ticker.tick(), if actor.is_some() => {
                        if let Some(actor) = actor {
                            refresh(&aggregator, &feed, actor).await;
                        }
                    }
                }
            }
            debug!("Notification poller stopped");
        });

        (handle, feed_rx)
    }
}

fn viewer(state: &AuthState) -> Option<Uuid> {
    state
        .actor_id()
        .filter(|_| state.can(Capability::ViewNotifications))
}

async fn refresh(
    aggregator: &NotificationAggregator,
    feed: &watch::Sender<Vec<NotificationItem>>,
    actor: Uuid,
) {
    let items = aggregator.fetch_notifications(Some(actor)).await;
    feed.send_if_modified(|current| {
        if *current == items {
            return false;
        }
        *current = items;
        true
    });
}
