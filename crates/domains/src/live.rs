//! # Live Query
//!
//! Fan-out of the ordered report list to any number of viewers.
//!
//! Every repository adapter owns one [`LiveQueryHub`] and publishes the full,
//! ordered list after each committed write. Viewers hold a
//! [`ReportSubscription`]: it carries the snapshot current at subscription
//! time and then yields each later snapshot until the viewer cancels it.
//! Snapshots are whole lists, so a slow viewer that misses an intermediate
//! one still converges on the latest state.

use std::sync::Arc;

use tokio::sync::watch;

use crate::models::Report;

/// An immutable, ordered (`generated_at` descending) view of the collection.
pub type ReportSnapshot = Arc<Vec<Report>>;

/// Orders reports the way every listing shows them: newest first.
pub fn sort_for_listing(reports: &mut [Report]) {
    reports.sort_by(|a, b| b.generated_at.cmp(&a.generated_at));
}

/// Publish side of the live query.
#[derive(Debug)]
pub struct LiveQueryHub {
    sender: watch::Sender<ReportSnapshot>,
}

impl LiveQueryHub {
    pub fn new(mut initial: Vec<Report>) -> Self {
        sort_for_listing(&mut initial);
        let (sender, _) = watch::channel(Arc::new(initial));
        Self { sender }
    }

    /// Replaces the current snapshot and wakes every subscriber.
    pub fn publish(&self, mut reports: Vec<Report>) {
        sort_for_listing(&mut reports);
        self.sender.send_replace(Arc::new(reports));
    }

    /// Edits the current list in place and wakes every subscriber.
    ///
    /// Lets a store mirror a committed write without reloading the collection.
    pub fn apply(&self, change: impl FnOnce(&mut Vec<Report>)) {
        self.sender.send_modify(|snapshot| {
            let reports = Arc::make_mut(snapshot);
            change(reports);
            sort_for_listing(reports);
        });
    }

    pub fn current(&self) -> ReportSnapshot {
        self.sender.borrow().clone()
    }

    pub fn subscribe(&self) -> ReportSubscription {
        let mut receiver = self.sender.subscribe();
        let initial = receiver.borrow_and_update().clone();
        ReportSubscription { initial, receiver }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for LiveQueryHub {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

/// Subscribe side of the live query.
///
/// Dropping the subscription is equivalent to [`cancel`](Self::cancel).
#[derive(Debug)]
pub struct ReportSubscription {
    initial: ReportSnapshot,
    receiver: watch::Receiver<ReportSnapshot>,
}

impl ReportSubscription {
    /// The full list as it stood when the subscription was opened.
    pub fn initial(&self) -> ReportSnapshot {
        self.initial.clone()
    }

    /// Latest snapshot seen by the publisher, without waiting.
    pub fn latest(&self) -> ReportSnapshot {
        self.receiver.borrow().clone()
    }

    /// Waits for the next committed change. Returns `None` only once the
    /// owning store has been dropped.
    pub async fn next(&mut self) -> Option<ReportSnapshot> {
        self.receiver.changed().await.ok()?;
        Some(self.receiver.borrow_and_update().clone())
    }

    pub fn cancel(self) {}

    /// Hands out the underlying receiver for stream adapters.
    pub fn into_receiver(self) -> watch::Receiver<ReportSnapshot> {
        self.receiver
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ArchiveRecord, NewReport};
    use chrono::{Duration, NaiveDate, Utc};
    use uuid::Uuid;

    fn report(name: &str, offset_secs: i64) -> Report {
        NewReport {
            client_name: name.into(),
            technician_name: "tech".into(),
            error_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            report_text: "text".into(),
            media_url: None,
            archive: ArchiveRecord::ZipUrl(None),
            reported_by_user_id: "u".into(),
        }
        .into_report(Uuid::now_v7(), Utc::now() + Duration::seconds(offset_secs))
    }

    #[tokio::test]
    async fn subscription_starts_with_current_state() {
        let hub = LiveQueryHub::new(vec![report("a", 0), report("b", 5)]);
        let sub = hub.subscribe();
        let names: Vec<_> = sub.initial().iter().map(|r| r.client_name.clone()).collect();
        assert_eq!(names, vec!["b", "a"]);
    }

    #[tokio::test]
    async fn publish_wakes_every_subscriber() {
        let hub = LiveQueryHub::default();
        let mut first = hub.subscribe();
        let mut second = hub.subscribe();
        assert_eq!(hub.subscriber_count(), 2);

        hub.publish(vec![report("x", 0)]);

        assert_eq!(first.next().await.unwrap().len(), 1);
        assert_eq!(second.next().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn apply_edits_in_place_without_touching_held_snapshots() {
        let hub = LiveQueryHub::new(vec![report("a", 0)]);
        let mut sub = hub.subscribe();
        let held = sub.initial();

        hub.apply(|reports| reports.push(report("b", 5)));

        let next = sub.next().await.unwrap();
        let names: Vec<_> = next.iter().map(|r| r.client_name.as_str()).collect();
        assert_eq!(names, vec!["b", "a"]);
        assert_eq!(held.len(), 1);
    }

    #[tokio::test]
    async fn cancel_releases_the_receiver() {
        let hub = LiveQueryHub::default();
        let sub = hub.subscribe();
        assert_eq!(hub.subscriber_count(), 1);
        sub.cancel();
        assert_eq!(hub.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn next_ends_when_hub_is_dropped() {
        let hub = LiveQueryHub::default();
        let mut sub = hub.subscribe();
        drop(hub);
        assert!(sub.next().await.is_none());
    }
}
