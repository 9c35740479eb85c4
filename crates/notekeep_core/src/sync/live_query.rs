//! Self-healing live query over one store collection.
//!
//! # Responsibility
//! - Own at most one store subscription for one consumer.
//! - Re-establish the subscription after failures or dropped streams.
//!
//! # Invariants
//! - The previous subscription is released before a new one is opened.
//! - Subscription failures surface as `StoreUnavailable` only after the
//!   retry policy is exhausted.

use crate::config::ResubscribePolicy;
use crate::error::{CoreError, CoreResult};
use crate::store::{
    Collection, Delivery, DocumentStore, Filter, StoreError, StoredDocument, Subscription,
};
use log::{info, warn};
use std::sync::Arc;

/// Live query bound to one collection and optional filter.
pub struct LiveQuery<S: DocumentStore + ?Sized> {
    store: Arc<S>,
    collection: Collection,
    filter: Option<Filter>,
    policy: ResubscribePolicy,
    subscription: Option<Subscription>,
}

impl<S: DocumentStore + ?Sized> LiveQuery<S> {
    /// Opens the query; fails with `StoreUnavailable` when no subscription
    /// could be established within the retry policy.
    pub async fn open(
        store: Arc<S>,
        collection: Collection,
        filter: Option<Filter>,
        policy: ResubscribePolicy,
    ) -> CoreResult<Self> {
        let mut query = Self {
            store,
            collection,
            filter,
            policy,
            subscription: None,
        };
        query.connect().await?;
        Ok(query)
    }

    pub fn collection(&self) -> Collection {
        self.collection
    }

    pub fn filter(&self) -> Option<&Filter> {
        self.filter.as_ref()
    }

    /// Returns whether a subscription is currently held.
    pub fn is_live(&self) -> bool {
        self.subscription.is_some()
    }

    /// Swaps the filter: releases the current subscription, then opens one
    /// for `filter`.
    pub async fn retarget(&mut self, filter: Option<Filter>) -> CoreResult<()> {
        self.release();
        self.filter = filter;
        self.connect().await
    }

    /// Waits for the next full snapshot, recovering from stream failures.
    pub async fn next_snapshot(&mut self) -> CoreResult<Vec<StoredDocument>> {
        let mut failures = 0;
        loop {
            if self.subscription.is_none() {
                self.connect().await?;
            }
            let delivered = match self.subscription.as_mut() {
                Some(subscription) => subscription.next().await,
                None => continue,
            };
            match delivered {
                Some(Ok(documents)) => return Ok(documents),
                Some(Err(err)) => self.on_stream_failure(err, &mut failures)?,
                None => self.on_stream_failure(stream_closed(), &mut failures)?,
            }
        }
    }

    /// Returns a snapshot if one is ready, without waiting for new commits.
    ///
    /// A failed or closed stream is re-established first, and the fresh
    /// subscription's initial snapshot is returned.
    pub async fn poll_snapshot(&mut self) -> CoreResult<Option<Vec<StoredDocument>>> {
        let mut failures = 0;
        loop {
            if self.subscription.is_none() {
                self.connect().await?;
            }
            let delivery = match self.subscription.as_mut() {
                Some(subscription) => subscription.try_next(),
                None => continue,
            };
            match delivery {
                Delivery::Batch(Ok(documents)) => return Ok(Some(documents)),
                Delivery::Pending => return Ok(None),
                Delivery::Batch(Err(err)) => self.on_stream_failure(err, &mut failures)?,
                Delivery::Closed => self.on_stream_failure(stream_closed(), &mut failures)?,
            }
        }
    }

    /// Releases the subscription; later reads reconnect.
    pub fn close(&mut self) {
        self.release();
    }

    fn on_stream_failure(&mut self, err: StoreError, failures: &mut u32) -> CoreResult<()> {
        *failures += 1;
        warn!(
            "event=live_query_failure module=sync status=error collection={} failures={} error={}",
            self.collection, failures, err
        );
        self.release();
        if *failures > self.policy.max_attempts.max(1) {
            return Err(CoreError::from(err));
        }
        Ok(())
    }

    async fn connect(&mut self) -> CoreResult<()> {
        self.release();
        let attempts = self.policy.max_attempts.max(1);
        let mut last_error = None;
        for attempt in 1..=attempts {
            if attempt > 1 {
                let delay = self.policy.delay_for(attempt - 1);
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
            }
            match self
                .store
                .subscribe(self.collection, self.filter.clone())
                .await
            {
                Ok(subscription) => {
                    info!(
                        "event=live_query_subscribe module=sync status=ok collection={} attempt={}",
                        self.collection, attempt
                    );
                    self.subscription = Some(subscription);
                    return Ok(());
                }
                Err(err) => {
                    warn!(
                        "event=live_query_subscribe module=sync status=error collection={} attempt={} error={}",
                        self.collection, attempt, err
                    );
                    last_error = Some(err);
                }
            }
        }
        Err(last_error.map_or_else(
            || CoreError::StoreUnavailable("subscription could not be established".to_string()),
            CoreError::from,
        ))
    }

    fn release(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.close();
        }
    }
}

fn stream_closed() -> StoreError {
    StoreError::Unavailable("notification stream closed".to_string())
}

#[cfg(test)]
mod tests {
    use super::LiveQuery;
    use crate::config::ResubscribePolicy;
    use crate::error::CoreError;
    use crate::store::{Collection, DocumentStore, MemoryStore};
    use serde_json::json;
    use std::sync::Arc;

    #[tokio::test]
    async fn open_delivers_initial_snapshot_then_waits() {
        let store = Arc::new(MemoryStore::new());
        store
            .create(Collection::Notes, json!({"content": "a"}))
            .await
            .unwrap();

        let mut query = LiveQuery::open(
            Arc::clone(&store),
            Collection::Notes,
            None,
            ResubscribePolicy::immediate(1),
        )
        .await
        .unwrap();

        assert_eq!(query.poll_snapshot().await.unwrap().unwrap().len(), 1);
        assert!(query.poll_snapshot().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn recovers_after_interrupted_stream() {
        let store = Arc::new(MemoryStore::new());
        let mut query = LiveQuery::open(
            Arc::clone(&store),
            Collection::Notes,
            None,
            ResubscribePolicy::immediate(2),
        )
        .await
        .unwrap();
        let _ = query.poll_snapshot().await.unwrap();

        store.interrupt_subscriptions();
        let snapshot = query.poll_snapshot().await.unwrap();
        assert_eq!(snapshot, Some(vec![]));
        assert_eq!(store.calls().subscribes(), 2);
        assert_eq!(store.feed().subscriber_count(Collection::Notes), 1);
    }

    #[tokio::test]
    async fn gives_up_with_store_unavailable_after_policy_attempts() {
        let store = Arc::new(MemoryStore::new());
        store.set_unavailable(true);

        let result = LiveQuery::open(
            Arc::clone(&store),
            Collection::Notes,
            None,
            ResubscribePolicy::immediate(3),
        )
        .await;

        assert!(matches!(result, Err(CoreError::StoreUnavailable(_))));
        assert_eq!(store.calls().subscribes(), 3);
        assert_eq!(store.feed().subscriber_count(Collection::Notes), 0);
    }

    #[tokio::test]
    async fn retarget_keeps_a_single_live_subscription() {
        let store = Arc::new(MemoryStore::new());
        let mut query = LiveQuery::open(
            Arc::clone(&store),
            Collection::Notes,
            None,
            ResubscribePolicy::immediate(1),
        )
        .await
        .unwrap();

        query
            .retarget(Some(crate::store::Filter::equals("category", "Work")))
            .await
            .unwrap();
        assert_eq!(store.feed().subscriber_count(Collection::Notes), 1);

        query.close();
        assert!(!query.is_live());
        assert_eq!(store.feed().subscriber_count(Collection::Notes), 0);
    }
}
