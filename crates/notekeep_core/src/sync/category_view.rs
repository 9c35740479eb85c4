//! Live category list.

use crate::config::ResubscribePolicy;
use crate::error::CoreResult;
use crate::model::category::Category;
use crate::store::{Collection, DocumentStore, StoredDocument};
use crate::sync::live_query::LiveQuery;
use log::warn;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Continuously synchronized list of every stored category record.
pub struct CategoryList<S: DocumentStore + ?Sized> {
    query: LiveQuery<S>,
    categories: Vec<Category>,
}

impl<S: DocumentStore + ?Sized> CategoryList<S> {
    pub async fn open(store: Arc<S>, policy: ResubscribePolicy) -> CoreResult<Self> {
        let query = LiveQuery::open(store, Collection::Categories, None, policy).await?;
        let mut list = Self {
            query,
            categories: Vec::new(),
        };
        list.refresh().await?;
        Ok(list)
    }

    /// Applies the newest delivered batch, if any, without waiting.
    pub async fn refresh(&mut self) -> CoreResult<bool> {
        match self.query.poll_snapshot().await? {
            Some(documents) => {
                self.replace_all(&documents);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Waits for the next committed change and applies it.
    pub async fn wait_for_change(&mut self) -> CoreResult<()> {
        let documents = self.query.next_snapshot().await?;
        self.replace_all(&documents);
        Ok(())
    }

    /// Every stored record, duplicates included.
    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    /// Distinct category names.
    pub fn names(&self) -> BTreeSet<String> {
        self.categories
            .iter()
            .map(|category| category.name.clone())
            .collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.categories.iter().any(|category| category.name == name)
    }

    pub fn close(&mut self) {
        self.query.close();
    }

    fn replace_all(&mut self, documents: &[StoredDocument]) {
        self.categories = documents
            .iter()
            .filter_map(|stored| match Category::from_stored(stored) {
                Ok(category) => Some(category),
                Err(err) => {
                    warn!(
                        "event=category_view_decode module=sync status=skipped category_id={} error={}",
                        stored.id, err
                    );
                    None
                }
            })
            .collect();
    }
}
