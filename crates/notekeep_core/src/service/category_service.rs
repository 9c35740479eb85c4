//! Category registry service.
//!
//! # Responsibility
//! - Add category names to the `categories` collection.
//! - Open live category lists for filtering and tagging.
//!
//! # Invariants
//! - Blank names are rejected before any store access.
//! - Uniqueness is not enforced here; duplicates may coexist in storage.
//! - Categories are never deleted or renamed by the core.

use crate::config::ResubscribePolicy;
use crate::error::{CoreError, CoreResult};
use crate::identity::IdentityWatch;
use crate::model::category::{normalize_category_name, CategoryDocument};
use crate::store::{Collection, DocId, DocumentStore};
use crate::sync::category_view::CategoryList;
use log::{info, warn};
use std::sync::Arc;

/// Registry facade over the `categories` collection.
pub struct CategoryRegistry<S: DocumentStore + ?Sized> {
    store: Arc<S>,
    identity: IdentityWatch,
    policy: ResubscribePolicy,
}

impl<S: DocumentStore + ?Sized> CategoryRegistry<S> {
    pub fn new(store: Arc<S>, identity: IdentityWatch, policy: ResubscribePolicy) -> Self {
        Self {
            store,
            identity,
            policy,
        }
    }

    /// Stores one category name and returns its key.
    pub async fn add_category(&self, name: &str) -> CoreResult<DocId> {
        if self.identity.current().is_none() {
            warn!("event=category_add module=service status=error error_code=unauthenticated");
            return Err(CoreError::Unauthenticated);
        }
        let name = normalize_category_name(name).ok_or_else(|| {
            CoreError::InvalidInput("category name cannot be empty".to_string())
        })?;

        let document = serde_json::to_value(CategoryDocument { name })
            .map_err(|err| CoreError::StoreUnavailable(format!("cannot encode category: {err}")))?;
        let id = self.store.create(Collection::Categories, document).await?.id;
        info!("event=category_add module=service status=ok category_id={id}");
        Ok(id)
    }

    /// Opens a live, continuously refreshed list of categories.
    pub async fn list_categories(&self) -> CoreResult<CategoryList<S>> {
        CategoryList::open(Arc::clone(&self.store), self.policy.clone()).await
    }
}
