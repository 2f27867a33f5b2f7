use std::{any::Any, ops::Range, sync::Arc};

use tracing::debug;

use crate::{
    attributes::{AttributeStore, AttributeValue},
    config::RequestContextConfig,
    data_loader::{DataLoaderBoxedArc, DataLoaderRegistry},
    error::RequestContextError,
    placeholder::{Placeholder, PlaceholderId, PlaceholderTracker},
    response::{errors::ErrorStore, graphql_error::GraphQLError},
};

/// State shared by every resolver task of a single GraphQL operation execution.
///
/// One context is created per request and handed to the tasks behind an `Arc`. Every method
/// takes `&self` and is safe to call from any number of tasks at once. None of them waits on
/// anything but short, sharded map locks.
pub struct RequestContext {
    attributes: AttributeStore,
    errors: ErrorStore,
    data_loaders: DataLoaderRegistry,
    placeholders: PlaceholderTracker,
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestContext {
    pub fn new() -> Self {
        Self::with_config(&RequestContextConfig::default())
    }

    pub fn with_config(config: &RequestContextConfig) -> Self {
        RequestContext {
            attributes: AttributeStore::default(),
            errors: ErrorStore::default(),
            data_loaders: DataLoaderRegistry::default(),
            placeholders: PlaceholderTracker::new(config),
        }
    }

    pub fn into_shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    // Attributes

    /// Passing `None` stores an explicit null: `get_attribute` yields `None`, but
    /// `contains_attribute` reports the key as present.
    pub fn set_attribute(&self, key: impl Into<String>, value: Option<AttributeValue>) {
        self.attributes.set(key, value);
    }

    pub fn get_attribute(&self, key: &str) -> Option<AttributeValue> {
        self.attributes.get(key)
    }

    pub fn get_attribute_as<T: Any + Send + Sync>(&self, key: &str) -> Option<Arc<T>> {
        self.attributes.get_as(key)
    }

    pub fn contains_attribute(&self, key: &str) -> bool {
        self.attributes.contains(key)
    }

    pub fn remove_attribute(&self, key: &str) -> Option<AttributeValue> {
        self.attributes.remove(key)
    }

    // Errors

    /// Returns the sequence number assigned to the error.
    pub fn add_error(&self, error: GraphQLError) -> usize {
        self.errors.push(error)
    }

    pub fn add_errors(&self, errors: Vec<GraphQLError>) -> Range<usize> {
        self.errors.extend(errors)
    }

    /// Errors in the order they were added.
    pub fn get_errors(&self) -> Vec<GraphQLError> {
        self.errors.to_vec()
    }

    pub fn error_count(&self) -> usize {
        self.errors.len()
    }

    pub fn reset_errors(&self) {
        debug!(dropped = self.errors.len(), "resetting collected errors");
        self.errors.clear();
    }

    // Dataloaders

    pub fn register_data_loader(&self, name: impl Into<String>, loader: DataLoaderBoxedArc) {
        let name = name.into();
        if self.data_loaders.register(name.clone(), loader).is_some() {
            debug!(data_loader_id = %name, "replaced previously registered dataloader");
        }
    }

    pub fn get_data_loader(&self, name: &str) -> Option<DataLoaderBoxedArc> {
        self.data_loaders.get(name)
    }

    pub fn get_data_loader_ids(&self) -> Vec<String> {
        self.data_loaders.ids()
    }

    // Placeholders

    pub fn add_unresolved_placeholder(
        &self,
        id: PlaceholderId,
        placeholder: impl Into<Arc<Placeholder>>,
    ) -> Result<(), RequestContextError> {
        self.placeholders.add(id, placeholder)
    }

    /// One-shot: the placeholder is removed from the registry by this call.
    pub fn get_placeholder(&self, id: &PlaceholderId) -> Option<Arc<Placeholder>> {
        self.placeholders.take(id)
    }

    pub fn get_unresolved_placeholders(&self) -> Vec<(PlaceholderId, Arc<Placeholder>)> {
        self.placeholders.unresolved()
    }

    pub fn remove_all_unresolved_placeholders(&self) {
        self.placeholders.remove_all_unresolved();
    }

    pub fn clear_placeholders(&self) {
        self.placeholders.clear();
    }

    pub fn has_placeholders(&self) -> bool {
        self.placeholders.has_placeholders()
    }

    pub fn get_unresolved_placeholder_count(&self) -> usize {
        self.placeholders.unresolved_count()
    }

    pub fn get_unresolved_placeholder_node_count(&self) -> usize {
        self.placeholders.unresolved_node_count()
    }

    /// Returns the count after the decrement.
    pub fn decrement_unresolved_placeholder_count(&self) -> usize {
        self.placeholders.decrement_unresolved_count()
    }

    /// Meant to be called once per response node, when the last of its placeholders got filled.
    pub fn decrement_unresolved_placeholder_node_count(&self) -> usize {
        self.placeholders.decrement_unresolved_node_count()
    }
}
