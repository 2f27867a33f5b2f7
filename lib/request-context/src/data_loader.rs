use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;

/// A batching loader registered for the lifetime of one request.
///
/// Resolvers enqueue keys on the loader and return placeholders. The execution engine calls
/// `dispatch` on every registered loader once the synchronous part of a resolution wave is
/// exhausted, which runs the batch function over every key collected so far.
#[async_trait]
pub trait DataLoader {
    async fn dispatch(&self);

    fn to_boxed_arc<'a>(self) -> Arc<Box<dyn DataLoader + Send + Sync + 'a>>
    where
        Self: Sized + Send + Sync + 'a,
    {
        Arc::new(Box::new(self))
    }
}

pub type DataLoaderBoxedArc = Arc<Box<dyn DataLoader + Send + Sync>>;

#[derive(Default)]
pub struct DataLoaderRegistry {
    inner: DashMap<String, DataLoaderBoxedArc>,
}

impl DataLoaderRegistry {
    /// Returns the loader previously registered under the same name, if any.
    pub fn register(
        &self,
        name: impl Into<String>,
        loader: DataLoaderBoxedArc,
    ) -> Option<DataLoaderBoxedArc> {
        self.inner.insert(name.into(), loader)
    }

    pub fn get(&self, name: &str) -> Option<DataLoaderBoxedArc> {
        self.inner.get(name).map(|entry| entry.value().clone())
    }

    /// Registered names in ascending order.
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.inner.iter().map(|entry| entry.key().clone()).collect();
        ids.sort_unstable();
        ids
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.inner.len()
    }
}
