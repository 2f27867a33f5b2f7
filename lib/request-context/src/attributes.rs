use std::{any::Any, fmt, sync::Arc};

use dashmap::DashMap;

/// A type-erased attribute value. Cloning only bumps a reference count.
#[derive(Clone)]
pub struct AttributeValue(Arc<dyn Any + Send + Sync>);

impl AttributeValue {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        AttributeValue(Arc::new(value))
    }

    pub fn is<T: Any + Send + Sync>(&self) -> bool {
        (*self.0).is::<T>()
    }

    pub fn downcast_ref<T: Any + Send + Sync>(&self) -> Option<&T> {
        (*self.0).downcast_ref::<T>()
    }

    pub fn downcast<T: Any + Send + Sync>(self) -> Option<Arc<T>> {
        self.0.downcast::<T>().ok()
    }
}

impl fmt::Debug for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttributeValue").finish_non_exhaustive()
    }
}

/// What is physically stored under a key. `Null` marks a key that was explicitly set to
/// no value, so it stays distinguishable from a key that was never set.
#[derive(Clone, Debug)]
enum AttributeSlot {
    Null,
    Value(AttributeValue),
}

impl AttributeSlot {
    fn from_option(value: Option<AttributeValue>) -> Self {
        match value {
            Some(value) => AttributeSlot::Value(value),
            None => AttributeSlot::Null,
        }
    }

    fn as_value(&self) -> Option<&AttributeValue> {
        match self {
            AttributeSlot::Value(value) => Some(value),
            AttributeSlot::Null => None,
        }
    }

    fn into_value(self) -> Option<AttributeValue> {
        match self {
            AttributeSlot::Value(value) => Some(value),
            AttributeSlot::Null => None,
        }
    }
}

#[derive(Default)]
pub struct AttributeStore {
    inner: DashMap<String, AttributeSlot>,
}

impl AttributeStore {
    pub fn set(&self, key: impl Into<String>, value: Option<AttributeValue>) {
        self.inner.insert(key.into(), AttributeSlot::from_option(value));
    }

    pub fn get(&self, key: &str) -> Option<AttributeValue> {
        self.inner
            .get(key)
            .and_then(|entry| entry.value().as_value().cloned())
    }

    pub fn get_as<T: Any + Send + Sync>(&self, key: &str) -> Option<Arc<T>> {
        self.get(key).and_then(AttributeValue::downcast::<T>)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.inner.contains_key(key)
    }

    pub fn remove(&self, key: &str) -> Option<AttributeValue> {
        self.inner
            .remove(key)
            .and_then(|(_, slot)| slot.into_value())
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.inner.len()
    }

    #[cfg(test)]
    fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}
