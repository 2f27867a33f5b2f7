use std::{
    fmt,
    str::FromStr,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
};

use dashmap::{mapref::entry::Entry, DashMap};
use sonic_rs::Value;
use tracing::{debug, trace, warn};
use uuid::Uuid;

use crate::{
    config::{CounterUnderflowPolicy, DuplicatePlaceholderPolicy, RequestContextConfig},
    error::RequestContextError,
    response::path::{display_path, PathSegment},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlaceholderId(Uuid);

impl PlaceholderId {
    pub fn new() -> Self {
        PlaceholderId(Uuid::new_v4())
    }
}

impl Default for PlaceholderId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for PlaceholderId {
    fn from(uuid: Uuid) -> Self {
        PlaceholderId(uuid)
    }
}

impl FromStr for PlaceholderId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(PlaceholderId)
    }
}

impl fmt::Display for PlaceholderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stands in the response tree for a value that a resolver handed over to a dataloader.
#[derive(Clone, Debug, PartialEq)]
pub struct Placeholder {
    /// Name of the dataloader the value is waiting on.
    pub data_loader_id: String,
    /// Key passed to the dataloader.
    pub key: Value,
    /// Position of the value in the response.
    pub path: Vec<PathSegment>,
}

impl Placeholder {
    pub fn new(data_loader_id: impl Into<String>, key: Value, path: Vec<PathSegment>) -> Self {
        Placeholder {
            data_loader_id: data_loader_id.into(),
            key,
            path,
        }
    }
}

/// Placeholder bookkeeping of a single request.
///
/// `registry` serves one-shot lookups by id, `unresolved` serves enumeration of the current
/// wave. The two maps are cleared independently. Both counters are only ever moved with
/// atomic read-modify-write operations.
pub struct PlaceholderTracker {
    registry: DashMap<PlaceholderId, Arc<Placeholder>>,
    unresolved: DashMap<PlaceholderId, Arc<Placeholder>>,
    has_placeholders: AtomicBool,
    unresolved_count: AtomicUsize,
    unresolved_node_count: AtomicUsize,
    duplicate_policy: DuplicatePlaceholderPolicy,
    underflow_policy: CounterUnderflowPolicy,
}

impl Default for PlaceholderTracker {
    fn default() -> Self {
        Self::new(&RequestContextConfig::default())
    }
}

impl PlaceholderTracker {
    pub fn new(config: &RequestContextConfig) -> Self {
        PlaceholderTracker {
            registry: DashMap::new(),
            unresolved: DashMap::new(),
            has_placeholders: AtomicBool::new(false),
            unresolved_count: AtomicUsize::new(0),
            unresolved_node_count: AtomicUsize::new(0),
            duplicate_policy: config.duplicate_placeholder,
            underflow_policy: config.counter_underflow,
        }
    }

    pub fn add(
        &self,
        id: PlaceholderId,
        placeholder: impl Into<Arc<Placeholder>>,
    ) -> Result<(), RequestContextError> {
        let placeholder = placeholder.into();

        // Lock order is registry entry first, enumeration map second. The registry guard is
        // held until both maps are written.
        let entry = self.registry.entry(id);
        let outstanding = matches!(entry, Entry::Occupied(_)) || self.unresolved.contains_key(&id);

        if outstanding && self.duplicate_policy == DuplicatePlaceholderPolicy::Reject {
            warn!(
                placeholder_id = %id,
                "rejected placeholder registration, the id is still outstanding"
            );
            return Err(RequestContextError::DuplicatePlaceholder(id));
        }

        let registered = entry.insert(placeholder.clone());
        self.unresolved.insert(id, placeholder.clone());
        drop(registered);

        if !outstanding {
            self.unresolved_count.fetch_add(1, Ordering::AcqRel);
            self.unresolved_node_count.fetch_add(1, Ordering::AcqRel);
        }
        self.has_placeholders.store(true, Ordering::Release);

        trace!(
            placeholder_id = %id,
            data_loader_id = %placeholder.data_loader_id,
            path = %display_path(&placeholder.path),
            replaced = outstanding,
            "placeholder registered"
        );

        Ok(())
    }

    /// Removes the placeholder from the registry. A second call for the same id yields `None`.
    /// The enumeration map is left untouched.
    pub fn take(&self, id: &PlaceholderId) -> Option<Arc<Placeholder>> {
        let taken = self.registry.remove(id).map(|(_, placeholder)| placeholder);
        trace!(placeholder_id = %id, found = taken.is_some(), "placeholder consumed");
        taken
    }

    /// Snapshot of the enumeration map, in no particular order.
    pub fn unresolved(&self) -> Vec<(PlaceholderId, Arc<Placeholder>)> {
        self.unresolved
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect()
    }

    pub fn remove_all_unresolved(&self) {
        self.unresolved.clear();
        debug!("unresolved placeholders enumeration cleared");
    }

    /// Meant for the point where the outstanding set is drained and no resolver can still
    /// register. A registration racing with `clear` may survive in either map. Counters are
    /// not touched.
    pub fn clear(&self) {
        self.unresolved.clear();
        self.registry.clear();
        self.has_placeholders.store(false, Ordering::Release);
        debug!("placeholders cleared");
    }

    pub fn has_placeholders(&self) -> bool {
        self.has_placeholders.load(Ordering::Acquire)
    }

    pub fn unresolved_count(&self) -> usize {
        self.unresolved_count.load(Ordering::Acquire)
    }

    pub fn unresolved_node_count(&self) -> usize {
        self.unresolved_node_count.load(Ordering::Acquire)
    }

    pub fn decrement_unresolved_count(&self) -> usize {
        decrement(
            &self.unresolved_count,
            self.underflow_policy,
            "unresolved_placeholder_count",
        )
    }

    pub fn decrement_unresolved_node_count(&self) -> usize {
        decrement(
            &self.unresolved_node_count,
            self.underflow_policy,
            "unresolved_placeholder_node_count",
        )
    }
}

fn decrement(counter: &AtomicUsize, policy: CounterUnderflowPolicy, name: &'static str) -> usize {
    match counter.fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
        current.checked_sub(1)
    }) {
        Ok(previous) => previous - 1,
        Err(_) => match policy {
            CounterUnderflowPolicy::Clamp => {
                warn!(counter = name, "decremented a counter that is already zero");
                0
            }
            CounterUnderflowPolicy::Panic => {
                panic!("{} decremented below zero", name)
            }
        },
    }
}
