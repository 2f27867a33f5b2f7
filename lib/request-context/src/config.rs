use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct RequestContextConfig {
    /// Controls what happens when a placeholder is registered under an id that is still
    /// present in the placeholder registry (registered, but not consumed yet).
    ///
    /// - `reject`: the registration fails and the outstanding placeholder is kept.
    /// - `replace`: the new placeholder wins. Unresolved counters are not incremented twice for the same id.
    ///
    /// Default: `reject`.
    #[serde(default = "default_duplicate_placeholder")]
    pub duplicate_placeholder: DuplicatePlaceholderPolicy,

    /// Controls what happens when an unresolved placeholder counter is decremented while it is already zero.
    ///
    /// - `clamp`: the counter stays at zero and a warning is logged.
    /// - `panic`: the call panics. Useful in tests of an execution engine, to catch unbalanced bookkeeping early.
    ///
    /// Default: `clamp`.
    #[serde(default = "default_counter_underflow")]
    pub counter_underflow: CounterUnderflowPolicy,
}

impl Default for RequestContextConfig {
    fn default() -> Self {
        Self {
            duplicate_placeholder: default_duplicate_placeholder(),
            counter_underflow: default_counter_underflow(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePlaceholderPolicy {
    Reject,
    Replace,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum CounterUnderflowPolicy {
    Clamp,
    Panic,
}

fn default_duplicate_placeholder() -> DuplicatePlaceholderPolicy {
    DuplicatePlaceholderPolicy::Reject
}

fn default_counter_underflow() -> CounterUnderflowPolicy {
    CounterUnderflowPolicy::Clamp
}
