use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use dashmap::DashMap;
use sonic_rs::{json, JsonValueTrait};

use crate::{
    attributes::AttributeValue,
    data_loader::DataLoader,
    placeholder::{Placeholder, PlaceholderId},
    response::{graphql_error::GraphQLError, path::PathSegment},
    RequestContext,
};

#[derive(Default)]
struct UserLoaderState {
    pending: Mutex<Vec<u64>>,
    loaded: DashMap<u64, String>,
    batches: Mutex<Vec<Vec<u64>>>,
}

/// Collects keys until dispatched, then "fetches" every collected key in one batch.
/// Ids above 1000 don't exist.
#[derive(Clone, Default)]
struct UserLoader {
    state: Arc<UserLoaderState>,
}

impl UserLoader {
    fn load(&self, id: u64) {
        self.state.pending.lock().unwrap().push(id);
    }

    fn loaded(&self, id: u64) -> Option<String> {
        self.state.loaded.get(&id).map(|name| name.value().clone())
    }

    fn batches(&self) -> Vec<Vec<u64>> {
        self.state.batches.lock().unwrap().clone()
    }
}

#[async_trait]
impl DataLoader for UserLoader {
    async fn dispatch(&self) {
        let mut keys = std::mem::take(&mut *self.state.pending.lock().unwrap());
        if keys.is_empty() {
            return;
        }
        tokio::task::yield_now().await;
        keys.sort_unstable();
        for key in keys.iter().filter(|key| **key <= 1000) {
            self.state.loaded.insert(*key, format!("user-{key}"));
        }
        self.state.batches.lock().unwrap().push(keys);
    }
}

fn user_path(index: usize) -> Vec<PathSegment> {
    vec!["users".into(), index.into(), "author".into()]
}

/// A resolver that defers to the "users" dataloader.
fn defer_user(ctx: &RequestContext, users: &UserLoader, user_id: u64, path: Vec<PathSegment>) {
    users.load(user_id);
    ctx.add_unresolved_placeholder(
        PlaceholderId::new(),
        Placeholder::new("users", json!(user_id), path),
    )
    .unwrap();
}

/// One dispatch-and-fill wave, the way an execution engine drives it.
/// Returns the filled values keyed by their response path.
async fn run_wave(ctx: &RequestContext, users: &UserLoader) -> Vec<(Vec<PathSegment>, String)> {
    for id in ctx.get_data_loader_ids() {
        if let Some(loader) = ctx.get_data_loader(&id) {
            loader.dispatch().await;
        }
    }

    let pending = ctx.get_unresolved_placeholders();
    ctx.remove_all_unresolved_placeholders();

    let mut filled = Vec::with_capacity(pending.len());
    for (id, _) in pending {
        let placeholder = ctx.get_placeholder(&id).unwrap();
        let user_id = placeholder.key.as_u64().unwrap();
        match users.loaded(user_id) {
            Some(name) => filled.push((placeholder.path.clone(), name)),
            None => {
                ctx.add_error(
                    GraphQLError::from(format!("User {user_id} not found"))
                        .with_path(placeholder.path.clone()),
                );
            }
        }
        ctx.decrement_unresolved_placeholder_count();
        ctx.decrement_unresolved_placeholder_node_count();
    }

    filled
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn single_wave_collapses_loads_into_one_batch() {
    let ctx = RequestContext::new().into_shared();
    let users = UserLoader::default();
    ctx.register_data_loader("users", users.clone().to_boxed_arc());

    assert!(!ctx.has_placeholders());

    let resolvers: Vec<_> = (0..10_u64)
        .map(|i| {
            let ctx = ctx.clone();
            let users = users.clone();
            tokio::spawn(async move { defer_user(&ctx, &users, i + 1, user_path(i as usize)) })
        })
        .collect();
    for resolver in resolvers {
        resolver.await.unwrap();
    }

    assert!(ctx.has_placeholders());
    assert_eq!(ctx.get_unresolved_placeholder_count(), 10);
    assert_eq!(ctx.get_unresolved_placeholder_node_count(), 10);

    let mut filled = run_wave(&ctx, &users).await;
    filled.sort_by_key(|(path, _)| match path[1] {
        PathSegment::Index(index) => index,
        PathSegment::Field(_) => usize::MAX,
    });

    assert_eq!(users.batches(), vec![(1..=10).collect::<Vec<u64>>()]);
    assert_eq!(filled.len(), 10);
    assert_eq!(filled[0], (user_path(0), "user-1".to_string()));
    assert_eq!(filled[9], (user_path(9), "user-10".to_string()));
    assert_eq!(ctx.get_unresolved_placeholder_count(), 0);
    assert_eq!(ctx.get_unresolved_placeholder_node_count(), 0);
    assert!(ctx.get_errors().is_empty());

    ctx.clear_placeholders();
    assert!(!ctx.has_placeholders());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn nested_deferrals_need_a_second_wave() {
    let ctx = RequestContext::new().into_shared();
    let users = UserLoader::default();
    ctx.register_data_loader("users", users.clone().to_boxed_arc());

    for i in 0..3_u64 {
        defer_user(&ctx, &users, i + 1, user_path(i as usize));
    }

    let first_wave = run_wave(&ctx, &users).await;
    assert_eq!(first_wave.len(), 3);
    assert_eq!(ctx.get_unresolved_placeholder_count(), 0);
    ctx.clear_placeholders();

    // every resolved author has a "manager" field that defers again
    let resolvers: Vec<_> = first_wave
        .into_iter()
        .map(|(path, name)| {
            let ctx = ctx.clone();
            let users = users.clone();
            tokio::spawn(async move {
                let author_id: u64 = name.trim_start_matches("user-").parse().unwrap();
                let mut manager_path = path;
                manager_path.push("manager".into());
                defer_user(&ctx, &users, author_id + 100, manager_path);
            })
        })
        .collect();
    for resolver in resolvers {
        resolver.await.unwrap();
    }

    assert!(ctx.has_placeholders());
    assert_eq!(ctx.get_unresolved_placeholder_count(), 3);

    let second_wave = run_wave(&ctx, &users).await;
    assert_eq!(second_wave.len(), 3);
    assert_eq!(users.batches(), vec![vec![1, 2, 3], vec![101, 102, 103]]);
    assert_eq!(ctx.get_unresolved_placeholder_count(), 0);

    ctx.clear_placeholders();
    assert!(!ctx.has_placeholders());
}

#[tokio::test]
async fn missing_values_become_errors_with_paths() {
    let ctx = RequestContext::new();
    let users = UserLoader::default();
    ctx.register_data_loader("users", users.clone().to_boxed_arc());

    ctx.add_error("Cannot query field \"age\"".into());
    defer_user(&ctx, &users, 5000, user_path(0));

    let filled = run_wave(&ctx, &users).await;
    assert!(filled.is_empty());

    let errors = ctx.get_errors();
    assert_eq!(errors.len(), 2);
    assert_eq!(errors[0].message, "Cannot query field \"age\"");
    assert_eq!(errors[1].message, "User 5000 not found");
    assert_eq!(errors[1].path, Some(user_path(0)));
    assert_eq!(ctx.get_unresolved_placeholder_count(), 0);
}

#[tokio::test]
async fn wave_without_placeholders_is_skipped() {
    let ctx = RequestContext::new();
    let users = UserLoader::default();
    ctx.register_data_loader("users", users.clone().to_boxed_arc());

    if ctx.has_placeholders() {
        run_wave(&ctx, &users).await;
    }

    assert!(users.batches().is_empty());
    assert_eq!(ctx.get_data_loader_ids(), vec!["users"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn resolvers_share_request_attributes() {
    #[derive(Debug, PartialEq)]
    struct Viewer {
        id: u64,
        roles: Vec<String>,
    }

    let ctx = RequestContext::new().into_shared();
    ctx.set_attribute(
        "viewer",
        Some(AttributeValue::new(Viewer {
            id: 42,
            roles: vec!["admin".to_string()],
        })),
    );

    let resolvers: Vec<_> = (0..20)
        .map(|i| {
            let ctx = ctx.clone();
            tokio::spawn(async move {
                let viewer = ctx.get_attribute_as::<Viewer>("viewer").unwrap();
                ctx.set_attribute(
                    format!("visited:{i}"),
                    Some(AttributeValue::new(viewer.id)),
                );
                if !viewer.roles.iter().any(|role| role == "editor") {
                    ctx.add_error(
                        GraphQLError::from("Forbidden")
                            .with_path(vec!["posts".into(), (i as usize).into()])
                            .with_extensions(json!({ "code": "FORBIDDEN" })),
                    );
                }
            })
        })
        .collect();
    for resolver in resolvers {
        resolver.await.unwrap();
    }

    for i in 0..20 {
        assert_eq!(
            ctx.get_attribute_as::<u64>(&format!("visited:{i}")).as_deref(),
            Some(&42)
        );
    }

    let errors = ctx.get_errors();
    assert_eq!(errors.len(), 20);
    assert!(errors.iter().all(|error| error
        .extensions
        .as_ref()
        .and_then(|ext| ext.get("code"))
        .and_then(|code| code.as_str())
        == Some("FORBIDDEN")));

    // an error boundary above "posts" swallows its children errors
    ctx.reset_errors();
    assert_eq!(ctx.error_count(), 0);
}
