pub mod attributes;
pub mod config;
pub mod context;
pub mod data_loader;
pub mod error;
pub mod placeholder;
pub mod response;

#[cfg(test)]
mod tests;

pub use attributes::AttributeValue;
pub use config::RequestContextConfig;
pub use context::RequestContext;
pub use data_loader::{DataLoader, DataLoaderBoxedArc};
pub use error::RequestContextError;
pub use placeholder::{Placeholder, PlaceholderId};
pub use response::graphql_error::GraphQLError;
