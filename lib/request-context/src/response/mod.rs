pub mod errors;
pub mod graphql_error;
pub mod path;
