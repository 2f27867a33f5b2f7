use crate::placeholder::PlaceholderId;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RequestContextError {
    #[error("Placeholder \"{0}\" is already registered and has not been consumed yet")]
    DuplicatePlaceholder(PlaceholderId),
}
