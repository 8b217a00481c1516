pub mod error;
pub mod identity;
pub mod store;

pub use error::{IdentityError, StoreError};
pub use identity::{HttpIdentityProvider, IdentityProvider, MockFailure, MockIdentityProvider};
pub use store::{InMemoryProjectStore, ProjectStore, RestProjectStore};
