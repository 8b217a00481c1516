pub mod credential;
pub mod identity;
pub mod membership;
pub mod project;
pub mod role;
pub mod stats;
pub mod template;

pub use credential::{Credential, CredentialType, CredentialsDisplay};
pub use identity::{AuthSession, Identity, SessionTokens};
pub use membership::{MemberMetadata, MemberUser, Membership};
pub use project::{Project, ProjectChanges, ProjectFeatures, ProjectLimits, ProjectStatus};
pub use role::Role;
pub use stats::ProjectStats;
pub use template::{default_templates, ProjectTemplate, BUILT_IN_TEMPLATE_IDS};
