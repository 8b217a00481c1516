use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::models::{Membership, Role};

/// Owner is never assignable through the member API; a project keeps
/// exactly one owner, the one that provisioned it.
fn validate_assignable_role(role: &Role) -> Result<(), ValidationError> {
    if *role == Role::Owner {
        let mut err = ValidationError::new("role");
        err.message = Some("role must be one of admin, member, viewer".into());
        return Err(err);
    }
    Ok(())
}

#[derive(Debug, Deserialize, Validate)]
pub struct AddMemberRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(custom(function = "validate_assignable_role"))]
    pub role: Role,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateMemberRoleRequest {
    #[validate(custom(function = "validate_assignable_role"))]
    pub role: Role,
}

#[derive(Debug, Serialize)]
pub struct MemberListResponse {
    pub members: Vec<Membership>,
}

#[derive(Debug, Serialize)]
pub struct MemberResponse {
    pub member: Membership,
}
