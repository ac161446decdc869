use crate::contract::model::User;
use crate::domain::error::DomainError;

/// An admin may mutate anything; a teacher only what they own.
pub fn can_mutate(actor: &User, owner_teacher_id: &str) -> bool {
    actor.is_admin() || actor.id == owner_teacher_id
}

pub fn ensure_can_mutate(
    actor: &User,
    owner_teacher_id: &str,
    reason: &str,
) -> Result<(), DomainError> {
    if can_mutate(actor, owner_teacher_id) {
        Ok(())
    } else {
        tracing::debug!(actor = %actor.id, owner = %owner_teacher_id, "policy denied");
        Err(DomainError::forbidden(reason))
    }
}

pub fn ensure_admin(actor: &User) -> Result<(), DomainError> {
    if actor.is_admin() {
        Ok(())
    } else {
        Err(DomainError::forbidden("Admin access required"))
    }
}
