use std::sync::Arc;

use tracing::debug;

use crate::contract::model::User;
use crate::domain::error::DomainError;
use crate::domain::ports::TokenCodec;
use crate::domain::store::Collection;

/// Maps a bearer token to the user it was issued for.
pub struct IdentityResolver {
    users: Collection<User>,
    tokens: Arc<dyn TokenCodec>,
}

impl IdentityResolver {
    pub fn new(users: Collection<User>, tokens: Arc<dyn TokenCodec>) -> Self {
        Self { users, tokens }
    }

    pub async fn resolve(&self, token: &str) -> Result<User, DomainError> {
        let subject = self.tokens.parse(token).map_err(|e| {
            debug!(error = %e, "rejecting bearer token");
            DomainError::unauthorized("Invalid token")
        })?;

        self.users
            .find_by_id(&subject)
            .await?
            .ok_or_else(|| DomainError::unauthorized("User not found"))
    }
}
