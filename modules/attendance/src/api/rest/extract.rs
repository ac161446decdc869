use std::sync::Arc;

use axum::{
    extract::{FromRequest, FromRequestParts, Query, Request},
    http::{header::AUTHORIZATION, request::Parts},
    Json,
};
use modkit::{ProblemCtx, ProblemResponse};
use serde::de::DeserializeOwned;

use crate::api::rest::error::{malformed, map_domain_error};
use crate::contract::model::User;
use crate::domain::error::DomainError;
use crate::domain::identity::IdentityResolver;

/// The authenticated user. Requires an `Arc<IdentityResolver>` extension.
///
/// No `Authorization: Bearer` header yields 403; a bearer token that does not
/// resolve to a user yields 401.
#[derive(Debug, Clone)]
pub struct Actor(pub User);

fn bearer_token(parts: &Parts) -> Option<&str> {
    let value = parts.headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = ProblemResponse;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let ctx = ProblemCtx::from_parts(parts);
        let resolver = parts
            .extensions
            .get::<Arc<IdentityResolver>>()
            .cloned()
            .ok_or_else(|| {
                map_domain_error(
                    &DomainError::internal("identity resolver extension missing"),
                    &ctx,
                )
            })?;
        let token = bearer_token(parts)
            .ok_or_else(|| map_domain_error(&DomainError::NotAuthenticated, &ctx))?;

        resolver
            .resolve(token)
            .await
            .map(Actor)
            .map_err(|e| map_domain_error(&e, &ctx))
    }
}

/// JSON body whose rejection is a 400 problem instead of axum's plain text.
pub struct JsonBody<T>(pub T);

impl<S, T> FromRequest<S> for JsonBody<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = ProblemResponse;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let (parts, body) = req.into_parts();
        let ctx = ProblemCtx::from_parts(&parts);
        let req = Request::from_parts(parts, body);
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(malformed(rejection.body_text(), &ctx)),
        }
    }
}

/// Query string counterpart of [`JsonBody`].
pub struct QueryParams<T>(pub T);

impl<S, T> FromRequestParts<S> for QueryParams<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = ProblemResponse;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Query::<T>::from_request_parts(parts, state).await {
            Ok(Query(value)) => Ok(Self(value)),
            Err(rejection) => Err(malformed(rejection.body_text(), &ProblemCtx::from_parts(parts))),
        }
    }
}
