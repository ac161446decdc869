use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use rand::RngCore;
use tracing::{info, warn};

use crate::api::rest::{openapi::AttendanceApiDoc, routes};
use crate::config::AttendanceConfig;
use crate::domain::auth::AuthService;
use crate::domain::identity::IdentityResolver;
use crate::domain::ledger::LedgerService;
use crate::domain::ports::{PasswordHasher, TokenCodec};
use crate::domain::registry::RegistryService;
use crate::domain::report::ReportService;
use crate::domain::store::{Collection, DocumentStore};
use crate::infra::credentials::{Argon2Hasher, JwtCodec};

/// The attendance module: services wired over one document store.
#[derive(Clone)]
pub struct Attendance {
    pub auth: Arc<AuthService>,
    pub identity: Arc<IdentityResolver>,
    pub registry: Arc<RegistryService>,
    pub ledger: Arc<LedgerService>,
    pub reports: Arc<ReportService>,
}

impl Attendance {
    /// Build with production credentials (Argon2id, HS256 JWT) from config.
    pub fn new(store: Arc<dyn DocumentStore>, cfg: &AttendanceConfig) -> Self {
        let secret = if cfg.jwt_secret.is_empty() {
            warn!("attendance.jwt_secret is not set; using a random secret, tokens will not survive a restart");
            let mut bytes = [0u8; 32];
            rand::rng().fill_bytes(&mut bytes);
            bytes.to_vec()
        } else {
            cfg.jwt_secret.as_bytes().to_vec()
        };
        let ttl = cfg.token_ttl_secs.map(Duration::from_secs);
        if ttl.is_none() {
            info!("attendance tokens are issued without expiry");
        }

        Self::with_components(
            store,
            Arc::new(Argon2Hasher::new()),
            Arc::new(JwtCodec::new(&secret, ttl)),
            cfg,
        )
    }

    pub fn with_components(
        store: Arc<dyn DocumentStore>,
        hasher: Arc<dyn PasswordHasher>,
        tokens: Arc<dyn TokenCodec>,
        cfg: &AttendanceConfig,
    ) -> Self {
        let list_limit = cfg.list_limit;
        let users = Collection::new(store.clone());
        let classes = Collection::new(store.clone());
        let students = Collection::new(store.clone());
        let attendance = Collection::new(store);

        Self {
            auth: Arc::new(AuthService::new(
                users.clone(),
                hasher,
                tokens.clone(),
                list_limit,
            )),
            identity: Arc::new(IdentityResolver::new(users, tokens)),
            registry: Arc::new(RegistryService::new(
                classes.clone(),
                students.clone(),
                list_limit,
            )),
            ledger: Arc::new(LedgerService::new(
                classes.clone(),
                students.clone(),
                attendance.clone(),
                list_limit,
            )),
            reports: Arc::new(ReportService::new(
                classes,
                students,
                attendance,
                list_limit,
                cfg.report_max_days,
            )),
        }
    }

    /// REST routes, relative to the API prefix.
    pub fn router(&self) -> Router {
        routes::register_routes(self)
    }

    pub fn openapi() -> utoipa::openapi::OpenApi {
        use utoipa::OpenApi;
        AttendanceApiDoc::openapi()
    }
}
