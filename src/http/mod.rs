//! REST surface under `/api`.

mod auth;
mod maintenance;

use std::{sync::Arc, time::Duration};

use axum::{
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method, StatusCode,
    },
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use derive_more::{Display, From};
use jsonwebtoken::{DecodingKey, EncodingKey};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    api, config,
    db::{self, user::Repository as _, Db},
    service::{self, Policy, Service},
};

pub use self::auth::{issue_token, AuthClaims, AuthError};

pub type SharedAppState = Arc<AppState>;

pub struct AppState {
    pub service: Service,

    pub db: Arc<dyn Db>,

    pub jwt: Jwt,
}

impl AppState {
    pub fn new(db: Arc<dyn Db>, policy: Policy, jwt: Jwt) -> Self {
        Self {
            service: Service::new(db.clone(), policy),
            db,
            jwt,
        }
    }
}

pub struct Jwt {
    pub expiration_time: Duration,

    pub decoding_key: DecodingKey,

    pub encoding_key: EncodingKey,
}

impl Jwt {
    pub fn new(secret: &str, expiration_time: Duration) -> Self {
        Self {
            expiration_time,
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
        }
    }
}

impl From<&config::Jwt> for Jwt {
    fn from(config: &config::Jwt) -> Self {
        Self::new(&config.secret, config.expiration_time)
    }
}

pub fn router(state: SharedAppState) -> Router {
    let api = Router::new()
        .route("/auth", post(auth::auth))
        .route("/user", get(auth::get_user))
        .route("/maintenance", post(maintenance::create_ticket))
        .route("/maintenance/my", get(maintenance::list_my_tickets))
        .route(
            "/maintenance/staff/my",
            get(maintenance::list_assigned_tickets),
        )
        .route(
            "/maintenance/dashboard/staff",
            get(maintenance::staff_dashboard),
        )
        .route("/maintenance/:id", get(maintenance::get_ticket))
        .route("/maintenance/:id/status", put(maintenance::update_status))
        .route("/maintenance/:id/assign", put(maintenance::assign_ticket))
        .route("/maintenance/:id/comments", post(maintenance::add_comment));

    Router::new()
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub fn cors(
    config: &config::Cors,
) -> Result<CorsLayer, axum::http::header::InvalidHeaderValue> {
    let mut cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE]);
    for origin in &config.allowed_origins {
        cors = cors.allow_origin(origin.parse::<HeaderValue>()?);
    }
    Ok(cors)
}

#[derive(Debug, Display, From)]
pub enum Error {
    #[from]
    Service(service::Error),
    #[from]
    Auth(AuthError),
    Forbidden(&'static str),
    BadRequest(String),
}

impl From<db::Error> for Error {
    fn from(e: db::Error) -> Self {
        Self::Service(e.into())
    }
}

impl Error {
    fn status(&self) -> StatusCode {
        use service::Error as S;

        match self {
            Self::Service(S::Validation(_)) | Self::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::Service(S::NotFound) => StatusCode::NOT_FOUND,
            Self::Service(S::InvalidTransition(_)) => StatusCode::CONFLICT,
            Self::Service(S::Db(_)) | Self::Auth(AuthError::DbError(_)) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::Auth(
                AuthError::InvalidToken | AuthError::WrongLoginOrPassword,
            ) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
            "internal server error".to_owned()
        } else {
            tracing::debug!(
                status = status.as_u16(),
                error = %self,
                "request rejected",
            );
            self.to_string()
        };
        (status, Json(api::Envelope::<()>::failure(message))).into_response()
    }
}

/// Loads the user behind the bearer token.
async fn caller(
    state: &AppState,
    claims: &AuthClaims,
) -> Result<db::User, Error> {
    state
        .db
        .get_user_by_id(claims.user_id())
        .await?
        .ok_or(Error::Auth(AuthError::InvalidToken))
}
