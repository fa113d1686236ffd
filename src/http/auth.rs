use async_trait::async_trait;
use axum::{
    extract::{rejection::JsonRejection, FromRequestParts, State},
    http::request,
    response::{IntoResponse, Response},
    Json, RequestPartsExt as _,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use derive_more::{Display, From};
use jsonwebtoken::{decode, encode, Header, Validation};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{api, db, db::user::Repository as _};

use super::{caller, Error, Jwt, SharedAppState};

#[derive(Deserialize)]
pub(super) struct AuthInput {
    login: String,
    password: String,
}

pub(super) async fn auth(
    State(state): State<SharedAppState>,
    input: Result<Json<AuthInput>, JsonRejection>,
) -> Result<Json<api::Envelope<api::user::Token>>, Error> {
    use AuthError as E;

    let Json(AuthInput { login, password }) =
        input.map_err(|e| Error::BadRequest(e.body_text()))?;

    let user = state
        .db
        .get_user_by_login(&login)
        .await
        .map_err(E::from)?
        .filter(|u| u.password_hash.verify(&password))
        .ok_or(E::WrongLoginOrPassword)?;

    let token = issue_token(&state.jwt, user.id)?;
    tracing::info!(user_id = %user.id, "access token issued");

    Ok(Json(api::Envelope::ok(api::user::Token { token })))
}

pub(super) async fn get_user(
    State(state): State<SharedAppState>,
    auth_claims: AuthClaims,
) -> Result<Json<api::Envelope<api::User>>, Error> {
    let my = caller(&state, &auth_claims).await?;
    Ok(Json(api::Envelope::ok(my.into())))
}

pub fn issue_token(
    jwt: &Jwt,
    user_id: api::user::Id,
) -> Result<String, AuthError> {
    let expires_at = OffsetDateTime::now_utc() + jwt.expiration_time;
    encode(
        &Header::default(),
        &AuthClaims {
            user_id,
            exp: expires_at.unix_timestamp(),
        },
        &jwt.encoding_key,
    )
    .map_err(|_| AuthError::InvalidToken)
}

#[derive(Debug, Display, From)]
pub enum AuthError {
    #[display("database error: {_0}")]
    #[from]
    DbError(db::Error),
    #[display("missing or invalid token")]
    InvalidToken,
    #[display("wrong login or password")]
    WrongLoginOrPassword,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        Error::from(self).into_response()
    }
}

/// Request-scoped identity taken from the bearer token.
#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
pub struct AuthClaims {
    user_id: api::user::Id,
    exp: i64,
}

impl AuthClaims {
    pub fn user_id(&self) -> api::user::Id {
        self.user_id
    }
}

#[async_trait]
impl FromRequestParts<SharedAppState> for AuthClaims {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut request::Parts,
        state: &SharedAppState,
    ) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) = parts
            .extract::<TypedHeader<Authorization<Bearer>>>()
            .await
            .map_err(|_| AuthError::InvalidToken)?;
        let token_data = decode::<Self>(
            bearer.token(),
            &state.jwt.decoding_key,
            &Validation::default(),
        )
        .map_err(|_| AuthError::InvalidToken)?;

        Ok(token_data.claims)
    }
}
