use std::error::Error as StdError;

use argon2::{
    password_hash::{rand_core::OsRng, SaltString},
    Argon2, PasswordHasher as _, PasswordVerifier as _,
};
use async_trait::async_trait;
use enum_utils::{FromStr, TryFromRepr};
use serde::{Deserialize, Serialize};
use tokio_postgres::{
    types::{
        accepts, private::BytesMut, to_sql_checked, FromSql, IsNull, ToSql,
        Type,
    },
    Error, Row,
};

use super::Client;

#[derive(Clone, Debug)]
pub struct User {
    pub id: Id,
    pub name: String,
    pub role: Role,
    pub login: String,
    pub password_hash: PasswordHash,
}

uuid_id! {
    Id
}

#[derive(
    Clone,
    Copy,
    Debug,
    Deserialize,
    Eq,
    FromStr,
    Hash,
    PartialEq,
    Serialize,
    TryFromRepr,
)]
#[enumeration(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Tenant = 1,
    Landlord = 2,
    Maintenance = 3,
}

int2_enum!(Role, "role");

/// Argon2 hash in PHC string format.
#[derive(Clone, Debug, PartialEq)]
pub struct PasswordHash(String);

impl PasswordHash {
    pub fn new(secret: &str) -> Result<Self, argon2::password_hash::Error> {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(secret.as_bytes(), &salt)
            .map(|hash| Self(hash.to_string()))
    }

    pub fn verify(&self, secret: &str) -> bool {
        match argon2::PasswordHash::new(&self.0) {
            Ok(parsed) => Argon2::default()
                .verify_password(secret.as_bytes(), &parsed)
                .is_ok(),
            Err(e) => {
                tracing::warn!("stored password hash is malformed: {e}");
                false
            }
        }
    }
}

impl FromSql<'_> for PasswordHash {
    accepts!(TEXT);

    fn from_sql(
        ty: &Type,
        raw: &[u8],
    ) -> Result<Self, Box<dyn StdError + Sync + Send>> {
        String::from_sql(ty, raw).map(Self)
    }
}

impl ToSql for PasswordHash {
    accepts!(TEXT);

    to_sql_checked!();

    fn to_sql(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> Result<IsNull, Box<dyn StdError + Sync + Send>> {
        self.0.to_sql(ty, out)
    }
}

/// Read access to users. Accounts are managed by the auth provider.
#[async_trait]
pub trait Repository: Send + Sync {
    async fn get_user_by_id(&self, id: Id) -> Result<Option<User>, Error>;

    async fn get_user_by_login(
        &self,
        login: &str,
    ) -> Result<Option<User>, Error>;
}

fn user_from_row(row: &Row) -> Result<User, Error> {
    Ok(User {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        login: row.try_get("login")?,
        password_hash: row.try_get("password_hash")?,
        role: row.try_get("role")?,
    })
}

#[async_trait]
impl Repository for Client {
    async fn get_user_by_id(&self, id: Id) -> Result<Option<User>, Error> {
        const SQL: &str = "SELECT id, name, login, password_hash, role \
                           FROM users \
                           WHERE id = $1 \
                           LIMIT 1";
        self.0
            .query_opt(SQL, &[&id])
            .await?
            .map(|row| user_from_row(&row))
            .transpose()
    }

    async fn get_user_by_login(
        &self,
        login: &str,
    ) -> Result<Option<User>, Error> {
        const SQL: &str = "SELECT id, name, login, password_hash, role \
                           FROM users \
                           WHERE login = $1 \
                           LIMIT 1";
        self.0
            .query_opt(SQL, &[&login])
            .await?
            .map(|row| user_from_row(&row))
            .transpose()
    }
}
