#[macro_use]
mod macros;

pub mod memory;
pub mod ticket;
pub mod user;

use std::str::FromStr;

use tokio_postgres::{tls::NoTlsStream, NoTls, Socket};

use crate::config;

pub use tokio_postgres::Error;

pub use self::{memory::Memory, ticket::Ticket, user::User};

pub type Connection = tokio_postgres::Connection<Socket, NoTlsStream>;

pub async fn connect(
    config: config::Db,
) -> Result<(Client, Connection), Error> {
    tokio_postgres::connect(&config.url, NoTls)
        .await
        .map(|(client, connection)| (Client(client), connection))
}

/// PostgreSQL datastore.
pub struct Client(tokio_postgres::Client);

/// Everything the HTTP layer needs from a datastore.
pub trait Db: ticket::Repository + user::Repository {}

impl<T: ticket::Repository + user::Repository> Db for T {}

/// A wire value that names no variant of an enum.
#[derive(Clone, Debug, derive_more::Display, Eq, PartialEq)]
#[display("unknown {kind} `{value}`")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

impl std::error::Error for UnknownVariant {}

/// Parses the SCREAMING_SNAKE_CASE wire name of a `kind` enum.
pub fn parse_variant<T>(
    kind: &'static str,
    value: &str,
) -> Result<T, UnknownVariant>
where
    T: FromStr<Err = ()>,
{
    value.parse().map_err(|()| UnknownVariant {
        kind,
        value: value.to_owned(),
    })
}
