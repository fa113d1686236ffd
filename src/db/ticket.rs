use async_trait::async_trait;
use constcat::concat;
use enum_utils::{FromStr, TryFromRepr};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tokio_postgres::{types::Json, Error, Row};

use super::{user, Client};

/// Maintenance request filed by a tenant against a rental unit.
#[derive(Clone, Debug, PartialEq)]
pub struct Ticket {
    pub id: Id,
    pub unit_id: UnitId,
    pub created_by: user::Id,
    pub assigned_to: Option<user::Id>,
    pub title: String,
    pub description: String,
    pub category: Category,
    pub priority: Priority,
    pub status: Status,
    pub attachments: Vec<String>,
    pub timeline: Vec<TimelineEntry>,
    pub requested_at: OffsetDateTime,
    pub acknowledged_at: Option<OffsetDateTime>,
    pub resolved_at: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

uuid_id! {
    Id
}

uuid_id! {
    /// Rental unit owned by the property service.
    UnitId
}

#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Deserialize,
    Eq,
    FromStr,
    Hash,
    PartialEq,
    Serialize,
    TryFromRepr,
)]
#[enumeration(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum Category {
    Plumbing = 1,
    Electrical = 2,
    Hvac = 3,
    Appliance = 4,
    #[default]
    General = 5,
}

int2_enum!(Category, "category");

#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Deserialize,
    Eq,
    FromStr,
    Hash,
    PartialEq,
    Serialize,
    TryFromRepr,
)]
#[enumeration(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum Priority {
    Low = 1,
    #[default]
    Medium = 2,
    High = 3,
    Urgent = 4,
}

int2_enum!(Priority, "priority");

#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Deserialize,
    Eq,
    FromStr,
    Hash,
    PartialEq,
    Serialize,
    TryFromRepr,
)]
#[enumeration(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum Status {
    /// Filed by the tenant, nobody has picked it up yet.
    #[default]
    Open = 1,

    /// Staff acknowledged the ticket and is working on it.
    InProgress = 2,

    /// Work is paused, e.g. waiting for parts or tenant access.
    OnHold = 3,

    /// The issue is fixed. May still be closed or reworked.
    Resolved = 4,

    /// Terminal. No further status changes are accepted.
    Closed = 5,
}

int2_enum!(Status, "status");

/// What a timeline entry records.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    Created,
    Open,
    InProgress,
    OnHold,
    Resolved,
    Closed,
    Assigned,
    Comment,
}

impl From<Status> for Action {
    fn from(status: Status) -> Self {
        match status {
            Status::Open => Self::Open,
            Status::InProgress => Self::InProgress,
            Status::OnHold => Self::OnHold,
            Status::Resolved => Self::Resolved,
            Status::Closed => Self::Closed,
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineEntry {
    #[serde(with = "time::serde::rfc3339")]
    pub at: OffsetDateTime,
    pub action: Action,
    pub by_user_id: user::Id,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Status change computed against a ticket snapshot.
///
/// Repositories apply it in a single write that appends to the stored
/// timeline and refuses to touch a ticket that is already closed, so
/// concurrent updates never drop each other's timeline entries.
#[derive(Clone, Debug, PartialEq)]
pub struct Transition {
    pub status: Status,
    pub entry: TimelineEntry,
    /// Only takes effect when the stored ticket has no acknowledgement yet.
    pub acknowledged_at: Option<OffsetDateTime>,
    pub resolved_at: Option<OffsetDateTime>,
}

impl Transition {
    pub fn apply(&self, ticket: &mut Ticket) {
        ticket.status = self.status;
        ticket.timeline.push(self.entry.clone());
        if ticket.acknowledged_at.is_none() {
            ticket.acknowledged_at = self.acknowledged_at;
        }
        if self.resolved_at.is_some() {
            ticket.resolved_at = self.resolved_at;
        }
        ticket.updated_at = self.entry.at;
    }
}

/// Persistence access for maintenance tickets.
///
/// Listing methods return tickets newest first (`created_at` descending,
/// then `id` descending).
#[async_trait]
pub trait Repository: Send + Sync {
    /// Inserts the ticket or replaces a stored one with the same id.
    async fn write_ticket(&self, ticket: &Ticket) -> Result<(), Error>;

    async fn get_ticket_by_id(&self, id: Id) -> Result<Option<Ticket>, Error>;

    async fn get_tickets_created_by(
        &self,
        user: user::Id,
    ) -> Result<Vec<Ticket>, Error>;

    async fn get_tickets_assigned_to(
        &self,
        user: user::Id,
    ) -> Result<Vec<Ticket>, Error>;

    /// Returns `None` if the ticket is missing or already closed.
    async fn apply_transition(
        &self,
        id: Id,
        transition: &Transition,
    ) -> Result<Option<Ticket>, Error>;

    /// Returns `None` if the ticket is missing or already closed.
    async fn assign_ticket(
        &self,
        id: Id,
        assignee: user::Id,
        entry: &TimelineEntry,
    ) -> Result<Option<Ticket>, Error>;

    /// Returns `None` if the ticket is missing.
    async fn append_timeline_entry(
        &self,
        id: Id,
        entry: &TimelineEntry,
    ) -> Result<Option<Ticket>, Error>;
}

const COLUMNS: &str = "\
    id, unit_id, created_by, assigned_to, title, description, \
    category, priority, status, attachments, timeline, \
    requested_at, acknowledged_at, resolved_at, created_at, updated_at";

fn ticket_from_row(row: &Row) -> Result<Ticket, Error> {
    Ok(Ticket {
        id: row.try_get("id")?,
        unit_id: row.try_get("unit_id")?,
        created_by: row.try_get("created_by")?,
        assigned_to: row.try_get("assigned_to")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        category: row.try_get("category")?,
        priority: row.try_get("priority")?,
        status: row.try_get("status")?,
        attachments: row.try_get("attachments")?,
        timeline: row
            .try_get::<_, Json<Vec<TimelineEntry>>>("timeline")?
            .0,
        requested_at: row.try_get("requested_at")?,
        acknowledged_at: row.try_get("acknowledged_at")?,
        resolved_at: row.try_get("resolved_at")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[async_trait]
impl Repository for Client {
    async fn write_ticket(&self, ticket: &Ticket) -> Result<(), Error> {
        const SQL: &str = concat!(
            "INSERT INTO maintenance_tickets (",
            COLUMNS,
            ") \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, \
                     $9, $10, $11, $12, $13, $14, $15, $16) \
             ON CONFLICT (id) DO UPDATE \
             SET assigned_to = EXCLUDED.assigned_to, \
                 title = EXCLUDED.title, \
                 description = EXCLUDED.description, \
                 category = EXCLUDED.category, \
                 priority = EXCLUDED.priority, \
                 status = EXCLUDED.status, \
                 attachments = EXCLUDED.attachments, \
                 timeline = EXCLUDED.timeline, \
                 acknowledged_at = EXCLUDED.acknowledged_at, \
                 resolved_at = EXCLUDED.resolved_at, \
                 updated_at = EXCLUDED.updated_at"
        );

        self.0
            .execute(
                SQL,
                &[
                    &ticket.id,
                    &ticket.unit_id,
                    &ticket.created_by,
                    &ticket.assigned_to,
                    &ticket.title,
                    &ticket.description,
                    &ticket.category,
                    &ticket.priority,
                    &ticket.status,
                    &ticket.attachments,
                    &Json(&ticket.timeline),
                    &ticket.requested_at,
                    &ticket.acknowledged_at,
                    &ticket.resolved_at,
                    &ticket.created_at,
                    &ticket.updated_at,
                ],
            )
            .await
            .map(drop)
    }

    async fn get_ticket_by_id(&self, id: Id) -> Result<Option<Ticket>, Error> {
        const SQL: &str = concat!(
            "SELECT ",
            COLUMNS,
            " FROM maintenance_tickets WHERE id = $1"
        );

        self.0
            .query_opt(SQL, &[&id])
            .await?
            .map(|row| ticket_from_row(&row))
            .transpose()
    }

    async fn get_tickets_created_by(
        &self,
        user: user::Id,
    ) -> Result<Vec<Ticket>, Error> {
        const SQL: &str = concat!(
            "SELECT ",
            COLUMNS,
            " FROM maintenance_tickets \
              WHERE created_by = $1 \
              ORDER BY created_at DESC, \
                       id DESC"
        );

        self.0
            .query(SQL, &[&user])
            .await?
            .iter()
            .map(ticket_from_row)
            .collect()
    }

    async fn get_tickets_assigned_to(
        &self,
        user: user::Id,
    ) -> Result<Vec<Ticket>, Error> {
        const SQL: &str = concat!(
            "SELECT ",
            COLUMNS,
            " FROM maintenance_tickets \
              WHERE assigned_to = $1 \
              ORDER BY created_at DESC, \
                       id DESC"
        );

        self.0
            .query(SQL, &[&user])
            .await?
            .iter()
            .map(ticket_from_row)
            .collect()
    }

    async fn apply_transition(
        &self,
        id: Id,
        transition: &Transition,
    ) -> Result<Option<Ticket>, Error> {
        const SQL: &str = concat!(
            "UPDATE maintenance_tickets \
             SET status = $2, \
                 timeline = timeline || $3::JSONB, \
                 acknowledged_at = COALESCE(acknowledged_at, $4), \
                 resolved_at = COALESCE($5, resolved_at), \
                 updated_at = $6 \
             WHERE id = $1 AND status <> $7 \
             RETURNING ",
            COLUMNS
        );

        self.0
            .query_opt(
                SQL,
                &[
                    &id,
                    &transition.status,
                    &Json(std::slice::from_ref(&transition.entry)),
                    &transition.acknowledged_at,
                    &transition.resolved_at,
                    &transition.entry.at,
                    &Status::Closed,
                ],
            )
            .await?
            .map(|row| ticket_from_row(&row))
            .transpose()
    }

    async fn assign_ticket(
        &self,
        id: Id,
        assignee: user::Id,
        entry: &TimelineEntry,
    ) -> Result<Option<Ticket>, Error> {
        const SQL: &str = concat!(
            "UPDATE maintenance_tickets \
             SET assigned_to = $2, \
                 timeline = timeline || $3::JSONB, \
                 updated_at = $4 \
             WHERE id = $1 AND status <> $5 \
             RETURNING ",
            COLUMNS
        );

        self.0
            .query_opt(
                SQL,
                &[
                    &id,
                    &assignee,
                    &Json(std::slice::from_ref(entry)),
                    &entry.at,
                    &Status::Closed,
                ],
            )
            .await?
            .map(|row| ticket_from_row(&row))
            .transpose()
    }

    async fn append_timeline_entry(
        &self,
        id: Id,
        entry: &TimelineEntry,
    ) -> Result<Option<Ticket>, Error> {
        const SQL: &str = concat!(
            "UPDATE maintenance_tickets \
             SET timeline = timeline || $2::JSONB, \
                 updated_at = $3 \
             WHERE id = $1 \
             RETURNING ",
            COLUMNS
        );

        self.0
            .query_opt(
                SQL,
                &[&id, &Json(std::slice::from_ref(entry)), &entry.at],
            )
            .await?
            .map(|row| ticket_from_row(&row))
            .transpose()
    }
}
