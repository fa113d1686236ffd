//! Maintenance ticket lifecycle.
//!
//! The free functions hold the rules and take `now` explicitly. [`Service`]
//! runs them against a datastore. Callers are expected to have authorized
//! the acting user already.

use std::{str::FromStr, sync::Arc, time::Duration};

use derive_more::{Display, From};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{
    config,
    db::{
        self,
        ticket::{
            self, Action, Category, Priority, Repository as _, Status,
            TimelineEntry, Transition, UnitId,
        },
        user::{self, Repository as _, Role},
        Db, Ticket,
    },
};

#[derive(Debug, Display, From)]
pub enum Error {
    #[display("database error: {_0}")]
    #[from]
    Db(db::Error),
    #[display("{_0}")]
    Validation(String),
    #[display("ticket not found")]
    NotFound,
    #[display("{_0}")]
    InvalidTransition(String),
}

impl std::error::Error for Error {}

#[derive(Clone, Copy, Debug)]
pub struct Policy {
    pub overdue_after: Duration,
    pub overdue_excludes_closed: bool,
}

impl Default for Policy {
    fn default() -> Self {
        config::Maintenance::default().into()
    }
}

impl From<config::Maintenance> for Policy {
    fn from(config: config::Maintenance) -> Self {
        Self {
            overdue_after: config.overdue_after,
            overdue_excludes_closed: config.overdue_excludes_closed,
        }
    }
}

impl Policy {
    /// Anything not RESOLVED and older than `overdue_after`.
    ///
    /// CLOSED tickets are included unless `overdue_excludes_closed` is set.
    pub fn is_overdue(&self, ticket: &Ticket, now: OffsetDateTime) -> bool {
        let settled = match ticket.status {
            Status::Resolved => true,
            Status::Closed => self.overdue_excludes_closed,
            Status::Open | Status::InProgress | Status::OnHold => false,
        };
        !settled && now - ticket.created_at > self.overdue_after
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct Filter {
    pub status: Option<Status>,
    pub created_since: Option<OffsetDateTime>,
    pub overdue_only: bool,
}

impl Filter {
    pub fn matches(
        &self,
        ticket: &Ticket,
        policy: &Policy,
        now: OffsetDateTime,
    ) -> bool {
        self.status.map_or(true, |s| ticket.status == s)
            && self.created_since.map_or(true, |t| ticket.created_at >= t)
            && (!self.overdue_only || policy.is_overdue(ticket, now))
    }
}

#[derive(
    Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize,
)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_assigned: usize,
    pub open: usize,
    pub in_progress: usize,
    pub on_hold: usize,
    pub resolved: usize,
    pub closed: usize,
    pub overdue: usize,
}

impl DashboardStats {
    pub fn from_tickets<'a>(
        tickets: impl IntoIterator<Item = &'a Ticket>,
        policy: &Policy,
        now: OffsetDateTime,
    ) -> Self {
        tickets.into_iter().fold(Self::default(), |mut stats, ticket| {
            stats.total_assigned += 1;
            match ticket.status {
                Status::Open => stats.open += 1,
                Status::InProgress => stats.in_progress += 1,
                Status::OnHold => stats.on_hold += 1,
                Status::Resolved => stats.resolved += 1,
                Status::Closed => stats.closed += 1,
            }
            if policy.is_overdue(ticket, now) {
                stats.overdue += 1;
            }
            stats
        })
    }
}

/// Ticket creation request.
///
/// `category` and `priority` are wire names; absent or blank ones fall back
/// to the defaults.
#[derive(Clone, Debug, Default)]
pub struct NewTicket {
    pub unit_id: Option<UnitId>,
    pub created_by: Option<user::Id>,
    pub title: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub priority: Option<String>,
    pub attachments: Vec<String>,
}

fn parse_or_default<T>(
    kind: &'static str,
    value: Option<&str>,
) -> Result<T, Error>
where
    T: Default + FromStr<Err = ()>,
{
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(|v| db::parse_variant(kind, v))
        .transpose()
        .map(Option::unwrap_or_default)
        .map_err(|e| Error::Validation(e.to_string()))
}

pub fn new_ticket(
    input: NewTicket,
    now: OffsetDateTime,
) -> Result<Ticket, Error> {
    use Error as E;

    let unit_id = input
        .unit_id
        .ok_or_else(|| E::Validation("unitId is required".to_owned()))?;
    let created_by = input
        .created_by
        .ok_or_else(|| E::Validation("createdBy is required".to_owned()))?;
    let title = input.title.trim();
    if title.is_empty() {
        return Err(E::Validation("title must not be empty".to_owned()));
    }
    let category =
        parse_or_default::<Category>("category", input.category.as_deref())?;
    let priority =
        parse_or_default::<Priority>("priority", input.priority.as_deref())?;

    Ok(Ticket {
        id: ticket::Id::new(),
        unit_id,
        created_by,
        assigned_to: None,
        title: title.to_owned(),
        description: input.description.unwrap_or_default(),
        category,
        priority,
        status: Status::Open,
        attachments: input.attachments,
        timeline: vec![TimelineEntry {
            at: now,
            action: Action::Created,
            by_user_id: created_by,
            note: None,
        }],
        requested_at: now,
        acknowledged_at: None,
        resolved_at: None,
        created_at: now,
        updated_at: now,
    })
}

/// Validates a status change against `ticket` and computes its effect.
pub fn plan_transition(
    ticket: &Ticket,
    actor: user::Id,
    new_status: &str,
    note: Option<String>,
    now: OffsetDateTime,
) -> Result<Transition, Error> {
    use Error as E;

    if ticket.status == Status::Closed {
        return Err(E::InvalidTransition("ticket is closed".to_owned()));
    }
    let status = db::parse_variant::<Status>("status", new_status.trim())
        .map_err(|e| E::InvalidTransition(e.to_string()))?;
    if status == Status::Open {
        return Err(E::InvalidTransition(
            "status cannot be changed back to OPEN".to_owned(),
        ));
    }

    Ok(Transition {
        status,
        entry: TimelineEntry {
            at: now,
            action: status.into(),
            by_user_id: actor,
            note: note.filter(|n| !n.trim().is_empty()),
        },
        acknowledged_at: (status == Status::InProgress
            && ticket.acknowledged_at.is_none())
        .then_some(now),
        resolved_at: (status == Status::Resolved).then_some(now),
    })
}

#[derive(Clone)]
pub struct Service {
    db: Arc<dyn Db>,
    policy: Policy,
}

impl Service {
    pub fn new(db: Arc<dyn Db>, policy: Policy) -> Self {
        Self { db, policy }
    }

    pub async fn create_ticket(
        &self,
        input: NewTicket,
    ) -> Result<Ticket, Error> {
        let ticket = new_ticket(input, OffsetDateTime::now_utc())?;
        self.db.write_ticket(&ticket).await?;
        tracing::info!(
            ticket_id = %ticket.id,
            unit_id = %ticket.unit_id,
            created_by = %ticket.created_by,
            "maintenance ticket filed",
        );
        Ok(ticket)
    }

    pub async fn get_ticket(&self, id: ticket::Id) -> Result<Ticket, Error> {
        self.db.get_ticket_by_id(id).await?.ok_or(Error::NotFound)
    }

    pub async fn update_status(
        &self,
        id: ticket::Id,
        actor: user::Id,
        new_status: &str,
        note: Option<String>,
    ) -> Result<Ticket, Error> {
        let ticket = self.get_ticket(id).await?;
        let transition = plan_transition(
            &ticket,
            actor,
            new_status,
            note,
            OffsetDateTime::now_utc(),
        )?;

        match self.db.apply_transition(id, &transition).await? {
            Some(updated) => {
                tracing::info!(
                    ticket_id = %id,
                    actor = %actor,
                    from = ?ticket.status,
                    to = ?updated.status,
                    "maintenance ticket status changed",
                );
                Ok(updated)
            }
            None => Err(self.rejected_write(id).await),
        }
    }

    pub async fn assign_ticket(
        &self,
        id: ticket::Id,
        actor: user::Id,
        assignee: user::Id,
    ) -> Result<Ticket, Error> {
        let ticket = self.get_ticket(id).await?;
        if ticket.status == Status::Closed {
            return Err(Error::InvalidTransition("ticket is closed".to_owned()));
        }
        match self.db.get_user_by_id(assignee).await? {
            Some(user) if user.role == Role::Maintenance => {}
            _ => {
                return Err(Error::Validation(
                    "assignee must be a maintenance staff member".to_owned(),
                ))
            }
        }

        let entry = TimelineEntry {
            at: OffsetDateTime::now_utc(),
            action: Action::Assigned,
            by_user_id: actor,
            note: Some(assignee.to_string()),
        };
        match self.db.assign_ticket(id, assignee, &entry).await? {
            Some(updated) => {
                tracing::info!(
                    ticket_id = %id,
                    actor = %actor,
                    assignee = %assignee,
                    "maintenance ticket assigned",
                );
                Ok(updated)
            }
            None => Err(self.rejected_write(id).await),
        }
    }

    pub async fn add_comment(
        &self,
        id: ticket::Id,
        actor: user::Id,
        note: String,
    ) -> Result<Ticket, Error> {
        if note.trim().is_empty() {
            return Err(Error::Validation("note must not be empty".to_owned()));
        }
        let entry = TimelineEntry {
            at: OffsetDateTime::now_utc(),
            action: Action::Comment,
            by_user_id: actor,
            note: Some(note),
        };
        self.db
            .append_timeline_entry(id, &entry)
            .await?
            .ok_or(Error::NotFound)
    }

    pub async fn list_created(
        &self,
        creator: user::Id,
    ) -> Result<Vec<Ticket>, Error> {
        Ok(self.db.get_tickets_created_by(creator).await?)
    }

    /// Tickets assigned to `staff` that match `filter`, newest first.
    ///
    /// Each call queries the datastore again.
    pub async fn list_assigned(
        &self,
        staff: user::Id,
        filter: Filter,
    ) -> Result<impl Iterator<Item = Ticket> + Send, Error> {
        let policy = self.policy;
        let now = OffsetDateTime::now_utc();
        let tickets = self.db.get_tickets_assigned_to(staff).await?;
        Ok(tickets
            .into_iter()
            .filter(move |ticket| filter.matches(ticket, &policy, now)))
    }

    pub async fn dashboard_stats(
        &self,
        staff: user::Id,
    ) -> Result<DashboardStats, Error> {
        let now = OffsetDateTime::now_utc();
        let tickets = self.db.get_tickets_assigned_to(staff).await?;
        Ok(DashboardStats::from_tickets(&tickets, &self.policy, now))
    }

    /// Explains why a guarded write matched no row.
    async fn rejected_write(&self, id: ticket::Id) -> Error {
        match self.db.get_ticket_by_id(id).await {
            Ok(Some(_)) => {
                Error::InvalidTransition("ticket is closed".to_owned())
            }
            Ok(None) => Error::NotFound,
            Err(e) => e.into(),
        }
    }
}
