//! In-process datastore with the same contract as the PostgreSQL one.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{
    ticket::{self, Status, TimelineEntry, Transition},
    user, Error, Ticket, User,
};

#[derive(Default)]
pub struct Memory {
    tickets: RwLock<HashMap<ticket::Id, Ticket>>,
    users: RwLock<HashMap<user::Id, User>>,
}

impl Memory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_user(&self, user: User) {
        self.users.write().await.insert(user.id, user);
    }

    async fn tickets_where(
        &self,
        predicate: impl Fn(&Ticket) -> bool,
    ) -> Vec<Ticket> {
        let mut tickets = self
            .tickets
            .read()
            .await
            .values()
            .filter(|ticket| predicate(ticket))
            .cloned()
            .collect::<Vec<_>>();
        tickets.sort_by(|a, b| {
            b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id))
        });
        tickets
    }
}

#[async_trait]
impl ticket::Repository for Memory {
    async fn write_ticket(&self, ticket: &Ticket) -> Result<(), Error> {
        self.tickets.write().await.insert(ticket.id, ticket.clone());
        Ok(())
    }

    async fn get_ticket_by_id(
        &self,
        id: ticket::Id,
    ) -> Result<Option<Ticket>, Error> {
        Ok(self.tickets.read().await.get(&id).cloned())
    }

    async fn get_tickets_created_by(
        &self,
        user: user::Id,
    ) -> Result<Vec<Ticket>, Error> {
        Ok(self.tickets_where(|t| t.created_by == user).await)
    }

    async fn get_tickets_assigned_to(
        &self,
        user: user::Id,
    ) -> Result<Vec<Ticket>, Error> {
        Ok(self.tickets_where(|t| t.assigned_to == Some(user)).await)
    }

    async fn apply_transition(
        &self,
        id: ticket::Id,
        transition: &Transition,
    ) -> Result<Option<Ticket>, Error> {
        let mut tickets = self.tickets.write().await;
        Ok(tickets
            .get_mut(&id)
            .filter(|t| t.status != Status::Closed)
            .map(|ticket| {
                transition.apply(ticket);
                ticket.clone()
            }))
    }

    async fn assign_ticket(
        &self,
        id: ticket::Id,
        assignee: user::Id,
        entry: &TimelineEntry,
    ) -> Result<Option<Ticket>, Error> {
        let mut tickets = self.tickets.write().await;
        Ok(tickets
            .get_mut(&id)
            .filter(|t| t.status != Status::Closed)
            .map(|ticket| {
                ticket.assigned_to = Some(assignee);
                ticket.timeline.push(entry.clone());
                ticket.updated_at = entry.at;
                ticket.clone()
            }))
    }

    async fn append_timeline_entry(
        &self,
        id: ticket::Id,
        entry: &TimelineEntry,
    ) -> Result<Option<Ticket>, Error> {
        let mut tickets = self.tickets.write().await;
        Ok(tickets.get_mut(&id).map(|ticket| {
            ticket.timeline.push(entry.clone());
            ticket.updated_at = entry.at;
            ticket.clone()
        }))
    }
}

#[async_trait]
impl user::Repository for Memory {
    async fn get_user_by_id(
        &self,
        id: user::Id,
    ) -> Result<Option<User>, Error> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn get_user_by_login(
        &self,
        login: &str,
    ) -> Result<Option<User>, Error> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .find(|u| u.login == login)
            .cloned())
    }
}
