//! Checks every `ticket::Repository` implementation must pass.

use time::{macros::datetime, Duration, OffsetDateTime};
use vasudha::{
    db::{
        ticket::{
            Action, Category, Priority, Repository, Status, TimelineEntry,
            Transition, UnitId,
        },
        user, Ticket,
    },
    service::{self, NewTicket},
};

/// Whole seconds, so timestamps survive a `TIMESTAMPTZ` round trip.
pub const NOW: OffsetDateTime = datetime!(2024-05-20 12:00 UTC);

/// Users the checks act as. Datastores with foreign keys must know them.
pub struct Cast {
    pub tenant: user::Id,
    pub landlord: user::Id,
    pub staff: user::Id,
}

fn filed_by(tenant: user::Id, at: OffsetDateTime) -> Ticket {
    service::new_ticket(
        NewTicket {
            unit_id: Some(UnitId::from(100)),
            created_by: Some(tenant),
            title: "Leaky faucet".to_owned(),
            ..Default::default()
        },
        at,
    )
    .unwrap()
}

fn plan(
    ticket: &Ticket,
    actor: user::Id,
    status: &str,
    at: OffsetDateTime,
) -> Transition {
    service::plan_transition(ticket, actor, status, None, at).unwrap()
}

async fn stored(store: &impl Repository, ticket: &Ticket) -> Ticket {
    store.get_ticket_by_id(ticket.id).await.unwrap().unwrap()
}

pub async fn round_trips_every_column(store: &impl Repository, cast: &Cast) {
    let mut ticket = filed_by(cast.tenant, NOW);
    ticket.assigned_to = Some(cast.staff);
    ticket.description = "Drips all night".to_owned();
    ticket.category = Category::Hvac;
    ticket.priority = Priority::Urgent;
    ticket.attachments = vec!["sink.jpg".to_owned(), "pipe.jpg".to_owned()];
    store.write_ticket(&ticket).await.unwrap();
    assert_eq!(stored(store, &ticket).await, ticket);

    ticket.status = Status::OnHold;
    ticket.acknowledged_at = Some(NOW + Duration::hours(1));
    ticket.updated_at = NOW + Duration::hours(1);
    store.write_ticket(&ticket).await.unwrap();
    assert_eq!(stored(store, &ticket).await, ticket);
}

pub async fn refuses_transition_once_closed(
    store: &impl Repository,
    cast: &Cast,
) {
    let ticket = filed_by(cast.tenant, NOW);
    store.write_ticket(&ticket).await.unwrap();

    // Both plans are computed from the same OPEN snapshot.
    let close = plan(&ticket, cast.landlord, "CLOSED", NOW);
    let resolve = plan(&ticket, cast.staff, "RESOLVED", NOW);

    let closed = store.apply_transition(ticket.id, &close).await.unwrap();
    assert_eq!(closed.map(|t| t.status), Some(Status::Closed));
    let late = store.apply_transition(ticket.id, &resolve).await.unwrap();
    assert_eq!(late, None);

    let stored = stored(store, &ticket).await;
    assert_eq!(stored.status, Status::Closed);
    assert_eq!(stored.resolved_at, None);
    assert_eq!(stored.timeline.len(), 2);
}

pub async fn concurrent_transitions_keep_both_entries(
    store: &impl Repository,
    cast: &Cast,
) {
    let ticket = filed_by(cast.tenant, NOW);
    store.write_ticket(&ticket).await.unwrap();

    let hold = plan(&ticket, cast.landlord, "ON_HOLD", NOW);
    let start = plan(&ticket, cast.staff, "IN_PROGRESS", NOW);
    let (held, started) = tokio::join!(
        store.apply_transition(ticket.id, &hold),
        store.apply_transition(ticket.id, &start),
    );
    assert!(held.unwrap().is_some());
    assert!(started.unwrap().is_some());

    let stored = stored(store, &ticket).await;
    let mut actions =
        stored.timeline.iter().map(|e| e.action).collect::<Vec<_>>();
    assert_eq!(actions.remove(0), Action::Created);
    actions.sort_by_key(|action| *action == Action::InProgress);
    assert_eq!(actions, [Action::OnHold, Action::InProgress]);
}

pub async fn acknowledges_only_once(store: &impl Repository, cast: &Cast) {
    let ticket = filed_by(cast.tenant, NOW);
    store.write_ticket(&ticket).await.unwrap();

    let start = plan(&ticket, cast.staff, "IN_PROGRESS", NOW);
    store.apply_transition(ticket.id, &start).await.unwrap();
    let later = NOW + Duration::hours(1);
    let hold = plan(&ticket, cast.staff, "ON_HOLD", later);
    store.apply_transition(ticket.id, &hold).await.unwrap();

    // Planned from the unacknowledged snapshot, so it carries a timestamp.
    let latest = NOW + Duration::hours(2);
    let restart = plan(&ticket, cast.staff, "IN_PROGRESS", latest);
    assert_eq!(restart.acknowledged_at, Some(latest));
    let updated = store
        .apply_transition(ticket.id, &restart)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(updated.status, Status::InProgress);
    assert_eq!(updated.acknowledged_at, Some(NOW));
    assert_eq!(updated.updated_at, latest);
    assert_eq!(updated.timeline.len(), 4);
}

pub async fn assigns_until_closed(store: &impl Repository, cast: &Cast) {
    let ticket = filed_by(cast.tenant, NOW);
    store.write_ticket(&ticket).await.unwrap();

    let entry = TimelineEntry {
        at: NOW,
        action: Action::Assigned,
        by_user_id: cast.landlord,
        note: Some(cast.staff.to_string()),
    };
    let assigned = store
        .assign_ticket(ticket.id, cast.staff, &entry)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(assigned.assigned_to, Some(cast.staff));
    assert_eq!(assigned.timeline.last(), Some(&entry));

    let close = plan(&assigned, cast.landlord, "CLOSED", NOW);
    store.apply_transition(ticket.id, &close).await.unwrap();
    let refused = store
        .assign_ticket(ticket.id, cast.landlord, &entry)
        .await
        .unwrap();
    assert_eq!(refused, None);
    assert_eq!(stored(store, &ticket).await.assigned_to, Some(cast.staff));
}

pub async fn comments_on_any_ticket(store: &impl Repository, cast: &Cast) {
    let ticket = filed_by(cast.tenant, NOW);
    store.write_ticket(&ticket).await.unwrap();
    let close = plan(&ticket, cast.landlord, "CLOSED", NOW);
    store.apply_transition(ticket.id, &close).await.unwrap();

    let entry = TimelineEntry {
        at: NOW + Duration::minutes(5),
        action: Action::Comment,
        by_user_id: cast.tenant,
        note: Some("Thanks".to_owned()),
    };
    let commented = store
        .append_timeline_entry(ticket.id, &entry)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(commented.status, Status::Closed);
    assert_eq!(commented.timeline.len(), 3);
    assert_eq!(commented.timeline[2], entry);

    let missing = filed_by(cast.tenant, NOW);
    let result = store.append_timeline_entry(missing.id, &entry).await;
    assert_eq!(result.unwrap(), None);
}

pub async fn lists_newest_first(store: &impl Repository, cast: &Cast) {
    let mut ids = Vec::new();
    for days in [3, 1, 2] {
        let mut ticket = filed_by(cast.tenant, NOW - Duration::days(days));
        ticket.assigned_to = Some(cast.staff);
        store.write_ticket(&ticket).await.unwrap();
        ids.push(ticket.id);
    }
    let expected = [ids[1], ids[2], ids[0]];

    let created = store.get_tickets_created_by(cast.tenant).await.unwrap();
    let created = created.iter().map(|t| t.id).collect::<Vec<_>>();
    assert_eq!(created, expected);

    let assigned = store.get_tickets_assigned_to(cast.staff).await.unwrap();
    let assigned = assigned.iter().map(|t| t.id).collect::<Vec<_>>();
    assert_eq!(assigned, expected);
}
