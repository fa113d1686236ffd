use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use time::OffsetDateTime;

use crate::{
    api,
    db::{
        self,
        ticket::Status,
        user::{self, Role},
    },
    service::{Filter, NewTicket},
};

use super::{caller, AuthClaims, Error, SharedAppState};

type Reply<T> = Result<Json<api::Envelope<T>>, Error>;

fn can_view(my: &db::User, ticket: &db::Ticket) -> bool {
    match my.role {
        Role::Tenant => ticket.created_by == my.id,
        Role::Landlord | Role::Maintenance => true,
    }
}

/// Landlords manage every ticket, staff only the ones assigned to them.
fn can_manage(my: &db::User, ticket: &db::Ticket) -> bool {
    match my.role {
        Role::Landlord => true,
        Role::Maintenance => ticket.assigned_to == Some(my.id),
        Role::Tenant => false,
    }
}

fn ensure_staff(my: &db::User) -> Result<(), Error> {
    match my.role {
        Role::Landlord | Role::Maintenance => Ok(()),
        Role::Tenant => Err(Error::Forbidden("staff only")),
    }
}

fn path_id(
    path: Result<Path<api::ticket::Id>, PathRejection>,
) -> Result<api::ticket::Id, Error> {
    path.map(|Path(id)| id)
        .map_err(|e| Error::BadRequest(e.body_text()))
}

fn body<T>(json: Result<Json<T>, JsonRejection>) -> Result<T, Error> {
    json.map(|Json(input)| input)
        .map_err(|e| Error::BadRequest(e.body_text()))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct CreateTicketInput {
    unit_id: Option<api::ticket::UnitId>,
    #[serde(default)]
    title: String,
    description: Option<String>,
    category: Option<String>,
    priority: Option<String>,
    #[serde(default)]
    attachments: Vec<String>,
}

pub(super) async fn create_ticket(
    State(state): State<SharedAppState>,
    auth_claims: AuthClaims,
    input: Result<Json<CreateTicketInput>, JsonRejection>,
) -> Result<(StatusCode, Json<api::Envelope<api::Ticket>>), Error> {
    let my = caller(&state, &auth_claims).await?;
    if my.role != Role::Tenant {
        return Err(Error::Forbidden("only tenants can file tickets"));
    }
    let input = body(input)?;

    let ticket = state
        .service
        .create_ticket(NewTicket {
            unit_id: input.unit_id,
            created_by: Some(my.id),
            title: input.title,
            description: input.description,
            category: input.category,
            priority: input.priority,
            attachments: input.attachments,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(api::Envelope::ok(ticket.into()))))
}

pub(super) async fn list_my_tickets(
    State(state): State<SharedAppState>,
    auth_claims: AuthClaims,
) -> Reply<Vec<api::Ticket>> {
    let my = caller(&state, &auth_claims).await?;
    let tickets = state.service.list_created(my.id).await?;
    Ok(Json(api::Envelope::ok(
        tickets.into_iter().map(api::Ticket::from).collect(),
    )))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct ListAssignedInput {
    status: Option<String>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    created_since: Option<OffsetDateTime>,
    #[serde(default)]
    overdue_only: bool,
}

pub(super) async fn list_assigned_tickets(
    State(state): State<SharedAppState>,
    auth_claims: AuthClaims,
    query: Result<Query<ListAssignedInput>, QueryRejection>,
) -> Reply<Vec<api::Ticket>> {
    let my = caller(&state, &auth_claims).await?;
    ensure_staff(&my)?;
    let Query(input) = query.map_err(|e| Error::BadRequest(e.body_text()))?;

    let status = input
        .status
        .as_deref()
        .filter(|s| !s.is_empty())
        .map(|s| db::parse_variant::<Status>("status", s))
        .transpose()
        .map_err(|e| Error::BadRequest(e.to_string()))?;
    let filter = Filter {
        status,
        created_since: input.created_since,
        overdue_only: input.overdue_only,
    };

    let tickets = state
        .service
        .list_assigned(my.id, filter)
        .await?
        .map(api::Ticket::from)
        .collect();
    Ok(Json(api::Envelope::ok(tickets)))
}

pub(super) async fn staff_dashboard(
    State(state): State<SharedAppState>,
    auth_claims: AuthClaims,
) -> Reply<api::ticket::DashboardStats> {
    let my = caller(&state, &auth_claims).await?;
    ensure_staff(&my)?;
    let stats = state.service.dashboard_stats(my.id).await?;
    Ok(Json(api::Envelope::ok(stats)))
}

pub(super) async fn get_ticket(
    State(state): State<SharedAppState>,
    auth_claims: AuthClaims,
    id: Result<Path<api::ticket::Id>, PathRejection>,
) -> Reply<api::Ticket> {
    let id = path_id(id)?;
    let my = caller(&state, &auth_claims).await?;
    let ticket = state.service.get_ticket(id).await?;
    if !can_view(&my, &ticket) {
        return Err(Error::Forbidden("ticket belongs to another tenant"));
    }
    Ok(Json(api::Envelope::ok(ticket.into())))
}

#[derive(Deserialize)]
pub(super) struct UpdateStatusInput {
    status: String,
    note: Option<String>,
}

pub(super) async fn update_status(
    State(state): State<SharedAppState>,
    auth_claims: AuthClaims,
    id: Result<Path<api::ticket::Id>, PathRejection>,
    input: Result<Json<UpdateStatusInput>, JsonRejection>,
) -> Reply<api::Ticket> {
    let id = path_id(id)?;
    let UpdateStatusInput { status, note } = body(input)?;
    let my = caller(&state, &auth_claims).await?;

    let ticket = state.service.get_ticket(id).await?;
    if !can_manage(&my, &ticket) {
        return Err(Error::Forbidden(
            "only the landlord or assigned staff can change the status",
        ));
    }

    let ticket = state
        .service
        .update_status(id, my.id, &status, note)
        .await?;
    Ok(Json(api::Envelope::ok(ticket.into())))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct AssignTicketInput {
    assigned_to: user::Id,
}

pub(super) async fn assign_ticket(
    State(state): State<SharedAppState>,
    auth_claims: AuthClaims,
    id: Result<Path<api::ticket::Id>, PathRejection>,
    input: Result<Json<AssignTicketInput>, JsonRejection>,
) -> Reply<api::Ticket> {
    let id = path_id(id)?;
    let AssignTicketInput { assigned_to } = body(input)?;
    let my = caller(&state, &auth_claims).await?;
    if my.role != Role::Landlord {
        return Err(Error::Forbidden("only the landlord can assign tickets"));
    }

    let ticket = state
        .service
        .assign_ticket(id, my.id, assigned_to)
        .await?;
    Ok(Json(api::Envelope::ok(ticket.into())))
}

#[derive(Deserialize)]
pub(super) struct AddCommentInput {
    #[serde(default)]
    note: String,
}

pub(super) async fn add_comment(
    State(state): State<SharedAppState>,
    auth_claims: AuthClaims,
    id: Result<Path<api::ticket::Id>, PathRejection>,
    input: Result<Json<AddCommentInput>, JsonRejection>,
) -> Reply<api::Ticket> {
    let id = path_id(id)?;
    let AddCommentInput { note } = body(input)?;
    let my = caller(&state, &auth_claims).await?;

    let ticket = state.service.get_ticket(id).await?;
    let allowed = match my.role {
        Role::Tenant => ticket.created_by == my.id,
        Role::Landlord | Role::Maintenance => can_manage(&my, &ticket),
    };
    if !allowed {
        return Err(Error::Forbidden("not a participant of this ticket"));
    }

    let ticket = state.service.add_comment(id, my.id, note).await?;
    Ok(Json(api::Envelope::ok(ticket.into())))
}
