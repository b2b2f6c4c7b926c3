use super::directory;
use crate::{
    access::{authorize, authorize_on, Action, Principal},
    error::AppResult,
    models::{ticket_code, FeedbackFilter, FeedbackTicket, NewFeedback, Triage},
    store::Store,
};
use chrono::{Datelike, Utc};
use itertools::Itertools;
use serde_json::Value;
use uuid::Uuid;

fn newest_first(tickets: Vec<FeedbackTicket>, keep: impl Fn(&FeedbackTicket) -> bool) -> Vec<FeedbackTicket> {
    tickets
        .into_iter()
        .filter(|t| keep(t))
        .sorted_by(|a, b| b.created_at.cmp(&a.created_at))
        .collect()
}

async fn present(store: &Store, ticket: &FeedbackTicket, viewer: &Principal) -> AppResult<Value> {
    let users = directory(store, ticket.user_ids()).await?;
    ticket.present(viewer, &users)
}

async fn present_all(store: &Store, tickets: Vec<FeedbackTicket>, viewer: &Principal) -> AppResult<Vec<Value>> {
    let users = directory(store, tickets.iter().flat_map(|t| t.user_ids()).collect()).await?;
    tickets.iter().map(|t| t.present(viewer, &users)).collect()
}

pub async fn create_feedback(store: &Store, principal: &Principal, data: NewFeedback) -> AppResult<Value> {
    authorize(Some(principal), Action::SubmitFeedback, None)?;
    data.validate()?;

    let now = Utc::now();
    let year = now.year();
    let sequence = store.next_in_sequence(&format!("feedback-{year}")).await?;
    let ticket = data.into_ticket(ticket_code(year, sequence), principal.id, now);
    store.create(&ticket).await?;

    tracing::info!(ticket = %ticket.ticket_code, category = ?ticket.category, "feedback submitted");
    present(store, &ticket, principal).await
}

pub async fn list_my_feedback(store: &Store, principal: &Principal) -> AppResult<Vec<Value>> {
    authorize(Some(principal), Action::ListOwnFeedback, None)?;
    let tickets = newest_first(store.all().await?, |t| t.submitted_by == principal.id);
    present_all(store, tickets, principal).await
}

pub async fn list_all_feedback(store: &Store, principal: &Principal, filter: FeedbackFilter) -> AppResult<Vec<Value>> {
    authorize(Some(principal), Action::ListAllFeedback, None)?;
    let tickets = newest_first(store.all().await?, |t| filter.matches(t));
    present_all(store, tickets, principal).await
}

pub async fn get_feedback(store: &Store, principal: &Principal, id: Uuid) -> AppResult<Value> {
    let ticket = store.get::<FeedbackTicket>(id).await?;
    authorize_on(principal, Action::ViewFeedback, &ticket)?;
    present(store, &ticket, principal).await
}

pub async fn update_feedback_status(store: &Store, principal: &Principal, id: Uuid, triage: Triage) -> AppResult<Value> {
    authorize(Some(principal), Action::TriageFeedback, None)?;
    let (ticket, ()) = store
        .modify::<FeedbackTicket, _, _>(id, |t| {
            t.triage(triage.clone());
            Ok(())
        })
        .await?;
    tracing::info!(ticket = %ticket.ticket_code, status = ?ticket.status, "feedback triaged");
    present(store, &ticket, principal).await
}

pub async fn respond_to_feedback(store: &Store, principal: &Principal, id: Uuid, message: String) -> AppResult<Value> {
    authorize(Some(principal), Action::RespondToFeedback, None)?;
    let now = Utc::now();
    let (ticket, ()) = store
        .modify::<FeedbackTicket, _, _>(id, |t| t.respond(principal.id, message.clone(), now))
        .await?;
    present(store, &ticket, principal).await
}

pub async fn rate_feedback(store: &Store, principal: &Principal, id: Uuid, rating: u8) -> AppResult<Value> {
    let ticket = store.get::<FeedbackTicket>(id).await?;
    authorize_on(principal, Action::RateFeedback, &ticket)?;
    let (ticket, ()) = store
        .modify::<FeedbackTicket, _, _>(id, |t| t.rate(rating))
        .await?;
    present(store, &ticket, principal).await
}
