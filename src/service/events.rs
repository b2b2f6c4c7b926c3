use super::{detach_users, directory, sync_user};
use crate::{
    access::{authorize, authorize_on, Action, Principal},
    blob::{BlobStore, Upload, UploadKind},
    error::{AppError, AppResult},
    models::{Event, EventFilter, EventPatch, EventView, NewEvent, Populated, RegistrationForm},
    store::Store,
};
use chrono::Utc;
use itertools::Itertools;
use uuid::Uuid;

pub async fn list_events(store: &Store, filter: EventFilter) -> AppResult<Vec<EventView<Populated>>> {
    let events = store
        .all::<Event>()
        .await?
        .into_iter()
        .filter(|e| filter.matches(e))
        .sorted_by(|a, b| b.created_at.cmp(&a.created_at))
        .collect_vec();
    let users = directory(store, events.iter().flat_map(|e| e.user_ids()).collect()).await?;
    Ok(events.into_iter().map(|e| e.populate(&users).into()).collect())
}

/// The event and whether `principal` is registered for it.
pub async fn get_event(
    store: &Store,
    principal: Option<&Principal>,
    id: Uuid,
) -> AppResult<(EventView<Populated>, bool)> {
    authorize(principal, Action::ViewEvent, None)?;
    let event = store.get::<Event>(id).await?;
    let registered = principal.map_or(false, |p| event.is_registered(p.id));
    let users = directory(store, event.user_ids()).await?;
    Ok((event.populate(&users).into(), registered))
}

pub async fn create_event(store: &Store, principal: &Principal, data: NewEvent) -> AppResult<EventView> {
    authorize(Some(principal), Action::CreateEvent, None)?;
    data.validate()?;
    let event = data.into_event(principal.id, Utc::now());
    store.create(&event).await?;
    tracing::info!(event = %event.id, by = %principal.id, "created event");
    Ok(event.into())
}

pub async fn update_event(store: &Store, principal: &Principal, id: Uuid, patch: EventPatch) -> AppResult<EventView> {
    let event = store.get::<Event>(id).await?;
    authorize_on(principal, Action::UpdateEvent, &event)?;
    let (event, ()) = store.modify::<Event, _, _>(id, |e| e.apply(patch.clone())).await?;
    Ok(event.into())
}

pub async fn delete_event(store: &Store, principal: &Principal, id: Uuid) -> AppResult<()> {
    let event = store.get::<Event>(id).await?;
    authorize_on(principal, Action::DeleteEvent, &event)?;
    let Some(event) = store.delete::<Event>(id).await? else {
        return Err(AppError::NotFound("Event"));
    };
    let users: Vec<Uuid> = event.registrations.iter().map(|r| r.user).collect();
    detach_users(store, users, |u| u.track_event(id, false)).await;
    tracing::info!(event = %id, by = %principal.id, "deleted event");
    Ok(())
}

pub async fn register_for_event(
    store: &Store,
    principal: &Principal,
    id: Uuid,
    form: RegistrationForm,
) -> AppResult<EventView> {
    authorize(Some(principal), Action::RegisterForEvent, None)?;
    let user = principal.id;
    let now = Utc::now();

    let (event, ()) = store
        .modify::<Event, _, _>(id, |e| e.register(user, form.clone(), now))
        .await?;
    sync_user(store, user, |u| u.track_event(id, true), async {
        store
            .modify::<Event, _, _>(id, |e| Ok(e.unregister(user)))
            .await
            .map(drop)
    })
    .await?;

    tracing::info!(event = %id, %user, "registered for event");
    Ok(event.into())
}

/// Removes the caller's registration. Succeeds when there was none.
pub async fn unregister_from_event(store: &Store, principal: &Principal, id: Uuid) -> AppResult<EventView> {
    authorize(Some(principal), Action::UnregisterFromEvent, None)?;
    let user = principal.id;

    let (event, removed) = store
        .modify::<Event, _, _>(id, |e| {
            let removed = e.registrations.iter().find(|r| r.user == user).cloned();
            e.unregister(user);
            Ok(removed)
        })
        .await?;
    sync_user(store, user, |u| u.track_event(id, false), async {
        match &removed {
            Some(registration) => store
                .modify::<Event, _, _>(id, |e| {
                    if !e.is_registered(user) {
                        e.registrations.push(registration.clone());
                    }
                    Ok(())
                })
                .await
                .map(drop),
            None => Ok(()),
        }
    })
    .await?;

    Ok(event.into())
}

pub async fn upload_event_poster(
    store: &Store,
    blobs: &dyn BlobStore,
    principal: &Principal,
    id: Uuid,
    upload: Option<Upload>,
) -> AppResult<EventView> {
    let event = store.get::<Event>(id).await?;
    authorize_on(principal, Action::UpdateEvent, &event)?;
    let upload = upload.ok_or_else(|| AppError::validation("poster", "please upload a file"))?;

    let url = blobs.store(UploadKind::EventPoster, &upload).await?;
    let (event, ()) = store
        .modify::<Event, _, _>(id, |e| {
            e.poster = url.clone();
            Ok(())
        })
        .await?;
    Ok(event.into())
}
