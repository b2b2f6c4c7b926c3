use super::directory;
use crate::{
    access::{authorize, authorize_on, Action, Principal},
    blob::{BlobStore, Upload, UploadKind},
    error::{AppError, AppResult},
    models::{ClaimStatus, ItemFilter, ItemPatch, LostFoundItem, NewItem, Populated, MAX_ITEM_IMAGES},
    store::Store,
};
use chrono::Utc;
use itertools::Itertools;
use uuid::Uuid;

async fn store_images(blobs: &dyn BlobStore, uploads: &[Upload]) -> AppResult<Vec<String>> {
    if uploads.len() > MAX_ITEM_IMAGES {
        return Err(AppError::validation(
            "images",
            format!("at most {MAX_ITEM_IMAGES} images can be uploaded at once"),
        ));
    }
    let mut urls = Vec::with_capacity(uploads.len());
    for upload in uploads {
        urls.push(blobs.store(UploadKind::LostFoundImage, upload).await?);
    }
    Ok(urls)
}

pub async fn list_items(store: &Store, filter: ItemFilter) -> AppResult<Vec<LostFoundItem<Populated>>> {
    let items = store
        .all::<LostFoundItem>()
        .await?
        .into_iter()
        .filter(|i| filter.matches(i))
        .sorted_by(|a, b| b.created_at.cmp(&a.created_at))
        .collect_vec();
    let users = directory(store, items.iter().flat_map(|i| i.user_ids()).collect()).await?;
    Ok(items.into_iter().map(|i| i.populate(&users)).collect())
}

pub async fn get_item(store: &Store, id: Uuid) -> AppResult<LostFoundItem<Populated>> {
    authorize(None, Action::ViewItem, None)?;
    let item = store.get::<LostFoundItem>(id).await?;
    let users = directory(store, item.user_ids()).await?;
    Ok(item.populate(&users))
}

pub async fn create_item(
    store: &Store,
    blobs: &dyn BlobStore,
    principal: &Principal,
    data: NewItem,
    uploads: Vec<Upload>,
) -> AppResult<LostFoundItem> {
    authorize(Some(principal), Action::ReportItem, None)?;
    data.validate()?;
    let images = store_images(blobs, &uploads).await?;

    let item = data.into_item(principal.id, images, Utc::now());
    store.create(&item).await?;
    tracing::info!(item = %item.id, kind = ?item.kind, by = %principal.id, "reported item");
    Ok(item)
}

pub async fn update_item(
    store: &Store,
    blobs: &dyn BlobStore,
    principal: &Principal,
    id: Uuid,
    patch: ItemPatch,
    uploads: Vec<Upload>,
) -> AppResult<LostFoundItem> {
    let item = store.get::<LostFoundItem>(id).await?;
    authorize_on(principal, Action::UpdateItem, &item)?;
    let images = store_images(blobs, &uploads).await?;

    let (item, ()) = store
        .modify::<LostFoundItem, _, _>(id, |i| i.apply(patch.clone(), images.clone()))
        .await?;
    Ok(item)
}

pub async fn delete_item(store: &Store, principal: &Principal, id: Uuid) -> AppResult<()> {
    let item = store.get::<LostFoundItem>(id).await?;
    authorize_on(principal, Action::DeleteItem, &item)?;
    store.delete::<LostFoundItem>(id).await?;
    tracing::info!(item = %id, by = %principal.id, "deleted item");
    Ok(())
}

pub async fn claim_item(store: &Store, principal: &Principal, id: Uuid, message: String) -> AppResult<LostFoundItem> {
    authorize(Some(principal), Action::ClaimItem, None)?;
    let now = Utc::now();
    let (item, ()) = store
        .modify::<LostFoundItem, _, _>(id, |i| i.claim(principal.id, message.clone(), now))
        .await?;
    tracing::info!(item = %id, by = %principal.id, "claim submitted");
    Ok(item)
}

pub async fn update_claim_status(
    store: &Store,
    principal: &Principal,
    item: Uuid,
    claim: Uuid,
    status: ClaimStatus,
) -> AppResult<LostFoundItem> {
    authorize(Some(principal), Action::ReviewClaim, None)?;
    let (item, ()) = store
        .modify::<LostFoundItem, _, _>(item, |i| i.decide_claim(claim, status))
        .await?;
    tracing::info!(item = %item.id, %claim, ?status, "claim decided");
    Ok(item)
}
