use crate::{
    blob::{Upload, UploadKind},
    error::{AppError, AppResult},
};
use axum::{
    body::Bytes,
    extract::multipart::{Field, MultipartError},
    routing::get,
    Router,
};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};

pub mod announcements;
pub mod auth;
pub mod clubs;
pub mod events;
pub mod extract;
pub mod feedback;
pub mod lost_found;
pub mod users;

pub use extract::{Json, Multipart, Path, Query};

/// Largest accepted text field in a multipart form.
const MAX_TEXT_FIELD: usize = 16 * 1024;

/// `{success, count, data}` body of every list route.
#[derive(Serialize)]
pub struct ListResponse<T> {
    success: bool,
    count: usize,
    data: Vec<T>,
}

pub fn list<T: Serialize>(data: Vec<T>) -> Json<ListResponse<T>> {
    Json(ListResponse {
        success: true,
        count: data.len(),
        data,
    })
}

#[derive(Serialize)]
pub struct DataResponse<T> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'static str>,
    data: T,
}

pub fn data<T: Serialize>(data: T) -> Json<DataResponse<T>> {
    Json(DataResponse {
        success: true,
        message: None,
        data,
    })
}

pub fn data_with_message<T: Serialize>(message: &'static str, data: T) -> Json<DataResponse<T>> {
    Json(DataResponse {
        success: true,
        message: Some(message),
        data,
    })
}

#[derive(Serialize)]
pub struct MessageResponse {
    success: bool,
    message: &'static str,
}

pub fn message(message: &'static str) -> Json<MessageResponse> {
    Json(MessageResponse {
        success: true,
        message,
    })
}

/// A multipart body split into text fields and files.
#[derive(Default)]
pub struct Form {
    fields: Map<String, Value>,
    files: Vec<(String, Upload)>,
}

impl Form {
    /// Reads the whole form, holding at most `max_files` files of `kind`.
    /// Reading stops as soon as a file passes the size limit of `kind`.
    pub async fn read(Multipart(mut multipart): Multipart, kind: UploadKind, max_files: usize) -> AppResult<Form> {
        let mut form = Form::default();
        while let Some(mut field) = multipart.next_field().await.map_err(malformed)? {
            let name = field.name().unwrap_or_default().to_string();
            match field.file_name().map(str::to_string) {
                Some(file_name) => {
                    if form.files.len() == max_files {
                        return Err(AppError::validation(
                            "file",
                            format!("at most {max_files} files can be uploaded at once"),
                        ));
                    }
                    let content = read_capped(&mut field, kind.max_bytes())
                        .await?
                        .ok_or_else(|| kind.too_large())?;
                    form.files.push((name, Upload { file_name, content }));
                }
                None => {
                    let text = read_capped(&mut field, MAX_TEXT_FIELD)
                        .await?
                        .ok_or_else(|| AppError::validation("body", format!("{name} is too long")))?;
                    let text = String::from_utf8(text.to_vec())
                        .map_err(|_| AppError::validation("body", format!("{name} is not valid text")))?;
                    form.fields.insert(name, Value::String(text));
                }
            }
        }
        Ok(form)
    }

    pub fn files(&mut self, name: &str) -> Vec<Upload> {
        let (picked, rest) = std::mem::take(&mut self.files)
            .into_iter()
            .partition::<Vec<_>, _>(|(field, _)| field == name);
        self.files = rest;
        picked.into_iter().map(|(_, upload)| upload).collect()
    }

    pub fn file(&mut self, name: &str) -> Option<Upload> {
        self.files(name).into_iter().next()
    }

    pub fn text(&self, name: &str) -> Option<String> {
        self.fields
            .get(name)
            .and_then(Value::as_str)
            .map(str::to_string)
    }

    /// Reads the text fields as if they had been sent as a JSON object of
    /// strings.
    pub fn parse<T: DeserializeOwned>(&self) -> AppResult<T> {
        serde_json::from_value(Value::Object(self.fields.clone()))
            .map_err(|e| AppError::validation("body", e.to_string()))
    }
}

fn malformed(err: MultipartError) -> AppError {
    AppError::validation("file", err.to_string())
}

/// The field's content, or `None` once it grows past `limit` bytes.
async fn read_capped(field: &mut Field<'_>, limit: usize) -> AppResult<Option<Bytes>> {
    let mut content = Vec::new();
    while let Some(chunk) = field.chunk().await.map_err(malformed)? {
        if content.len() + chunk.len() > limit {
            return Ok(None);
        }
        content.extend_from_slice(&chunk);
    }
    Ok(Some(Bytes::from(content)))
}

async fn health() -> Json<MessageResponse> {
    message("campus portal is running")
}

pub fn app() -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/auth", auth::app())
        .nest("/users", users::app())
        .nest("/events", events::app())
        .nest("/lost-found", lost_found::app())
        .nest("/clubs", clubs::app())
        .nest("/announcements", announcements::app())
        .nest("/feedback", feedback::app())
}
