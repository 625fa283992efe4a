use crate::server::{Result, ServerError};
use quill_common::model::{
    Id,
    author::{AuthorMarker, UserName},
};
use quill_db::store::Store;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("missing field {0}")]
    MissingField(&'static str),
    #[error("malformed request body: {0}")]
    Malformed(serde_json::Error),
    #[error("id mismatch: request path id ({path}) and request body id ({body:?}) must match")]
    IdMismatch { path: u64, body: Option<u64> },
}

/// Fails on the first of `fields` that is absent from `body`.
pub fn require_fields(
    body: &Map<String, Value>,
    fields: &[&'static str],
) -> Result<(), ValidationError> {
    match fields.iter().find(|field| !body.contains_key(**field)) {
        Some(&field) => Err(ValidationError::MissingField(field)),
        None => Ok(()),
    }
}

pub fn parse_body<T: DeserializeOwned>(
    body: Map<String, Value>,
    fields: &[&'static str],
) -> Result<T, ValidationError> {
    require_fields(&body, fields)?;
    serde_json::from_value(Value::Object(body)).map_err(ValidationError::Malformed)
}

pub fn require_id_match<Marker>(
    path_id: Id<Marker>,
    body_id: Option<Id<Marker>>,
) -> Result<(), ValidationError> {
    if body_id == Some(path_id) {
        Ok(())
    } else {
        Err(ValidationError::IdMismatch {
            path: path_id.into(),
            body: body_id.map(u64::from),
        })
    }
}

/// Fails if an author other than `exclude` already uses `user_name`.
pub async fn require_unique_user_name(
    store: &dyn Store,
    user_name: &UserName,
    exclude: Option<Id<AuthorMarker>>,
) -> Result<()> {
    match store.fetch_author_by_user_name(user_name).await? {
        Some(existing) if Some(existing.id) != exclude => {
            Err(ServerError::UserNameTaken(user_name.clone()))
        }
        _ => Ok(()),
    }
}
