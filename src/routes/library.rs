//! Library Routes
//!
//! Catalog listing, deletion and metadata edits. Every route selects the
//! library half with the `mType` query parameter (`video` or `audio`).

use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::library::{Listing, MediaType, MetadataUpdate};
use crate::state::AppState;

/// Create the library router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/dir/", get(list_entries))
        .route("/delete/", get(delete_entry))
        .route("/update/", post(update_entry))
}

#[derive(Debug, Deserialize)]
pub struct MediaQuery {
    #[serde(rename = "mType")]
    pub media_type: Option<String>,
    pub title: Option<String>,
}

impl MediaQuery {
    fn media_type(&self) -> Result<MediaType> {
        self.media_type
            .as_deref()
            .ok_or_else(|| AppError::BadRequest("Invalid media type".to_string()))?
            .parse()
            .map_err(|e: crate::library::InvalidMediaType| AppError::BadRequest(e.to_string()))
    }
}

/// GET /dir/?mType=
pub async fn list_entries(
    State(state): State<AppState>,
    Query(query): Query<MediaQuery>,
) -> Result<Json<Listing>> {
    let media_type = query.media_type()?;
    Ok(Json(state.library().list(media_type).await?))
}

/// GET /delete/?mType=&title=
///
/// Clients encode the title before placing it in the query string, so it
/// is decoded once more after query parsing.
pub async fn delete_entry(
    State(state): State<AppState>,
    Query(query): Query<MediaQuery>,
) -> Result<StatusCode> {
    let media_type = query.media_type()?;
    let raw = query
        .title
        .as_deref()
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::BadRequest("Title is missing".to_string()))?;
    let title = urlencoding::decode(raw)
        .map_err(|e| AppError::BadRequest(format!("Invalid title encoding: {}", e)))?;

    state.library().delete(media_type, &title).await?;
    Ok(StatusCode::OK)
}

#[derive(Debug, Deserialize)]
pub struct UpdateRequest {
    /// Title the entry is currently stored under
    pub title: String,
    pub update: MetadataUpdate,
}

#[derive(Debug, Serialize)]
pub struct UpdateResponse {
    pub modified: u64,
}

/// POST /update/?mType=
///
/// `modified` is 0 when no entry carries the prior title.
pub async fn update_entry(
    State(state): State<AppState>,
    Query(query): Query<MediaQuery>,
    Json(request): Json<UpdateRequest>,
) -> Result<Json<UpdateResponse>> {
    let media_type = query.media_type()?;
    let modified = state
        .library()
        .update_metadata(media_type, &request.title, &request.update)
        .await?;

    Ok(Json(UpdateResponse { modified }))
}
