use axum::{Extension, Json, extract::State, response::IntoResponse};

use redona_db::queries;
use redona_types::models::{Coordinates, Role};

use crate::convert;
use crate::coordinates;
use crate::error::ApiError;
use crate::middleware::Actor;
use crate::state::{AppState, run_blocking};

/// GET /ongs/me
///
/// The caller's organisation, whatever its approval status. Missing
/// coordinates are resolved (and cached) on the way out.
pub async fn me(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> Result<impl IntoResponse, ApiError> {
    if actor.role != Role::Ngo {
        return Err(ApiError::forbidden("Only NGO accounts have an organisation"));
    }

    let user_id = actor.user_id.clone();
    let mut ong = run_blocking(&state, move |db| {
        Ok(db.with_conn(|conn| queries::get_ong_by_user(conn, &user_id))?)
    })
    .await?
    .ok_or_else(|| ApiError::not_found("ONG not found"))?;

    if let Some(Coordinates { latitude, longitude }) = coordinates::resolve_ong(&state, &ong).await {
        ong.latitude = Some(latitude);
        ong.longitude = Some(longitude);
    }

    Ok(Json(convert::ong_response(ong)?))
}
