//! Needs published by approved NGOs. Closing a need closes every donor
//! conversation about it.

use axum::{
    Extension, Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::info;

use redona_db::Database;
use redona_db::models::NewNeed;
use redona_db::queries;
use redona_types::api::{CreateNeedRequest, NeedResponse};
use redona_types::models::{ConversationSubject, Role};

use crate::conversations::close_conversations_for;
use crate::convert;
use crate::error::ApiError;
use crate::middleware::Actor;
use crate::state::{AppState, run_blocking};
use crate::validation::{optional, required};

fn approved_ong(actor: &Actor) -> Result<&str, ApiError> {
    match (actor.role, actor.ong_id.as_deref()) {
        (Role::Ngo, Some(ong_id)) => Ok(ong_id),
        (Role::Ngo, None) => Err(ApiError::forbidden("Your organisation has not been approved yet")),
        _ => Err(ApiError::forbidden("Only NGOs can manage needs")),
    }
}

pub fn create_need(db: &Database, actor: &Actor, req: &CreateNeedRequest) -> Result<NeedResponse, ApiError> {
    let ong_id = approved_ong(actor)?;
    let new = NewNeed {
        ong_id,
        title: required("title", &req.title)?,
        description: required("description", &req.description)?,
        category: required("category", &req.category)?,
        quantity: optional(req.quantity.as_deref()),
        urgent: req.urgent,
    };

    let row = db.with_conn(|conn| {
        let id = queries::insert_need(conn, &new)?;
        queries::get_need(conn, &id)?.ok_or_else(|| anyhow::anyhow!("need {} vanished", id))
    })?;
    info!("ONG {} published need {}", ong_id, row.id);
    convert::need_response(row)
}

/// OPEN -> CLOSED. Closing an already closed need changes nothing.
pub fn close_need(db: &Database, actor: &Actor, need_id: &str) -> Result<NeedResponse, ApiError> {
    let ong_id = approved_ong(actor)?;
    db.transaction(|tx| {
        queries::get_need(tx, need_id)?
            .filter(|n| n.ong_id == ong_id)
            .ok_or_else(|| ApiError::not_found("Need not found"))?;

        if queries::close_need(tx, need_id)? {
            info!("Need {} closed", need_id);
        }
        close_conversations_for(
            tx,
            &ConversationSubject::Need {
                need_id: need_id.to_string(),
            },
        )?;

        let row = queries::get_need(tx, need_id)?
            .ok_or_else(|| anyhow::anyhow!("need {} vanished", need_id))?;
        convert::need_response(row)
    })
}

/// POST /needs
pub async fn create(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    payload: Result<Json<CreateNeedRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload?;
    let need = run_blocking(&state, move |db| create_need(db, &actor, &req)).await?;
    Ok((StatusCode::CREATED, Json(need)))
}

/// POST /needs/{id}/close
pub async fn close(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let need = run_blocking(&state, move |db| close_need(db, &actor, &id)).await?;
    Ok(Json(need))
}
