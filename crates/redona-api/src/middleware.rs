use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::headers::{Authorization, HeaderMapExt, authorization::Bearer};
use jsonwebtoken::{DecodingKey, Validation, decode};
use tracing::debug;

use redona_db::queries;
use redona_types::api::Claims;
use redona_types::models::{OngStatus, Role};

use crate::error::ApiError;
use crate::state::{AppState, run_blocking};

/// The authenticated caller, resolved from the token and the users table.
#[derive(Debug, Clone)]
pub struct Actor {
    pub user_id: String,
    pub username: String,
    pub role: Role,
    /// Only set for NGO users whose organisation is approved.
    pub ong_id: Option<String>,
}

/// Extract and validate the bearer JWT, then load the caller.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let bearer = req
        .headers()
        .typed_get::<Authorization<Bearer>>()
        .ok_or(ApiError::Unauthorized)?;

    let token_data = decode::<Claims>(
        bearer.token(),
        &DecodingKey::from_secret(state.jwt_secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| {
        debug!("Rejected token: {}", e);
        ApiError::Unauthorized
    })?;

    let user_id = token_data.claims.sub.to_string();
    let actor = run_blocking(&state, move |db| load_actor(db, &user_id)).await?;

    req.extensions_mut().insert(actor);
    Ok(next.run(req).await)
}

fn load_actor(db: &redona_db::Database, user_id: &str) -> Result<Actor, ApiError> {
    db.with_conn(|conn| {
        let Some(user) = queries::get_user(conn, user_id)? else {
            return Ok(None);
        };
        // The stored role wins over whatever the token claims.
        let role: Role = user.role.parse()?;
        let ong_id = match role {
            Role::Ngo => queries::get_ong_by_user(conn, &user.id)?
                .filter(|ong| ong.status == OngStatus::Approved.as_str())
                .map(|ong| ong.id),
            _ => None,
        };
        Ok(Some(Actor {
            user_id: user.id,
            username: user.username,
            role,
            ong_id,
        }))
    })?
    .ok_or(ApiError::Unauthorized)
}
