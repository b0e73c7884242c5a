use std::sync::Arc;

use redona_db::Database;
use redona_geo::Geocoder;

use crate::error::ApiError;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub jwt_secret: String,
    pub geocoder: Box<dyn Geocoder>,
}

/// Run blocking DB work off the async runtime.
pub async fn run_blocking<F, T>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&Database) -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state.db)).await?
}
