//! Resolve-and-cache for stored addresses: use the persisted coordinates when
//! present, otherwise ask the geocoder and write a hit back. Never fails.

use rusqlite::Connection;
use tracing::{info, warn};

use redona_db::models::{DonationRow, OngRow};
use redona_db::queries;
use redona_geo::AddressQuery;
use redona_types::models::Coordinates;

use crate::state::{AppState, run_blocking};

async fn resolve_and_cache<P>(
    state: &AppState,
    stored: Option<Coordinates>,
    query: AddressQuery,
    persist: P,
) -> Option<Coordinates>
where
    P: FnOnce(&Connection, Coordinates) -> anyhow::Result<()> + Send + 'static,
{
    if stored.is_some() {
        return stored;
    }

    let coords = state.geocoder.geocode(&query).await?;
    let result = run_blocking(state, move |db| Ok(db.with_conn(|conn| persist(conn, coords))?)).await;
    if let Err(e) = result {
        warn!("Could not cache coordinates for {:?}: {}", query, e);
    }
    Some(coords)
}

pub fn donation_address(donation: &DonationRow) -> AddressQuery {
    AddressQuery {
        address: donation.address.clone(),
        city: Some(donation.city.clone()),
        province: donation.province.clone(),
        postal_code: donation.postal_code.clone(),
    }
}

pub fn ong_address(ong: &OngRow) -> AddressQuery {
    AddressQuery {
        address: ong.address.clone(),
        city: Some(ong.city.clone()),
        province: ong.province.clone(),
        postal_code: ong.postal_code.clone(),
    }
}

pub async fn resolve_donation(state: &AppState, donation: &DonationRow) -> Option<Coordinates> {
    let id = donation.id.clone();
    resolve_and_cache(
        state,
        Coordinates::from_columns(donation.latitude, donation.longitude),
        donation_address(donation),
        move |conn, coords| {
            queries::update_donation_coordinates(conn, &id, coords)?;
            info!("Cached coordinates for donation {}", id);
            Ok(())
        },
    )
    .await
}

pub async fn resolve_ong(state: &AppState, ong: &OngRow) -> Option<Coordinates> {
    let id = ong.id.clone();
    resolve_and_cache(
        state,
        Coordinates::from_columns(ong.latitude, ong.longitude),
        ong_address(ong),
        move |conn, coords| {
            queries::update_ong_coordinates(conn, &id, coords)?;
            info!("Cached coordinates for ONG {}", id);
            Ok(())
        },
    )
    .await
}
