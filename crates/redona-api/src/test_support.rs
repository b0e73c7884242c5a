//! Fixtures shared by the unit tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use redona_db::Database;
use redona_db::models::{NewDonation, NewOng};
use redona_db::queries;
use redona_geo::{AddressQuery, Geocoder};
use redona_types::api::{CreateDonationRequest, CreateNeedRequest};
use redona_types::models::{Coordinates, OngStatus, Role};

use crate::middleware::Actor;
use crate::state::{AppState, AppStateInner};

pub fn db() -> Database {
    Database::open_in_memory().unwrap()
}

pub fn state_with(db: Database, geocoder: impl Geocoder + 'static) -> AppState {
    Arc::new(AppStateInner {
        db,
        jwt_secret: "test-secret".into(),
        geocoder: Box::new(geocoder),
    })
}

pub fn seed_donor(db: &Database, username: &str) -> Actor {
    let email = format!("{username}@example.org");
    let user_id = db
        .with_conn(|conn| queries::insert_user(conn, username, &email, "x", Role::Donor, Some("Madrid")))
        .unwrap();
    Actor {
        user_id,
        username: username.into(),
        role: Role::Donor,
        ong_id: None,
    }
}

fn seed_ngo_with_status(db: &Database, name: &str, status: OngStatus) -> Actor {
    let username = format!("ngo-{name}");
    let email = format!("{username}@example.org");
    let cif = format!("G-{name}");
    let (user_id, ong_id) = db
        .with_conn(|conn| {
            let user_id = queries::insert_user(conn, &username, &email, "x", Role::Ngo, None)?;
            let ong_id = queries::insert_ong(
                conn,
                &NewOng {
                    user_id: &user_id,
                    cif: &cif,
                    name,
                    ong_type: "association",
                    status: status.as_str(),
                    city: "Barcelona",
                    address: Some("Carrer de Mallorca 401"),
                    postal_code: Some("08013"),
                    province: Some("Barcelona"),
                    contact_email: &email,
                    contact_phone: None,
                },
            )?;
            Ok((user_id, ong_id))
        })
        .unwrap();
    Actor {
        user_id,
        username,
        role: Role::Ngo,
        ong_id: (status == OngStatus::Approved).then_some(ong_id),
    }
}

pub fn seed_ngo(db: &Database, name: &str) -> Actor {
    seed_ngo_with_status(db, name, OngStatus::Approved)
}

pub fn seed_pending_ngo(db: &Database) -> Actor {
    seed_ngo_with_status(db, "pending", OngStatus::Pending)
}

pub fn seed_donation(db: &Database, donor: &Actor) -> String {
    db.with_conn(|conn| {
        queries::insert_donation(
            conn,
            &NewDonation {
                donor_id: &donor.user_id,
                title: "Winter coats",
                description: "Six adult coats",
                category: "clothing",
                quantity: "6",
                city: "Madrid",
                address: Some("Calle Mayor 1"),
                postal_code: Some("28013"),
                province: Some("Madrid"),
                images: &[],
            },
        )
    })
    .unwrap()
}

pub fn seed_donor_with_donation(db: &Database) -> (Actor, String) {
    let donor = seed_donor(db, "alice");
    let donation = seed_donation(db, &donor);
    (donor, donation)
}

pub fn donation_request() -> CreateDonationRequest {
    CreateDonationRequest {
        title: "Baby cot".into(),
        description: "Wooden cot, good condition".into(),
        category: "furniture".into(),
        quantity: "1".into(),
        city: "Madrid".into(),
        address: None,
        postal_code: Some("28013".into()),
        province: None,
        images: Vec::new(),
    }
}

pub fn need_request() -> CreateNeedRequest {
    CreateNeedRequest {
        title: "Blankets".into(),
        description: "For the night shelter".into(),
        category: "textiles".into(),
        quantity: Some("40".into()),
        urgent: true,
    }
}

/// Answers every lookup by city: Madrid and Barcelona are known, anything
/// else is unresolved. Counts calls so caching can be asserted.
#[derive(Default)]
pub struct FakeGeocoder {
    pub calls: Arc<AtomicUsize>,
}

pub const MADRID: Coordinates = Coordinates {
    latitude: 40.4168,
    longitude: -3.7038,
};

pub const BARCELONA: Coordinates = Coordinates {
    latitude: 41.3874,
    longitude: 2.1686,
};

#[async_trait]
impl Geocoder for FakeGeocoder {
    async fn geocode(&self, query: &AddressQuery) -> Option<Coordinates> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match query.city.as_deref() {
            Some("Madrid") => Some(MADRID),
            Some("Barcelona") => Some(BARCELONA),
            _ => None,
        }
    }
}
