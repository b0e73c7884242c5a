//! Donation workflow. Requesting a donation opens its conversation; delivery
//! and rejection close it.

use axum::{
    Extension, Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use rusqlite::Connection;
use tracing::info;

use redona_db::Database;
use redona_db::models::{DonationRow, NewDonation};
use redona_db::queries;
use redona_types::api::{CreateDonationRequest, DonationRequestResponse, DonationResponse};
use redona_types::models::{ConversationSubject, DonationStatus, Role};

use crate::conversations::{close_conversations_for, open_for_donation_request};
use crate::convert::{self, parse_id};
use crate::error::ApiError;
use crate::middleware::Actor;
use crate::state::{AppState, run_blocking};
use crate::validation::{optional, required};

const DONATION_NOT_FOUND: &str = "Donation not found";

pub fn create_donation(
    db: &Database,
    actor: &Actor,
    req: &CreateDonationRequest,
) -> Result<DonationResponse, ApiError> {
    if actor.role != Role::Donor {
        return Err(ApiError::forbidden("Only donors can publish donations"));
    }

    let new = NewDonation {
        donor_id: &actor.user_id,
        title: required("title", &req.title)?,
        description: required("description", &req.description)?,
        category: required("category", &req.category)?,
        quantity: required("quantity", &req.quantity)?,
        city: required("city", &req.city)?,
        address: optional(req.address.as_deref()),
        postal_code: optional(req.postal_code.as_deref()),
        province: optional(req.province.as_deref()),
        images: &req.images,
    };

    let row = db.with_conn(|conn| {
        let id = queries::insert_donation(conn, &new)?;
        queries::get_donation(conn, &id)?.ok_or_else(|| anyhow::anyhow!("donation {} vanished", id))
    })?;
    info!("Donor {} published donation {}", actor.user_id, row.id);
    convert::donation_response(row)
}

/// Assign an AVAILABLE donation to the caller's NGO and open the conversation
/// with its donor. Both happen in one transaction.
pub fn request_donation(
    db: &Database,
    actor: &Actor,
    donation_id: &str,
) -> Result<DonationRequestResponse, ApiError> {
    let ong_id = match (actor.role, actor.ong_id.as_deref()) {
        (Role::Ngo, Some(ong_id)) => ong_id,
        (Role::Ngo, None) => {
            return Err(ApiError::forbidden("Your organisation has not been approved yet"));
        }
        _ => return Err(ApiError::forbidden("Only NGOs can request donations")),
    };

    db.transaction(|tx| {
        let donation = queries::get_donation(tx, donation_id)?
            .ok_or_else(|| ApiError::not_found(DONATION_NOT_FOUND))?;
        if donation.status != DonationStatus::Available.as_str()
            || !queries::assign_donation(tx, donation_id, ong_id)?
        {
            return Err(ApiError::invalid_state("Donation is not available"));
        }

        let conversation_id = open_for_donation_request(tx, donation_id, ong_id)?;
        info!("ONG {} requested donation {}", ong_id, donation_id);

        Ok(DonationRequestResponse {
            donation: convert::donation_response(reload(tx, donation_id)?)?,
            conversation_id: parse_id(&conversation_id)?,
        })
    })
}

/// Load a donation the caller owns. Anyone else sees it as missing.
fn owned_donation(conn: &Connection, actor: &Actor, donation_id: &str) -> Result<DonationRow, ApiError> {
    if actor.role != Role::Donor {
        return Err(ApiError::forbidden("Only the donor can update this donation"));
    }
    queries::get_donation(conn, donation_id)?
        .filter(|d| d.donor_id == actor.user_id)
        .ok_or_else(|| ApiError::not_found(DONATION_NOT_FOUND))
}

fn reload(conn: &Connection, donation_id: &str) -> Result<DonationRow, ApiError> {
    Ok(queries::get_donation(conn, donation_id)?
        .ok_or_else(|| anyhow::anyhow!("donation {} vanished", donation_id))?)
}

fn donation_subject(donation_id: &str) -> ConversationSubject {
    ConversationSubject::Donation {
        donation_id: donation_id.to_string(),
    }
}

/// ASSIGNED -> DELIVERED, closing the donation's conversations.
pub fn deliver_donation(db: &Database, actor: &Actor, donation_id: &str) -> Result<DonationResponse, ApiError> {
    db.transaction(|tx| {
        owned_donation(tx, actor, donation_id)?;
        if !queries::mark_donation_delivered(tx, donation_id)? {
            return Err(ApiError::invalid_state("Donation is not assigned"));
        }
        close_conversations_for(tx, &donation_subject(donation_id))?;
        info!("Donation {} delivered", donation_id);
        convert::donation_response(reload(tx, donation_id)?)
    })
}

/// ASSIGNED -> AVAILABLE, dropping the NGO and closing the conversations.
pub fn reject_donation(db: &Database, actor: &Actor, donation_id: &str) -> Result<DonationResponse, ApiError> {
    db.transaction(|tx| {
        owned_donation(tx, actor, donation_id)?;
        if !queries::release_donation(tx, donation_id)? {
            return Err(ApiError::invalid_state("Donation is not assigned"));
        }
        close_conversations_for(tx, &donation_subject(donation_id))?;
        info!("Donor rejected the assignment of donation {}", donation_id);
        convert::donation_response(reload(tx, donation_id)?)
    })
}

// -- Handlers --

/// POST /donations
pub async fn create(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    payload: Result<Json<CreateDonationRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload?;
    let donation = run_blocking(&state, move |db| create_donation(db, &actor, &req)).await?;
    Ok((StatusCode::CREATED, Json(donation)))
}

/// POST /donations/{id}/request
pub async fn request(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let response = run_blocking(&state, move |db| request_donation(db, &actor, &id)).await?;
    Ok(Json(response))
}

/// POST /donations/{id}/deliver
pub async fn deliver(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let donation = run_blocking(&state, move |db| deliver_donation(db, &actor, &id)).await?;
    Ok(Json(donation))
}

/// POST /donations/{id}/reject
pub async fn reject(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let donation = run_blocking(&state, move |db| reject_donation(db, &actor, &id)).await?;
    Ok(Json(donation))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::*;
    use redona_db::conversations as store;

    #[test]
    fn request_assigns_and_opens_a_single_conversation() {
        let db = db();
        let (donor, donation) = seed_donor_with_donation(&db);
        let ngo = seed_ngo(&db, "first");

        let res = request_donation(&db, &ngo, &donation).unwrap();
        assert_eq!(res.donation.status, DonationStatus::Assigned);
        assert_eq!(res.donation.assigned_ong_id.map(|id| id.to_string()), ngo.ong_id.clone());

        let row = db
            .with_conn(|conn| store::find_open_for_donation(conn, &donation))
            .unwrap()
            .unwrap();
        assert_eq!(row.id, res.conversation_id.to_string());
        assert_eq!(row.donation_donor_id.as_deref(), Some(donor.user_id.as_str()));
    }

    #[test]
    fn request_of_an_assigned_donation_is_rejected() {
        let db = db();
        let (_, donation) = seed_donor_with_donation(&db);
        request_donation(&db, &seed_ngo(&db, "first"), &donation).unwrap();

        let err = request_donation(&db, &seed_ngo(&db, "second"), &donation).unwrap_err();
        assert!(matches!(err, ApiError::InvalidState(_)));
    }

    #[test]
    fn reject_then_request_again_replaces_the_conversation() {
        let db = db();
        let (donor, donation) = seed_donor_with_donation(&db);
        let first = request_donation(&db, &seed_ngo(&db, "first"), &donation).unwrap();

        let released = reject_donation(&db, &donor, &donation).unwrap();
        assert_eq!(released.status, DonationStatus::Available);
        assert!(released.assigned_ong_id.is_none());

        let second = request_donation(&db, &seed_ngo(&db, "second"), &donation).unwrap();
        assert_ne!(first.conversation_id, second.conversation_id);

        let old = db
            .with_conn(|conn| store::get_conversation(conn, &first.conversation_id.to_string()))
            .unwrap()
            .unwrap();
        assert_eq!(old.status, "CLOSED");
        assert!(old.closed_at.is_some());
    }

    #[test]
    fn deliver_closes_the_conversation() {
        let db = db();
        let (donor, donation) = seed_donor_with_donation(&db);
        request_donation(&db, &seed_ngo(&db, "first"), &donation).unwrap();

        let delivered = deliver_donation(&db, &donor, &donation).unwrap();
        assert_eq!(delivered.status, DonationStatus::Delivered);
        let open = db.with_conn(|conn| store::find_open_for_donation(conn, &donation)).unwrap();
        assert!(open.is_none());

        let err = deliver_donation(&db, &donor, &donation).unwrap_err();
        assert!(matches!(err, ApiError::InvalidState(_)));
    }

    #[test]
    fn other_donors_cannot_see_the_donation() {
        let db = db();
        let (_, donation) = seed_donor_with_donation(&db);
        let stranger = seed_donor(&db, "mallory");
        assert!(matches!(
            deliver_donation(&db, &stranger, &donation),
            Err(ApiError::NotFound(_))
        ));
    }

    #[test]
    fn create_requires_the_mandatory_fields() {
        let db = db();
        let donor = seed_donor(&db, "alice");
        let mut req = donation_request();
        req.city = "   ".into();
        assert!(matches!(
            create_donation(&db, &donor, &req),
            Err(ApiError::Validation(ref m)) if m == "city is required"
        ));

        let ngo = seed_ngo(&db, "first");
        assert!(matches!(
            create_donation(&db, &ngo, &donation_request()),
            Err(ApiError::Forbidden(_))
        ));
    }
}
