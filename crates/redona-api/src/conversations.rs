//! Conversation lifecycle: opening, closing, listing with unread counts,
//! reading (which stamps the caller's last-read time) and posting messages.
//!
//! A caller takes part in a conversation either as the donor party or as the
//! NGO party; which one is decided by switching on the conversation subject.

use axum::{
    Extension, Json,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use rusqlite::Connection;
use serde::Deserialize;
use tracing::{debug, info};

use redona_db::Database;
use redona_db::conversations::{self as store, ListScope};
use redona_db::models::ConversationRow;
use redona_db::queries;
use redona_types::api::{
    ConversationDetail, ConversationListItem, ConversationSummary, MessageResponse,
    SendMessageRequest,
};
use redona_types::models::{
    ConversationStatus, ConversationSubject, NeedStatus, Party, Role,
};

use crate::convert::{self, subject_of};
use crate::error::ApiError;
use crate::middleware::Actor;
use crate::state::{AppState, run_blocking};

const CONVERSATION_NOT_FOUND: &str = "Conversation not found";

/// Which side of `row` the actor is on, if any.
pub fn participant_party(actor: &Actor, row: &ConversationRow, subject: &ConversationSubject) -> Option<Party> {
    match actor.role {
        Role::Donor => {
            let donor = convert::effective_donor(row, subject)?;
            (donor == actor.user_id).then_some(Party::Donor)
        }
        Role::Ngo => {
            let ong = actor.ong_id.as_deref()?;
            let linked = match subject {
                ConversationSubject::Donation { .. } => [&row.ong_id, &row.donation_assigned_ong_id],
                ConversationSubject::Need { .. } => [&row.ong_id, &row.need_ong_id],
            };
            linked
                .iter()
                .any(|id| id.as_deref() == Some(ong))
                .then_some(Party::Ong)
        }
        Role::Admin => None,
    }
}

// -- Opening and closing --

/// Close whatever is open for the donation and open a fresh conversation with
/// the requesting NGO. Callers run this inside the transaction that assigns
/// the donation, so the pair is atomic.
pub fn open_for_donation_request(conn: &Connection, donation_id: &str, ong_id: &str) -> anyhow::Result<String> {
    let subject = ConversationSubject::Donation {
        donation_id: donation_id.to_string(),
    };
    let closed = store::close_open_conversations(conn, &subject)?;
    if closed > 0 {
        debug!("Closed {} previous conversation(s) for donation {}", closed, donation_id);
    }
    let id = store::insert_donation_conversation(conn, donation_id, ong_id)?;
    info!("Opened conversation {} for donation {} with ONG {}", id, donation_id, ong_id);
    Ok(id)
}

/// Bulk-close every OPEN conversation about `subject`. Idempotent.
pub fn close_conversations_for(conn: &Connection, subject: &ConversationSubject) -> anyhow::Result<usize> {
    let closed = store::close_open_conversations(conn, subject)?;
    if closed > 0 {
        info!("Closed {} conversation(s) for {} {}", closed, subject.kind(), subject.id());
    }
    Ok(closed)
}

/// Open (or reuse) the donor's conversation about a need. The boolean is true
/// when a new conversation was created.
pub fn open_need_conversation(
    db: &Database,
    actor: &Actor,
    need_id: &str,
) -> Result<(ConversationSummary, bool), ApiError> {
    if actor.role != Role::Donor {
        return Err(ApiError::forbidden("Only donors can open a conversation about a need"));
    }

    db.transaction(|tx| {
        let need = queries::get_need(tx, need_id)?
            .ok_or_else(|| ApiError::not_found("Need not found"))?;
        if need.status != NeedStatus::Open.as_str() {
            return Err(ApiError::invalid_state("Need is not open"));
        }

        if let Some(existing) = store::find_open_for_need(tx, need_id, &actor.user_id)? {
            return Ok((convert::conversation_summary(&existing)?, false));
        }

        let id = store::insert_need_conversation(tx, need_id, &actor.user_id, &need.ong_id)?;
        info!("Opened conversation {} for need {} with donor {}", id, need_id, actor.user_id);
        let row = store::get_conversation(tx, &id)?
            .ok_or_else(|| ApiError::Internal(anyhow::anyhow!("conversation {} vanished", id)))?;
        Ok((convert::conversation_summary(&row)?, true))
    })
}

// -- Reading --

pub fn list_conversations(
    db: &Database,
    actor: &Actor,
    status: Option<ConversationStatus>,
) -> Result<Vec<ConversationListItem>, ApiError> {
    let scope = match (actor.role, actor.ong_id.as_deref()) {
        (Role::Donor, _) => ListScope::Donor {
            user_id: &actor.user_id,
        },
        (Role::Ngo, Some(ong_id)) => ListScope::Ong {
            ong_id,
            user_id: &actor.user_id,
        },
        (Role::Ngo, None) => {
            return Err(ApiError::forbidden("Your organisation has not been approved yet"));
        }
        (Role::Admin, _) => {
            return Err(ApiError::forbidden("Only donors and NGOs have conversations"));
        }
    };

    let rows = db.with_conn(|conn| store::list_conversations(conn, scope, status))?;
    rows.into_iter()
        .map(|row| {
            Ok(ConversationListItem {
                conversation: convert::conversation_summary(&row.conversation)?,
                unread_count: row.unread_count.max(0) as u64,
            })
        })
        .collect()
}

/// Authorize, stamp the caller's read time and load the messages.
/// Non-participants see the conversation as missing.
fn open_detail(conn: &Connection, actor: &Actor, row: ConversationRow) -> Result<ConversationDetail, ApiError> {
    let subject = subject_of(&row)?;
    let party = participant_party(actor, &row, &subject)
        .ok_or_else(|| ApiError::not_found(CONVERSATION_NOT_FOUND))?;

    store::mark_read(conn, &row.id, party)?;

    let messages = store::list_messages(conn, &row.id)?
        .into_iter()
        .map(convert::message_response)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ConversationDetail {
        conversation: convert::conversation_summary(&row)?,
        messages,
    })
}

pub fn get_conversation(db: &Database, actor: &Actor, id: &str) -> Result<ConversationDetail, ApiError> {
    db.transaction(|tx| {
        let row = store::get_conversation(tx, id)?
            .ok_or_else(|| ApiError::not_found(CONVERSATION_NOT_FOUND))?;
        open_detail(tx, actor, row)
    })
}

pub fn get_donation_conversation(
    db: &Database,
    actor: &Actor,
    donation_id: &str,
) -> Result<ConversationDetail, ApiError> {
    db.transaction(|tx| {
        let row = store::find_open_for_donation(tx, donation_id)?
            .ok_or_else(|| ApiError::not_found(CONVERSATION_NOT_FOUND))?;
        open_detail(tx, actor, row)
    })
}

pub fn get_need_conversation(
    db: &Database,
    actor: &Actor,
    need_id: &str,
) -> Result<ConversationDetail, ApiError> {
    if actor.role != Role::Donor {
        return Err(ApiError::forbidden("Only donors have a conversation per need"));
    }
    db.transaction(|tx| {
        let row = store::find_open_for_need(tx, need_id, &actor.user_id)?
            .ok_or_else(|| ApiError::not_found(CONVERSATION_NOT_FOUND))?;
        open_detail(tx, actor, row)
    })
}

// -- Writing --

pub fn post_message(
    db: &Database,
    actor: &Actor,
    conversation_id: &str,
    content: &str,
) -> Result<MessageResponse, ApiError> {
    let content = content.trim();
    if content.is_empty() {
        return Err(ApiError::validation("Message content cannot be empty"));
    }

    db.transaction(|tx| {
        let row = store::get_conversation(tx, conversation_id)?
            .ok_or_else(|| ApiError::not_found(CONVERSATION_NOT_FOUND))?;
        let subject = subject_of(&row)?;
        let party = participant_party(actor, &row, &subject)
            .ok_or_else(|| ApiError::forbidden("You are not a participant in this conversation"))?;
        if row.status != ConversationStatus::Open.as_str() {
            return Err(ApiError::invalid_state("Conversation is closed"));
        }

        let ong_id = match party {
            Party::Ong => actor.ong_id.as_deref(),
            Party::Donor => None,
        };
        let id = store::insert_message(tx, conversation_id, &actor.user_id, ong_id, content)?;
        let message = store::get_message(tx, &id)?
            .ok_or_else(|| ApiError::Internal(anyhow::anyhow!("message {} vanished", id)))?;
        convert::message_response(message)
    })
}

// -- Handlers --

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub status: Option<String>,
}

fn parse_status(raw: Option<&str>) -> Result<Option<ConversationStatus>, ApiError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(raw) => raw
            .to_ascii_uppercase()
            .parse()
            .map(Some)
            .map_err(|_| ApiError::validation("status must be OPEN or CLOSED")),
    }
}

/// GET /conversations?status=OPEN|CLOSED
pub async fn list(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let status = parse_status(query.status.as_deref())?;
    let items = run_blocking(&state, move |db| list_conversations(db, &actor, status)).await?;
    Ok(Json(items))
}

/// GET /conversations/{id}
pub async fn get(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let detail = run_blocking(&state, move |db| get_conversation(db, &actor, &id)).await?;
    Ok(Json(detail))
}

/// GET /conversations/donation/{donation_id}
pub async fn get_for_donation(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(donation_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let detail =
        run_blocking(&state, move |db| get_donation_conversation(db, &actor, &donation_id)).await?;
    Ok(Json(detail))
}

/// GET /conversations/need/{need_id}
pub async fn get_for_need(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(need_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let detail = run_blocking(&state, move |db| get_need_conversation(db, &actor, &need_id)).await?;
    Ok(Json(detail))
}

/// POST /conversations/need/{need_id}/open
pub async fn open_for_need(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(need_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let (summary, created) =
        run_blocking(&state, move |db| open_need_conversation(db, &actor, &need_id)).await?;
    let status = if created { StatusCode::CREATED } else { StatusCode::OK };
    Ok((status, Json(summary)))
}

/// POST /conversations/{id}/messages
pub async fn send_message(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
    payload: Result<Json<SendMessageRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload?;
    let message = run_blocking(&state, move |db| post_message(db, &actor, &id, &req.content)).await?;
    Ok((StatusCode::CREATED, Json(message)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::donations::{deliver_donation, reject_donation, request_donation};
    use crate::needs::create_need;
    use crate::test_support::*;

    /// Donor, NGO and the id of their open donation conversation.
    fn donation_conversation(db: &Database) -> (Actor, Actor, String) {
        let (donor, donation) = seed_donor_with_donation(db);
        let ngo = seed_ngo(db, "first");
        let res = request_donation(db, &ngo, &donation).unwrap();
        (donor, ngo, res.conversation_id.to_string())
    }

    fn unread_for(db: &Database, actor: &Actor, id: &str) -> u64 {
        list_conversations(db, actor, None)
            .unwrap()
            .into_iter()
            .find(|item| item.conversation.id.to_string() == id)
            .map(|item| item.unread_count)
            .unwrap()
    }

    #[test]
    fn both_parties_can_talk() {
        let db = db();
        let (donor, ngo, id) = donation_conversation(&db);

        let m1 = post_message(&db, &donor, &id, "  Hola, can you pick up on Friday?  ").unwrap();
        assert_eq!(m1.content, "Hola, can you pick up on Friday?");
        assert!(m1.ong_id.is_none());

        let m2 = post_message(&db, &ngo, &id, "Yes, at 10").unwrap();
        assert_eq!(m2.ong_id.map(|o| o.to_string()), ngo.ong_id.clone());
        assert_eq!(m2.ong_name.as_deref(), Some("first"));

        let detail = get_conversation(&db, &donor, &id).unwrap();
        let contents: Vec<_> = detail.messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, ["Hola, can you pick up on Friday?", "Yes, at 10"]);
        assert_eq!(detail.conversation.title.as_deref(), Some("Winter coats"));
        assert_eq!(detail.conversation.donor_id.map(|d| d.to_string()), Some(donor.user_id));
    }

    #[test]
    fn a_new_request_closes_the_open_conversation() {
        let db = db();
        let (_donor, donation) = seed_donor_with_donation(&db);
        let first = seed_ngo(&db, "first").ong_id.unwrap();
        let second = seed_ngo(&db, "second").ong_id.unwrap();

        db.with_conn(|conn| {
            let old = open_for_donation_request(conn, &donation, &first)?;
            let new = open_for_donation_request(conn, &donation, &second)?;
            assert_ne!(old, new);

            let old_row = store::get_conversation(conn, &old)?.unwrap();
            assert_eq!(old_row.status, "CLOSED");
            assert!(old_row.closed_at.is_some());

            let open: i64 = conn.query_row(
                "SELECT COUNT(*) FROM conversations WHERE donation_id = ?1 AND status = 'OPEN'",
                [&donation],
                |r| r.get(0),
            )?;
            assert_eq!(open, 1);
            assert_eq!(store::find_open_for_donation(conn, &donation)?.unwrap().id, new);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn reading_clears_the_unread_count() {
        let db = db();
        let (donor, ngo, id) = donation_conversation(&db);
        post_message(&db, &donor, &id, "first").unwrap();
        post_message(&db, &donor, &id, "second").unwrap();

        assert_eq!(unread_for(&db, &ngo, &id), 2);
        assert_eq!(unread_for(&db, &donor, &id), 0);

        get_conversation(&db, &ngo, &id).unwrap();
        assert_eq!(unread_for(&db, &ngo, &id), 0);
    }

    #[test]
    fn closed_conversation_rejects_messages() {
        let db = db();
        let (donor, _ngo, id) = donation_conversation(&db);
        let donation = get_conversation(&db, &donor, &id).unwrap();
        let ConversationSubject::Donation { donation_id } = donation.conversation.subject else {
            panic!("expected a donation conversation");
        };
        deliver_donation(&db, &donor, &donation_id).unwrap();

        let err = post_message(&db, &donor, &id, "still there?").unwrap_err();
        assert!(matches!(err, ApiError::InvalidState(_)));
        assert_eq!(db.with_conn(|conn| store::count_messages(conn, &id)).unwrap(), 0);

        let closed = list_conversations(&db, &donor, Some(ConversationStatus::Closed)).unwrap();
        assert_eq!(closed.len(), 1);
        assert!(list_conversations(&db, &donor, Some(ConversationStatus::Open)).unwrap().is_empty());
    }

    #[test]
    fn blank_messages_are_rejected() {
        let db = db();
        let (donor, _ngo, id) = donation_conversation(&db);
        assert!(matches!(
            post_message(&db, &donor, &id, " \n "),
            Err(ApiError::Validation(_))
        ));
    }

    #[test]
    fn strangers_do_not_see_the_conversation() {
        let db = db();
        let (_donor, _ngo, id) = donation_conversation(&db);
        let stranger = seed_donor(&db, "mallory");
        let other_ngo = seed_ngo(&db, "second");

        assert!(matches!(get_conversation(&db, &stranger, &id), Err(ApiError::NotFound(_))));
        assert!(matches!(get_conversation(&db, &other_ngo, &id), Err(ApiError::NotFound(_))));
        assert!(matches!(
            post_message(&db, &stranger, &id, "hi"),
            Err(ApiError::Forbidden(_))
        ));
        assert!(list_conversations(&db, &stranger, None).unwrap().is_empty());
    }

    #[test]
    fn rejected_ngo_keeps_its_closed_history() {
        let db = db();
        let (donor, donation) = seed_donor_with_donation(&db);
        let first = seed_ngo(&db, "first");
        let old = request_donation(&db, &first, &donation).unwrap().conversation_id.to_string();
        reject_donation(&db, &donor, &donation).unwrap();
        request_donation(&db, &seed_ngo(&db, "second"), &donation).unwrap();

        let detail = get_conversation(&db, &first, &old).unwrap();
        assert_eq!(detail.conversation.status, ConversationStatus::Closed);
        assert!(matches!(
            post_message(&db, &first, &old, "hello?"),
            Err(ApiError::InvalidState(_))
        ));
        assert_eq!(list_conversations(&db, &donor, None).unwrap().len(), 2);
    }

    #[test]
    fn donation_lookup_finds_the_open_conversation() {
        let db = db();
        let (donor, donation) = seed_donor_with_donation(&db);
        assert!(matches!(
            get_donation_conversation(&db, &donor, &donation),
            Err(ApiError::NotFound(_))
        ));

        let res = request_donation(&db, &seed_ngo(&db, "first"), &donation).unwrap();
        let detail = get_donation_conversation(&db, &donor, &donation).unwrap();
        assert_eq!(detail.conversation.id, res.conversation_id);
    }

    #[test]
    fn opening_a_need_conversation_twice_reuses_it() {
        let db = db();
        let ngo = seed_ngo(&db, "first");
        let need = create_need(&db, &ngo, &need_request()).unwrap().id.to_string();
        let donor = seed_donor(&db, "alice");

        let (first, created) = open_need_conversation(&db, &donor, &need).unwrap();
        assert!(created);
        let (second, created) = open_need_conversation(&db, &donor, &need).unwrap();
        assert!(!created);
        assert_eq!(first.id, second.id);
        assert_eq!(first.ong_id.map(|o| o.to_string()), ngo.ong_id.clone());

        let detail = get_need_conversation(&db, &donor, &need).unwrap();
        assert_eq!(detail.conversation.id, first.id);
        assert!(matches!(
            get_need_conversation(&db, &ngo, &need),
            Err(ApiError::Forbidden(_))
        ));

        // The NGO sees the donor's conversation in its inbox.
        let inbox = list_conversations(&db, &ngo, None).unwrap();
        assert_eq!(inbox.len(), 1);
    }

    #[test]
    fn ngos_cannot_open_need_conversations() {
        let db = db();
        let ngo = seed_ngo(&db, "first");
        let need = create_need(&db, &ngo, &need_request()).unwrap().id.to_string();
        assert!(matches!(
            open_need_conversation(&db, &ngo, &need),
            Err(ApiError::Forbidden(_))
        ));
    }

    #[test]
    fn admins_and_pending_ngos_have_no_inbox() {
        let db = db();
        let admin = Actor {
            user_id: "admin".into(),
            username: "admin".into(),
            role: Role::Admin,
            ong_id: None,
        };
        assert!(matches!(list_conversations(&db, &admin, None), Err(ApiError::Forbidden(_))));
        assert!(matches!(
            list_conversations(&db, &seed_pending_ngo(&db), None),
            Err(ApiError::Forbidden(_))
        ));
    }

    #[test]
    fn status_filter_is_case_insensitive() {
        assert_eq!(parse_status(Some("open")).unwrap(), Some(ConversationStatus::Open));
        assert_eq!(parse_status(Some(" ")).unwrap(), None);
        assert!(matches!(parse_status(Some("archived")), Err(ApiError::Validation(_))));
    }
}
