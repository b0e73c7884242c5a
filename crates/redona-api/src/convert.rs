//! Row -> response conversions. Rows hold raw TEXT columns; a value that does
//! not parse means the database is corrupt, which surfaces as a 500.

use std::str::FromStr;

use anyhow::{Context, anyhow};
use chrono::{DateTime, Utc};
use uuid::Uuid;

use redona_db::models::{ConversationRow, DonationRow, MessageRow, NeedRow, OngRow};
use redona_types::api::{
    ConversationSummary, DonationResponse, MessageResponse, NeedResponse, OngResponse,
};
use redona_types::models::{ConversationSubject, UnknownVariant};

use crate::error::ApiError;

pub fn parse_id(raw: &str) -> Result<Uuid, ApiError> {
    Ok(raw
        .parse::<Uuid>()
        .with_context(|| format!("corrupt id '{}'", raw))?)
}

fn parse_opt_id(raw: Option<&str>) -> Result<Option<Uuid>, ApiError> {
    raw.map(parse_id).transpose()
}

pub fn parse_time(raw: &str) -> Result<DateTime<Utc>, ApiError> {
    Ok(DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .with_context(|| format!("corrupt timestamp '{}'", raw))?)
}

fn parse_label<T: FromStr<Err = UnknownVariant>>(raw: &str) -> Result<T, ApiError> {
    Ok(raw.parse::<T>().map_err(anyhow::Error::from)?)
}

pub fn subject_of(row: &ConversationRow) -> Result<ConversationSubject, ApiError> {
    ConversationSubject::from_columns(row.donation_id.clone(), row.need_id.clone()).ok_or_else(
        || ApiError::Internal(anyhow!("conversation '{}' has no single subject", row.id)),
    )
}

/// The donor side of the conversation, taken from wherever the subject keeps it.
pub fn effective_donor(row: &ConversationRow, subject: &ConversationSubject) -> Option<String> {
    match subject {
        ConversationSubject::Donation { .. } => row.donation_donor_id.clone(),
        ConversationSubject::Need { .. } => row.donor_id.clone(),
    }
}

pub fn effective_ong(row: &ConversationRow, subject: &ConversationSubject) -> Option<String> {
    let fallback = match subject {
        ConversationSubject::Donation { .. } => &row.donation_assigned_ong_id,
        ConversationSubject::Need { .. } => &row.need_ong_id,
    };
    row.ong_id.clone().or_else(|| fallback.clone())
}

pub fn conversation_summary(row: &ConversationRow) -> Result<ConversationSummary, ApiError> {
    let subject = subject_of(row)?;
    let title = match subject {
        ConversationSubject::Donation { .. } => row.donation_title.clone(),
        ConversationSubject::Need { .. } => row.need_title.clone(),
    };

    Ok(ConversationSummary {
        id: parse_id(&row.id)?,
        status: parse_label(&row.status)?,
        title,
        donor_id: parse_opt_id(effective_donor(row, &subject).as_deref())?,
        ong_id: parse_opt_id(effective_ong(row, &subject).as_deref())?,
        ong_name: row.ong_name.clone(),
        created_at: parse_time(&row.created_at)?,
        updated_at: parse_time(&row.updated_at)?,
        closed_at: row.closed_at.as_deref().map(parse_time).transpose()?,
        subject,
    })
}

pub fn message_response(row: MessageRow) -> Result<MessageResponse, ApiError> {
    Ok(MessageResponse {
        id: parse_id(&row.id)?,
        conversation_id: parse_id(&row.conversation_id)?,
        sender_id: parse_id(&row.sender_id)?,
        sender_username: row.sender_username,
        ong_id: parse_opt_id(row.ong_id.as_deref())?,
        ong_name: row.ong_name,
        content: row.content,
        created_at: parse_time(&row.created_at)?,
    })
}

pub fn donation_response(row: DonationRow) -> Result<DonationResponse, ApiError> {
    Ok(DonationResponse {
        id: parse_id(&row.id)?,
        status: parse_label(&row.status)?,
        donor_id: parse_id(&row.donor_id)?,
        assigned_ong_id: parse_opt_id(row.assigned_ong_id.as_deref())?,
        created_at: parse_time(&row.created_at)?,
        updated_at: parse_time(&row.updated_at)?,
        title: row.title,
        description: row.description,
        category: row.category,
        quantity: row.quantity,
        city: row.city,
        address: row.address,
        postal_code: row.postal_code,
        province: row.province,
        latitude: row.latitude,
        longitude: row.longitude,
        images: row.images,
    })
}

pub fn need_response(row: NeedRow) -> Result<NeedResponse, ApiError> {
    Ok(NeedResponse {
        id: parse_id(&row.id)?,
        status: parse_label(&row.status)?,
        ong_id: parse_id(&row.ong_id)?,
        created_at: parse_time(&row.created_at)?,
        updated_at: parse_time(&row.updated_at)?,
        title: row.title,
        description: row.description,
        category: row.category,
        quantity: row.quantity,
        urgent: row.urgent,
    })
}

pub fn ong_response(row: OngRow) -> Result<OngResponse, ApiError> {
    Ok(OngResponse {
        id: parse_id(&row.id)?,
        status: parse_label(&row.status)?,
        cif: row.cif,
        name: row.name,
        ong_type: row.ong_type,
        city: row.city,
        address: row.address,
        postal_code: row.postal_code,
        province: row.province,
        latitude: row.latitude,
        longitude: row.longitude,
        contact_email: row.contact_email,
        contact_phone: row.contact_phone,
        rejection_reason: row.rejection_reason,
    })
}
