use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{
    ConversationStatus, ConversationSubject, DonationStatus, NeedStatus, OngStatus, Role,
};

// -- JWT Claims --

/// Tokens are issued by the account service; this backend only verifies them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub username: String,
    pub role: Role,
    pub exp: usize,
}

// -- Errors --

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

// -- Conversations --

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSummary {
    pub id: Uuid,
    pub status: ConversationStatus,
    pub subject: ConversationSubject,
    /// Title of the donation or need the conversation is about.
    pub title: Option<String>,
    pub donor_id: Option<Uuid>,
    pub ong_id: Option<Uuid>,
    pub ong_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationListItem {
    #[serde(flatten)]
    pub conversation: ConversationSummary,
    pub unread_count: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationDetail {
    #[serde(flatten)]
    pub conversation: ConversationSummary,
    pub messages: Vec<MessageResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendMessageRequest {
    pub content: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageResponse {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    pub sender_username: String,
    /// Set when the sender wrote on behalf of an NGO.
    pub ong_id: Option<Uuid>,
    pub ong_name: Option<String>,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

// -- Shipping --

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingQuote {
    pub amount: f64,
    pub currency: &'static str,
    pub distance_km: Option<f64>,
    pub weight_kg: f64,
    pub packages: u32,
    pub weight_bracket_max_kg: f64,
    pub base_amount: f64,
    pub remote_surcharge: f64,
    pub express_surcharge: f64,
    pub is_remote_zone: bool,
    pub is_express24h: bool,
    pub origin: String,
    pub destination: String,
}

// -- Donations --

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateDonationRequest {
    pub title: String,
    pub description: String,
    pub category: String,
    pub quantity: String,
    pub city: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub postal_code: Option<String>,
    #[serde(default)]
    pub province: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DonationResponse {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub category: String,
    pub quantity: String,
    pub city: String,
    pub address: Option<String>,
    pub postal_code: Option<String>,
    pub province: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub images: Vec<String>,
    pub status: DonationStatus,
    pub donor_id: Uuid,
    pub assigned_ong_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DonationRequestResponse {
    pub donation: DonationResponse,
    pub conversation_id: Uuid,
}

// -- Needs --

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateNeedRequest {
    pub title: String,
    pub description: String,
    pub category: String,
    #[serde(default)]
    pub quantity: Option<String>,
    #[serde(default)]
    pub urgent: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NeedResponse {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub category: String,
    pub quantity: Option<String>,
    pub urgent: bool,
    pub status: NeedStatus,
    pub ong_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// -- Ongs --

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OngResponse {
    pub id: Uuid,
    pub cif: String,
    pub name: String,
    #[serde(rename = "type")]
    pub ong_type: String,
    pub status: OngStatus,
    pub city: String,
    pub address: Option<String>,
    pub postal_code: Option<String>,
    pub province: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub contact_email: String,
    pub contact_phone: Option<String>,
    pub rejection_reason: Option<String>,
}
