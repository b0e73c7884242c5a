//! Database row types. These map directly to SQLite rows,
//! distinct from redona-types API models to keep the DB layer independent.

pub struct UserRow {
    pub id: String,
    pub username: String,
    pub email: String,
    pub role: String,
    pub location: Option<String>,
    pub created_at: String,
}

pub struct OngRow {
    pub id: String,
    pub user_id: String,
    pub cif: String,
    pub name: String,
    pub ong_type: String,
    pub status: String,
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

pub struct NewOng<'a> {
    pub user_id: &'a str,
    pub cif: &'a str,
    pub name: &'a str,
    pub ong_type: &'a str,
    pub status: &'a str,
    pub city: &'a str,
    pub address: Option<&'a str>,
    pub postal_code: Option<&'a str>,
    pub province: Option<&'a str>,
    pub contact_email: &'a str,
    pub contact_phone: Option<&'a str>,
}

pub struct DonationRow {
    pub id: String,
    pub donor_id: String,
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
    pub status: String,
    pub assigned_ong_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

pub struct NewDonation<'a> {
    pub donor_id: &'a str,
    pub title: &'a str,
    pub description: &'a str,
    pub category: &'a str,
    pub quantity: &'a str,
    pub city: &'a str,
    pub address: Option<&'a str>,
    pub postal_code: Option<&'a str>,
    pub province: Option<&'a str>,
    pub images: &'a [String],
}

pub struct NeedRow {
    pub id: String,
    pub ong_id: String,
    pub title: String,
    pub description: String,
    pub category: String,
    pub quantity: Option<String>,
    pub urgent: bool,
    pub status: String,
    pub created_at: String,
    pub updated_at: String,
}

pub struct NewNeed<'a> {
    pub ong_id: &'a str,
    pub title: &'a str,
    pub description: &'a str,
    pub category: &'a str,
    pub quantity: Option<&'a str>,
    pub urgent: bool,
}

/// A conversation joined with the fields of its subject that authorization
/// and display need. Only one of the `donation_*` / `need_*` groups is set.
#[derive(Debug, Clone)]
pub struct ConversationRow {
    pub id: String,
    pub status: String,
    pub donation_id: Option<String>,
    pub need_id: Option<String>,
    pub donor_id: Option<String>,
    pub ong_id: Option<String>,
    pub ong_name: Option<String>,
    pub donor_last_read_at: Option<String>,
    pub ong_last_read_at: Option<String>,
    pub closed_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub donation_title: Option<String>,
    pub donation_donor_id: Option<String>,
    pub donation_assigned_ong_id: Option<String>,
    pub need_title: Option<String>,
    pub need_ong_id: Option<String>,
}

pub struct MessageRow {
    pub id: String,
    pub conversation_id: String,
    pub sender_id: String,
    pub sender_username: String,
    pub ong_id: Option<String>,
    pub ong_name: Option<String>,
    pub content: String,
    pub created_at: String,
}
