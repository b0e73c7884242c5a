use anyhow::Result;
use rusqlite::{Connection, Row, params};
use tracing::warn;
use uuid::Uuid;

use redona_types::models::{Coordinates, DonationStatus, NeedStatus, Role};

use crate::OptionalExt;
use crate::models::{DonationRow, NeedRow, NewDonation, NewNeed, NewOng, OngRow, UserRow};

// -- Users --

pub fn insert_user(
    conn: &Connection,
    username: &str,
    email: &str,
    password_hash: &str,
    role: Role,
    location: Option<&str>,
) -> Result<String> {
    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO users (id, username, email, password_hash, role, location, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![id, username, email, password_hash, role.as_str(), location, crate::now()],
    )?;
    Ok(id)
}

pub fn get_user(conn: &Connection, id: &str) -> Result<Option<UserRow>> {
    conn.query_row(
        "SELECT id, username, email, role, location, created_at FROM users WHERE id = ?1",
        [id],
        |row| {
            Ok(UserRow {
                id: row.get(0)?,
                username: row.get(1)?,
                email: row.get(2)?,
                role: row.get(3)?,
                location: row.get(4)?,
                created_at: row.get(5)?,
            })
        },
    )
    .optional()
}

// -- Ongs --

const ONG_COLUMNS: &str = "id, user_id, cif, name, ong_type, status, city, address, postal_code,
    province, latitude, longitude, contact_email, contact_phone, rejection_reason";

fn map_ong(row: &Row<'_>) -> rusqlite::Result<OngRow> {
    Ok(OngRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        cif: row.get(2)?,
        name: row.get(3)?,
        ong_type: row.get(4)?,
        status: row.get(5)?,
        city: row.get(6)?,
        address: row.get(7)?,
        postal_code: row.get(8)?,
        province: row.get(9)?,
        latitude: row.get(10)?,
        longitude: row.get(11)?,
        contact_email: row.get(12)?,
        contact_phone: row.get(13)?,
        rejection_reason: row.get(14)?,
    })
}

pub fn insert_ong(conn: &Connection, ong: &NewOng<'_>) -> Result<String> {
    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO ongs (id, user_id, cif, name, ong_type, status, city, address, postal_code,
                           province, contact_email, contact_phone, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        params![
            id,
            ong.user_id,
            ong.cif,
            ong.name,
            ong.ong_type,
            ong.status,
            ong.city,
            ong.address,
            ong.postal_code,
            ong.province,
            ong.contact_email,
            ong.contact_phone,
            crate::now(),
        ],
    )?;
    Ok(id)
}

pub fn get_ong(conn: &Connection, id: &str) -> Result<Option<OngRow>> {
    let sql = format!("SELECT {ONG_COLUMNS} FROM ongs WHERE id = ?1");
    conn.query_row(&sql, [id], map_ong).optional()
}

pub fn get_ong_by_user(conn: &Connection, user_id: &str) -> Result<Option<OngRow>> {
    let sql = format!("SELECT {ONG_COLUMNS} FROM ongs WHERE user_id = ?1");
    conn.query_row(&sql, [user_id], map_ong).optional()
}

pub fn update_ong_coordinates(conn: &Connection, id: &str, coords: Coordinates) -> Result<()> {
    conn.execute(
        "UPDATE ongs SET latitude = ?1, longitude = ?2 WHERE id = ?3",
        params![coords.latitude, coords.longitude, id],
    )?;
    Ok(())
}

// -- Donations --

const DONATION_COLUMNS: &str = "id, donor_id, title, description, category, quantity, city,
    address, postal_code, province, latitude, longitude, images, status, assigned_ong_id,
    created_at, updated_at";

fn map_donation(row: &Row<'_>) -> rusqlite::Result<DonationRow> {
    let id: String = row.get(0)?;
    let images_json: String = row.get(12)?;
    let images = serde_json::from_str(&images_json).unwrap_or_else(|e| {
        warn!("Corrupt images column on donation '{}': {}", id, e);
        Vec::new()
    });

    Ok(DonationRow {
        id,
        donor_id: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        category: row.get(4)?,
        quantity: row.get(5)?,
        city: row.get(6)?,
        address: row.get(7)?,
        postal_code: row.get(8)?,
        province: row.get(9)?,
        latitude: row.get(10)?,
        longitude: row.get(11)?,
        images,
        status: row.get(13)?,
        assigned_ong_id: row.get(14)?,
        created_at: row.get(15)?,
        updated_at: row.get(16)?,
    })
}

pub fn insert_donation(conn: &Connection, donation: &NewDonation<'_>) -> Result<String> {
    let id = Uuid::new_v4().to_string();
    let now = crate::now();
    let images = serde_json::to_string(donation.images)?;
    conn.execute(
        "INSERT INTO donations (id, donor_id, title, description, category, quantity, city,
                                address, postal_code, province, images, status, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?13)",
        params![
            id,
            donation.donor_id,
            donation.title,
            donation.description,
            donation.category,
            donation.quantity,
            donation.city,
            donation.address,
            donation.postal_code,
            donation.province,
            images,
            DonationStatus::Available.as_str(),
            now,
        ],
    )?;
    Ok(id)
}

pub fn get_donation(conn: &Connection, id: &str) -> Result<Option<DonationRow>> {
    let sql = format!("SELECT {DONATION_COLUMNS} FROM donations WHERE id = ?1");
    conn.query_row(&sql, [id], map_donation).optional()
}

/// AVAILABLE -> ASSIGNED. Returns false when the donation was not AVAILABLE.
pub fn assign_donation(conn: &Connection, id: &str, ong_id: &str) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE donations SET status = ?1, assigned_ong_id = ?2, updated_at = ?3
         WHERE id = ?4 AND status = ?5",
        params![
            DonationStatus::Assigned.as_str(),
            ong_id,
            crate::now(),
            id,
            DonationStatus::Available.as_str(),
        ],
    )?;
    Ok(changed == 1)
}

/// ASSIGNED -> DELIVERED. Returns false when the donation was not ASSIGNED.
pub fn mark_donation_delivered(conn: &Connection, id: &str) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE donations SET status = ?1, updated_at = ?2 WHERE id = ?3 AND status = ?4",
        params![
            DonationStatus::Delivered.as_str(),
            crate::now(),
            id,
            DonationStatus::Assigned.as_str(),
        ],
    )?;
    Ok(changed == 1)
}

/// ASSIGNED -> AVAILABLE, dropping the assigned NGO.
pub fn release_donation(conn: &Connection, id: &str) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE donations SET status = ?1, assigned_ong_id = NULL, updated_at = ?2
         WHERE id = ?3 AND status = ?4",
        params![
            DonationStatus::Available.as_str(),
            crate::now(),
            id,
            DonationStatus::Assigned.as_str(),
        ],
    )?;
    Ok(changed == 1)
}

pub fn update_donation_coordinates(conn: &Connection, id: &str, coords: Coordinates) -> Result<()> {
    conn.execute(
        "UPDATE donations SET latitude = ?1, longitude = ?2 WHERE id = ?3",
        params![coords.latitude, coords.longitude, id],
    )?;
    Ok(())
}

// -- Needs --

const NEED_COLUMNS: &str =
    "id, ong_id, title, description, category, quantity, urgent, status, created_at, updated_at";

fn map_need(row: &Row<'_>) -> rusqlite::Result<NeedRow> {
    Ok(NeedRow {
        id: row.get(0)?,
        ong_id: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        category: row.get(4)?,
        quantity: row.get(5)?,
        urgent: row.get(6)?,
        status: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

pub fn insert_need(conn: &Connection, need: &NewNeed<'_>) -> Result<String> {
    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO needs (id, ong_id, title, description, category, quantity, urgent, status,
                            created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)",
        params![
            id,
            need.ong_id,
            need.title,
            need.description,
            need.category,
            need.quantity,
            need.urgent,
            NeedStatus::Open.as_str(),
            crate::now(),
        ],
    )?;
    Ok(id)
}

pub fn get_need(conn: &Connection, id: &str) -> Result<Option<NeedRow>> {
    let sql = format!("SELECT {NEED_COLUMNS} FROM needs WHERE id = ?1");
    conn.query_row(&sql, [id], map_need).optional()
}

/// OPEN -> CLOSED. Returns false when the need was already closed.
pub fn close_need(conn: &Connection, id: &str) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE needs SET status = ?1, updated_at = ?2 WHERE id = ?3 AND status = ?4",
        params![
            NeedStatus::Closed.as_str(),
            crate::now(),
            id,
            NeedStatus::Open.as_str(),
        ],
    )?;
    Ok(changed == 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;

    fn seed_donor(conn: &Connection) -> String {
        insert_user(conn, "alice", "alice@example.org", "x", Role::Donor, Some("Madrid")).unwrap()
    }

    fn seed_donation(conn: &Connection, donor_id: &str) -> String {
        let images = vec!["https://img.example.org/1.jpg".to_string()];
        insert_donation(
            conn,
            &NewDonation {
                donor_id,
                title: "Winter coats",
                description: "Six adult coats",
                category: "clothing",
                quantity: "6",
                city: "Madrid",
                address: Some("Calle Mayor 1"),
                postal_code: Some("28013"),
                province: Some("Madrid"),
                images: &images,
            },
        )
        .unwrap()
    }

    #[test]
    fn donation_transitions_are_guarded_by_status() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|conn| {
            let donor = seed_donor(conn);
            let ngo_user = insert_user(conn, "ngo", "ngo@example.org", "x", Role::Ngo, None)?;
            let ong = insert_ong(
                conn,
                &NewOng {
                    user_id: &ngo_user,
                    cif: "G12345678",
                    name: "Banco de Ropa",
                    ong_type: "association",
                    status: "APPROVED",
                    city: "Madrid",
                    address: None,
                    postal_code: None,
                    province: None,
                    contact_email: "hola@example.org",
                    contact_phone: None,
                },
            )?;
            let donation = seed_donation(conn, &donor);

            assert!(!mark_donation_delivered(conn, &donation)?);
            assert!(assign_donation(conn, &donation, &ong)?);
            assert!(!assign_donation(conn, &donation, &ong)?);

            let row = get_donation(conn, &donation)?.unwrap();
            assert_eq!(row.status, "ASSIGNED");
            assert_eq!(row.assigned_ong_id.as_deref(), Some(ong.as_str()));
            assert_eq!(row.images, vec!["https://img.example.org/1.jpg".to_string()]);

            assert!(release_donation(conn, &donation)?);
            let row = get_donation(conn, &donation)?.unwrap();
            assert_eq!(row.status, "AVAILABLE");
            assert!(row.assigned_ong_id.is_none());
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn coordinates_are_written_back() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|conn| {
            let donor = seed_donor(conn);
            let donation = seed_donation(conn, &donor);
            assert!(get_donation(conn, &donation)?.unwrap().latitude.is_none());

            update_donation_coordinates(conn, &donation, Coordinates::new(40.4168, -3.7038))?;
            let row = get_donation(conn, &donation)?.unwrap();
            assert_eq!(row.latitude, Some(40.4168));
            assert_eq!(row.longitude, Some(-3.7038));
            Ok(())
        })
        .unwrap();
    }
}
