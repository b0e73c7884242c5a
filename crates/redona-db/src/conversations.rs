use anyhow::Result;
use rusqlite::{Connection, Row, params};
use uuid::Uuid;

use redona_types::models::{ConversationStatus, ConversationSubject, Party};

use crate::OptionalExt;
use crate::models::{ConversationRow, MessageRow};

const CONVERSATION_COLUMNS: &str = "
    SELECT c.id, c.status, c.donation_id, c.need_id, c.donor_id, c.ong_id, o.name,
           c.donor_last_read_at, c.ong_last_read_at, c.closed_at, c.created_at, c.updated_at,
           d.title, d.donor_id, d.assigned_ong_id, n.title, n.ong_id";

const CONVERSATION_FROM: &str = "
    FROM conversations c
    LEFT JOIN donations d ON d.id = c.donation_id
    LEFT JOIN needs n ON n.id = c.need_id
    LEFT JOIN ongs o ON o.id = COALESCE(c.ong_id, d.assigned_ong_id, n.ong_id)";

fn map_conversation(row: &Row<'_>) -> rusqlite::Result<ConversationRow> {
    Ok(ConversationRow {
        id: row.get(0)?,
        status: row.get(1)?,
        donation_id: row.get(2)?,
        need_id: row.get(3)?,
        donor_id: row.get(4)?,
        ong_id: row.get(5)?,
        ong_name: row.get(6)?,
        donor_last_read_at: row.get(7)?,
        ong_last_read_at: row.get(8)?,
        closed_at: row.get(9)?,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
        donation_title: row.get(12)?,
        donation_donor_id: row.get(13)?,
        donation_assigned_ong_id: row.get(14)?,
        need_title: row.get(15)?,
        need_ong_id: row.get(16)?,
    })
}

/// Whose conversations to list.
#[derive(Debug, Clone, Copy)]
pub enum ListScope<'a> {
    Donor { user_id: &'a str },
    Ong { ong_id: &'a str, user_id: &'a str },
}

pub struct ConversationListRow {
    pub conversation: ConversationRow,
    pub unread_count: i64,
}

fn last_read_column(party: Party) -> &'static str {
    match party {
        Party::Donor => "donor_last_read_at",
        Party::Ong => "ong_last_read_at",
    }
}

pub fn get_conversation(conn: &Connection, id: &str) -> Result<Option<ConversationRow>> {
    let sql = format!("{CONVERSATION_COLUMNS} {CONVERSATION_FROM} WHERE c.id = ?1");
    conn.query_row(&sql, [id], map_conversation).optional()
}

pub fn find_open_for_donation(conn: &Connection, donation_id: &str) -> Result<Option<ConversationRow>> {
    let sql = format!("{CONVERSATION_COLUMNS} {CONVERSATION_FROM} WHERE c.donation_id = ?1 AND c.status = 'OPEN'");
    conn.query_row(&sql, [donation_id], map_conversation).optional()
}

pub fn find_open_for_need(
    conn: &Connection,
    need_id: &str,
    donor_id: &str,
) -> Result<Option<ConversationRow>> {
    let sql = format!(
        "{CONVERSATION_COLUMNS} {CONVERSATION_FROM} WHERE c.need_id = ?1 AND c.donor_id = ?2 AND c.status = 'OPEN'"
    );
    conn.query_row(&sql, [need_id, donor_id], map_conversation).optional()
}

/// The donor is reachable through the donation, so it is not stored here.
pub fn insert_donation_conversation(conn: &Connection, donation_id: &str, ong_id: &str) -> Result<String> {
    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO conversations (id, status, donation_id, ong_id, created_at, updated_at)
         VALUES (?1, 'OPEN', ?2, ?3, ?4, ?4)",
        params![id, donation_id, ong_id, crate::now()],
    )?;
    Ok(id)
}

pub fn insert_need_conversation(
    conn: &Connection,
    need_id: &str,
    donor_id: &str,
    ong_id: &str,
) -> Result<String> {
    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO conversations (id, status, need_id, donor_id, ong_id, created_at, updated_at)
         VALUES (?1, 'OPEN', ?2, ?3, ?4, ?5, ?5)",
        params![id, need_id, donor_id, ong_id, crate::now()],
    )?;
    Ok(id)
}

/// Close every OPEN conversation about `subject`. Returns how many were closed.
pub fn close_open_conversations(conn: &Connection, subject: &ConversationSubject) -> Result<usize> {
    let column = match subject {
        ConversationSubject::Donation { .. } => "donation_id",
        ConversationSubject::Need { .. } => "need_id",
    };
    let now = crate::now();
    let sql = format!(
        "UPDATE conversations SET status = 'CLOSED', closed_at = ?1, updated_at = ?1
         WHERE {column} = ?2 AND status = 'OPEN'"
    );
    let closed = conn.execute(&sql, params![now, subject.id()])?;
    Ok(closed)
}

pub fn list_conversations(
    conn: &Connection,
    scope: ListScope<'_>,
    status: Option<ConversationStatus>,
) -> Result<Vec<ConversationListRow>> {
    let (party, filter, subject_id, user_id) = match scope {
        ListScope::Donor { user_id } => (
            Party::Donor,
            "(c.donor_id = ?1 OR d.donor_id = ?1)",
            user_id,
            user_id,
        ),
        ListScope::Ong { ong_id, user_id } => (
            Party::Ong,
            "(c.ong_id = ?1 OR d.assigned_ong_id = ?1 OR n.ong_id = ?1)",
            ong_id,
            user_id,
        ),
    };
    let read_col = last_read_column(party);

    // Unread count: messages from the other side newer than this party's
    // last-read stamp (all of them when the party never opened the chat).
    let sql = format!(
        "{CONVERSATION_COLUMNS},
            (SELECT COUNT(*) FROM messages m
             WHERE m.conversation_id = c.id
               AND m.sender_id <> ?2
               AND (c.{read_col} IS NULL OR m.created_at > c.{read_col}))
         {CONVERSATION_FROM}
         WHERE {filter} AND (?3 IS NULL OR c.status = ?3)
         ORDER BY c.updated_at DESC, c.created_at DESC"
    );

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![subject_id, user_id, status.map(|s| s.as_str())], |row| {
            Ok(ConversationListRow {
                conversation: map_conversation(row)?,
                unread_count: row.get(17)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

/// Stamp the party's last-read timestamp with the current time.
pub fn mark_read(conn: &Connection, conversation_id: &str, party: Party) -> Result<()> {
    let sql = format!(
        "UPDATE conversations SET {} = ?1 WHERE id = ?2",
        last_read_column(party)
    );
    conn.execute(&sql, params![crate::now(), conversation_id])?;
    Ok(())
}

// -- Messages --

const MESSAGE_SELECT: &str = "
    SELECT m.id, m.conversation_id, m.sender_id, u.username, m.ong_id, o.name, m.content, m.created_at
    FROM messages m
    LEFT JOIN users u ON u.id = m.sender_id
    LEFT JOIN ongs o ON o.id = m.ong_id";

fn map_message(row: &Row<'_>) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        id: row.get(0)?,
        conversation_id: row.get(1)?,
        sender_id: row.get(2)?,
        sender_username: row
            .get::<_, Option<String>>(3)?
            .unwrap_or_else(|| "unknown".to_string()),
        ong_id: row.get(4)?,
        ong_name: row.get(5)?,
        content: row.get(6)?,
        created_at: row.get(7)?,
    })
}

/// Insert a message and bump the conversation's `updated_at` to its timestamp.
pub fn insert_message(
    conn: &Connection,
    conversation_id: &str,
    sender_id: &str,
    ong_id: Option<&str>,
    content: &str,
) -> Result<String> {
    let id = Uuid::new_v4().to_string();
    let now = crate::now();
    conn.execute(
        "INSERT INTO messages (id, conversation_id, sender_id, ong_id, content, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![id, conversation_id, sender_id, ong_id, content, now],
    )?;
    conn.execute(
        "UPDATE conversations SET updated_at = ?1 WHERE id = ?2",
        params![now, conversation_id],
    )?;
    Ok(id)
}

pub fn get_message(conn: &Connection, id: &str) -> Result<Option<MessageRow>> {
    let sql = format!("{MESSAGE_SELECT} WHERE m.id = ?1");
    conn.query_row(&sql, [id], map_message).optional()
}

/// Oldest first.
pub fn list_messages(conn: &Connection, conversation_id: &str) -> Result<Vec<MessageRow>> {
    let sql = format!("{MESSAGE_SELECT} WHERE m.conversation_id = ?1 ORDER BY m.created_at ASC, m.rowid ASC");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([conversation_id], map_message)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn count_messages(conn: &Connection, conversation_id: &str) -> Result<i64> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM messages WHERE conversation_id = ?1",
        [conversation_id],
        |r| r.get(0),
    )?;
    Ok(count)
}
