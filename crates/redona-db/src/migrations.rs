use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id              TEXT PRIMARY KEY,
                username        TEXT NOT NULL UNIQUE,
                email           TEXT NOT NULL UNIQUE,
                password_hash   TEXT NOT NULL,
                role            TEXT NOT NULL CHECK (role IN ('DONOR', 'NGO', 'ADMIN')),
                location        TEXT,
                created_at      TEXT NOT NULL
            );

            CREATE TABLE ongs (
                id                  TEXT PRIMARY KEY,
                user_id             TEXT NOT NULL UNIQUE REFERENCES users(id),
                cif                 TEXT NOT NULL UNIQUE,
                name                TEXT NOT NULL,
                ong_type            TEXT NOT NULL,
                status              TEXT NOT NULL DEFAULT 'PENDING'
                                    CHECK (status IN ('PENDING', 'APPROVED', 'REJECTED')),
                city                TEXT NOT NULL,
                address             TEXT,
                postal_code         TEXT,
                province            TEXT,
                latitude            REAL,
                longitude           REAL,
                contact_email       TEXT NOT NULL,
                contact_phone       TEXT,
                rejection_reason    TEXT,
                created_at          TEXT NOT NULL
            );

            CREATE TABLE donations (
                id                  TEXT PRIMARY KEY,
                donor_id            TEXT NOT NULL REFERENCES users(id),
                title               TEXT NOT NULL,
                description         TEXT NOT NULL,
                category            TEXT NOT NULL,
                quantity            TEXT NOT NULL,
                city                TEXT NOT NULL,
                address             TEXT,
                postal_code         TEXT,
                province            TEXT,
                latitude            REAL,
                longitude           REAL,
                images              TEXT NOT NULL DEFAULT '[]',
                status              TEXT NOT NULL DEFAULT 'AVAILABLE'
                                    CHECK (status IN ('AVAILABLE', 'ASSIGNED', 'DELIVERED')),
                assigned_ong_id     TEXT REFERENCES ongs(id),
                created_at          TEXT NOT NULL,
                updated_at          TEXT NOT NULL
            );

            CREATE INDEX idx_donations_donor ON donations(donor_id);

            CREATE TABLE needs (
                id              TEXT PRIMARY KEY,
                ong_id          TEXT NOT NULL REFERENCES ongs(id),
                title           TEXT NOT NULL,
                description     TEXT NOT NULL,
                category        TEXT NOT NULL,
                quantity        TEXT,
                urgent          INTEGER NOT NULL DEFAULT 0,
                status          TEXT NOT NULL DEFAULT 'OPEN' CHECK (status IN ('OPEN', 'CLOSED')),
                created_at      TEXT NOT NULL,
                updated_at      TEXT NOT NULL
            );

            CREATE TABLE conversations (
                id                  TEXT PRIMARY KEY,
                status              TEXT NOT NULL DEFAULT 'OPEN' CHECK (status IN ('OPEN', 'CLOSED')),
                donation_id         TEXT REFERENCES donations(id),
                need_id             TEXT REFERENCES needs(id),
                donor_id            TEXT REFERENCES users(id),
                ong_id              TEXT REFERENCES ongs(id),
                donor_last_read_at  TEXT,
                ong_last_read_at    TEXT,
                closed_at           TEXT,
                created_at          TEXT NOT NULL,
                updated_at          TEXT NOT NULL,
                CHECK ((donation_id IS NULL) <> (need_id IS NULL))
            );

            -- One OPEN conversation per donation, and per (need, donor)
            CREATE UNIQUE INDEX idx_conversations_open_donation
                ON conversations(donation_id)
                WHERE status = 'OPEN' AND donation_id IS NOT NULL;

            CREATE UNIQUE INDEX idx_conversations_open_need
                ON conversations(need_id, donor_id)
                WHERE status = 'OPEN' AND need_id IS NOT NULL;

            CREATE INDEX idx_conversations_updated ON conversations(updated_at);

            CREATE TABLE messages (
                id                  TEXT PRIMARY KEY,
                conversation_id     TEXT NOT NULL REFERENCES conversations(id),
                sender_id           TEXT NOT NULL REFERENCES users(id),
                ong_id              TEXT REFERENCES ongs(id),
                content             TEXT NOT NULL CHECK (length(trim(content)) > 0),
                created_at          TEXT NOT NULL
            );

            CREATE INDEX idx_messages_conversation
                ON messages(conversation_id, created_at);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        run(&conn).unwrap();
        run(&conn).unwrap();

        let version: i64 = conn
            .query_row("SELECT MAX(version) FROM schema_version", [], |r| r.get(0))
            .unwrap();
        assert_eq!(version, 1);
    }
}
