//! Client registrations kept by a master.

use crate::{ContentStore, StoreError, StoreResult, from_db_time, to_db_time};
use chrono::{DateTime, Utc};
use coursesync_types::ClientRegistration;
use rusqlite::{Connection, OptionalExtension, params};

const CLIENT_COLUMNS: &str = "endpoint_url, display_name, push_secret, first_seen_at, last_seen_at";

type RawClient = (String, String, Option<String>, String, String);

fn read_client(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawClient> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
}

fn into_registration(raw: RawClient) -> StoreResult<ClientRegistration> {
    let (endpoint_url, display_name, push_secret, first_seen, last_seen) = raw;
    Ok(ClientRegistration {
        endpoint_url,
        display_name,
        push_secret,
        first_seen_at: from_db_time(&first_seen)?,
        last_seen_at: from_db_time(&last_seen)?,
    })
}

fn load_client(conn: &Connection, url: &str) -> StoreResult<Option<ClientRegistration>> {
    conn.query_row(
        &format!("SELECT {CLIENT_COLUMNS} FROM client_registrations WHERE endpoint_url = ?1"),
        params![url],
        read_client,
    )
    .optional()?
    .map(into_registration)
    .transpose()
}

impl ContentStore {
    /// Records a verified connection from a client. The first call creates the
    /// registration; later calls refresh its name and `last_seen_at`.
    pub fn touch_client(
        &self,
        endpoint_url: &str,
        display_name: &str,
        seen_at: DateTime<Utc>,
    ) -> StoreResult<ClientRegistration> {
        let conn = self.conn()?;
        let ts = to_db_time(seen_at);
        conn.execute(
            "INSERT INTO client_registrations (endpoint_url, display_name, first_seen_at, last_seen_at)
             VALUES (?1, ?2, ?3, ?3)
             ON CONFLICT(endpoint_url) DO UPDATE SET
                display_name = excluded.display_name,
                last_seen_at = excluded.last_seen_at",
            params![endpoint_url, display_name, ts],
        )?;
        load_client(&conn, endpoint_url)?
            .ok_or_else(|| StoreError::NotFound(format!("client {endpoint_url}")))
    }

    /// Adds (or re-keys) a push target.
    pub fn add_push_target(
        &self,
        endpoint_url: &str,
        display_name: &str,
        secret: &str,
    ) -> StoreResult<ClientRegistration> {
        let conn = self.conn()?;
        let ts = to_db_time(Utc::now());
        conn.execute(
            "INSERT INTO client_registrations
                (endpoint_url, display_name, push_secret, first_seen_at, last_seen_at)
             VALUES (?1, ?2, ?3, ?4, ?4)
             ON CONFLICT(endpoint_url) DO UPDATE SET
                display_name = excluded.display_name,
                push_secret = excluded.push_secret",
            params![endpoint_url, display_name, secret, ts],
        )?;
        load_client(&conn, endpoint_url)?
            .ok_or_else(|| StoreError::NotFound(format!("client {endpoint_url}")))
    }

    pub fn client(&self, endpoint_url: &str) -> StoreResult<Option<ClientRegistration>> {
        let conn = self.conn()?;
        load_client(&conn, endpoint_url)
    }

    /// All registrations, in the order they were first seen.
    pub fn list_clients(&self) -> StoreResult<Vec<ClientRegistration>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {CLIENT_COLUMNS} FROM client_registrations ORDER BY first_seen_at, rowid"
        ))?;
        let rows = stmt
            .query_map([], read_client)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(into_registration).collect()
    }

    /// Registrations that carry a push secret.
    pub fn push_targets(&self) -> StoreResult<Vec<ClientRegistration>> {
        Ok(self
            .list_clients()?
            .into_iter()
            .filter(|c| c.push_secret.is_some())
            .collect())
    }

    /// Removes a registration. Returns `false` if none existed.
    pub fn remove_client(&self, endpoint_url: &str) -> StoreResult<bool> {
        let conn = self.conn()?;
        let removed = conn.execute(
            "DELETE FROM client_registrations WHERE endpoint_url = ?1",
            params![endpoint_url],
        )?;
        Ok(removed > 0)
    }
}
