//! Standalone query functions over a `&Connection`.
//!
//! Every function that depends on the clock takes `now` explicitly; callers
//! pass `Utc::now()` and tests pass fixed instants.

use crate::{
    DatabaseError, DatabaseResult, FlushLease, LeaseStatus, MessageStatus, NewSpooledMessage,
    PurgeFilter, SpoolCounts, SpooledMessage,
};
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::{debug, warn};

const MESSAGE_COLUMNS: &str = "id, sender, recipients, subject, body, status, attempts, permanent, \
     last_error, enqueued_at, last_attempt_at, sent_at";

/// Convert a timestamp to the unix-millis representation stored in SQLite.
pub fn to_millis(dt: DateTime<Utc>) -> i64 {
    dt.timestamp_millis()
}

/// Convert stored unix millis back to a timestamp.
pub fn from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}

fn message_from_row(row: &Row<'_>) -> rusqlite::Result<SpooledMessage> {
    let recipients_json: String = row.get(2)?;
    let recipients = serde_json::from_str(&recipients_json)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(e)))?;

    Ok(SpooledMessage {
        id: row.get(0)?,
        sender: row.get(1)?,
        recipients,
        subject: row.get(3)?,
        body: row.get(4)?,
        status: MessageStatus::from_str(&row.get::<_, String>(5)?),
        attempts: row.get(6)?,
        permanent: row.get(7)?,
        last_error: row.get(8)?,
        enqueued_at: from_millis(row.get(9)?),
        last_attempt_at: row.get::<_, Option<i64>>(10)?.map(from_millis),
        sent_at: row.get::<_, Option<i64>>(11)?.map(from_millis),
    })
}

// ==========================================
// Messages
// ==========================================

/// Insert a new pending message.
pub fn insert_message(conn: &Connection, message: &NewSpooledMessage) -> DatabaseResult<()> {
    let recipients = serde_json::to_string(&message.recipients)?;
    conn.execute(
        "INSERT INTO spool_messages (id, sender, recipients, subject, body, status, enqueued_at)
         VALUES (?1, ?2, ?3, ?4, ?5, 'pending', ?6)",
        params![
            message.id,
            message.sender,
            recipients,
            message.subject,
            message.body,
            to_millis(message.enqueued_at),
        ],
    )?;
    debug!(message_id = %message.id, "Message spooled");
    Ok(())
}

/// Get a message by ID.
pub fn get_message(conn: &Connection, id: &str) -> DatabaseResult<Option<SpooledMessage>> {
    let sql = format!("SELECT {MESSAGE_COLUMNS} FROM spool_messages WHERE id = ?1");
    let mut stmt = conn.prepare_cached(&sql)?;
    let message = stmt.query_row(params![id], message_from_row).optional()?;
    Ok(message)
}

/// List messages, oldest first, optionally restricted to one state.
pub fn list_messages(
    conn: &Connection,
    status: Option<MessageStatus>,
    limit: usize,
) -> DatabaseResult<Vec<SpooledMessage>> {
    let sql = format!(
        "SELECT {MESSAGE_COLUMNS} FROM spool_messages
         WHERE ?1 IS NULL OR status = ?1
         ORDER BY enqueued_at ASC, rowid ASC
         LIMIT ?2"
    );
    let mut stmt = conn.prepare_cached(&sql)?;
    let messages = stmt
        .query_map(
            params![status.map(|s| s.as_str()), limit as i64],
            message_from_row,
        )?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(messages)
}

/// Error recorded on a pending message that already used its attempts.
pub const INTERRUPTED_ERROR: &str = "delivery interrupted";

/// Claim the oldest eligible message and move it to `in_flight`.
///
/// Eligible messages are `pending` ones, plus `failed` ones that are not
/// permanent, have attempts left, and were last tried before `pass_start`.
/// The claim bumps `attempts` and stamps `last_attempt_at = now`.
///
/// A `pending` message only carries attempts after recovery put it back. If
/// it already used `max_attempts` it is failed here instead of claimed, so
/// a message that keeps killing the flusher stops being retried.
pub fn claim_next_message(
    conn: &Connection,
    now: DateTime<Utc>,
    pass_start: DateTime<Utc>,
    max_attempts: u32,
) -> DatabaseResult<Option<SpooledMessage>> {
    let tx = conn.unchecked_transaction()?;

    let exhausted = tx.execute(
        "UPDATE spool_messages
         SET status = 'failed', last_error = ?1
         WHERE status = 'pending' AND attempts >= ?2",
        params![INTERRUPTED_ERROR, max_attempts],
    )?;
    if exhausted > 0 {
        warn!(exhausted, "Failing interrupted messages with no attempts left");
    }

    let sql = format!(
        "UPDATE spool_messages
         SET status = 'in_flight', attempts = attempts + 1, last_attempt_at = ?1
         WHERE id = (
             SELECT id FROM spool_messages
             WHERE status = 'pending'
                OR (status = 'failed' AND permanent = 0 AND attempts < ?2
                    AND (last_attempt_at IS NULL OR last_attempt_at < ?3))
             ORDER BY enqueued_at ASC, rowid ASC
             LIMIT 1
         )
         RETURNING {MESSAGE_COLUMNS}"
    );
    let claimed = {
        let mut stmt = tx.prepare_cached(&sql)?;
        stmt.query_row(
            params![to_millis(now), max_attempts, to_millis(pass_start)],
            message_from_row,
        )
        .optional()?
    };
    tx.commit()?;
    Ok(claimed)
}

/// Mark an in-flight message as delivered, keeping its row.
pub fn mark_sent(conn: &Connection, id: &str, now: DateTime<Utc>) -> DatabaseResult<bool> {
    let updated = conn.execute(
        "UPDATE spool_messages
         SET status = 'sent', sent_at = ?1, last_error = NULL
         WHERE id = ?2 AND status = 'in_flight'",
        params![to_millis(now), id],
    )?;
    Ok(updated > 0)
}

/// Delete a message regardless of state.
pub fn delete_message(conn: &Connection, id: &str) -> DatabaseResult<bool> {
    let deleted = conn.execute("DELETE FROM spool_messages WHERE id = ?1", params![id])?;
    Ok(deleted > 0)
}

/// Record a failed delivery for an in-flight message.
pub fn mark_failed(
    conn: &Connection,
    id: &str,
    error: &str,
    permanent: bool,
) -> DatabaseResult<bool> {
    let updated = conn.execute(
        "UPDATE spool_messages
         SET status = 'failed', last_error = ?1, permanent = ?2
         WHERE id = ?3 AND status = 'in_flight'",
        params![error, permanent, id],
    )?;
    Ok(updated > 0)
}

/// Return in-flight messages last attempted before `cutoff` to `pending`.
pub fn recover_in_flight(conn: &Connection, cutoff: DateTime<Utc>) -> DatabaseResult<usize> {
    let recovered = conn.execute(
        "UPDATE spool_messages
         SET status = 'pending'
         WHERE status = 'in_flight'
           AND (last_attempt_at IS NULL OR last_attempt_at < ?1)",
        params![to_millis(cutoff)],
    )?;
    if recovered > 0 {
        debug!(recovered, "Recovered stuck in-flight messages");
    }
    Ok(recovered)
}

/// Count messages per state.
pub fn count_by_status(conn: &Connection, max_attempts: u32) -> DatabaseResult<SpoolCounts> {
    let counts = conn.query_row(
        "SELECT
             COALESCE(SUM(status = 'pending'), 0),
             COALESCE(SUM(status = 'in_flight'), 0),
             COALESCE(SUM(status = 'sent'), 0),
             COALESCE(SUM(status = 'failed' AND permanent = 0 AND attempts < ?1), 0),
             COALESCE(SUM(status = 'failed' AND (permanent = 1 OR attempts >= ?1)), 0),
             MIN(CASE WHEN status = 'pending' THEN enqueued_at END)
         FROM spool_messages",
        params![max_attempts],
        |row| {
            Ok(SpoolCounts {
                pending: row.get::<_, i64>(0)? as u64,
                in_flight: row.get::<_, i64>(1)? as u64,
                sent: row.get::<_, i64>(2)? as u64,
                failed: row.get::<_, i64>(3)? as u64,
                dead: row.get::<_, i64>(4)? as u64,
                oldest_pending_at: row.get::<_, Option<i64>>(5)?.map(from_millis),
            })
        },
    )?;
    Ok(counts)
}

/// Delete dead and/or retained sent messages.
pub fn purge_messages(
    conn: &Connection,
    filter: &PurgeFilter,
    max_attempts: u32,
) -> DatabaseResult<usize> {
    if !filter.dead && !filter.sent {
        return Ok(0);
    }
    let purged = conn.execute(
        "DELETE FROM spool_messages
         WHERE ((?1 AND status = 'failed' AND (permanent = 1 OR attempts >= ?3))
                OR (?2 AND status = 'sent'))
           AND (?4 IS NULL OR enqueued_at < ?4)",
        params![
            filter.dead,
            filter.sent,
            max_attempts,
            filter.enqueued_before.map(to_millis),
        ],
    )?;
    debug!(purged, "Purged spool messages");
    Ok(purged)
}

// ==========================================
// Flush lease
// ==========================================

/// Get the current lease row, expired or not.
pub fn get_lease(conn: &Connection) -> DatabaseResult<Option<FlushLease>> {
    let lease = conn
        .query_row(
            "SELECT holder, acquired_at, expires_at FROM spool_flush_lease WHERE id = 1",
            [],
            |row| {
                Ok(FlushLease {
                    holder: row.get(0)?,
                    acquired_at: from_millis(row.get(1)?),
                    expires_at: from_millis(row.get(2)?),
                })
            },
        )
        .optional()?;
    Ok(lease)
}

/// Take the flush lease if it is free, expired, or already ours.
pub fn try_acquire_lease(
    conn: &Connection,
    holder: &str,
    now: DateTime<Utc>,
    expires_at: DateTime<Utc>,
) -> DatabaseResult<LeaseStatus> {
    let changed = conn.execute(
        "INSERT INTO spool_flush_lease (id, holder, acquired_at, expires_at)
         VALUES (1, ?1, ?2, ?3)
         ON CONFLICT(id) DO UPDATE SET
             holder = excluded.holder,
             acquired_at = excluded.acquired_at,
             expires_at = excluded.expires_at
         WHERE spool_flush_lease.expires_at <= excluded.acquired_at
            OR spool_flush_lease.holder = excluded.holder",
        params![holder, to_millis(now), to_millis(expires_at)],
    )?;

    if changed > 0 {
        return Ok(LeaseStatus::Acquired);
    }

    let current = get_lease(conn)?
        .ok_or_else(|| DatabaseError::NotFound("flush lease".to_string()))?;
    Ok(LeaseStatus::HeldBy(current))
}

/// Push out the expiry of a lease we hold. Returns false if we lost it.
pub fn renew_lease(
    conn: &Connection,
    holder: &str,
    expires_at: DateTime<Utc>,
) -> DatabaseResult<bool> {
    let updated = conn.execute(
        "UPDATE spool_flush_lease SET expires_at = ?1 WHERE id = 1 AND holder = ?2",
        params![to_millis(expires_at), holder],
    )?;
    Ok(updated > 0)
}

/// Drop a lease we hold.
pub fn release_lease(conn: &Connection, holder: &str) -> DatabaseResult<bool> {
    let deleted = conn.execute(
        "DELETE FROM spool_flush_lease WHERE id = 1 AND holder = ?1",
        params![holder],
    )?;
    Ok(deleted > 0)
}
