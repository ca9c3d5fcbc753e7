//! Friend requests and friend edges.

use hustchat_shared::{RequestId, UserId};
use rusqlite::params;
use uuid::Uuid;

use crate::database::{conversion_error, optional, Database};
use crate::error::{Result, StoreError};
use crate::models::{FriendEdge, FriendRequest, Profile, RequestStatus};

impl Database {
    pub fn get_friend_request(&self, id: &RequestId) -> Result<Option<FriendRequest>> {
        optional(self.conn().query_row(
            "SELECT id, sender_id, receiver_id, status, timestamp
             FROM friend_requests WHERE id = ?1",
            params![id.to_string()],
            row_to_request,
        ))
    }

    /// Pending requests addressed to `receiver_id`, newest first.
    pub fn list_pending_requests_for(&self, receiver_id: &UserId) -> Result<Vec<FriendRequest>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, sender_id, receiver_id, status, timestamp
             FROM friend_requests
             WHERE receiver_id = ?1 AND status = ?2
             ORDER BY timestamp DESC",
        )?;

        let rows = stmt.query_map(
            params![receiver_id.as_str(), RequestStatus::Pending.as_str()],
            row_to_request,
        )?;

        let mut requests = Vec::new();
        for row in rows {
            requests.push(row?);
        }
        Ok(requests)
    }

    /// Friend edges owned by `owner_id`, ordered by the friend's name.
    pub fn list_friends(&self, owner_id: &UserId) -> Result<Vec<FriendEdge>> {
        let mut stmt = self.conn().prepare(
            "SELECT owner_id, friend_id, username, avatar_url
             FROM friends
             WHERE owner_id = ?1
             ORDER BY username COLLATE NOCASE ASC, friend_id ASC",
        )?;

        let rows = stmt.query_map(params![owner_id.as_str()], |row| {
            let owner: String = row.get(0)?;
            let friend: String = row.get(1)?;
            Ok(FriendEdge {
                owner_id: UserId(owner),
                friend: Profile {
                    id: UserId(friend),
                    username: row.get(2)?,
                    avatar_url: row.get(3)?,
                },
            })
        })?;

        let mut edges = Vec::new();
        for row in rows {
            edges.push(row?);
        }
        Ok(edges)
    }

    pub fn are_friends(&self, owner_id: &UserId, friend_id: &UserId) -> Result<bool> {
        let found = optional(self.conn().query_row(
            "SELECT 1 FROM friends WHERE owner_id = ?1 AND friend_id = ?2",
            params![owner_id.as_str(), friend_id.as_str()],
            |_| Ok(()),
        ))?;
        Ok(found.is_some())
    }
}

fn row_to_request(row: &rusqlite::Row<'_>) -> rusqlite::Result<FriendRequest> {
    let id_str: String = row.get(0)?;
    let sender: String = row.get(1)?;
    let receiver: String = row.get(2)?;

    let status: String = row.get(3)?;

    let id = Uuid::parse_str(&id_str).map_err(|e| conversion_error(0, e))?;
    let status = RequestStatus::from_stored(&status).ok_or_else(|| {
        conversion_error(3, StoreError::InvalidValue(format!("request status {status}")))
    })?;

    Ok(FriendRequest {
        id: RequestId(id),
        sender_id: UserId(sender),
        receiver_id: UserId(receiver),
        status,
        timestamp: row.get(4)?,
    })
}
