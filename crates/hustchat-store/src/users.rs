//! Queries over [`User`] records.

use hustchat_shared::UserId;
use rusqlite::params;

use crate::database::{optional, Database};
use crate::error::Result;
use crate::models::{Presence, Profile, User};

const USER_COLUMNS: &str = "id, username, email, phone_number, avatar_url, status, last_seen";

impl Database {
    /// Fetch a single user by id.
    pub fn get_user(&self, id: &UserId) -> Result<Option<User>> {
        optional(self.conn().query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
            params![id.as_str()],
            row_to_user,
        ))
    }

    /// Fetch the display profile of a user.
    pub fn get_profile(&self, id: &UserId) -> Result<Option<Profile>> {
        Ok(self.get_user(id)?.map(|u| u.profile()))
    }

    /// Users whose email equals `email` exactly.
    pub fn find_users_by_email(&self, email: &str) -> Result<Vec<User>> {
        self.find_users_where("email", email)
    }

    /// Users whose phone number equals `phone` exactly.
    pub fn find_users_by_phone(&self, phone: &str) -> Result<Vec<User>> {
        self.find_users_where("phone_number", phone)
    }

    fn find_users_where(&self, column: &'static str, value: &str) -> Result<Vec<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE {column} = ?1 ORDER BY id ASC");
        let mut stmt = self.conn().prepare(&sql)?;
        let rows = stmt.query_map(params![value], row_to_user)?;

        let mut users = Vec::new();
        for row in rows {
            users.push(row?);
        }
        Ok(users)
    }
}

fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    let id: String = row.get(0)?;
    let status: String = row.get(5)?;
    Ok(User {
        id: UserId(id),
        username: row.get(1)?,
        email: row.get(2)?,
        phone_number: row.get(3)?,
        avatar_url: row.get(4)?,
        status: Presence::from_stored(&status),
        last_seen: row.get(6)?,
    })
}
