/// Application name
pub const APP_NAME: &str = "HustChat";

/// Sender id reserved for automated announcements
pub const SYSTEM_SENDER_ID: &str = "SYSTEM";

/// Separator between the two user ids of a direct conversation id
pub const DIRECT_ID_SEPARATOR: char = '_';

/// Preview text and system message posted when a friend request is accepted
pub const FRIENDSHIP_GREETING: &str = "You are now friends. Say hello!";

/// Prefix of the change-detection id of a date header
pub const DATE_HEADER_ID_PREFIX: &str = "date_";

/// Minimum number of invited members when creating a group
pub const MIN_GROUP_MEMBERS: usize = 2;

/// Title shown for a direct conversation whose partner is not resolved yet
pub const UNRESOLVED_PARTNER_TITLE: &str = "User";

/// Announcement posted when a group is created.
pub fn group_created_announcement(group_name: &str) -> String {
    format!("Group \"{group_name}\" has been created.")
}
