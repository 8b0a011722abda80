//! User account as read from the `users` collection

use serde::{Deserialize, Serialize};

use crate::permissions::Role;

/// Collection holding user accounts
pub const USERS_COLLECTION: &str = "users";

/// Stored user account. Only the fields needed to log in are decoded; the
/// rest of the document is left to the admin handlers.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserAccount {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub email: String,
    pub role: Role,
    pub password_hash: String,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

/// User login credentials
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginCredentials {
    pub email: String,
    pub password: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decodes_stored_document() {
        let account: UserAccount = serde_json::from_value(json!({
            "id": "u1",
            "name": "Amina",
            "email": "amina@example.org",
            "role": "editor",
            "passwordHash": "$argon2id$...",
            "createdAt": "2024-01-01T00:00:00.000Z"
        }))
        .unwrap();

        assert_eq!(account.role, Role::Editor);
        assert!(account.is_active);
    }

    #[test]
    fn test_rejects_unknown_role() {
        let result = serde_json::from_value::<UserAccount>(json!({
            "id": "u1",
            "email": "a@example.org",
            "role": "owner",
            "passwordHash": "x"
        }));
        assert!(result.is_err());
    }
}
