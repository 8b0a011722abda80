//! Roles, permissions and the static table that links them
//!
//! Permissions are never stored; they are derived from a user's role at
//! request time. The table below is the only source of truth and cannot be
//! changed at runtime.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Role assigned to a user account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Superadmin,
    Admin,
    Editor,
    Viewer,
}

/// Named action gated by role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Permission {
    #[serde(rename = "content.view")]
    ContentView,
    #[serde(rename = "content.create")]
    ContentCreate,
    #[serde(rename = "content.edit")]
    ContentEdit,
    #[serde(rename = "content.publish")]
    ContentPublish,
    #[serde(rename = "content.delete")]
    ContentDelete,
    #[serde(rename = "media.view")]
    MediaView,
    #[serde(rename = "media.upload")]
    MediaUpload,
    #[serde(rename = "media.edit")]
    MediaEdit,
    #[serde(rename = "media.delete")]
    MediaDelete,
    #[serde(rename = "analytics.view")]
    AnalyticsView,
    #[serde(rename = "settings.view")]
    SettingsView,
    #[serde(rename = "settings.edit")]
    SettingsEdit,
    #[serde(rename = "users.view")]
    UsersView,
    #[serde(rename = "users.manage")]
    UsersManage,
}

use Permission::*;

const VIEWER_PERMISSIONS: &[Permission] = &[ContentView, MediaView, AnalyticsView];

const EDITOR_PERMISSIONS: &[Permission] = &[
    ContentView,
    MediaView,
    AnalyticsView,
    ContentCreate,
    ContentEdit,
    ContentPublish,
    MediaUpload,
    MediaEdit,
];

const ADMIN_PERMISSIONS: &[Permission] = &[
    ContentView,
    MediaView,
    AnalyticsView,
    ContentCreate,
    ContentEdit,
    ContentPublish,
    MediaUpload,
    MediaEdit,
    ContentDelete,
    MediaDelete,
    SettingsView,
    SettingsEdit,
    UsersView,
];

/// Role to permission table
pub const ROLE_PERMISSIONS: [(Role, &[Permission]); 4] = [
    (Role::Superadmin, Permission::ALL),
    (Role::Admin, ADMIN_PERMISSIONS),
    (Role::Editor, EDITOR_PERMISSIONS),
    (Role::Viewer, VIEWER_PERMISSIONS),
];

impl Role {
    pub const ALL: &'static [Role] = &[Role::Superadmin, Role::Admin, Role::Editor, Role::Viewer];

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Superadmin => "superadmin",
            Role::Admin => "admin",
            Role::Editor => "editor",
            Role::Viewer => "viewer",
        }
    }

    /// Every permission granted to this role
    pub fn permissions(self) -> &'static [Permission] {
        ROLE_PERMISSIONS
            .iter()
            .find(|(role, _)| *role == self)
            .map(|(_, permissions)| *permissions)
            .unwrap_or(&[])
    }
}

impl Permission {
    pub const ALL: &'static [Permission] = &[
        ContentView,
        ContentCreate,
        ContentEdit,
        ContentPublish,
        ContentDelete,
        MediaView,
        MediaUpload,
        MediaEdit,
        MediaDelete,
        AnalyticsView,
        SettingsView,
        SettingsEdit,
        UsersView,
        UsersManage,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ContentView => "content.view",
            ContentCreate => "content.create",
            ContentEdit => "content.edit",
            ContentPublish => "content.publish",
            ContentDelete => "content.delete",
            MediaView => "media.view",
            MediaUpload => "media.upload",
            MediaEdit => "media.edit",
            MediaDelete => "media.delete",
            AnalyticsView => "analytics.view",
            SettingsView => "settings.view",
            SettingsEdit => "settings.edit",
            UsersView => "users.view",
            UsersManage => "users.manage",
        }
    }
}

/// Whether `role` grants `permission`
pub fn role_allows(role: Role, permission: Permission) -> bool {
    role.permissions().contains(&permission)
}

/// Whether `role` grants at least one of `permissions`
pub fn role_allows_any(role: Role, permissions: &[Permission]) -> bool {
    permissions.iter().any(|p| role_allows(role, *p))
}

/// Whether `role` grants every one of `permissions`
pub fn role_allows_all(role: Role, permissions: &[Permission]) -> bool {
    permissions.iter().all(|p| role_allows(role, *p))
}

/// Error returned when parsing an unknown role or permission name
#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown {kind}: {value}")]
pub struct ParseError {
    kind: &'static str,
    value: String,
}

impl FromStr for Role {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .iter()
            .copied()
            .find(|role| role.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ParseError {
                kind: "role",
                value: s.to_string(),
            })
    }
}

impl FromStr for Permission {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Permission::ALL
            .iter()
            .copied()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| ParseError {
                kind: "permission",
                value: s.to_string(),
            })
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Ordered from most to least privileged
    const HIERARCHY: [Role; 4] = [Role::Superadmin, Role::Admin, Role::Editor, Role::Viewer];

    #[test]
    fn test_roles_are_monotonic() {
        for permission in Permission::ALL {
            for (i, lower) in HIERARCHY.iter().enumerate() {
                if role_allows(*lower, *permission) {
                    for higher in &HIERARCHY[..i] {
                        assert!(
                            role_allows(*higher, *permission),
                            "{higher} must have {permission} because {lower} does"
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn test_superadmin_has_everything() {
        assert!(role_allows_all(Role::Superadmin, Permission::ALL));
    }

    #[test]
    fn test_every_role_is_in_the_table() {
        for role in Role::ALL {
            assert!(!role.permissions().is_empty(), "{role} has no permissions");
        }
    }

    #[test]
    fn test_viewer_is_read_only() {
        assert!(role_allows(Role::Viewer, ContentView));
        assert!(!role_allows(Role::Viewer, ContentEdit));
        assert!(!role_allows(Role::Viewer, ContentDelete));
        assert!(!role_allows(Role::Viewer, MediaUpload));
    }

    #[test]
    fn test_editor_cannot_delete_or_manage() {
        assert!(role_allows(Role::Editor, ContentPublish));
        assert!(!role_allows(Role::Editor, ContentDelete));
        assert!(!role_allows(Role::Editor, SettingsEdit));
        assert!(!role_allows(Role::Admin, UsersManage));
    }

    #[test]
    fn test_any_and_all_helpers() {
        assert!(role_allows_any(Role::Editor, &[ContentDelete, ContentEdit]));
        assert!(!role_allows_all(Role::Editor, &[ContentDelete, ContentEdit]));
        assert!(!role_allows_any(Role::Admin, &[]));
        assert!(role_allows_all(Role::Viewer, &[]));
    }

    #[test]
    fn test_parse_and_display() {
        assert_eq!("Editor".parse::<Role>(), Ok(Role::Editor));
        assert!("owner".parse::<Role>().is_err());
        assert_eq!("media.upload".parse::<Permission>(), Ok(MediaUpload));
        assert_eq!(SettingsEdit.to_string(), "settings.edit");
        assert_eq!(
            serde_json::to_string(&Role::Superadmin).unwrap(),
            "\"superadmin\""
        );
        assert_eq!(
            serde_json::to_string(&UsersManage).unwrap(),
            "\"users.manage\""
        );
    }
}
