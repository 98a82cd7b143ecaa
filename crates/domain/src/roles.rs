//! 管理端角色与权限表
//!
//! 封闭枚举加显式权限表，权限判断只走 `Role::allows`，
//! 调用点不做字符串比较。

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Root,
    Administrator,
    Moderator,
    User,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    BanSubject,
    UnbanSubject,
    ListBans,
    DeleteMessage,
    ClearChat,
    ListMessages,
    EditFilterPatterns,
    EditSettings,
}

impl Role {
    /// 角色的权限集合
    pub fn permissions(&self) -> &'static [Permission] {
        use Permission::*;
        match self {
            Role::Root | Role::Administrator => &[
                BanSubject,
                UnbanSubject,
                ListBans,
                DeleteMessage,
                ClearChat,
                ListMessages,
                EditFilterPatterns,
                EditSettings,
            ],
            Role::Moderator => &[
                BanSubject,
                UnbanSubject,
                ListBans,
                DeleteMessage,
                ListMessages,
            ],
            Role::User => &[],
        }
    }

    pub fn allows(&self, permission: Permission) -> bool {
        self.permissions().contains(&permission)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn moderator_cannot_clear_chat() {
        assert!(Role::Moderator.allows(Permission::BanSubject));
        assert!(!Role::Moderator.allows(Permission::ClearChat));
        assert!(!Role::Moderator.allows(Permission::EditFilterPatterns));
    }

    #[test]
    fn plain_user_has_no_admin_permissions() {
        assert!(Role::User.permissions().is_empty());
    }

    #[test]
    fn root_and_administrator_share_the_full_set() {
        assert_eq!(Role::Root.permissions(), Role::Administrator.permissions());
    }
}
