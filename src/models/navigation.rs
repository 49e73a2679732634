use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SidebarAction {
    Navigate,
    Logout,
}

/// 个人主页侧边栏的菜单项
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SidebarEntry {
    pub key: &'static str,
    pub label: &'static str,
    pub action: SidebarAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<&'static str>,
}

impl SidebarEntry {
    const fn link(key: &'static str, label: &'static str, path: &'static str) -> Self {
        Self { key, label, action: SidebarAction::Navigate, path: Some(path) }
    }
}

pub fn sidebar_menu() -> Vec<SidebarEntry> {
    vec![
        SidebarEntry::link("settings", "Impostazioni", "/settings"),
        SidebarEntry::link("privacy", "Privacy", "/privacy"),
        SidebarEntry::link("notifications", "Notifiche", "/notifications"),
        SidebarEntry::link("help", "Aiuto", "/help"),
        SidebarEntry {
            key: "logout",
            label: "Esci",
            action: SidebarAction::Logout,
            path: None,
        },
    ]
}

pub const LOGIN_PATH: &str = "/login";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogoutResponse {
    pub redirect: &'static str,
}

impl Default for LogoutResponse {
    fn default() -> Self {
        Self { redirect: LOGIN_PATH }
    }
}
