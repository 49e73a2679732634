use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    #[default]
    Public,
    Private,
}

/// 谁可以看到个人主页内容
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProfileVisibility {
    #[default]
    Public,
    Private,
    Followers,
    /// 无法识别的旧值，除本人外一律不可见
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PostAudience {
    #[default]
    Everyone,
    Followers,
    None,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PrivacySettings {
    pub account_type: AccountType,
    pub profile_visibility: ProfileVisibility,
    pub who_can_see_my_posts: PostAudience,
    pub show_last_seen: bool,
    pub show_status: bool,
    pub show_bio: bool,
    pub show_posts: bool,
    pub show_services: bool,
}

impl Default for PrivacySettings {
    fn default() -> Self {
        Self {
            account_type: AccountType::Public,
            profile_visibility: ProfileVisibility::Public,
            who_can_see_my_posts: PostAudience::Everyone,
            show_last_seen: true,
            show_status: true,
            show_bio: true,
            show_posts: true,
            show_services: true,
        }
    }
}

/// 隐私设置的部分更新
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrivacyUpdate {
    pub account_type: Option<AccountType>,
    pub profile_visibility: Option<ProfileVisibility>,
    pub who_can_see_my_posts: Option<PostAudience>,
    pub show_last_seen: Option<bool>,
    pub show_status: Option<bool>,
    pub show_bio: Option<bool>,
    pub show_posts: Option<bool>,
    pub show_services: Option<bool>,
}

impl PrivacyUpdate {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// 隐私面板中的一个开关
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrivacyToggle {
    pub key: &'static str,
    pub label: &'static str,
    pub value: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrivacyPanel {
    pub settings: PrivacySettings,
    pub toggles: Vec<PrivacyToggle>,
}

impl PrivacySettings {
    pub fn apply(&mut self, update: &PrivacyUpdate) {
        if let Some(account_type) = update.account_type {
            self.account_type = account_type;
        }
        if let Some(visibility) = update.profile_visibility {
            self.profile_visibility = visibility;
        }
        if let Some(audience) = update.who_can_see_my_posts {
            self.who_can_see_my_posts = audience;
        }
        if let Some(value) = update.show_last_seen {
            self.show_last_seen = value;
        }
        if let Some(value) = update.show_status {
            self.show_status = value;
        }
        if let Some(value) = update.show_bio {
            self.show_bio = value;
        }
        if let Some(value) = update.show_posts {
            self.show_posts = value;
        }
        if let Some(value) = update.show_services {
            self.show_services = value;
        }
    }

    pub fn is_private(&self) -> bool {
        self.account_type == AccountType::Private
    }

    pub fn toggles(&self) -> Vec<PrivacyToggle> {
        vec![
            PrivacyToggle { key: "showLastSeen", label: "Mostra ultimo accesso", value: self.show_last_seen },
            PrivacyToggle { key: "showStatus", label: "Mostra stato online", value: self.show_status },
            PrivacyToggle { key: "showBio", label: "Mostra biografia", value: self.show_bio },
            PrivacyToggle { key: "showPosts", label: "Mostra post", value: self.show_posts },
            PrivacyToggle { key: "showServices", label: "Mostra servizi", value: self.show_services },
        ]
    }

    pub fn panel(&self) -> PrivacyPanel {
        PrivacyPanel {
            settings: self.clone(),
            toggles: self.toggles(),
        }
    }
}

/// 内容被隐藏的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LockReason {
    PrivateAccount,
    FollowersOnly,
}

/// 个人主页内容是否可见：本人总是可见，公开总是可见，
/// 私密与仅关注者需要已关注
pub fn can_view_content(is_own_profile: bool, visibility: ProfileVisibility, is_following: bool) -> bool {
    if is_own_profile {
        return true;
    }

    match visibility {
        ProfileVisibility::Public => true,
        ProfileVisibility::Private | ProfileVisibility::Followers => is_following,
        ProfileVisibility::Unknown => false,
    }
}

pub fn lock_reason(visibility: ProfileVisibility) -> LockReason {
    match visibility {
        ProfileVisibility::Followers => LockReason::FollowersOnly,
        _ => LockReason::PrivateAccount,
    }
}
