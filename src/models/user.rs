use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use validator::Validate;

use crate::models::privacy::{LockReason, PrivacySettings, ProfileVisibility};

/// `users/{uid}` 文档
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserDocument {
    pub id: String,
    pub display_name: String,
    #[serde(rename = "photoURL")]
    pub photo_url: String,
    pub bio: String,
    pub phone_numbers: Vec<String>,
    pub secondary_email: String,
    pub social_links: SocialLinks,
    pub followers: Vec<String>,
    pub following: Vec<String>,
    pub stats: UserStats,
    pub privacy: PrivacySettings,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserStats {
    pub followers: u64,
    pub following: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SocialLinks {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub facebook: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instagram: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub telegram: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tiktok: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub github: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub linkedin: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub twitter: Option<String>,
}

impl SocialLinks {
    pub fn entries(&self) -> [(&'static str, Option<&str>); 7] {
        [
            ("facebook", self.facebook.as_deref()),
            ("instagram", self.instagram.as_deref()),
            ("telegram", self.telegram.as_deref()),
            ("tiktok", self.tiktok.as_deref()),
            ("github", self.github.as_deref()),
            ("linkedin", self.linkedin.as_deref()),
            ("twitter", self.twitter.as_deref()),
        ]
    }

    /// 去掉空白链接
    pub fn normalized(&self) -> Self {
        fn clean(link: &Option<String>) -> Option<String> {
            link.as_ref()
                .map(|l| l.trim().to_string())
                .filter(|l| !l.is_empty())
        }

        Self {
            facebook: clean(&self.facebook),
            instagram: clean(&self.instagram),
            telegram: clean(&self.telegram),
            tiktok: clean(&self.tiktok),
            github: clean(&self.github),
            linkedin: clean(&self.linkedin),
            twitter: clean(&self.twitter),
        }
    }
}

impl UserDocument {
    pub fn new(id: &str, display_name: &str, photo_url: &str) -> Self {
        let now = Utc::now();
        Self {
            id: id.to_string(),
            display_name: display_name.to_string(),
            photo_url: photo_url.to_string(),
            created_at: Some(now),
            updated_at: Some(now),
            ..Default::default()
        }
    }

    /// 旧文档可能没有 `id` 字段，以路径中的 ID 为准
    pub fn with_id(mut self, id: &str) -> Self {
        if self.id != id {
            self.id = id.to_string();
        }
        self
    }

    pub fn has_follower(&self, user_id: &str) -> bool {
        self.followers.iter().any(|id| id == user_id)
    }

    pub fn follows(&self, user_id: &str) -> bool {
        self.following.iter().any(|id| id == user_id)
    }

    pub fn is_private(&self) -> bool {
        self.privacy.is_private()
    }
}

/// 个人资料编辑页的数据
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase", default)]
pub struct ProfileData {
    #[validate(length(min = 1, max = 50, message = "Il nome deve avere tra 1 e 50 caratteri"))]
    pub display_name: String,
    #[serde(rename = "photoURL")]
    pub photo_url: String,
    pub bio: String,
    pub phone_numbers: Vec<String>,
    pub secondary_email: String,
    pub social_links: SocialLinks,
}

impl Default for ProfileData {
    fn default() -> Self {
        Self {
            display_name: String::new(),
            photo_url: String::new(),
            bio: String::new(),
            phone_numbers: vec![String::new()],
            secondary_email: String::new(),
            social_links: SocialLinks::default(),
        }
    }
}

impl From<&UserDocument> for ProfileData {
    fn from(user: &UserDocument) -> Self {
        let phone_numbers = if user.phone_numbers.is_empty() {
            vec![String::new()]
        } else {
            user.phone_numbers.clone()
        };

        Self {
            display_name: user.display_name.clone(),
            photo_url: user.photo_url.clone(),
            bio: user.bio.clone(),
            phone_numbers,
            secondary_email: user.secondary_email.clone(),
            social_links: user.social_links.clone(),
        }
    }
}

/// 对外展示的资料摘要
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicProfile {
    pub id: String,
    pub display_name: String,
    #[serde(rename = "photoURL")]
    pub photo_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    pub stats: UserStats,
    pub is_private: bool,
}

impl PublicProfile {
    pub fn from_user(user: &UserDocument, show_bio: bool) -> Self {
        Self {
            id: user.id.clone(),
            display_name: user.display_name.clone(),
            photo_url: user.photo_url.clone(),
            bio: show_bio.then(|| user.bio.clone()),
            stats: user.stats,
            is_private: user.is_private(),
        }
    }
}

/// 个人主页视图
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileView {
    pub profile: PublicProfile,
    pub visibility: ProfileVisibility,
    pub is_own_profile: bool,
    pub is_following: bool,
    pub can_view_content: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lock_reason: Option<LockReason>,
}
