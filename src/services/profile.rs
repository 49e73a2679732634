use crate::{
    error::{AppError, Result},
    models::privacy::{can_view_content, lock_reason, PrivacyPanel, PrivacySettings, PrivacyUpdate, ProfileVisibility},
    models::user::{ProfileData, ProfileView, PublicProfile, UserDocument},
    services::auth::User,
    services::database::Database,
    services::store::{DocPath, FieldTransform},
    utils::validation::validate_profile,
};
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info};
use validator::Validate;

/// 个人资料、隐私设置与主页可见性
#[derive(Clone)]
pub struct ProfileService {
    db: Arc<Database>,
}

impl ProfileService {
    pub async fn new(db: Arc<Database>) -> Result<Self> {
        Ok(Self { db })
    }

    async fn load_user(&self, user_id: &str) -> Result<Option<UserDocument>> {
        Ok(self
            .db
            .get_as::<UserDocument>(&DocPath::user(user_id)?)
            .await?
            .map(|user| user.with_id(user_id)))
    }

    /// 首次认证请求时创建用户文档
    pub async fn ensure_profile(&self, user: &User) -> Result<UserDocument> {
        let path = DocPath::user(&user.id)?;

        self.db
            .run_transaction("ensure_profile", |tx| {
                let path = path.clone();
                async move {
                    if let Some(existing) = tx.get_as::<UserDocument>(&path).await? {
                        return Ok(existing.with_id(&user.id));
                    }

                    let document = UserDocument::new(
                        &user.id,
                        user.display_name.as_deref().unwrap_or_default(),
                        user.photo_url.as_deref().unwrap_or_default(),
                    );
                    tx.set_document(&path, &document)?;
                    info!("Created profile document for user {}", user.id);
                    Ok(document)
                }
            })
            .await
    }

    /// 编辑页数据，文档不存在时返回默认值
    pub async fn load_profile(&self, user_id: &str) -> Result<ProfileData> {
        debug!("Loading profile for user: {}", user_id);
        Ok(self
            .load_user(user_id)
            .await?
            .map(|user| ProfileData::from(&user))
            .unwrap_or_default())
    }

    pub async fn save_profile(&self, user: &User, data: ProfileData) -> Result<ProfileData> {
        if user.is_anonymous {
            return Err(AppError::forbidden("Gli utenti anonimi non possono modificare il profilo"));
        }

        data.validate()?;
        let data = validate_profile(&data, self.db.config.max_bio_length)?;
        let path = DocPath::user(&user.id)?;

        self.db
            .run_transaction("save_profile", |tx| {
                let path = path.clone();
                let data = data.clone();
                async move {
                    if tx.get(&path).await?.is_none() {
                        tx.set_document(&path, &UserDocument::new(&user.id, "", ""))?;
                    }
                    tx.update(
                        &path,
                        vec![
                            FieldTransform::set("displayName", json!(data.display_name)),
                            FieldTransform::set("photoURL", json!(data.photo_url)),
                            FieldTransform::set("bio", json!(data.bio)),
                            FieldTransform::set("phoneNumbers", json!(data.phone_numbers)),
                            FieldTransform::set("secondaryEmail", json!(data.secondary_email)),
                            FieldTransform::set("socialLinks", serde_json::to_value(&data.social_links)?),
                            FieldTransform::set("updatedAt", json!(Utc::now())),
                        ],
                    );
                    Ok(())
                }
            })
            .await?;

        info!("Profile updated for user {}", user.id);
        Ok(data)
    }

    pub async fn get_privacy(&self, user_id: &str) -> Result<PrivacyPanel> {
        let settings = self
            .load_user(user_id)
            .await?
            .map(|user| user.privacy)
            .unwrap_or_default();
        Ok(settings.panel())
    }

    /// 部分更新隐私设置，返回合并后的结果
    pub async fn update_privacy(&self, user_id: &str, update: PrivacyUpdate) -> Result<PrivacySettings> {
        debug!("Updating privacy settings for user: {}", user_id);
        // Unknown 只用于读取旧数据，不接受写入
        if update.profile_visibility == Some(ProfileVisibility::Unknown) {
            return Err(AppError::BadRequest("Visibilità del profilo non valida".to_string()));
        }
        let path = DocPath::user(user_id)?;

        let settings = self
            .db
            .run_transaction("update_privacy", |tx| {
                let path = path.clone();
                let update = update.clone();
                async move {
                    let user: UserDocument = tx
                        .get_as(&path)
                        .await?
                        .ok_or_else(|| AppError::not_found("User"))?;

                    let mut settings = user.privacy;
                    if update.is_empty() {
                        return Ok(settings);
                    }
                    settings.apply(&update);
                    tx.update(
                        &path,
                        vec![
                            FieldTransform::set("privacy", serde_json::to_value(&settings)?),
                            FieldTransform::set("updatedAt", json!(Utc::now())),
                        ],
                    );
                    Ok(settings)
                }
            })
            .await?;

        info!("Privacy settings updated for user {}", user_id);
        Ok(settings)
    }

    /// 个人主页视图，按可见性决定是否展示内容
    pub async fn profile_view(&self, viewer_id: Option<&str>, user_id: &str) -> Result<ProfileView> {
        let user = self
            .load_user(user_id)
            .await?
            .ok_or_else(|| AppError::not_found("User"))?;

        let is_own_profile = viewer_id == Some(user_id);
        let is_following = viewer_id.map(|id| user.has_follower(id)).unwrap_or(false);
        let visibility = user.privacy.profile_visibility;
        let can_view = can_view_content(is_own_profile, visibility, is_following);
        let show_bio = is_own_profile || (can_view && user.privacy.show_bio);

        Ok(ProfileView {
            profile: PublicProfile::from_user(&user, show_bio),
            visibility,
            is_own_profile,
            is_following,
            can_view_content: can_view,
            lock_reason: (!can_view).then(|| lock_reason(visibility)),
        })
    }
}
