use crate::{
    error::{AppError, Result},
    models::media::*,
    models::user::UserDocument,
    services::auth::User,
    services::database::Database,
    services::store::{DocPath, FieldTransform, WriteBatch},
    utils::time::relative_time,
};
use chrono::Utc;
use futures::future::join_all;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;
use validator::Validate;

/// 视频详情与集合浏览
#[derive(Clone)]
pub struct MediaService {
    db: Arc<Database>,
}

impl MediaService {
    pub async fn new(db: Arc<Database>) -> Result<Self> {
        Ok(Self { db })
    }

    async fn load_video(&self, video_id: &str) -> Result<Video> {
        let mut video = self
            .db
            .get_as::<Video>(&DocPath::video(video_id)?)
            .await?
            .ok_or_else(|| AppError::not_found("Video"))?;
        video.id = video_id.to_string();
        Ok(video)
    }

    pub async fn video_detail(&self, viewer_id: Option<&str>, video_id: &str) -> Result<VideoDetail> {
        debug!("Loading video detail: {}", video_id);

        let video = self.load_video(video_id).await?;
        let now = Utc::now();
        let comments = video
            .comments
            .iter()
            .map(|comment| CommentView {
                relative_time: relative_time(comment.created_at, now),
                comment: comment.clone(),
            })
            .collect();

        Ok(VideoDetail {
            likes_count: video.likes.len(),
            is_liked: viewer_id.map(|id| video.likes.iter().any(|l| l == id)).unwrap_or(false),
            is_owner: viewer_id == Some(video.user_id.as_str()),
            comments,
            video,
        })
    }

    /// 点赞/取消点赞
    pub async fn toggle_like(&self, user_id: &str, video_id: &str) -> Result<LikeState> {
        debug!("User {} toggling like on video {}", user_id, video_id);
        let path = DocPath::video(video_id)?;

        self.db
            .run_transaction("toggle_like", |tx| {
                let path = path.clone();
                async move {
                    let video: Video = tx
                        .get_as(&path)
                        .await?
                        .ok_or_else(|| AppError::not_found("Video"))?;

                    let liked = video.likes.iter().any(|id| id == user_id);
                    if liked {
                        tx.update(&path, vec![FieldTransform::array_remove("likes", vec![json!(user_id)])]);
                        Ok(LikeState {
                            is_liked: false,
                            likes_count: video.likes.iter().filter(|id| *id != user_id).count(),
                        })
                    } else {
                        tx.update(&path, vec![FieldTransform::array_union("likes", vec![json!(user_id)])]);
                        Ok(LikeState {
                            is_liked: true,
                            likes_count: video.likes.len() + 1,
                        })
                    }
                }
            })
            .await
    }

    /// 发表评论
    pub async fn add_comment(&self, user: &User, video_id: &str, request: AddCommentRequest) -> Result<Comment> {
        let text = request.text.trim();
        if text.is_empty() {
            return Err(AppError::Validation("Il commento non può essere vuoto".to_string()));
        }
        let max_length = self.db.config.max_comment_length;
        if text.chars().count() > max_length {
            return Err(AppError::Validation(format!(
                "Il commento non può superare {} caratteri",
                max_length
            )));
        }

        let author = self
            .db
            .get_as::<UserDocument>(&DocPath::user(&user.id)?)
            .await?;
        let user_name = author
            .as_ref()
            .map(|a| a.display_name.clone())
            .filter(|name| !name.is_empty())
            .or_else(|| user.display_name.clone())
            .unwrap_or_else(|| "Utente".to_string());
        let user_photo_url = author
            .as_ref()
            .map(|a| a.photo_url.clone())
            .filter(|photo| !photo.is_empty())
            .or_else(|| user.photo_url.clone())
            .unwrap_or_default();

        let comment = Comment {
            id: Uuid::new_v4().to_string(),
            text: text.to_string(),
            user_id: user.id.clone(),
            user_name,
            user_photo_url,
            created_at: Utc::now(),
            likes: Vec::new(),
        };

        // 视频不存在时 update 返回 NotFound
        self.db
            .commit(WriteBatch::new().update(
                DocPath::video(video_id)?,
                vec![FieldTransform::array_union("comments", vec![serde_json::to_value(&comment)?])],
            ))
            .await?;

        info!("User {} commented on video {}", user.id, video_id);
        Ok(comment)
    }

    /// 修改视频信息，仅限所有者
    pub async fn update_video(&self, user_id: &str, video_id: &str, request: UpdateVideoRequest) -> Result<Video> {
        request.validate()?;
        let path = DocPath::video(video_id)?;

        let video = self
            .db
            .run_transaction("update_video", |tx| {
                let path = path.clone();
                let request = request.clone();
                async move {
                    let mut video: Video = tx
                        .get_as(&path)
                        .await?
                        .ok_or_else(|| AppError::not_found("Video"))?;
                    if video.user_id != user_id {
                        return Err(AppError::forbidden("Solo il proprietario può modificare il video"));
                    }

                    let mut transforms = Vec::new();
                    if let Some(title) = request.title.as_deref().map(str::trim) {
                        video.title = title.to_string();
                        transforms.push(FieldTransform::set("title", json!(title)));
                    }
                    if let Some(description) = request.description.as_deref().map(str::trim) {
                        video.description = description.to_string();
                        transforms.push(FieldTransform::set("description", json!(description)));
                    }
                    if let Some(thumbnail) = request.thumbnail_url.as_deref() {
                        video.thumbnail_url = thumbnail.to_string();
                        transforms.push(FieldTransform::set("thumbnailUrl", json!(thumbnail)));
                    }
                    tx.update(&path, transforms);
                    video.id = video_id.to_string();
                    Ok(video)
                }
            })
            .await?;

        info!("Video {} updated by {}", video_id, user_id);
        Ok(video)
    }

    /// 删除视频，仅限所有者
    pub async fn delete_video(&self, user_id: &str, video_id: &str) -> Result<()> {
        let path = DocPath::video(video_id)?;

        self.db
            .run_transaction("delete_video", |tx| {
                let path = path.clone();
                async move {
                    let video: Video = tx
                        .get_as(&path)
                        .await?
                        .ok_or_else(|| AppError::not_found("Video"))?;
                    if video.user_id != user_id {
                        return Err(AppError::forbidden("Solo il proprietario può eliminare il video"));
                    }
                    tx.delete(&path);
                    Ok(())
                }
            })
            .await?;

        info!("Video {} deleted by {}", video_id, user_id);
        Ok(())
    }

    /// 解析集合中的条目：先查视频再查图片，失败时用占位条目
    pub async fn resolve_collection(&self, collection_id: &str, index: Option<usize>) -> Result<CollectionDetail> {
        debug!("Resolving collection: {}", collection_id);

        let mut collection = self
            .db
            .get_as::<Collection>(&DocPath::collection(collection_id)?)
            .await?
            .ok_or_else(|| AppError::not_found("Collection"))?;
        collection.id = collection_id.to_string();

        let items = join_all(collection.items.iter().map(|id| self.resolve_item(id))).await;

        let mut viewer = CollectionViewer::new(&items);
        if let Some(index) = index {
            if !viewer.is_empty() {
                viewer.select(index.min(viewer.len() - 1));
            }
        }

        Ok(CollectionDetail {
            collection,
            viewer: viewer.state(),
            items,
        })
    }

    async fn resolve_item(&self, item_id: &str) -> MediaItem {
        let config = &self.db.config;
        match self.lookup_item(item_id).await {
            Ok(Some(item)) => item,
            Ok(None) => {
                warn!("Collection item {} not found in videos or posts", item_id);
                MediaItem::placeholder(item_id, &config.placeholder_video_url)
            }
            Err(e) => {
                warn!("Failed to resolve collection item {}: {}", item_id, e);
                MediaItem::placeholder(item_id, &config.placeholder_video_url)
            }
        }
    }

    async fn lookup_item(&self, item_id: &str) -> Result<Option<MediaItem>> {
        let config = &self.db.config;

        if let Some(video) = self.db.get_as::<Video>(&DocPath::video(item_id)?).await? {
            return Ok(Some(MediaItem::from_video(&video, item_id, &config.placeholder_video_url)));
        }
        if let Some(post) = self.db.get_as::<Post>(&DocPath::post(item_id)?).await? {
            return Ok(Some(MediaItem::from_post(&post, item_id, &config.placeholder_image_url)));
        }
        Ok(None)
    }
}
