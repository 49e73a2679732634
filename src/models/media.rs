use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use validator::Validate;

/// `videos/{id}` 文档
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Video {
    pub id: String,
    pub user_id: String,
    pub user_name: String,
    #[serde(rename = "userPhotoURL")]
    pub user_photo_url: String,
    pub url: String,
    pub thumbnail_url: String,
    pub title: String,
    pub description: String,
    pub likes: Vec<String>,
    pub comments: Vec<Comment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

/// `posts/{id}` 文档
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Post {
    pub id: String,
    pub user_id: String,
    pub image_url: String,
    pub caption: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: String,
    pub text: String,
    pub user_id: String,
    #[serde(default)]
    pub user_name: String,
    #[serde(rename = "userPhotoURL", default)]
    pub user_photo_url: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub likes: Vec<String>,
}

/// `collections/{id}` 文档
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Collection {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub items: Vec<String>,
    pub user_id: String,
    pub likes: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Video,
    Post,
}

/// 集合中解析后的可播放条目
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaItem {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: MediaKind,
    pub url: String,
    pub thumbnail_url: String,
    pub title: String,
    /// 查找失败时的占位条目
    pub unavailable: bool,
}

impl MediaItem {
    pub fn from_video(video: &Video, id: &str, placeholder_thumbnail: &str) -> Self {
        let thumbnail_url = if video.thumbnail_url.is_empty() {
            placeholder_thumbnail.to_string()
        } else {
            video.thumbnail_url.clone()
        };

        Self {
            id: id.to_string(),
            kind: MediaKind::Video,
            url: video.url.clone(),
            thumbnail_url,
            title: video.title.clone(),
            unavailable: false,
        }
    }

    pub fn from_post(post: &Post, id: &str, placeholder_image: &str) -> Self {
        let url = if post.image_url.is_empty() {
            placeholder_image.to_string()
        } else {
            post.image_url.clone()
        };

        Self {
            id: id.to_string(),
            kind: MediaKind::Post,
            thumbnail_url: url.clone(),
            url,
            title: post.caption.clone(),
            unavailable: false,
        }
    }

    pub fn placeholder(id: &str, placeholder_thumbnail: &str) -> Self {
        Self {
            id: id.to_string(),
            kind: MediaKind::Video,
            url: String::new(),
            thumbnail_url: placeholder_thumbnail.to_string(),
            title: "Media non disponibile".to_string(),
            unavailable: true,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionDetail {
    pub collection: Collection,
    pub items: Vec<MediaItem>,
    pub viewer: ViewerState,
}

/// 集合浏览器的游标
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionViewer {
    kinds: Vec<MediaKind>,
    current_index: usize,
    autoplay: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewerState {
    pub current_index: usize,
    pub autoplay: bool,
    pub has_previous: bool,
    pub has_next: bool,
    pub position: String,
    pub total: usize,
}

impl CollectionViewer {
    pub fn new(items: &[MediaItem]) -> Self {
        Self {
            kinds: items.iter().map(|item| item.kind).collect(),
            current_index: 0,
            autoplay: false,
        }
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn autoplay(&self) -> bool {
        self.autoplay
    }

    pub fn has_previous(&self) -> bool {
        self.current_index > 0
    }

    pub fn has_next(&self) -> bool {
        self.current_index + 1 < self.kinds.len()
    }

    pub fn next(&mut self) -> bool {
        if !self.has_next() {
            return false;
        }
        self.move_to(self.current_index + 1);
        true
    }

    pub fn previous(&mut self) -> bool {
        if !self.has_previous() {
            return false;
        }
        self.move_to(self.current_index - 1);
        true
    }

    pub fn select(&mut self, index: usize) -> bool {
        if index >= self.kinds.len() {
            return false;
        }
        self.move_to(index);
        true
    }

    fn move_to(&mut self, index: usize) {
        self.current_index = index;
        self.autoplay = self.kinds[index] == MediaKind::Video;
    }

    pub fn position(&self) -> String {
        if self.kinds.is_empty() {
            return "0 / 0".to_string();
        }
        format!("{} / {}", self.current_index + 1, self.kinds.len())
    }

    pub fn state(&self) -> ViewerState {
        ViewerState {
            current_index: self.current_index,
            autoplay: self.autoplay,
            has_previous: self.has_previous(),
            has_next: self.has_next(),
            position: self.position(),
            total: self.kinds.len(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LikeState {
    pub is_liked: bool,
    pub likes_count: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentView {
    #[serde(flatten)]
    pub comment: Comment,
    pub relative_time: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoDetail {
    pub video: Video,
    pub likes_count: usize,
    pub is_liked: bool,
    pub is_owner: bool,
    pub comments: Vec<CommentView>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AddCommentRequest {
    pub text: String,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateVideoRequest {
    #[validate(length(max = 150))]
    pub title: Option<String>,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[validate(url)]
    pub thumbnail_url: Option<String>,
}
