pub mod auth;
pub mod database;
pub mod follow;
pub mod media;
pub mod profile;
pub mod store;

// 重新导出常用类型
pub use auth::AuthService;
pub use database::Database;
pub use follow::FollowService;
pub use media::MediaService;
pub use profile::ProfileService;
