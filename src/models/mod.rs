pub mod follow;
pub mod media;
pub mod navigation;
pub mod privacy;
pub mod response;
pub mod user;
