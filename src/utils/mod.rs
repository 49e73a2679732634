pub mod cache;
pub mod middleware;
pub mod time;
pub mod validation;
