pub mod auth;
pub mod comments;
pub mod error;
pub mod middleware;
pub mod posts;
pub mod votes;
