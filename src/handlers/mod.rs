pub mod admin;
pub mod articles;
pub mod auth;
pub mod comments;
pub mod likes;
pub mod newsletter;
pub mod pages;
pub mod profile;
pub mod topics;
