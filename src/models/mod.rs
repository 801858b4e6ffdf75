// src/models/mod.rs

pub mod article;
pub mod comment;
pub mod like;
pub mod newsletter;
pub mod page;
pub mod topic;
pub mod user;
