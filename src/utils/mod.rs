pub mod flash;
pub mod form;
pub mod hash;
pub mod html;
pub mod jwt;
pub mod media;
pub mod slug;
pub mod tokens;
