pub mod comment;
pub mod post;
pub mod room;
pub mod user;
