pub mod root;
pub mod auth;
pub mod books;
pub mod member;
pub mod admin;
pub mod fines;
pub mod payments;
