pub mod action;
pub mod conversation;
