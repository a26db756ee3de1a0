pub mod hosted_chat;
pub mod local_model;
