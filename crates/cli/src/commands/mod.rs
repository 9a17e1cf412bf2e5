pub mod chat;
pub mod compose;
pub mod onboard;
pub mod status;
