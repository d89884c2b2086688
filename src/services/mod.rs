pub mod chat;
pub mod memory;
