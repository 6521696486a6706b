//! Chat domain: users, sessions, messages and the message service port.

pub mod message;
pub mod service;
pub mod user;
