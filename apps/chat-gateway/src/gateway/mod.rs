pub mod connection;
pub mod connector;
pub mod error;
pub mod events;
pub mod fanout;
pub mod handler;
pub mod registry;
pub mod server;
pub mod transport;
