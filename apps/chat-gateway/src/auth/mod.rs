pub mod middleware;
pub mod session;
pub mod tokens;
