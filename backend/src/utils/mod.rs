pub mod cookies;
pub mod jwt;
pub mod password;
pub mod tokens;

pub use jwt::*;
pub use password::*;
