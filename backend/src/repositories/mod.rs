pub mod credential;
pub mod memory;
pub mod refresh_token;
pub mod session;

pub use credential::{CredentialStore, PgCredentialStore};
pub use memory::{MemoryCredentialStore, MemoryRefreshTokenStore, MemorySessionStore};
pub use refresh_token::{PgRefreshTokenStore, RefreshTokenStore};
pub use session::{PgSessionStore, SessionStore};
