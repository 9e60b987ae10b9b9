pub mod command_executor;
pub mod credential_store;

pub use command_executor::{CommandError, SafeCommandExecutor};
pub use credential_store::CredentialStore;
