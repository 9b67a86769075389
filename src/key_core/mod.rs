//! Key Core - credential sharing and recovery from key expiry

pub mod channel;
pub mod credential;
pub mod lifecycle;
pub mod token;

pub use channel::{ChannelError, DiscordChannel, Notification, OperatorChannel};
pub use credential::{mask_key, CredentialHandle, KeyState};
pub use lifecycle::{KeyLifecycleConfig, KeyLifecycleManager, RecoveryOutcome, RunStats};
pub use token::KeyEnvelope;
