pub mod core;
pub mod feeds;
pub mod orchestration;
pub mod security;
pub mod validation;

pub use crate::core::*;
pub use feeds::{LocalFeed, RemoteFeed, ViewPromoter};
pub use orchestration::{
    ArtifactRepository, CommandProducer, Orchestrator, PlanDecision, PrebuiltArtifacts,
    PublicationPlanner, Publisher, RunOutcome, RunRequest, TargetFeed,
};
pub use security::{CommandError, CredentialStore, SafeCommandExecutor};
pub use validation::{Channel, PackageQuality, RepositoryVersionInfo, classify};
