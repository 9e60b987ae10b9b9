//! Orchestration layer for artifact publishing
//!
//! Feed selection, existence checks, planning, push and the run driver that
//! sequences them.

pub mod existence_checker;
pub mod feed_registry;
pub mod orchestrator;
pub mod planner;
pub mod producer;
pub mod publisher;

// Re-export main types for convenience
pub use existence_checker::{FeedPlan, TargetFeed, check_feeds};
pub use feed_registry::{FeedRegistry, find_local_feed_root, local_subfeed, remote_templates_for};
pub use orchestrator::{Orchestrator, RunOutcome, RunRequest};
pub use planner::{ArtifactRepository, PlanDecision, PublicationPlanner};
pub use producer::{CommandProducer, PrebuiltArtifacts, verify_artifacts};
pub use publisher::Publisher;
