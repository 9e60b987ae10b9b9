//! Run orchestration
//!
//! Drives one run through its phases: plan, gate, build, push. The outcome is a
//! typed [`RunOutcome`]; mapping it to a process exit code is left to the binary.

use crate::core::artifact::ArtifactInstance;
use crate::core::context::RunContext;
use crate::core::error::PublishError;
use crate::core::state_machine::{RunPhase, RunStateMachine};
use crate::core::traits::{ArtifactProducer, FeedPushReport};
use crate::orchestration::planner::{PlanDecision, PublicationPlanner};
use crate::orchestration::publisher::Publisher;
use crate::validation::RepositoryVersionInfo;
use tracing::{error, info};

/// Inputs of a run
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub version: RepositoryVersionInfo,
    /// Publishable project identifiers
    pub projects: Vec<String>,
    pub ignore_no_artifacts_to_produce: bool,
    /// Stop after the plan summary
    pub plan_only: bool,
}

/// How a run ended
#[derive(Debug, Clone)]
pub enum RunOutcome {
    /// Every feed completed (pushed, nothing to push, or skipped)
    Published { reports: Vec<FeedPushReport> },
    /// Every artifact already exists in every target feed
    NothingToPublish,
    /// Planning only: what a publish run would push
    PlanOnly { to_publish: Vec<ArtifactInstance> },
    /// At least one feed failed to push
    Failed { reports: Vec<FeedPushReport> },
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, RunOutcome::Failed { .. })
    }

    pub fn reports(&self) -> &[FeedPushReport] {
        match self {
            RunOutcome::Published { reports } | RunOutcome::Failed { reports } => reports,
            RunOutcome::NothingToPublish | RunOutcome::PlanOnly { .. } => &[],
        }
    }
}

pub struct Orchestrator<'a> {
    ctx: &'a RunContext,
    producer: &'a dyn ArtifactProducer,
    state: RunStateMachine,
}

impl<'a> Orchestrator<'a> {
    pub fn new(ctx: &'a RunContext, producer: &'a dyn ArtifactProducer) -> Self {
        Self {
            ctx,
            producer,
            state: RunStateMachine::new(ctx.run_id, ctx.started_at),
        }
    }

    /// Phase record of the last run
    pub fn state(&self) -> &RunStateMachine {
        &self.state
    }

    /// Execute a run
    ///
    /// Configuration and build errors abort the run and are returned as `Err`.
    /// Feed failures never abort: they end in [`RunOutcome::Failed`] once every
    /// other feed has completed.
    pub async fn run(&mut self, request: RunRequest) -> Result<RunOutcome, PublishError> {
        match self.execute(request).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                error!(run_id = %self.ctx.run_id, error = %e, code = e.code(), "run aborted");
                self.state.fail(e.to_string());
                Err(e)
            }
        }
    }

    async fn execute(&mut self, request: RunRequest) -> Result<RunOutcome, PublishError> {
        info!(
            run_id = %self.ctx.run_id,
            version = %request.version.normalized_version,
            projects = request.projects.len(),
            "starting publication run"
        );

        self.state.transition(RunPhase::Planning);
        let repository = PublicationPlanner::new(self.ctx)
            .plan(
                request.version,
                &request.projects,
                request.ignore_no_artifacts_to_produce,
            )
            .await?;
        self.state.set_version(
            repository.version().normalized_version.clone(),
            repository.channel().as_str(),
        );

        println!("\n📦 Publication plan ({})", repository.channel());
        for line in repository.summary() {
            println!("  {}", line);
        }

        let to_publish = repository.actual_artifacts_to_publish();
        if request.plan_only {
            self.state.transition(RunPhase::Success);
            return Ok(RunOutcome::PlanOnly { to_publish });
        }

        if repository.decision() == PlanDecision::NothingToPublish {
            println!("\n✅ All artifacts are already published, nothing to build.");
            self.state.transition(RunPhase::NothingToPublish);
            return Ok(RunOutcome::NothingToPublish);
        }

        self.state.transition(RunPhase::Building);
        info!(producer = self.producer.name(), artifacts = to_publish.len(), "producing artifacts");
        self.producer
            .produce(&to_publish, self.ctx.artifacts_dir())
            .await?;

        self.state.transition(RunPhase::Publishing);
        let reports = Publisher::new(self.ctx).publish(&repository).await;
        self.state.set_feed_reports(reports.clone());

        if reports.iter().any(|r| r.status.is_failure()) {
            self.state.fail("one or more feeds failed to push");
            Ok(RunOutcome::Failed { reports })
        } else {
            self.state.transition(RunPhase::Success);
            info!(run_id = %self.ctx.run_id, elapsed_ms = self.state.elapsed_ms(), "run completed");
            Ok(RunOutcome::Published { reports })
        }
    }
}
