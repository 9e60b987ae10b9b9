//! Feed selection
//!
//! Routing is table-driven: the local sub-feed of a channel comes from
//! [`LOCAL_SUBFEEDS`] and remote feeds are the configured templates that list the
//! channel. Local and blank builds never reach a remote feed.

use crate::core::config::RemoteFeedConfig;
use crate::core::context::RunContext;
use crate::core::error::PublishError;
use crate::core::interaction::{InteractionMode, PUSH_TO_REMOTE};
use crate::core::retry::RetryOptions;
use crate::core::traits::ArtifactFeed;
use crate::feeds::{LocalFeed, RemoteFeed, ViewPromoter};
use crate::validation::Channel;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Local sub-feed directory of each channel
pub const LOCAL_SUBFEEDS: &[(Channel, &str)] = &[
    (Channel::Release, "Release"),
    (Channel::Preview, "Release"),
    (Channel::CI, "CI"),
    (Channel::Local, "Local"),
    (Channel::Blank, "Blank"),
];

pub fn local_subfeed(channel: Channel) -> Option<&'static str> {
    LOCAL_SUBFEEDS
        .iter()
        .find(|(c, _)| *c == channel)
        .map(|(_, dir)| *dir)
}

/// Remote feed templates serving a channel, in configuration order
pub fn remote_templates_for(
    channel: Channel,
    templates: &[RemoteFeedConfig],
) -> Vec<&RemoteFeedConfig> {
    if !channel.allows_remote() {
        return Vec::new();
    }
    templates.iter().filter(|t| t.serves(channel)).collect()
}

/// Search `start` and its parents for a directory named `dir_name`
pub fn find_local_feed_root(start: &Path, dir_name: &str) -> Option<PathBuf> {
    start
        .ancestors()
        .map(|dir| dir.join(dir_name))
        .find(|candidate| candidate.is_dir())
}

/// Builds the ordered feed list of a run
pub struct FeedRegistry<'a> {
    ctx: &'a RunContext,
}

impl<'a> FeedRegistry<'a> {
    pub fn new(ctx: &'a RunContext) -> Self {
        Self { ctx }
    }

    /// Select the target feeds of a channel: the local sub-feed first, then remote feeds
    pub async fn select(&self, channel: Channel) -> Result<Vec<Arc<dyn ArtifactFeed>>, PublishError> {
        let mut feeds: Vec<Arc<dyn ArtifactFeed>> = Vec::new();

        if let Some(local) = self.local_feed(channel).await? {
            feeds.push(Arc::new(local));
        }

        let templates = remote_templates_for(channel, self.ctx.config.remote_feeds());
        if !templates.is_empty() && self.remote_publishing_enabled().await? {
            for template in templates {
                feeds.push(Arc::new(self.remote_feed(template)));
            }
        }

        info!(
            %channel,
            feeds = ?feeds.iter().map(|f| f.name().to_string()).collect::<Vec<_>>(),
            "selected target feeds"
        );
        Ok(feeds)
    }

    async fn local_feed(&self, channel: Channel) -> Result<Option<LocalFeed>, PublishError> {
        let Some(subfeed) = local_subfeed(channel) else {
            return Ok(None);
        };
        if !self.ctx.config.local_feed_enabled() {
            return Ok(None);
        }

        let dir_name = self.ctx.config.local_feed_directory_name();
        let Some(root) = find_local_feed_root(&self.ctx.project_path, dir_name) else {
            // Local builds have no other destination
            if !channel.allows_remote() {
                return Err(PublishError::MissingDirectory {
                    path: dir_name.to_string(),
                });
            }
            info!(dir_name, "no local feed directory found");
            return Ok(None);
        };

        let path = root.join(subfeed);
        tokio::fs::create_dir_all(&path)
            .await
            .map_err(|e| PublishError::io(path.display(), e))?;
        Ok(Some(LocalFeed::new(subfeed, path)))
    }

    fn remote_feed(&self, template: &RemoteFeedConfig) -> RemoteFeed {
        let mut feed = RemoteFeed::new(
            &template.name,
            &template.url,
            template.secret_key_name.clone(),
            self.ctx.client.clone(),
        );
        if let Some(push_url) = &template.push_url {
            feed = feed.with_push_url(push_url);
        }
        if let Some(promotion) = &template.promotion {
            let mut promoter = ViewPromoter::new(self.ctx.client.clone(), &promotion.url)
                .with_retry(self.promotion_retry());
            if let Some(views) = &promotion.views {
                promoter = promoter.with_views(views.clone());
            }
            feed = feed.with_promoter(promoter);
        }
        feed
    }

    fn promotion_retry(&self) -> RetryOptions {
        self.ctx.config.promotion_retry()
    }

    /// Whether remote feeds are targeted
    ///
    /// A configured override wins; otherwise build servers push, and an operator
    /// is asked.
    async fn remote_publishing_enabled(&self) -> Result<bool, PublishError> {
        if let Some(enabled) = self.ctx.config.push_to_remote() {
            return Ok(enabled);
        }
        if self.ctx.interaction_mode() == InteractionMode::NoInteraction {
            return Ok(true);
        }
        let answer = self
            .ctx
            .interaction
            .read_option(PUSH_TO_REMOTE, "Push to remote feeds?", &['Y', 'N'])
            .await?;
        Ok(answer == 'Y')
    }
}
