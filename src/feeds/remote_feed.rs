//! Remote package index feed
//!
//! Existence is checked against the package metadata index:
//! - NuGet: `GET {index}/{lower(id)}/index.json`, the `versions` array lists every version
//! - npm: `GET {index}/{id}`, the `versions` object is keyed by version
//!
//! A 404 means the package has never been published. Pushes are multipart `PUT`
//! requests authenticated by the `X-NuGet-ApiKey` header.

use crate::core::artifact::{ArtifactInstance, ArtifactKind};
use crate::core::error::PublishError;
use crate::core::traits::{ArtifactFeed, FeedDescriptor};
use crate::feeds::view_promoter::ViewPromoter;
use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::multipart::{Form, Part};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

const API_KEY_HEADER: &str = "X-NuGet-ApiKey";

/// NuGet flat container package index
#[derive(Debug, Deserialize)]
struct FlatContainerIndex {
    #[serde(default)]
    versions: Vec<String>,
}

/// npm registry package document
#[derive(Debug, Deserialize)]
struct NpmPackageDocument {
    #[serde(default)]
    versions: HashMap<String, serde_json::Value>,
}

pub struct RemoteFeed {
    descriptor: FeedDescriptor,
    client: reqwest::Client,
    push_url: String,
    promoter: Option<ViewPromoter>,
}

impl RemoteFeed {
    pub fn new(
        name: impl Into<String>,
        index_url: impl Into<String>,
        secret_key_name: Option<String>,
        client: reqwest::Client,
    ) -> Self {
        let index_url = index_url.into().trim_end_matches('/').to_string();
        Self {
            descriptor: FeedDescriptor {
                name: name.into(),
                url_or_path: index_url.clone(),
                is_local: false,
                secret_key_name,
            },
            client,
            push_url: index_url,
            promoter: None,
        }
    }

    /// Upload endpoint, when it differs from the metadata index
    pub fn with_push_url(mut self, push_url: impl Into<String>) -> Self {
        self.push_url = push_url.into();
        self
    }

    pub fn with_promoter(mut self, promoter: ViewPromoter) -> Self {
        self.promoter = Some(promoter);
        self
    }

    pub fn index_url(&self) -> &str {
        &self.descriptor.url_or_path
    }

    pub fn push_url(&self) -> &str {
        &self.push_url
    }

    fn metadata_url(&self, artifact: &ArtifactInstance) -> String {
        match artifact.kind {
            ArtifactKind::NuGet => format!(
                "{}/{}/index.json",
                self.index_url(),
                artifact.name.to_lowercase()
            ),
            ArtifactKind::Npm => format!("{}/{}", self.index_url(), artifact.name),
        }
    }

    fn existence_error(&self, artifact: &ArtifactInstance, message: String) -> PublishError {
        PublishError::ExistenceCheckFailed {
            feed: self.descriptor.name.clone(),
            artifact: artifact.to_string(),
            message,
        }
    }

    fn push_error(&self, artifact: &ArtifactInstance, message: String) -> PublishError {
        PublishError::PushFailed {
            feed: self.descriptor.name.clone(),
            artifact: artifact.to_string(),
            message,
        }
    }

    /// Connection failures and timeouts map to [`PublishError::Network`]
    fn send_error(
        &self,
        error: reqwest::Error,
        otherwise: impl FnOnce(String) -> PublishError,
    ) -> PublishError {
        if error.is_connect() || error.is_timeout() {
            PublishError::Network {
                feed: self.descriptor.name.clone(),
                message: error.to_string(),
            }
        } else {
            otherwise(error.to_string())
        }
    }
}

#[async_trait]
impl ArtifactFeed for RemoteFeed {
    fn descriptor(&self) -> &FeedDescriptor {
        &self.descriptor
    }

    async fn exists(&self, artifact: &ArtifactInstance) -> Result<bool, PublishError> {
        let url = self.metadata_url(artifact);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| self.send_error(e, |m| self.existence_error(artifact, m)))?;

        if response.status() == StatusCode::NOT_FOUND {
            debug!(feed = %self.descriptor.name, %url, "package not found in index");
            return Ok(false);
        }
        if !response.status().is_success() {
            return Err(self.existence_error(artifact, format!("HTTP {}", response.status())));
        }

        let found = match artifact.kind {
            ArtifactKind::NuGet => {
                let index = response
                    .json::<FlatContainerIndex>()
                    .await
                    .map_err(|e| self.existence_error(artifact, e.to_string()))?;
                index
                    .versions
                    .iter()
                    .any(|v| v.eq_ignore_ascii_case(&artifact.version))
            }
            ArtifactKind::Npm => {
                let document = response
                    .json::<NpmPackageDocument>()
                    .await
                    .map_err(|e| self.existence_error(artifact, e.to_string()))?;
                document.versions.contains_key(&artifact.version)
            }
        };

        Ok(found)
    }

    async fn push(
        &self,
        artifact: &ArtifactInstance,
        artifacts_dir: &Path,
        credential: Option<&SecretString>,
    ) -> Result<(), PublishError> {
        let source = artifact.path_in(artifacts_dir);
        let bytes = tokio::fs::read(&source).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                PublishError::MissingArtifact {
                    path: source.display().to_string(),
                }
            } else {
                PublishError::io(source.display(), e)
            }
        })?;

        let part = Part::bytes(bytes)
            .file_name(artifact.file_name())
            .mime_str("application/octet-stream")
            .map_err(|e| self.push_error(artifact, e.to_string()))?;
        let form = Form::new().part("package", part);

        let mut request = self.client.put(&self.push_url).multipart(form);
        if let Some(credential) = credential {
            request = request.header(API_KEY_HEADER, credential.expose_secret());
        }

        let response = request
            .send()
            .await
            .map_err(|e| self.send_error(e, |m| self.push_error(artifact, m)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = if body.trim().is_empty() {
                format!("HTTP {}", status)
            } else {
                format!("HTTP {}: {}", status, body.trim())
            };
            return Err(self.push_error(artifact, message));
        }

        debug!(feed = %self.descriptor.name, artifact = %artifact, "pushed");
        Ok(())
    }

    fn promoter(&self) -> Option<&ViewPromoter> {
        self.promoter.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn artifact(kind: ArtifactKind, name: &str, version: &str) -> ArtifactInstance {
        ArtifactInstance::new(kind, name, version)
    }

    fn feed(server: &MockServer, secret: Option<&str>) -> RemoteFeed {
        RemoteFeed::new(
            "ci",
            format!("{}/v3/flatcontainer/", server.uri()),
            secret.map(str::to_string),
            reqwest::Client::new(),
        )
        .with_push_url(format!("{}/api/v2/package", server.uri()))
    }

    #[tokio::test]
    async fn test_exists_in_flat_container() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v3/flatcontainer/pkg.a/index.json"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "versions": ["1.0.0", "1.2.3-ci.5"] })),
            )
            .mount(&server)
            .await;

        let feed = feed(&server, None);
        assert!(
            feed.exists(&artifact(ArtifactKind::NuGet, "Pkg.A", "1.2.3-CI.5"))
                .await
                .unwrap()
        );
        assert!(
            !feed
                .exists(&artifact(ArtifactKind::NuGet, "Pkg.A", "2.0.0"))
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn test_not_found_means_absent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let feed = feed(&server, None);
        assert!(
            !feed
                .exists(&artifact(ArtifactKind::NuGet, "pkg-b", "1.0.0"))
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn test_server_error_is_existence_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let feed = feed(&server, None);
        let result = feed
            .exists(&artifact(ArtifactKind::NuGet, "pkg-b", "1.0.0"))
            .await;
        let error = result.unwrap_err();
        assert_eq!(error.code(), "EXISTENCE_CHECK_FAILED");
        assert!(error.is_transient());
    }

    #[tokio::test]
    async fn test_unreachable_feed_is_network_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let feed = RemoteFeed::new(
            "ci",
            format!("http://127.0.0.1:{}/v3/flatcontainer", port),
            None,
            reqwest::Client::new(),
        );
        let error = feed
            .exists(&artifact(ArtifactKind::NuGet, "pkg-b", "1.0.0"))
            .await
            .unwrap_err();

        assert_eq!(error.code(), "NETWORK_ERROR");
        assert_eq!(error.feed(), Some("ci"));
        assert!(error.is_transient());
    }

    #[tokio::test]
    async fn test_npm_document_versions() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v3/flatcontainer/pkg-n"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "name": "pkg-n",
                "versions": { "0.1.0": {}, "0.2.0": {} }
            })))
            .mount(&server)
            .await;

        let feed = feed(&server, None);
        assert!(
            feed.exists(&artifact(ArtifactKind::Npm, "pkg-n", "0.2.0"))
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn test_push_sends_api_key() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/api/v2/package"))
            .and(header("X-NuGet-ApiKey", "ci-secret-key"))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        let artifacts = TempDir::new().unwrap();
        std::fs::write(artifacts.path().join("pkg-a.1.2.3.nupkg"), b"zip").unwrap();

        let secret = SecretString::new("ci-secret-key".into());
        feed(&server, Some("MYGET_CI_API_KEY"))
            .push(
                &artifact(ArtifactKind::NuGet, "pkg-a", "1.2.3"),
                artifacts.path(),
                Some(&secret),
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_push_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(409).set_body_string("version exists"))
            .mount(&server)
            .await;

        let artifacts = TempDir::new().unwrap();
        std::fs::write(artifacts.path().join("pkg-a.1.2.3.nupkg"), b"zip").unwrap();

        let error = feed(&server, None)
            .push(
                &artifact(ArtifactKind::NuGet, "pkg-a", "1.2.3"),
                artifacts.path(),
                None,
            )
            .await
            .unwrap_err();
        assert_eq!(error.code(), "PUSH_FAILED");
        assert!(error.to_string().contains("version exists"));
    }

    #[tokio::test]
    async fn test_push_missing_file() {
        let server = MockServer::start().await;
        let artifacts = TempDir::new().unwrap();

        let error = feed(&server, None)
            .push(
                &artifact(ArtifactKind::NuGet, "pkg-a", "1.2.3"),
                artifacts.path(),
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(error, PublishError::MissingArtifact { .. }));
    }
}
