use anyhow::{Context, Result};
use async_trait::async_trait;
use octocrab::models::{AppId, InstallationId};
use octocrab::Octocrab;
use tracing::debug;

use super::{GithubClient, GithubError, OctocrabClient};
use crate::models::Repository;

/// Builds repository-bound clients for the installation that sent an event
#[async_trait]
pub trait ClientFactory: Send + Sync + 'static {
    type Client: GithubClient + 'static;

    async fn client_for(
        &self,
        installation_id: u64,
        repo: Repository,
    ) -> Result<Self::Client, GithubError>;
}

/// GitHub App authentication: app JWT exchanged for installation tokens by octocrab
pub struct AppClientFactory {
    app: Octocrab,
}

impl AppClientFactory {
    /// Create a factory from the app id and its RSA private key (PEM)
    pub fn new(app_id: u64, private_key_pem: &[u8]) -> Result<Self> {
        let key = jsonwebtoken::EncodingKey::from_rsa_pem(private_key_pem)
            .context("Failed to parse GitHub App private key")?;

        let app = Octocrab::builder()
            .app(AppId(app_id), key)
            .build()
            .context("Failed to create GitHub App client")?;

        Ok(Self { app })
    }
}

#[async_trait]
impl ClientFactory for AppClientFactory {
    type Client = OctocrabClient;

    async fn client_for(
        &self,
        installation_id: u64,
        repo: Repository,
    ) -> Result<Self::Client, GithubError> {
        debug!(installation_id, repo = %repo.full_name, "Creating installation client");

        let client = self.app.installation(InstallationId(installation_id))?;
        Ok(OctocrabClient::new(client, repo))
    }
}
