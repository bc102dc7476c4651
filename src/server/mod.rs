//! Webhook endpoint: verifies deliveries, acknowledges them and runs the
//! release flows in detached tasks.

pub mod error;
pub mod signature;

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::Context;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::github::{ClientFactory, WebhookEvent};
use crate::models::Repository;
use crate::releaser::{PushOutcome, ReleaseError, ReleaseOutcome, Releaser, UpstreamContext};

pub use error::WebhookError;
pub use signature::verify_signature;

const SIGNATURE_HEADER: &str = "x-hub-signature-256";
const EVENT_HEADER: &str = "x-github-event";
const DELIVERY_HEADER: &str = "x-github-delivery";

/// Result of running a flow for one delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Processed {
    Push(PushOutcome),
    Release(ReleaseOutcome),
    Ignored,
}

/// One async lock per repository so flows of a repository never interleave.
///
/// Entries only live while some flow holds or waits for them.
#[derive(Clone, Default)]
struct RepoLocks(Arc<Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>>);

impl RepoLocks {
    fn get(&self, repo: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        locks.entry(repo.to_string()).or_default().clone()
    }

    /// Drop the entry of `repo` once nobody else holds its lock.
    /// Callers must have dropped their own handle first.
    fn release(&self, repo: &str) {
        let mut locks = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        if locks.get(repo).is_some_and(|l| Arc::strong_count(l) == 1) {
            locks.remove(repo);
        }
    }

    fn len(&self) -> usize {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

/// Shared state of the webhook handler
pub struct AppState<F> {
    factory: Arc<F>,
    secret: Arc<[u8]>,
    locks: RepoLocks,
}

impl<F> Clone for AppState<F> {
    fn clone(&self) -> Self {
        Self {
            factory: Arc::clone(&self.factory),
            secret: Arc::clone(&self.secret),
            locks: self.locks.clone(),
        }
    }
}

impl<F: ClientFactory> AppState<F> {
    /// An empty `secret` disables signature verification
    pub fn new(factory: F, secret: impl AsRef<[u8]>) -> Self {
        if secret.as_ref().is_empty() {
            warn!("No webhook secret configured, signatures will not be verified");
        }

        Self {
            factory: Arc::new(factory),
            secret: Arc::from(secret.as_ref()),
            locks: RepoLocks::default(),
        }
    }

    /// Run the flow for an event against the repository it came from
    pub async fn process(
        &self,
        installation_id: u64,
        event: WebhookEvent,
    ) -> Result<Processed, ReleaseError> {
        let (repo, git_ref) = match &event {
            WebhookEvent::Push(e) => (e.repository.clone(), e.after.clone()),
            WebhookEvent::Release(e) => (e.repository.clone(), e.release.tag_name.clone()),
            _ => return Ok(Processed::Ignored),
        };

        let full_name = repo.full_name.clone();
        let lock = self.locks.get(&full_name);
        let result = {
            let _guard = lock.lock().await;
            self.run(installation_id, repo, &git_ref, event).await
        };
        drop(lock);
        self.locks.release(&full_name);
        debug!(repo = %full_name, tracked = self.locks.len(), "Repository lock released");

        result
    }

    async fn run(
        &self,
        installation_id: u64,
        repo: Repository,
        git_ref: &str,
        event: WebhookEvent,
    ) -> Result<Processed, ReleaseError> {
        let client = self
            .factory
            .client_for(installation_id, repo)
            .await
            .upstream("create installation client")?;
        let releaser = Releaser::resolve(client, git_ref).await?;

        match event {
            WebhookEvent::Push(e) => Ok(Processed::Push(releaser.handle_push(&e).await?)),
            WebhookEvent::Release(e) => Ok(Processed::Release(releaser.handle_release(&e).await?)),
            _ => Ok(Processed::Ignored),
        }
    }

    fn dispatch(&self, installation_id: u64, event: WebhookEvent, kind: &str, delivery: &str) {
        let repo = match &event {
            WebhookEvent::Push(e) => e.repository.full_name.clone(),
            WebhookEvent::Release(e) => e.repository.full_name.clone(),
            _ => return,
        };
        let span = info_span!("delivery", repo = %repo, event = %kind, delivery = %delivery);
        let state = self.clone();

        tokio::spawn(
            async move {
                match state.process(installation_id, event).await {
                    Ok(outcome) => info!(?outcome, "Event processed"),
                    Err(err) if err.is_parse() => {
                        warn!(error = %err, "Ignoring event for a tag that is not managed here")
                    }
                    Err(err) => error!(error = %err, "Event processing failed"),
                }
            }
            .instrument(span),
        );
    }
}

/// Build the webhook router
pub fn router<F: ClientFactory>(state: AppState<F>) -> Router {
    Router::new()
        .route("/", get(|| async { "Ready to receive" }))
        .route("/github", post(webhook::<F>))
        .with_state(state)
}

/// Bind `addr` and serve webhooks until the process stops
pub async fn serve<F: ClientFactory>(addr: SocketAddr, state: AppState<F>) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .context("Failed to bind webhook server")?;

    info!(addr = %addr, "Webhook server listening");

    axum::serve(listener, router(state))
        .await
        .context("Webhook server error")?;

    Ok(())
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

async fn webhook<F: ClientFactory>(
    State(state): State<AppState<F>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, &'static str), WebhookError> {
    if !state.secret.is_empty() {
        let signature = header(&headers, SIGNATURE_HEADER).ok_or(WebhookError::MissingSignature)?;
        verify_signature(&state.secret, &body, signature)?;
    }

    let kind = header(&headers, EVENT_HEADER).ok_or(WebhookError::MissingEvent)?;
    let delivery = header(&headers, DELIVERY_HEADER).unwrap_or("unknown");

    let event = WebhookEvent::parse(kind, &body)
        .map_err(|e| WebhookError::InvalidPayload(e.to_string()))?;

    match event {
        WebhookEvent::Ping => Ok((StatusCode::OK, "pong")),
        WebhookEvent::Unsupported(kind) => {
            debug!(kind = %kind, delivery, "Unexpected event");
            Err(WebhookError::UnexpectedEvent(kind))
        }
        WebhookEvent::Release(e) if !e.is_published() => {
            debug!(action = %e.action, delivery, "Ignoring release action");
            Ok((StatusCode::OK, "Ignored"))
        }
        event => {
            let installation_id = event
                .installation()
                .map(|i| i.id)
                .ok_or_else(|| WebhookError::InvalidPayload("missing installation".to_string()))?;

            state.dispatch(installation_id, event, kind, delivery);
            Ok((StatusCode::ACCEPTED, "Accepted"))
        }
    }
}
