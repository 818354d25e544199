//! Background renewal of the service's own Vault token.
//!
//! The service token mints every one-time credential, so it has to outlive them. The
//! renewer looks the token up, sleeps for two thirds of its remaining TTL, renews it and
//! repeats until stopped. Non-renewable tokens (root tokens, for instance) end the loop.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use vaultrs::client::VaultClient;
use vaultrs::token;

/// Shortest pause between renewals.
pub const MIN_RENEWAL_DELAY: Duration = Duration::from_secs(5);

/// Pause after a failed lookup or renewal.
pub const RETRY_DELAY: Duration = Duration::from_secs(30);

/// Delay before renewing a token with `ttl` left, never shorter than `floor`.
pub fn renewal_delay(ttl: Duration, floor: Duration) -> Duration {
    (ttl * 2 / 3).max(floor)
}

/// Keeps the service token alive.
pub struct TokenRenewer {
    client: Arc<VaultClient>,
    retry_delay: Duration,
    min_delay: Duration,
}

/// Handle for a running [`TokenRenewer`].
#[derive(Debug)]
pub struct RenewalHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl RenewalHandle {
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Cancel the renewal loop and wait for it to exit.
    pub async fn stop(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            warn!(error = %e, "Token renewal task ended abnormally");
        }
        info!("Token renewal stopped");
    }
}

enum Step {
    Renewed,
    NotRenewable,
    Failed,
}

impl TokenRenewer {
    pub fn new(client: Arc<VaultClient>) -> Self {
        Self { client, retry_delay: RETRY_DELAY, min_delay: MIN_RENEWAL_DELAY }
    }

    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    pub fn with_min_delay(mut self, min_delay: Duration) -> Self {
        self.min_delay = min_delay;
        self
    }

    /// Spawn the renewal loop.
    pub fn start(self) -> RenewalHandle {
        let cancel = CancellationToken::new();
        let task = tokio::spawn(self.run(cancel.clone()));
        info!("Token renewal started");
        RenewalHandle { cancel, task }
    }

    async fn run(self, cancel: CancellationToken) {
        loop {
            let step = tokio::select! {
                _ = cancel.cancelled() => return,
                step = self.renew_once(&cancel) => step,
            };

            match step {
                Step::Renewed => {}
                Step::NotRenewable => return,
                Step::Failed => {
                    tokio::select! {
                        _ = cancel.cancelled() => return,
                        _ = tokio::time::sleep(self.retry_delay) => {}
                    }
                }
            }
        }
    }

    async fn renew_once(&self, cancel: &CancellationToken) -> Step {
        let lookup = match token::lookup_self(self.client.as_ref()).await {
            Ok(lookup) => lookup,
            Err(e) => {
                warn!(error = %e, "Failed to look up service token");
                return Step::Failed;
            }
        };

        if !lookup.renewable {
            info!("Service token is not renewable; renewal disabled");
            return Step::NotRenewable;
        }

        let delay = renewal_delay(Duration::from_secs(lookup.ttl), self.min_delay);
        tokio::select! {
            _ = cancel.cancelled() => return Step::Renewed,
            _ = tokio::time::sleep(delay) => {}
        }

        match token::renew_self(self.client.as_ref(), None).await {
            Ok(auth) => {
                info!(lease_duration_secs = auth.lease_duration, "Renewed service token");
                Step::Renewed
            }
            Err(e) => {
                warn!(error = %e, "Failed to renew service token");
                Step::Failed
            }
        }
    }
}
