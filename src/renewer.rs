//! Background access-token renewal.
//!
//! `Running` until a renewal fails or the owner cancels, then `Stopped`.
//! A failed renewal is fatal for the session: the credential is discarded and
//! the error is handed to whoever joins the task. There is no retry.
//!
//! The renewal interval must stay below the token's `expires_in`; callers own
//! that contract, it is only warned about here.

use crate::auth::Authenticator;
use crate::credentials::CredentialStore;
use crate::error::AuthError;
use crate::periodic::{self, TaskHandle, Wake};
use crossbeam_channel::Receiver;
use log::{error, info, warn};
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RenewerState {
    Running,
    Stopped,
}

pub struct Renewer {
    authenticator: Authenticator,
    credentials: Arc<CredentialStore>,
    client_secret: String,
}

impl Renewer {
    pub fn new(authenticator: Authenticator, credentials: Arc<CredentialStore>, client_secret: impl Into<String>) -> Self {
        Renewer {
            authenticator,
            credentials,
            client_secret: client_secret.into(),
        }
    }

    /// Renew once: current refresh token in, new pair installed. Returns the new generation.
    pub fn renew_once(&self) -> Result<u64, AuthError> {
        let current = self.credentials.current();
        let tokens = self
            .authenticator
            .renew(current.refresh_token(), &self.client_secret)?;
        Ok(self.credentials.replace(tokens))
    }

    pub fn spawn(self, interval: Duration) -> io::Result<RenewerHandle> {
        let expires_in = self.credentials.current().tokens.expires_in;
        if expires_in > 0 && interval.as_secs() >= expires_in {
            warn!(
                "Token renewal interval ({}s) is not shorter than the token lifetime ({}s); requests may fail with an expired token",
                interval.as_secs(),
                expires_in
            );
        }
        self.spawn_with_ticks(periodic::interval_ticks(interval))
    }

    pub fn spawn_with_ticks(self, ticks: Receiver<Instant>) -> io::Result<RenewerHandle> {
        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);
        let task = periodic::spawn_task("token-renewer", move |cancel| {
            let result = self.run(&ticks, &cancel);
            flag.store(false, Ordering::Release);
            result
        })?;
        Ok(RenewerHandle { task, running })
    }

    fn run(&self, ticks: &Receiver<Instant>, cancel: &Receiver<()>) -> Result<u64, AuthError> {
        info!("Token renewer started");
        let mut renewals: u64 = 0;
        loop {
            match periodic::next_wake(ticks, cancel) {
                Wake::Cancelled => {
                    info!("Token renewer stopped by cancellation after {} renewal(s)", renewals);
                    return Ok(renewals);
                }
                Wake::Tick(_) => {
                    info!("Refreshing access token");
                    match self.renew_once() {
                        Ok(generation) => {
                            renewals += 1;
                            let expires = self
                                .credentials
                                .current()
                                .expires_at()
                                .map(|t| t.to_rfc3339())
                                .unwrap_or_else(|| "-".to_string());
                            info!("Access token refreshed (generation {}, expires {})", generation, expires);
                        }
                        Err(e) => {
                            self.credentials.discard();
                            error!("Token refresh failed, stopping the renewer: {}", e);
                            return Err(e);
                        }
                    }
                }
            }
        }
    }
}

pub struct RenewerHandle {
    task: TaskHandle<Result<u64, AuthError>>,
    running: Arc<AtomicBool>,
}

impl RenewerHandle {
    pub fn state(&self) -> RenewerState {
        if self.running.load(Ordering::Acquire) {
            RenewerState::Running
        } else {
            RenewerState::Stopped
        }
    }

    pub fn cancel(&self) {
        self.task.cancel();
    }

    /// Block until the renewer stops. `Ok` carries the number of successful renewals.
    pub fn wait(self) -> Result<u64, AuthError> {
        self.task.join()
    }

    pub fn stop(self) -> Result<u64, AuthError> {
        self.task.stop()
    }
}
