//! Shared holder of the live token pair.
//!
//! Readers take a cheap `Arc` snapshot under a read lock and never see a
//! half-written pair; the renewer installs a whole new `Credential` per renewal.

use crate::models::tado::TokenPair;
use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::RwLock;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Clone, PartialEq)]
pub struct Credential {
    pub tokens: TokenPair,
    /// 0 for the login pair, +1 for every replacement.
    pub generation: u64,
    pub renewed_at: DateTime<Utc>,
}

impl Credential {
    /// `None` when the advertised lifetime does not fit a timestamp.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        let lifetime = i64::try_from(self.tokens.expires_in).ok()?;
        self.renewed_at.checked_add_signed(TimeDelta::try_seconds(lifetime)?)
    }

    pub fn access_token(&self) -> &str {
        &self.tokens.access_token
    }

    pub fn refresh_token(&self) -> &str {
        &self.tokens.refresh_token
    }
}

#[derive(Debug)]
pub struct CredentialStore {
    current: RwLock<Arc<Credential>>,
    discarded: AtomicBool,
}

impl CredentialStore {
    /// Install the pair obtained at login as generation 0.
    pub fn new(tokens: TokenPair) -> Self {
        CredentialStore {
            current: RwLock::new(Arc::new(Credential {
                tokens,
                generation: 0,
                renewed_at: Utc::now(),
            })),
            discarded: AtomicBool::new(false),
        }
    }

    pub fn current(&self) -> Arc<Credential> {
        Arc::clone(&*self.current.read())
    }

    /// Atomically install `tokens` as the live pair and return the new generation.
    pub fn replace(&self, tokens: TokenPair) -> u64 {
        let mut guard = self.current.write();
        let next = Arc::new(Credential {
            tokens,
            generation: guard.generation + 1,
            renewed_at: Utc::now(),
        });
        let generation = next.generation;
        *guard = next;
        generation
    }

    /// Mark the credential unusable; nothing will refresh it any more.
    pub fn discard(&self) {
        self.discarded.store(true, Ordering::Release);
    }

    pub fn is_discarded(&self) -> bool {
        self.discarded.load(Ordering::Acquire)
    }
}
