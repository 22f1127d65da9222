//! Session bootstrap: login, owner discovery and home selection.
//!
//! The token pair is only installed in a `CredentialStore` once login has
//! succeeded. Zone endpoints are never touched before a home is selected.

use crate::auth::{Authenticator, LoginCredentials};
use crate::client::TadoClient;
use crate::config::Endpoints;
use crate::credentials::CredentialStore;
use crate::error::SessionError;
use crate::models::tado::{Home, HomeId, Owner};
use crate::poller::Poller;
use crate::renewer::Renewer;
use crate::transport::Transport;
use log::info;
use std::sync::Arc;

pub struct Session {
    authenticator: Authenticator,
    client_secret: String,
    credentials: Arc<CredentialStore>,
    client: Arc<TadoClient>,
    pub owner: Owner,
    pub home: Home,
}

impl Session {
    pub fn establish(
        transport: Arc<dyn Transport>,
        endpoints: &Endpoints,
        login: &LoginCredentials,
        preferred_home: Option<HomeId>,
    ) -> Result<Self, SessionError> {
        let authenticator = Authenticator::new(Arc::clone(&transport), endpoints.auth_url.as_str());
        let tokens = authenticator.login(login)?;
        info!(
            "Authenticated to Tado API (token lifetime {}s, scope {})",
            tokens.expires_in, tokens.scope
        );

        let credentials = Arc::new(CredentialStore::new(tokens));
        let client = Arc::new(TadoClient::new(
            transport,
            endpoints.api_url.as_str(),
            Arc::clone(&credentials),
        ));

        let owner = client.get_owner()?;
        info!(
            "Owner {} has {} home(s)",
            owner.username.as_deref().unwrap_or("<unknown>"),
            owner.homes.len()
        );
        let home = select_home(&owner, preferred_home)?;
        info!("Using home {} ({})", home.id, home.name);

        Ok(Session {
            authenticator,
            client_secret: login.client_secret.clone(),
            credentials,
            client,
            owner,
            home,
        })
    }

    pub fn client(&self) -> Arc<TadoClient> {
        Arc::clone(&self.client)
    }

    #[cfg(test)]
    pub(crate) fn credentials(&self) -> Arc<CredentialStore> {
        Arc::clone(&self.credentials)
    }

    pub fn renewer(&self) -> Renewer {
        Renewer::new(
            self.authenticator.clone(),
            Arc::clone(&self.credentials),
            self.client_secret.as_str(),
        )
    }

    pub fn poller(&self) -> Poller {
        Poller::new(Arc::clone(&self.client), self.home.id)
    }
}

/// Pick the configured home, or the first one the owner lists.
pub fn select_home(owner: &Owner, preferred: Option<HomeId>) -> Result<Home, SessionError> {
    if owner.homes.is_empty() {
        return Err(SessionError::NoHomesFound);
    }
    match preferred {
        Some(id) => owner.home(id).cloned().ok_or(SessionError::HomeNotFound(id)),
        None => owner.homes.first().cloned().ok_or(SessionError::NoHomesFound),
    }
}
