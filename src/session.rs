//! Per-deal lifecycle of a shared secret.
//!
//! ```text
//!   Uninitialized ──create──▶ Created ──mark_shared──▶ Shared
//!         ▲                                              │
//!         │ forget (any state)                        recover
//!         │                                              ▼
//!         └──────────────── Recovered ◀──ok── Recovering ──err──▶ RecoveryFailed
//!                                                        ▲              │
//!                                                        └───recover────┘
//! ```
//!
//! `mark_shared` is the point where the client share and hash are written
//! to secure storage; the caller is expected to have sent the server share
//! to the counterpart by then. `load` rebuilds a `Shared` session from
//! storage on a later run.

use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::secret::Secret;
use crate::shared_secret::{self, SharedSecret};
use crate::storage::{SecretStorage, SharedSecretStore, StoredClientShare};

/// Where a deal's secret currently stands.
#[derive(Debug, Default)]
pub enum SecretState {
    #[default]
    Uninitialized,
    Created(SharedSecret),
    Shared(StoredClientShare),
    /// Transient while shares are being combined.
    Recovering(StoredClientShare),
    Recovered {
        record: StoredClientShare,
        secret: Secret,
    },
    RecoveryFailed(StoredClientShare),
}

impl SecretState {
    pub fn name(&self) -> &'static str {
        match self {
            SecretState::Uninitialized => "uninitialized",
            SecretState::Created(_) => "created",
            SecretState::Shared(_) => "shared",
            SecretState::Recovering(_) => "recovering",
            SecretState::Recovered { .. } => "recovered",
            SecretState::RecoveryFailed(_) => "recovery-failed",
        }
    }
}

/// Drives one deal's secret through its states, persisting through `S`.
pub struct SharedSecretSession<S> {
    deal_id: String,
    store: SharedSecretStore<S>,
    state: SecretState,
}

impl<S: SecretStorage> SharedSecretSession<S> {
    pub fn new(deal_id: impl Into<String>, storage: S) -> Self {
        Self {
            deal_id: deal_id.into(),
            store: SharedSecretStore::new(storage),
            state: SecretState::Uninitialized,
        }
    }

    /// Session for a deal whose client share is already stored, or an
    /// `Uninitialized` one when nothing is stored.
    pub fn load(deal_id: impl Into<String>, storage: S) -> Result<Self> {
        let mut session = Self::new(deal_id, storage);
        if let Some(record) = session.store.get_shared_secret(&session.deal_id)? {
            debug!(deal_id = %session.deal_id, "loaded stored client share");
            session.state = SecretState::Shared(record);
        }
        Ok(session)
    }

    pub fn deal_id(&self) -> &str {
        &self.deal_id
    }

    pub fn state(&self) -> &SecretState {
        &self.state
    }

    /// The recovered secret, if the last recovery succeeded.
    pub fn secret(&self) -> Option<&Secret> {
        match &self.state {
            SecretState::Recovered { secret, .. } => Some(secret),
            SecretState::Created(bundle) => Some(&bundle.secret),
            _ => None,
        }
    }

    /// Uninitialized → Created.
    pub fn create(&mut self, owner_private_key: &[u8]) -> Result<&SharedSecret> {
        self.expect_state("create", |s| matches!(s, SecretState::Uninitialized))?;
        let bundle = shared_secret::create_shared_secret(owner_private_key)?;
        self.state = SecretState::Created(bundle);
        match &self.state {
            SecretState::Created(bundle) => Ok(bundle),
            _ => unreachable!(),
        }
    }

    /// Created → Shared: persist the client share and hash, drop the secret.
    pub fn mark_shared(&mut self) -> Result<()> {
        self.expect_state("mark_shared", |s| matches!(s, SecretState::Created(_)))?;
        let SecretState::Created(bundle) = std::mem::take(&mut self.state) else {
            unreachable!()
        };
        let record = StoredClientShare {
            client_share: bundle.client_share.clone(),
            hash_of_secret: bundle.hash_of_secret.clone(),
        };
        if let Err(e) = self.store.save_shared_secret(&self.deal_id, &record) {
            self.state = SecretState::Created(bundle);
            return Err(e.into());
        }
        debug!(deal_id = %self.deal_id, "client share stored");
        self.state = SecretState::Shared(record);
        Ok(())
    }

    /// Shared | RecoveryFailed → Recovering → Recovered | RecoveryFailed.
    ///
    /// On a mismatch the session moves to `RecoveryFailed` and the error is
    /// returned; the caller may fetch the server share again and retry.
    pub fn recover(&mut self, server_share: &[u8]) -> Result<&Secret> {
        self.expect_state("recover", |s| {
            matches!(s, SecretState::Shared(_) | SecretState::RecoveryFailed(_))
        })?;
        let record = match std::mem::take(&mut self.state) {
            SecretState::Shared(r) | SecretState::RecoveryFailed(r) => r,
            _ => unreachable!(),
        };
        self.state = SecretState::Recovering(record);
        let SecretState::Recovering(record) = &self.state else {
            unreachable!()
        };

        let result = shared_secret::recover(
            server_share,
            record.client_share.as_bytes(),
            &record.hash_of_secret,
        );

        let SecretState::Recovering(record) = std::mem::take(&mut self.state) else {
            unreachable!()
        };
        match result {
            Ok(secret) => {
                debug!(deal_id = %self.deal_id, "secret recovered");
                self.state = SecretState::Recovered { record, secret };
                match &self.state {
                    SecretState::Recovered { secret, .. } => Ok(secret),
                    _ => unreachable!(),
                }
            }
            Err(e) => {
                warn!(deal_id = %self.deal_id, error = %e, "recovery failed");
                self.state = SecretState::RecoveryFailed(record);
                Err(e)
            }
        }
    }

    /// Remove anything stored for the deal and return to Uninitialized.
    pub fn forget(&mut self) -> Result<()> {
        self.store.delete_shared_secret(&self.deal_id)?;
        self.state = SecretState::Uninitialized;
        debug!(deal_id = %self.deal_id, "forgot shared secret");
        Ok(())
    }

    fn expect_state(&self, op: &'static str, allowed: impl Fn(&SecretState) -> bool) -> Result<()> {
        if allowed(&self.state) {
            Ok(())
        } else {
            Err(Error::InvalidState {
                op,
                state: self.state.name(),
            })
        }
    }
}
