use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::datastore::Storage;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub id: String,
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

/// Changes accepted by [`ProfileStore::update`]. `None` leaves a field alone;
/// `avatar_url: Some(None)` clears the avatar.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub username: Option<String>,
    pub avatar_url: Option<Option<String>>,
}

/// Local sign-in stub. Unrelated to the task engine; it only shares the
/// storage abstraction.
#[derive(Debug)]
pub struct ProfileStore<S> {
    storage: S,
    profile: Option<Profile>,
}

impl<S: Storage> ProfileStore<S> {
    #[instrument(skip_all)]
    pub fn open(storage: S) -> Self {
        let profile = match storage.load() {
            Ok(Some(raw)) => match serde_json::from_slice::<Profile>(&raw) {
                Ok(profile) => Some(profile),
                Err(err) => {
                    warn!(error = %err, "persisted profile is malformed; treating as signed out");
                    None
                }
            },
            Ok(None) => None,
            Err(err) => {
                warn!(error = %format!("{err:#}"), "failed reading profile; treating as signed out");
                None
            }
        };

        debug!(signed_in = profile.is_some(), "opened profile store");
        Self { storage, profile }
    }

    pub fn current(&self) -> Option<&Profile> {
        self.profile.as_ref()
    }

    pub fn is_signed_in(&self) -> bool {
        self.profile.is_some()
    }

    /// Returns `false` when either credential is blank. Credentials are not
    /// checked against anything.
    #[instrument(skip(self, password), fields(email = %email))]
    pub fn sign_in(&mut self, email: &str, password: &str) -> anyhow::Result<bool> {
        let email = email.trim();
        if email.is_empty() || password.is_empty() {
            return Ok(false);
        }

        let username = email.split('@').next().unwrap_or(email).to_string();
        self.profile = Some(Profile {
            id: Uuid::new_v4().to_string(),
            username,
            email: email.to_string(),
            avatar_url: None,
        });
        info!("signed in");
        self.persist()?;
        Ok(true)
    }

    #[instrument(skip(self))]
    pub fn sign_out(&mut self) -> anyhow::Result<()> {
        self.profile = None;
        info!("signed out");
        self.storage.remove().context("failed to remove profile")
    }

    /// No-op while signed out; a blank username is ignored.
    #[instrument(skip(self, update))]
    pub fn update(&mut self, update: ProfileUpdate) -> anyhow::Result<bool> {
        let Some(profile) = self.profile.as_mut() else {
            return Ok(false);
        };

        let mut changed = false;
        if let Some(username) = update.username {
            let username = username.trim();
            if !username.is_empty() && profile.username != username {
                profile.username = username.to_string();
                changed = true;
            }
        }
        if let Some(avatar_url) = update.avatar_url
            && profile.avatar_url != avatar_url
        {
            profile.avatar_url = avatar_url;
            changed = true;
        }

        if changed {
            self.persist()?;
        }
        Ok(changed)
    }

    fn persist(&self) -> anyhow::Result<()> {
        let Some(profile) = self.profile.as_ref() else {
            return Ok(());
        };
        let raw = serde_json::to_vec(profile).context("failed to serialize profile")?;
        self.storage.save(&raw).context("failed to persist profile")
    }
}
