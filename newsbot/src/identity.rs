use crate::ledger::{Ledger, Reservation};
use crate::traits::PublishingApi;
use crate::types::{BotError, Identity, Result};
use rand::Rng;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Feed configs naming this user publish under a random pool identity.
pub const RANDOM_IDENTITY: &str = "random";

const BUILTIN_USERNAMES: &[&str] = &[
    "Vernon", "Bevan", "Jacinta", "Habib", "Michel", "Luther", "Josslyn", "Otho", "Safiya", "Roxie",
    "Sarra", "Jayse", "Tully", "Sephora", "Kenza", "Nosson", "Sadee", "Hagen", "Anitra", "Willma",
    "Blanchard", "Malia", "Baron", "Neo", "Viviann", "Haydon", "Catherine", "Thalia", "Titan", "Kenya",
    "Harlin", "Ayden", "Kasandra", "Saxon", "Ulisses", "Zach", "Aly", "Henna", "Romana", "Rowan",
    "Carmela", "Remi", "Peter", "Aman", "Jocelynne", "Flo", "Clifton", "Scot", "Gerry", "Keyton",
    "Hong", "Quint", "Cheron", "Katelynn", "Kaven", "Elsworth", "Jenelle", "Fernando", "Vilas", "Susette",
    "Meda", "Windsor", "Karine", "Kamela", "Kristeen", "Kairi", "Saloni", "Janice", "Abel", "Christin",
    "Stewart", "Guilherme", "Marylu", "Reymundo", "Anton", "Kaleena", "Florida", "Quinten", "Zoi", "Eleni",
    "Gia", "Selmer", "Reuben", "Zaynab", "Justen", "Emi", "Filip", "Sherry", "Wendie", "Vannie",
    "Deron", "Nicklaus", "Hamilton", "Rebekah", "Sabas", "Pixie", "Belinda", "Estel", "Glenda", "Darnell",
    "Mart", "Takumi", "Ezell", "Emanuel", "Nabor", "Abdulaziz", "Josh", "Owen", "Noor", "Andriana",
    "Sesar", "Celestia", "Giovana", "Kamila", "Vana", "Marja", "Nihal", "Aedan", "Gabrielle", "Berlin",
    "Jaxson", "Diangelo", "Zachari", "Wendi", "Ayelet", "Oren", "Clarisa", "Theola", "Heidy", "Abella",
    "Jude", "Zaden", "Salley", "Marcelino", "Cesario", "Marcia", "Phelan", "Sherrell", "Pascale", "Stephane",
    "Kelvin", "Marilu", "Edwina", "Florentino",
];

/// Immutable list of usernames the pool may draw from.
#[derive(Debug, Clone)]
pub struct IdentityCatalog {
    usernames: Arc<[String]>,
}

impl IdentityCatalog {
    /// Usernames are trimmed, lower-cased and deduplicated; the result must
    /// not be empty.
    pub fn new<I, S>(usernames: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen = HashSet::new();
        let usernames: Vec<String> = usernames
            .into_iter()
            .map(|name| name.as_ref().trim().to_lowercase())
            .filter(|name| !name.is_empty())
            .filter(|name| seen.insert(name.clone()))
            .collect();

        if usernames.is_empty() {
            return Err(BotError::Config("identity catalog is empty".to_string()));
        }

        Ok(Self {
            usernames: usernames.into(),
        })
    }

    pub fn builtin() -> Self {
        Self {
            usernames: BUILTIN_USERNAMES.iter().map(|name| name.to_lowercase()).collect(),
        }
    }

    pub fn choose<R: Rng>(&self, rng: &mut R) -> &str {
        let index = rng.gen_range(0..self.usernames.len());
        &self.usernames[index]
    }

    pub fn contains(&self, username: &str) -> bool {
        self.usernames.iter().any(|name| name == username)
    }

    pub(crate) fn len(&self) -> usize {
        self.usernames.len()
    }
}

impl Default for IdentityCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Derives account passwords from the username and a shared secret suffix.
#[derive(Clone, Default)]
pub struct PasswordPolicy {
    suffix: String,
}

impl PasswordPolicy {
    pub fn new(suffix: impl Into<String>) -> Self {
        Self { suffix: suffix.into() }
    }

    pub fn password_for(&self, username: &str) -> String {
        format!("{}{}", username, self.suffix)
    }
}

/// Hands out publishing credentials, registering pool accounts on first use.
pub struct IdentityPool {
    ledger: Arc<Ledger>,
    api: Arc<dyn PublishingApi>,
    catalog: IdentityCatalog,
    passwords: PasswordPolicy,
}

impl IdentityPool {
    pub fn new(
        ledger: Arc<Ledger>,
        api: Arc<dyn PublishingApi>,
        catalog: IdentityCatalog,
        passwords: PasswordPolicy,
    ) -> Self {
        Self {
            ledger,
            api,
            catalog,
            passwords,
        }
    }

    pub fn catalog(&self) -> &IdentityCatalog {
        &self.catalog
    }

    /// Credential for a fixed username such as the moderator account.
    pub async fn credential_for(&self, username: &str) -> Result<Identity> {
        let username = username.trim();
        if username.is_empty() {
            return Err(BotError::Identity {
                username: String::new(),
                reason: "empty username".to_string(),
            });
        }
        self.provision(username).await
    }

    /// Credential for a uniformly drawn catalog username.
    pub async fn random_credential<R: Rng>(&self, rng: &mut R) -> Result<Identity> {
        let username = self.catalog.choose(rng).to_string();
        debug!("Drew identity {}", username);
        self.provision(&username).await
    }

    async fn provision(&self, username: &str) -> Result<Identity> {
        match self.ledger.reserve_identity(username).await? {
            Reservation::AlreadyClaimed => {
                debug!("Identity {} exists, logging in", username);
                self.login(username).await
            }
            Reservation::Reserved => {
                let password = self.passwords.password_for(username);
                match self.api.register(username, &password).await {
                    Ok(credential) if !credential.is_empty() => {
                        if !self.ledger.store_registered_credential(username, &credential).await? {
                            warn!("Identity {} already had a credential, keeping it", username);
                        }
                        info!("Registered identity {}", username);
                        Ok(Identity {
                            username: username.to_string(),
                            credential,
                        })
                    }
                    Ok(_) => {
                        warn!("Registration of {} returned no token, falling back to login", username);
                        self.login(username).await
                    }
                    Err(e) => {
                        warn!("Registration of {} failed, falling back to login: {}", username, e);
                        self.login(username).await
                    }
                }
            }
        }
    }

    async fn login(&self, username: &str) -> Result<Identity> {
        let password = self.passwords.password_for(username);
        let credential = self.api.login(username, &password).await.map_err(|e| BotError::Identity {
            username: username.to_string(),
            reason: format!("login failed: {}", e),
        })?;

        if credential.is_empty() {
            return Err(BotError::Identity {
                username: username.to_string(),
                reason: "login returned an empty token".to_string(),
            });
        }

        self.ledger.refresh_credential(username, &credential).await?;
        Ok(Identity {
            username: username.to_string(),
            credential,
        })
    }
}
