use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use dashmap::{mapref::entry::Entry, DashMap};
use uuid::Uuid;

use super::error::GatewayError;

const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Clone)]
pub(crate) struct Account {
    pub uid: String,
    pub email: String,
    pub display_name: Option<String>,
    pub photo_url: Option<String>,
    password_hash: Option<String>,
}

/// Email-keyed accounts of the in-memory auth provider.
#[derive(Default)]
pub(crate) struct AccountTable {
    by_email: DashMap<String, Account>,
}

impl AccountTable {
    pub fn create(&self, email: &str, password: &str) -> Result<Account, GatewayError> {
        validate_credentials(email, password)?;
        let email = normalize_email(email);
        if self.by_email.contains_key(&email) {
            return Err(GatewayError::EmailAlreadyInUse);
        }
        let password_hash = hash_password(password)?;

        match self.by_email.entry(email.clone()) {
            Entry::Occupied(_) => Err(GatewayError::EmailAlreadyInUse),
            Entry::Vacant(slot) => {
                let account = Account {
                    uid: new_uid(),
                    email,
                    display_name: None,
                    photo_url: None,
                    password_hash: Some(password_hash),
                };
                slot.insert(account.clone());
                Ok(account)
            }
        }
    }

    pub fn authenticate(&self, email: &str, password: &str) -> Result<Account, GatewayError> {
        let account = self
            .by_email
            .get(&normalize_email(email))
            .map(|entry| entry.value().clone())
            .ok_or(GatewayError::InvalidCredentials)?;

        // Federated-only accounts have no password to check against.
        let hash = account
            .password_hash
            .as_deref()
            .ok_or(GatewayError::InvalidCredentials)?;
        if !verify_password(password, hash)? {
            return Err(GatewayError::InvalidCredentials);
        }
        Ok(account)
    }

    /// Find or create the account linked to a federated identity.
    pub fn link_federated(
        &self,
        email: &str,
        display_name: Option<String>,
        photo_url: Option<String>,
    ) -> Account {
        let mut entry = self
            .by_email
            .entry(normalize_email(email))
            .or_insert_with(|| Account {
                uid: new_uid(),
                email: normalize_email(email),
                display_name: None,
                photo_url: None,
                password_hash: None,
            });
        if display_name.is_some() {
            entry.display_name = display_name;
        }
        if photo_url.is_some() {
            entry.photo_url = photo_url;
        }
        entry.value().clone()
    }
}

pub(crate) fn validate_credentials(email: &str, password: &str) -> Result<(), GatewayError> {
    if !validator::validate_email(email.trim()) {
        return Err(GatewayError::InvalidEmail);
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(GatewayError::WeakPassword);
    }
    Ok(())
}

pub(crate) fn normalize_email(value: &str) -> String {
    value.trim().to_lowercase()
}

fn new_uid() -> String {
    Uuid::new_v4().simple().to_string()
}

fn hash_password(password: &str) -> Result<String, GatewayError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| GatewayError::Rejected(format!("password hashing failed: {}", e)))
}

fn verify_password(password: &str, hash: &str) -> Result<bool, GatewayError> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| GatewayError::Rejected(format!("stored hash unreadable: {}", e)))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credential_rules() {
        assert!(matches!(
            validate_credentials("not-an-email", "secret1"),
            Err(GatewayError::InvalidEmail)
        ));
        assert!(matches!(
            validate_credentials("a@x.com", "12345"),
            Err(GatewayError::WeakPassword)
        ));
        assert!(validate_credentials(" a@x.com ", "123456").is_ok());
    }

    #[test]
    fn create_then_authenticate() {
        let table = AccountTable::default();
        let created = table.create("Ann@X.com", "secret1").expect("create");
        assert_eq!(created.email, "ann@x.com");

        let again = table.authenticate("ann@x.com ", "secret1").expect("authenticate");
        assert_eq!(again.uid, created.uid);

        assert!(matches!(
            table.authenticate("ann@x.com", "wrong-pass"),
            Err(GatewayError::InvalidCredentials)
        ));
        assert!(matches!(
            table.create("ann@x.com", "another1"),
            Err(GatewayError::EmailAlreadyInUse)
        ));
    }

    #[test]
    fn federated_link_is_stable_and_passwordless() {
        let table = AccountTable::default();
        let first = table.link_federated("g@x.com", Some("Gee".into()), None);
        let second = table.link_federated("G@x.com", None, None);

        assert_eq!(first.uid, second.uid);
        assert_eq!(second.display_name.as_deref(), Some("Gee"));
        assert!(matches!(
            table.authenticate("g@x.com", "anything"),
            Err(GatewayError::InvalidCredentials)
        ));
    }
}
