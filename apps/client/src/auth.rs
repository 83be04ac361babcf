//! Sign-in page flows. Each failure is logged, surfaced as an error notice
//! and returned; none of them are fatal.

use std::sync::Arc;

use chat_proto::{collections, to_fields, PresenceRecord};

use crate::error::{AppError, AppResult};
use crate::gateway::{Gateway, Session};
use crate::notify::Notifier;
use crate::presence::write_presence;

pub const PROFILE_MISSING: &str = "User data not found!";

#[derive(Clone)]
pub struct AuthFlows {
    gateway: Arc<dyn Gateway>,
    notifier: Notifier,
}

impl AuthFlows {
    pub fn new(gateway: Arc<dyn Gateway>, notifier: Notifier) -> Self {
        Self { gateway, notifier }
    }

    pub async fn sign_up(&self, email: &str, password: &str) -> AppResult<Session> {
        let result = async {
            let session = self.gateway.sign_up_email(email, password).await?;
            self.write_profile(&session).await?;
            Ok::<_, AppError>(session)
        }
        .await;

        self.report("sign_up", result, |session| {
            format!(
                "User {} created successfully!",
                session.email.as_deref().unwrap_or(email)
            )
        })
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> AppResult<Session> {
        let result = async {
            let session = self.gateway.sign_in_email(email, password).await?;
            if self
                .gateway
                .get_document(collections::USERS, &session.uid)
                .await?
                .is_none()
            {
                return Err(AppError::auth(PROFILE_MISSING));
            }
            write_presence(self.gateway.as_ref(), &session.uid, PresenceRecord::signed_in())
                .await?;
            Ok::<_, AppError>(session)
        }
        .await;

        self.report("sign_in", result, |session| {
            format!(
                "Welcome back, {}!",
                session.email.as_deref().unwrap_or(email)
            )
        })
    }

    pub async fn sign_in_federated(&self) -> AppResult<Session> {
        let result = async {
            let session = self.gateway.sign_in_federated().await?;
            self.write_profile(&session).await?;
            write_presence(self.gateway.as_ref(), &session.uid, PresenceRecord::signed_in())
                .await?;
            Ok::<_, AppError>(session)
        }
        .await;

        self.report("sign_in_federated", result, |session| {
            let name = session
                .display_name
                .as_deref()
                .filter(|name| !name.is_empty())
                .unwrap_or("User");
            format!("Welcome, {}!", name)
        })
    }

    async fn write_profile(&self, session: &Session) -> AppResult<()> {
        let fields = to_fields(&session.profile())?;
        self.gateway
            .set_document(collections::USERS, &session.uid, fields, false)
            .await?;
        Ok(())
    }

    fn report(
        &self,
        flow: &'static str,
        result: AppResult<Session>,
        success: impl FnOnce(&Session) -> String,
    ) -> AppResult<Session> {
        match &result {
            Ok(session) => {
                tracing::info!(component = "auth", flow, uid = %session.uid, "signed in");
                self.notifier.success(success(session));
            }
            Err(e) => {
                tracing::warn!(component = "auth", flow, code = ?e.code, error = %e, "auth flow failed");
                self.notifier.error(e.message.clone());
            }
        }
        result
    }
}
