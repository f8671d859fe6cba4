//! Sign-in, registration and account profile.

use delguur_core::Email;
use serde_json::json;
use tracing::instrument;

use crate::api::ApiRequest;
use crate::cache::keys;
use crate::error::{AppError, Result, clear_sentry_user, set_sentry_user};
use crate::events::DomainEvent;
use crate::models::{AccountUpdate, AuthPayload, Credentials, RegisterInput, User};
use crate::resource::{CachedResource, ResourceContext, ResourceSpec};

/// Minimum password length.
const MIN_PASSWORD_LENGTH: usize = 8;

#[derive(Clone)]
pub struct AccountService {
    ctx: ResourceContext,
    profile: CachedResource<Option<User>>,
    facebook_app_id: Option<String>,
}

impl AccountService {
    #[must_use]
    pub fn new(ctx: ResourceContext, facebook_app_id: Option<String>) -> Self {
        Self {
            profile: CachedResource::new(
                ResourceSpec {
                    name: "account",
                    cache_key: keys::USER_INFO,
                    path: "user/account",
                    policy: keys::SESSION_POLICY,
                    requires_auth: true,
                    event: Some(DomainEvent::SessionChanged { signed_in: true }),
                },
                ctx.clone(),
            ),
            ctx,
            facebook_app_id,
        }
    }

    /// Register a new account and sign in.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::BadRequest`] for a weak password or a blank name,
    /// or the remote error.
    #[instrument(skip(self, input), fields(email = %input.email))]
    pub async fn register(&self, input: &RegisterInput) -> Result<User> {
        validate_password(&input.password)?;
        if input.name.trim().is_empty() {
            return Err(AppError::BadRequest("Name is required".to_string()));
        }
        let payload: AuthPayload = self
            .ctx
            .api
            .call(ApiRequest::post("user/register").json(input)?)
            .await?;
        Ok(self.signed_in(payload))
    }

    /// Sign in with email and password.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::BadRequest`] for a malformed email, or the remote
    /// error (wrong credentials come back as a rejection).
    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<User> {
        let email = Email::parse(email).map_err(|e| AppError::BadRequest(e.to_string()))?;
        if password.is_empty() {
            return Err(AppError::BadRequest("Password is required".to_string()));
        }
        let credentials = Credentials {
            email,
            password: password.to_string(),
        };
        let payload: AuthPayload = self
            .ctx
            .api
            .call(ApiRequest::post("user/login").json(&credentials)?)
            .await?;
        Ok(self.signed_in(payload))
    }

    /// Exchange a Facebook access token for a session.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::BadRequest`] when Facebook login is not
    /// configured, or the remote error.
    #[instrument(skip(self, access_token))]
    pub async fn facebook_login(&self, access_token: &str) -> Result<User> {
        let Some(app_id) = self.facebook_app_id.as_deref() else {
            return Err(AppError::BadRequest(
                "Facebook login is not available".to_string(),
            ));
        };
        let request = ApiRequest::post("facebook/token-login")
            .json(&json!({ "accessToken": access_token, "appId": app_id }))?;
        let payload: AuthPayload = self.ctx.api.call(request).await?;
        Ok(self.signed_in(payload))
    }

    /// Sign out.
    ///
    /// The backend call is best effort; local state is cleared regardless.
    #[instrument(skip(self))]
    pub async fn logout(&self) {
        if self.ctx.auth.is_authenticated()
            && let Err(e) = self.ctx.api.execute(ApiRequest::post("user/logout")).await
        {
            tracing::warn!(error = %e, "Logout request failed");
        }
        self.ctx.auth.clear();
        self.profile.reset();
        clear_sentry_user();
        self.ctx
            .events
            .publish(DomainEvent::SessionChanged { signed_in: false });
    }

    /// Profile of the signed-in user; `None` when signed out.
    ///
    /// # Errors
    ///
    /// Returns the remote error.
    pub async fn account(&self, force: bool) -> Result<Option<User>> {
        self.profile.fetch(force).await
    }

    /// # Errors
    ///
    /// Returns [`AppError::BadRequest`] for an empty update, otherwise see
    /// [`CachedResource::mutate`].
    #[instrument(skip(self, update))]
    pub async fn update_account(&self, update: &AccountUpdate) -> Result<Option<User>> {
        if update == &AccountUpdate::default() {
            return Err(AppError::BadRequest("Nothing to update".to_string()));
        }
        self.profile
            .mutate(ApiRequest::put("user/account").json(update)?)
            .await?;
        Ok(self.profile.current())
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.ctx.auth.is_authenticated()
    }

    fn signed_in(&self, payload: AuthPayload) -> User {
        let AuthPayload { token, user } = payload;
        self.ctx.auth.store(&token, &user);
        self.profile.modify(|profile| *profile = Some(user.clone()));
        set_sentry_user(&user.id, user.email.as_ref().map(Email::as_str));
        tracing::info!(user_id = %user.id, "Signed in");
        self.ctx
            .events
            .publish(DomainEvent::SessionChanged { signed_in: true });
        user
    }
}

fn validate_password(password: &str) -> Result<()> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AppError::BadRequest(format!(
            "Password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use delguur_core::UserId;
    use serde_json::json;

    use super::*;
    use crate::api::{ApiError, Method};
    use crate::testing::TestContext;

    fn payload() -> serde_json::Value {
        json!({"token": "abc", "user": {"id": 7, "email": "bat@example.mn", "name": "Bat"}})
    }

    #[tokio::test]
    async fn test_login_stores_session() {
        let t = TestContext::new();
        t.transport.ok(Method::POST, "user/login", payload());
        let service = AccountService::new(t.resource_context(), None);
        let mut events = t.events.subscribe();

        let user = service.login("Bat@Example.MN", "hunter22").await.unwrap();

        assert_eq!(user.id, UserId::new(7));
        assert!(service.is_authenticated());
        assert!(t.auth.is_token("abc"));
        assert_eq!(
            events.try_recv().unwrap(),
            DomainEvent::SessionChanged { signed_in: true }
        );
        let body = t.transport.calls()[0].body.clone().unwrap();
        assert_eq!(body["email"], "Bat@example.mn");
    }

    #[tokio::test]
    async fn test_wrong_password_is_rejected() {
        let t = TestContext::new();
        t.transport
            .reject(Method::POST, "user/login", "Invalid email or password");
        let service = AccountService::new(t.resource_context(), None);

        let err = service.login("bat@example.mn", "nope").await.unwrap_err();
        assert!(matches!(err, AppError::Api(ApiError::Rejected(_))));
        assert!(!service.is_authenticated());
    }

    #[tokio::test]
    async fn test_register_checks_password_locally() {
        let t = TestContext::new();
        let service = AccountService::new(t.resource_context(), None);
        let input = RegisterInput {
            email: Email::parse("bat@example.mn").unwrap(),
            password: "short".to_string(),
            name: "Bat".to_string(),
            phone: None,
        };
        assert!(matches!(
            service.register(&input).await,
            Err(AppError::BadRequest(_))
        ));
        assert!(t.transport.calls().is_empty());
    }

    #[tokio::test]
    async fn test_logout_clears_even_if_backend_fails() {
        let t = TestContext::signed_in();
        t.cache.set(keys::CART_DATA, &json!({"items": []}), None);
        let service = AccountService::new(t.resource_context(), None);

        service.logout().await;

        assert_eq!(t.transport.calls_to(&Method::POST, "user/logout").len(), 1);
        assert!(!service.is_authenticated());
        assert!(!t.cache.contains(keys::CART_DATA));
        assert!(service.account(false).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_facebook_login_needs_app_id() {
        let t = TestContext::new();
        let service = AccountService::new(t.resource_context(), None);
        assert!(matches!(
            service.facebook_login("fb-token").await,
            Err(AppError::BadRequest(_))
        ));

        t.transport.ok(Method::POST, "facebook/token-login", payload());
        let service = AccountService::new(t.resource_context(), Some("1234".to_string()));
        service.facebook_login("fb-token").await.unwrap();
        let body = t.transport.calls()[0].body.clone().unwrap();
        assert_eq!(body, json!({"accessToken": "fb-token", "appId": "1234"}));
    }

    #[tokio::test]
    async fn test_account_reads_cached_profile() {
        let t = TestContext::signed_in();
        let service = AccountService::new(t.resource_context(), None);
        let user = service.account(false).await.unwrap().unwrap();
        assert_eq!(user.name, "Bat");
        assert!(t.transport.calls().is_empty());
    }
}
