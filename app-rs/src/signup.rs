//! The signup wizard state machine.
//!
//! Steps run in order: name -> phone -> password -> business name (optional)
//! -> photo (optional). Submitting the password registers the account with
//! the backend; a server rejection keeps the wizard on the password step so
//! the user can retry. From registration until finalize the wizard holds the
//! bearer token in memory only, so abandoning signup leaves nothing on disk.
//!
//! Finalize is tolerant: the optional profile calls and the session persist
//! may each fail without failing signup. Problems are collected as warnings
//! for the UI to surface.

use anyhow::Context;
use bahi_api::{
    def::AppBackendApi,
    error::BackendApiError,
    models::{AuthResponse, RegisterRequest, UpdateProfileRequest, User},
};
use bytes::Bytes;
use tracing::{info, warn};

use crate::{form, kv::KvStore, session::SessionStore};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SignupStep {
    Name,
    Phone,
    Password,
    /// Optional; first step after the account exists server-side.
    BusinessName,
    /// Optional, terminal input step.
    Photo,
    Done,
}

/// Collects signup inputs step by step, then registers and finalizes.
///
/// One wizard per signup attempt; the UI owns it for the duration of the
/// flow and drops it afterwards.
pub struct SignupWizard {
    step: SignupStep,
    name: Option<String>,
    phone_number: Option<String>,
    business_name: Option<String>,
    photo: Option<(String, Bytes)>,
    /// Set once `register` succeeds. Volatile until finalize.
    auth: Option<AuthResponse>,
}

/// The result of a finalized signup.
#[derive(Debug)]
pub struct SignupOutcome {
    pub user: User,
    /// Non-fatal problems hit during finalize, in the order they occurred.
    pub warnings: Vec<String>,
}

impl Default for SignupWizard {
    fn default() -> Self {
        Self::new()
    }
}

impl SignupWizard {
    pub fn new() -> Self {
        Self {
            step: SignupStep::Name,
            name: None,
            phone_number: None,
            business_name: None,
            photo: None,
            auth: None,
        }
    }

    #[inline]
    pub fn step(&self) -> SignupStep {
        self.step
    }

    /// Move back one input step. Entered values are kept. Once the account
    /// is registered the pre-registration steps are no longer reachable.
    pub fn back(&mut self) {
        self.step = match self.step {
            SignupStep::Phone => SignupStep::Name,
            SignupStep::Password => SignupStep::Phone,
            SignupStep::Photo => SignupStep::BusinessName,
            step => step,
        };
    }

    pub fn submit_name(&mut self, name: String) -> Result<(), String> {
        self.ensure_step(SignupStep::Name)?;
        form::validate_name(&name)?;
        self.name = Some(name);
        self.step = SignupStep::Phone;
        Ok(())
    }

    pub fn submit_phone(
        &mut self,
        phone_number: String,
    ) -> Result<(), String> {
        self.ensure_step(SignupStep::Phone)?;
        form::validate_phone_number(&phone_number)?;
        self.phone_number = Some(phone_number);
        self.step = SignupStep::Password;
        Ok(())
    }

    /// Validate the password and register the account with the backend.
    ///
    /// On any error the wizard stays on the password step. On success the
    /// returned token is held in memory and the wizard advances to the
    /// optional steps.
    pub async fn submit_password<A: AppBackendApi>(
        &mut self,
        api: &A,
        password: String,
    ) -> Result<(), BackendApiError> {
        self.ensure_step(SignupStep::Password)
            .map_err(BackendApiError::validation)?;
        form::validate_password(&password)
            .map_err(BackendApiError::validation)?;

        // these were validated on their own steps
        let req = RegisterRequest {
            name: self.name.clone().unwrap_or_default(),
            phone_number: self.phone_number.clone().unwrap_or_default(),
            password,
        };

        let auth = api.register(&req).await?;
        info!(user_id = %auth.user.id, "signup: registered");

        self.auth = Some(auth);
        self.step = SignupStep::BusinessName;
        Ok(())
    }

    /// `None` skips the step.
    pub fn submit_business_name(
        &mut self,
        business_name: Option<String>,
    ) -> Result<(), String> {
        self.ensure_step(SignupStep::BusinessName)?;
        if let Some(business_name) = &business_name {
            form::validate_name(business_name)?;
        }
        self.business_name = business_name;
        self.step = SignupStep::Photo;
        Ok(())
    }

    /// `None` skips the step.
    pub fn submit_photo(
        &mut self,
        photo: Option<(String, Bytes)>,
    ) -> Result<(), String> {
        self.ensure_step(SignupStep::Photo)?;
        self.photo = photo;
        self.step = SignupStep::Done;
        Ok(())
    }

    /// Apply the optional inputs to the new account and hand the session to
    /// the session store.
    ///
    /// Only errors if called before registration succeeded. Failures in the
    /// optional profile calls or the session persist are demoted to warnings:
    /// the account already exists server-side, so aborting signup over them
    /// would strand the user.
    pub async fn finalize<A, K>(
        &mut self,
        api: &A,
        session: &SessionStore<K>,
    ) -> anyhow::Result<SignupOutcome>
    where
        A: AppBackendApi,
        K: KvStore,
    {
        let AuthResponse { token, mut user } = self
            .auth
            .clone()
            .context("Can't finalize before registration")?;

        let mut warnings = Vec::new();

        if let Some(business_name) = self.business_name.clone() {
            let req = UpdateProfileRequest {
                name: None,
                business_name: Some(business_name),
            };
            match api.update_profile(&token, &req).await {
                Ok(updated) => user = updated,
                Err(err) => {
                    warn!("signup: failed to save business name: {err:#}");
                    warnings
                        .push(format!("Couldn't save business name: {err}"));
                }
            }
        }

        if let Some((filename, image)) = self.photo.clone() {
            match api.upload_profile_photo(&token, filename, image).await {
                Ok(resp) =>
                    user.profile_photo_url = Some(resp.profile_photo_url),
                Err(err) => {
                    warn!("signup: failed to upload photo: {err:#}");
                    warnings.push(format!("Couldn't upload photo: {err}"));
                }
            }
        }

        if let Err(err) = session.login(token.clone(), user.clone()) {
            warn!("signup: failed to persist session: {err:#}");
            warnings.push(
                "Couldn't save your session on this device; you'll need to \
                 log in again next time"
                    .to_owned(),
            );
            // stay signed in for this process at least
            session.adopt(token, user.clone());
        }

        self.step = SignupStep::Done;
        Ok(SignupOutcome { user, warnings })
    }

    fn ensure_step(&self, expected: SignupStep) -> Result<(), String> {
        if self.step != expected {
            return Err(format!(
                "Wizard is on step {:?}, not {expected:?}",
                self.step
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use std::cell::Cell;

    use bahi_api::{
        error::BackendErrorKind,
        models::{
            AddCustomerRequest, AddTransactionRequest, AuthToken, Customer,
            CustomerDetails, CustomerId, GetTransactions, LoginRequest,
            ProfilePhotoResponse, Transaction, UpdateLocationRequest, UserId,
        },
    };

    use super::*;
    use crate::{kv::test::MemKvStore, session::SessionState};

    /// In-memory backend with per-endpoint failure injection.
    #[derive(Default)]
    struct FakeBackend {
        fail_register: Cell<Option<BackendErrorKind>>,
        fail_update_profile: Cell<bool>,
        fail_upload: Cell<bool>,
    }

    fn server_err(kind: BackendErrorKind) -> BackendApiError {
        BackendApiError {
            kind,
            msg: "injected".to_owned(),
        }
    }

    impl AppBackendApi for FakeBackend {
        async fn login(
            &self,
            _req: &LoginRequest,
        ) -> Result<AuthResponse, BackendApiError> {
            unimplemented!()
        }

        async fn register(
            &self,
            req: &RegisterRequest,
        ) -> Result<AuthResponse, BackendApiError> {
            if let Some(kind) = self.fail_register.get() {
                return Err(server_err(kind));
            }
            Ok(AuthResponse {
                token: AuthToken("tok_fake".to_owned()),
                user: User {
                    id: UserId(42),
                    name: req.name.clone(),
                    phone_number: req.phone_number.clone(),
                    business_name: None,
                    profile_photo_url: None,
                    location: None,
                },
            })
        }

        async fn get_profile(
            &self,
            _token: &AuthToken,
        ) -> Result<User, BackendApiError> {
            unimplemented!()
        }

        async fn update_profile(
            &self,
            _token: &AuthToken,
            req: &UpdateProfileRequest,
        ) -> Result<User, BackendApiError> {
            if self.fail_update_profile.get() {
                return Err(server_err(BackendErrorKind::Server));
            }
            Ok(User {
                id: UserId(42),
                name: "Asha".to_owned(),
                phone_number: "9876543210".to_owned(),
                business_name: req.business_name.clone(),
                profile_photo_url: None,
                location: None,
            })
        }

        async fn update_location(
            &self,
            _token: &AuthToken,
            _req: &UpdateLocationRequest,
        ) -> Result<User, BackendApiError> {
            unimplemented!()
        }

        async fn upload_profile_photo(
            &self,
            _token: &AuthToken,
            _filename: String,
            _image: Bytes,
        ) -> Result<ProfilePhotoResponse, BackendApiError> {
            if self.fail_upload.get() {
                return Err(server_err(BackendErrorKind::Upload));
            }
            Ok(ProfilePhotoResponse {
                profile_photo_url: "https://cdn.bahi.test/photos/42.jpg".to_owned(),
            })
        }

        async fn get_customers(
            &self,
            _token: &AuthToken,
        ) -> Result<Vec<Customer>, BackendApiError> {
            unimplemented!()
        }

        async fn add_customer(
            &self,
            _token: &AuthToken,
            _req: &AddCustomerRequest,
        ) -> Result<Customer, BackendApiError> {
            unimplemented!()
        }

        async fn get_customer(
            &self,
            _token: &AuthToken,
            _id: CustomerId,
        ) -> Result<CustomerDetails, BackendApiError> {
            unimplemented!()
        }

        async fn get_transactions(
            &self,
            _token: &AuthToken,
            _req: &GetTransactions,
        ) -> Result<Vec<Transaction>, BackendApiError> {
            unimplemented!()
        }

        async fn add_transaction(
            &self,
            _token: &AuthToken,
            _req: &AddTransactionRequest,
        ) -> Result<Transaction, BackendApiError> {
            unimplemented!()
        }
    }

    async fn advance_to_password(wizard: &mut SignupWizard) {
        wizard.submit_name("Asha".to_owned()).unwrap();
        wizard.submit_phone("9876543210".to_owned()).unwrap();
        assert_eq!(wizard.step(), SignupStep::Password);
    }

    #[tokio::test]
    async fn happy_path_all_steps() {
        let api = FakeBackend::default();
        let kv = MemKvStore::new();
        let session = SessionStore::new(&kv);
        session.init();

        let mut wizard = SignupWizard::new();
        advance_to_password(&mut wizard).await;

        wizard
            .submit_password(&api, "hunter2!".to_owned())
            .await
            .unwrap();
        assert_eq!(wizard.step(), SignupStep::BusinessName);

        wizard
            .submit_business_name(Some("Asha Kirana".to_owned()))
            .unwrap();
        wizard
            .submit_photo(Some((
                "me.jpg".to_owned(),
                Bytes::from_static(b"\xff\xd8fake-jpeg"),
            )))
            .unwrap();

        let outcome = wizard.finalize(&api, &session).await.unwrap();
        assert!(outcome.warnings.is_empty());
        assert_eq!(
            outcome.user.business_name.as_deref(),
            Some("Asha Kirana")
        );
        assert!(outcome.user.profile_photo_url.is_some());

        // session persisted: a reload comes back logged in
        let session2 = SessionStore::new(&kv);
        assert!(session2.init().is_logged_in());
    }

    #[tokio::test]
    async fn local_validation_keeps_step() {
        let mut wizard = SignupWizard::new();
        wizard.submit_name("   ".to_owned()).unwrap_err();
        assert_eq!(wizard.step(), SignupStep::Name);

        wizard.submit_name("Asha".to_owned()).unwrap();
        wizard.submit_phone("12345".to_owned()).unwrap_err();
        assert_eq!(wizard.step(), SignupStep::Phone);
    }

    #[tokio::test]
    async fn server_rejection_keeps_password_step() {
        let api = FakeBackend::default();
        api.fail_register.set(Some(BackendErrorKind::Server));

        let mut wizard = SignupWizard::new();
        advance_to_password(&mut wizard).await;

        let err = wizard
            .submit_password(&api, "hunter2!".to_owned())
            .await
            .unwrap_err();
        assert_eq!(err.kind, BackendErrorKind::Server);
        assert_eq!(wizard.step(), SignupStep::Password);

        // the retry can succeed
        api.fail_register.set(None);
        wizard
            .submit_password(&api, "hunter2!".to_owned())
            .await
            .unwrap();
        assert_eq!(wizard.step(), SignupStep::BusinessName);
    }

    #[tokio::test]
    async fn duplicate_phone_surfaces_kind() {
        let api = FakeBackend::default();
        api.fail_register.set(Some(BackendErrorKind::Duplicate));

        let mut wizard = SignupWizard::new();
        advance_to_password(&mut wizard).await;

        let err = wizard
            .submit_password(&api, "hunter2!".to_owned())
            .await
            .unwrap_err();
        assert_eq!(err.kind, BackendErrorKind::Duplicate);
        assert_eq!(wizard.step(), SignupStep::Password);
    }

    #[tokio::test]
    async fn finalize_tolerates_optional_call_failures() {
        let api = FakeBackend::default();
        api.fail_update_profile.set(true);
        api.fail_upload.set(true);

        let kv = MemKvStore::new();
        let session = SessionStore::new(&kv);
        session.init();

        let mut wizard = SignupWizard::new();
        advance_to_password(&mut wizard).await;
        wizard
            .submit_password(&api, "hunter2!".to_owned())
            .await
            .unwrap();
        wizard
            .submit_business_name(Some("Asha Kirana".to_owned()))
            .unwrap();
        wizard
            .submit_photo(Some(("me.jpg".to_owned(), Bytes::new())))
            .unwrap();

        let outcome = wizard.finalize(&api, &session).await.unwrap();
        assert_eq!(outcome.warnings.len(), 2);
        // still signed in, just without the optional extras
        assert!(session.state().is_logged_in());
        assert_eq!(outcome.user.business_name, None);
        assert_eq!(outcome.user.profile_photo_url, None);
    }

    #[tokio::test]
    async fn finalize_persist_failure_keeps_memory_session() {
        let api = FakeBackend::default();
        let kv = MemKvStore::new();
        let session = SessionStore::new(&kv);
        session.init();
        kv.set_fail_writes(true);

        let mut wizard = SignupWizard::new();
        advance_to_password(&mut wizard).await;
        wizard
            .submit_password(&api, "hunter2!".to_owned())
            .await
            .unwrap();
        wizard.submit_business_name(None).unwrap();
        wizard.submit_photo(None).unwrap();

        let outcome = wizard.finalize(&api, &session).await.unwrap();
        assert_eq!(outcome.warnings.len(), 1);
        assert!(session.state().is_logged_in());
        // nothing made it to disk
        assert!(!kv.contains_key("auth_token"));
        assert!(!kv.contains_key("user.json"));
    }

    #[tokio::test]
    async fn abandoning_before_register_leaves_nothing() {
        let kv = MemKvStore::new();
        let session = SessionStore::new(&kv);
        session.init();

        let mut wizard = SignupWizard::new();
        advance_to_password(&mut wizard).await;
        drop(wizard);

        assert!(matches!(session.state(), SessionState::LoggedOut));
        assert!(!kv.contains_key("auth_token"));
    }

    #[tokio::test]
    async fn finalize_before_register_errors() {
        let api = FakeBackend::default();
        let session = SessionStore::new(MemKvStore::new());
        session.init();

        let mut wizard = SignupWizard::new();
        wizard.finalize(&api, &session).await.unwrap_err();
    }

    #[test]
    fn back_navigation_keeps_entries() {
        let mut wizard = SignupWizard::new();
        wizard.submit_name("Asha".to_owned()).unwrap();
        wizard.submit_phone("9876543210".to_owned()).unwrap();

        wizard.back();
        assert_eq!(wizard.step(), SignupStep::Phone);
        wizard.back();
        assert_eq!(wizard.step(), SignupStep::Name);
        wizard.back();
        assert_eq!(wizard.step(), SignupStep::Name);

        // re-submitting after going back works
        wizard.submit_name("Asha Devi".to_owned()).unwrap();
        assert_eq!(wizard.step(), SignupStep::Phone);
    }
}
