//! `LedgerClient`: the HTTPS impl of [`AppBackendApi`] against the Bahi
//! backend.
//!
//! Requests that fail basic local validation (phone number shape, positive
//! amounts) are rejected here with a `Validation` error before any bytes hit
//! the network.

use bahi_api::{
    def::AppBackendApi,
    error::{ApiErrorKind, BackendApiError, BackendErrorKind, ErrorCode},
    models::{
        AddCustomerRequest, AddTransactionRequest, AuthResponse, AuthToken,
        Customer, CustomerDetails, CustomerId, Empty, GetTransactions,
        LoginRequest, ProfilePhotoResponse, RegisterRequest, Transaction,
        UpdateLocationRequest, UpdateProfileRequest, User,
    },
    rest::{RestClient, POST},
};
use bytes::Bytes;

use crate::form;

/// Idempotent reads are retried a couple times before giving up.
const GET_RETRIES: usize = 2;

pub struct LedgerClient {
    rest: RestClient,
    backend_url: String,
}

impl LedgerClient {
    pub fn new(backend_url: String) -> anyhow::Result<Self> {
        let rest = RestClient::new("bahi-app", "backend")?;
        Ok(Self { rest, backend_url })
    }

    /// Build a [`LedgerClient`] from an existing [`RestClient`], e.g. one
    /// configured to allow plain http against a local dev backend.
    pub fn from_parts(rest: RestClient, backend_url: String) -> Self {
        Self { rest, backend_url }
    }

    /// Error codes which shouldn't be retried: the server gave a definitive
    /// answer, so asking again can only waste the user's data plan.
    fn stop_codes() -> [ErrorCode; 2] {
        [
            BackendErrorKind::BadAuth.to_code(),
            BackendErrorKind::NotFound.to_code(),
        ]
    }
}

impl AppBackendApi for LedgerClient {
    async fn login(
        &self,
        req: &LoginRequest,
    ) -> Result<AuthResponse, BackendApiError> {
        form::validate_phone_number(&req.phone_number)
            .map_err(BackendApiError::validation)?;

        let url = format!("{}/auth/login", self.backend_url);
        self.rest.send(self.rest.post(url, req)).await
    }

    async fn register(
        &self,
        req: &RegisterRequest,
    ) -> Result<AuthResponse, BackendApiError> {
        form::validate_name(&req.name)
            .map_err(BackendApiError::validation)?;
        form::validate_phone_number(&req.phone_number)
            .map_err(BackendApiError::validation)?;
        form::validate_password(&req.password)
            .map_err(BackendApiError::validation)?;

        let url = format!("{}/auth/register", self.backend_url);
        self.rest.send(self.rest.post(url, req)).await
    }

    async fn get_profile(
        &self,
        token: &AuthToken,
    ) -> Result<User, BackendApiError> {
        let url = format!("{}/app/profile", self.backend_url);
        let req = self.rest.get(url, &Empty {}).bearer_auth(token.as_str());
        self.rest
            .send_with_retries(req, GET_RETRIES, &Self::stop_codes())
            .await
    }

    async fn update_profile(
        &self,
        token: &AuthToken,
        req: &UpdateProfileRequest,
    ) -> Result<User, BackendApiError> {
        let url = format!("{}/app/profile", self.backend_url);
        let req = self.rest.put(url, req).bearer_auth(token.as_str());
        self.rest.send(req).await
    }

    async fn update_location(
        &self,
        token: &AuthToken,
        req: &UpdateLocationRequest,
    ) -> Result<User, BackendApiError> {
        let url = format!("{}/app/profile/location", self.backend_url);
        let req = self.rest.put(url, req).bearer_auth(token.as_str());
        self.rest.send(req).await
    }

    async fn upload_profile_photo(
        &self,
        token: &AuthToken,
        filename: String,
        image: Bytes,
    ) -> Result<ProfilePhotoResponse, BackendApiError> {
        let url = format!("{}/app/profile/photo", self.backend_url);
        let part = reqwest::multipart::Part::bytes(image.to_vec())
            .file_name(filename);
        let multipart = reqwest::multipart::Form::new().part("photo", part);
        let req = self
            .rest
            .builder(POST, url)
            .bearer_auth(token.as_str())
            .multipart(multipart);
        self.rest.send(req).await
    }

    async fn get_customers(
        &self,
        token: &AuthToken,
    ) -> Result<Vec<Customer>, BackendApiError> {
        let url = format!("{}/app/customers", self.backend_url);
        let req = self.rest.get(url, &Empty {}).bearer_auth(token.as_str());
        self.rest
            .send_with_retries(req, GET_RETRIES, &Self::stop_codes())
            .await
    }

    async fn add_customer(
        &self,
        token: &AuthToken,
        req: &AddCustomerRequest,
    ) -> Result<Customer, BackendApiError> {
        form::validate_name(&req.name)
            .map_err(BackendApiError::validation)?;
        form::validate_phone_number(&req.phone_number)
            .map_err(BackendApiError::validation)?;

        let url = format!("{}/app/customers", self.backend_url);
        let req = self.rest.post(url, req).bearer_auth(token.as_str());
        self.rest.send(req).await
    }

    async fn get_customer(
        &self,
        token: &AuthToken,
        id: CustomerId,
    ) -> Result<CustomerDetails, BackendApiError> {
        let url = format!("{}/app/customers/{id}", self.backend_url);
        let req = self.rest.get(url, &Empty {}).bearer_auth(token.as_str());
        self.rest
            .send_with_retries(req, GET_RETRIES, &Self::stop_codes())
            .await
    }

    async fn get_transactions(
        &self,
        token: &AuthToken,
        req: &GetTransactions,
    ) -> Result<Vec<Transaction>, BackendApiError> {
        let url = format!("{}/app/transactions", self.backend_url);
        let req = self.rest.get(url, req).bearer_auth(token.as_str());
        self.rest
            .send_with_retries(req, GET_RETRIES, &Self::stop_codes())
            .await
    }

    async fn add_transaction(
        &self,
        token: &AuthToken,
        req: &AddTransactionRequest,
    ) -> Result<Transaction, BackendApiError> {
        form::validate_amount_paise(req.amount_paise)
            .map_err(BackendApiError::validation)?;

        let url = format!("{}/app/transactions", self.backend_url);
        let req = self.rest.post(url, req).bearer_auth(token.as_str());
        self.rest.send(req).await
    }
}
