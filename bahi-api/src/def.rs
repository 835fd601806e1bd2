//! # API Definitions
//!
//! This module contains the trait which defines the full set of operations
//! the app can perform against the Bahi backend, with one method per
//! endpoint. The app core implements it over HTTPS; tests implement it with
//! in-memory fakes.
//!
//! ## Conventions
//!
//! - Methods are annotated with their HTTP method and path.
//! - Methods which take a token parameter require authentication; the
//!   implementor attaches the token as an `Authorization: Bearer` header.
//! - All methods return [`BackendApiError`], whose kind distinguishes
//!   transport failures from typed server rejections.

use bytes::Bytes;

use crate::{
    error::BackendApiError,
    models::{
        AddCustomerRequest, AddTransactionRequest, AuthResponse, AuthToken,
        Customer, CustomerDetails, CustomerId, GetTransactions, LoginRequest,
        ProfilePhotoResponse, RegisterRequest, Transaction,
        UpdateLocationRequest, UpdateProfileRequest, User,
    },
};

/// Defines every Bahi backend operation available to the app.
pub trait AppBackendApi {
    /// POST /auth/login [`LoginRequest`] -> [`AuthResponse`]
    ///
    /// Exchange phone number + password for a bearer token and the user's
    /// account record.
    async fn login(
        &self,
        req: &LoginRequest,
    ) -> Result<AuthResponse, BackendApiError>;

    /// POST /auth/register [`RegisterRequest`] -> [`AuthResponse`]
    ///
    /// Create an account. Returns the same shape as `login`, so a freshly
    /// registered user is immediately authenticated.
    async fn register(
        &self,
        req: &RegisterRequest,
    ) -> Result<AuthResponse, BackendApiError>;

    /// GET /app/profile [`Empty`] -> [`User`]
    ///
    /// [`Empty`]: crate::models::Empty
    async fn get_profile(
        &self,
        token: &AuthToken,
    ) -> Result<User, BackendApiError>;

    /// PUT /app/profile [`UpdateProfileRequest`] -> [`User`]
    ///
    /// Partial update; unset fields are left untouched. Returns the full
    /// updated record.
    async fn update_profile(
        &self,
        token: &AuthToken,
        req: &UpdateProfileRequest,
    ) -> Result<User, BackendApiError>;

    /// PUT /app/profile/location [`UpdateLocationRequest`] -> [`User`]
    async fn update_location(
        &self,
        token: &AuthToken,
        req: &UpdateLocationRequest,
    ) -> Result<User, BackendApiError>;

    /// POST /app/profile/photo (multipart) -> [`ProfilePhotoResponse`]
    ///
    /// Uploads the image bytes as a multipart form part named `photo`.
    async fn upload_profile_photo(
        &self,
        token: &AuthToken,
        filename: String,
        image: Bytes,
    ) -> Result<ProfilePhotoResponse, BackendApiError>;

    /// GET /app/customers [`Empty`] -> [`Vec<Customer>`]
    ///
    /// [`Empty`]: crate::models::Empty
    async fn get_customers(
        &self,
        token: &AuthToken,
    ) -> Result<Vec<Customer>, BackendApiError>;

    /// POST /app/customers [`AddCustomerRequest`] -> [`Customer`]
    async fn add_customer(
        &self,
        token: &AuthToken,
        req: &AddCustomerRequest,
    ) -> Result<Customer, BackendApiError>;

    /// GET /app/customers/{id} [`Empty`] -> [`CustomerDetails`]
    ///
    /// [`Empty`]: crate::models::Empty
    async fn get_customer(
        &self,
        token: &AuthToken,
        id: CustomerId,
    ) -> Result<CustomerDetails, BackendApiError>;

    /// GET /app/transactions [`GetTransactions`] -> [`Vec<Transaction>`]
    async fn get_transactions(
        &self,
        token: &AuthToken,
        req: &GetTransactions,
    ) -> Result<Vec<Transaction>, BackendApiError>;

    /// POST /app/transactions [`AddTransactionRequest`] -> [`Transaction`]
    async fn add_transaction(
        &self,
        token: &AuthToken,
        req: &AddTransactionRequest,
    ) -> Result<Transaction, BackendApiError>;
}
