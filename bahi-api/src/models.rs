//! Domain records and request/response structs for the Bahi backend API.
//!
//! Everything here crosses the wire as JSON. Fields added server-side after a
//! client shipped must be optional (or `#[serde(default)]`) so old clients
//! keep deserializing newer records.

use std::fmt;

#[cfg(any(test, feature = "test-utils"))]
use proptest_derive::Arbitrary;
use serde::{Deserialize, Serialize};

// --- Auth --- //

/// An opaque bearer token returned by `login` / `register` and attached to
/// every authenticated request as `Authorization: Bearer <token>`.
///
/// The `Debug` impl is redacted so tokens don't leak into logs.
#[derive(Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuthToken(pub String);

impl AuthToken {
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AuthToken(..)")
    }
}

#[cfg(any(test, feature = "test-utils"))]
impl proptest::arbitrary::Arbitrary for AuthToken {
    type Parameters = ();
    type Strategy = proptest::strategy::BoxedStrategy<Self>;
    fn arbitrary_with(_args: Self::Parameters) -> Self::Strategy {
        use proptest::strategy::Strategy;
        // Tokens are urlsafe-ish opaque strings.
        "[A-Za-z0-9_-]{16,48}".prop_map(Self).boxed()
    }
}

/// POST /auth/login -> [`AuthResponse`]
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LoginRequest {
    pub phone_number: String,
    pub password: String,
}

/// POST /auth/register -> [`AuthResponse`]
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub phone_number: String,
    pub password: String,
}

/// Returned by both `login` and `register`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuthResponse {
    pub token: AuthToken,
    pub user: User,
}

// --- Users --- //

/// The authenticated merchant's account record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[cfg_attr(any(test, feature = "test-utils"), derive(Arbitrary))]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub phone_number: String,
    #[serde(default)]
    pub business_name: Option<String>,
    #[serde(default)]
    pub profile_photo_url: Option<String>,
    #[serde(default)]
    pub location: Option<Location>,
}

#[derive(
    Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize,
    Deserialize,
)]
#[cfg_attr(any(test, feature = "test-utils"), derive(Arbitrary))]
#[serde(transparent)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// A geographic point attached to the merchant's shop.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
}

#[cfg(any(test, feature = "test-utils"))]
impl proptest::arbitrary::Arbitrary for Location {
    type Parameters = ();
    type Strategy = proptest::strategy::BoxedStrategy<Self>;
    fn arbitrary_with(_args: Self::Parameters) -> Self::Strategy {
        use proptest::strategy::Strategy;
        (-90.0_f64..=90.0, -180.0_f64..=180.0)
            .prop_map(|(latitude, longitude)| Self {
                latitude,
                longitude,
            })
            .boxed()
    }
}

// `Location` contains f64s, so derive `Eq` is unavailable; the struct is
// still totally comparable in practice since NaN never round-trips the API.
impl Eq for User {}

/// PUT /app/profile -> [`User`]
///
/// All fields optional; only the set fields are updated.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct UpdateProfileRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub business_name: Option<String>,
}

/// PUT /app/profile/location -> [`User`]
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UpdateLocationRequest {
    pub latitude: f64,
    pub longitude: f64,
}

/// POST /app/profile/photo (multipart) -> [`ProfilePhotoResponse`]
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProfilePhotoResponse {
    pub profile_photo_url: String,
}

// --- Customers --- //

/// A customer in the merchant's ledger, with their running balance.
///
/// `balance_paise` is the net amount in the smallest currency unit. Positive
/// means the customer owes the merchant.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[cfg_attr(any(test, feature = "test-utils"), derive(Arbitrary))]
pub struct Customer {
    pub id: CustomerId,
    pub name: String,
    pub phone_number: String,
    #[serde(default)]
    pub balance_paise: i64,
}

#[derive(
    Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize,
    Deserialize,
)]
#[cfg_attr(any(test, feature = "test-utils"), derive(Arbitrary))]
#[serde(transparent)]
pub struct CustomerId(pub i64);

impl fmt::Display for CustomerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// POST /app/customers -> [`Customer`]
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AddCustomerRequest {
    pub name: String,
    pub phone_number: String,
}

/// GET /app/customers/{id} -> [`CustomerDetails`]
///
/// The customer record plus their transaction history, newest first.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct CustomerDetails {
    pub customer: Customer,
    pub transactions: Vec<Transaction>,
}

// --- Transactions --- //

/// Whether a ledger entry extends credit to the customer or records a
/// payment received from them.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[cfg_attr(any(test, feature = "test-utils"), derive(Arbitrary))]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    /// Goods given on credit; increases what the customer owes.
    Credit,
    /// Payment received; decreases what the customer owes.
    Payment,
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Credit => write!(f, "credit"),
            Self::Payment => write!(f, "payment"),
        }
    }
}

/// One entry in a customer's ledger.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[cfg_attr(any(test, feature = "test-utils"), derive(Arbitrary))]
pub struct Transaction {
    pub id: TransactionId,
    pub customer_id: CustomerId,
    pub kind: TransactionKind,
    /// Amount in the smallest currency unit. Always positive; the sign of
    /// the balance effect comes from `kind`.
    pub amount_paise: i64,
    #[serde(default)]
    pub note: Option<String>,
    /// Server-assigned creation time, seconds since the unix epoch.
    pub created_at: i64,
}

#[derive(
    Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize,
    Deserialize,
)]
#[cfg_attr(any(test, feature = "test-utils"), derive(Arbitrary))]
#[serde(transparent)]
pub struct TransactionId(pub i64);

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Query string for GET /app/transactions.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct GetTransactions {
    /// Restrict to one customer's ledger; `None` returns all transactions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<CustomerId>,
}

/// POST /app/transactions -> [`Transaction`]
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AddTransactionRequest {
    pub customer_id: CustomerId,
    pub kind: TransactionKind,
    pub amount_paise: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

// --- Misc --- //

/// Query parameter struct for endpoints which expect no parameters.
///
/// Also used to serialize empty JSON responses.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct Empty {}

#[cfg(test)]
mod test {
    use proptest::{arbitrary::any, prop_assert_eq, proptest};

    use super::*;

    #[test]
    fn transaction_kind_wire_format() {
        let json = serde_json::to_string(&TransactionKind::Credit).unwrap();
        assert_eq!(json, "\"credit\"");
        let json = serde_json::to_string(&TransactionKind::Payment).unwrap();
        assert_eq!(json, "\"payment\"");
    }

    #[test]
    fn auth_token_debug_is_redacted() {
        let token = AuthToken("super-secret-token".to_owned());
        assert_eq!(format!("{token:?}"), "AuthToken(..)");
    }

    #[test]
    fn user_deser_tolerates_missing_optionals() {
        // An old record persisted before business_name/profile_photo_url/location
        // existed must still deserialize.
        let json = r#"{"id":7,"name":"Asha","phone_number":"9876543210"}"#;
        let user = serde_json::from_str::<User>(&json).unwrap();
        assert_eq!(user.id, UserId(7));
        assert_eq!(user.business_name, None);
        assert_eq!(user.profile_photo_url, None);
        assert!(user.location.is_none());
    }

    #[test]
    fn user_serde_roundtrip() {
        proptest!(|(user in any::<User>())| {
            let json = serde_json::to_string(&user).unwrap();
            let user2 = serde_json::from_str::<User>(&json).unwrap();
            prop_assert_eq!(user, user2);
        });
    }

    #[test]
    fn transaction_serde_roundtrip() {
        proptest!(|(txn in any::<Transaction>())| {
            let json = serde_json::to_string(&txn).unwrap();
            let txn2 = serde_json::from_str::<Transaction>(&json).unwrap();
            prop_assert_eq!(txn, txn2);
        });
    }
}
