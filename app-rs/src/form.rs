//! Helpers for UI input forms.
//!
//! Each validator returns a user-displayable message on failure. The server
//! is still authoritative; these checks just avoid pointless round trips.

/// Minimum password length enforced locally.
pub const MIN_PASSWORD_LEN: usize = 6;

/// Phone numbers are national-format: exactly 10 digits, no separators.
pub fn validate_phone_number(phone_number: &str) -> Result<(), String> {
    // TODO(bahi): these messages need to be translated before display.
    if phone_number.is_empty() {
        return Err("Please enter a phone number".to_owned());
    }
    if !phone_number.bytes().all(|b| b.is_ascii_digit()) {
        return Err("Phone number can only contain digits".to_owned());
    }
    if phone_number.len() != 10 {
        return Err("Phone number must be exactly 10 digits".to_owned());
    }
    Ok(())
}

pub fn validate_name(name: &str) -> Result<(), String> {
    if name.trim().is_empty() {
        return Err("Please enter a name".to_owned());
    }
    Ok(())
}

pub fn validate_password(password: &str) -> Result<(), String> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        ));
    }
    Ok(())
}

/// Ledger amounts are in the smallest currency unit and must be positive;
/// whether the amount is owed or paid comes from the transaction kind.
pub fn validate_amount_paise(amount_paise: i64) -> Result<(), String> {
    if amount_paise <= 0 {
        return Err("Amount must be greater than zero".to_owned());
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use proptest::{prop_assert, proptest};

    use super::*;

    #[test]
    fn phone_number_proptest() {
        // any 10 ascii digits pass; anything containing a non-digit fails
        proptest!(|(phone in "[0-9]{10}")| {
            prop_assert!(validate_phone_number(&phone).is_ok());
        });
        proptest!(|(prefix in "[0-9]{0,9}", junk in "[^0-9]{1,3}")| {
            let phone = format!("{prefix}{junk}");
            prop_assert!(validate_phone_number(&phone).is_err());
        });
    }

    #[test]
    fn test_validate_phone_number() {
        let valid = ["9876543210", "0000000000", "1234567890"];
        let invalid = [
            "",
            "98765",
            "98765432100",
            "987654321",
            "98765 4321",
            "+919876543210",
            "98765asdfg",
            "९८७६५४३२१०",
        ];

        for phone in valid {
            validate_phone_number(phone).unwrap();
        }
        for phone in invalid {
            validate_phone_number(phone).unwrap_err();
        }
    }

    #[test]
    fn test_validate_name() {
        validate_name("Asha").unwrap();
        validate_name("A").unwrap();
        validate_name("").unwrap_err();
        validate_name("   ").unwrap_err();
    }

    #[test]
    fn test_validate_password() {
        validate_password("hunter2!").unwrap();
        validate_password("abcdef").unwrap();
        validate_password("abcde").unwrap_err();
        validate_password("").unwrap_err();
    }

    #[test]
    fn test_validate_amount_paise() {
        validate_amount_paise(1).unwrap();
        validate_amount_paise(50_00).unwrap();
        validate_amount_paise(i64::MAX).unwrap();
        validate_amount_paise(0).unwrap_err();
        validate_amount_paise(-1).unwrap_err();
        validate_amount_paise(i64::MIN).unwrap_err();
    }
}
