//! Client-side form validation, run before any request leaves the device.

pub const OTP_LENGTH: usize = 6;
pub const MIN_PASSWORD_LENGTH: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Please fill in all required fields")]
    MissingFields,

    #[error("Email address is not valid")]
    InvalidEmail,

    #[error("Password must be at least 6 characters")]
    PasswordTooShort,

    #[error("Password confirmation does not match")]
    PasswordMismatch,

    #[error("Please enter the OTP code")]
    MissingOtp,

    #[error("OTP code must be exactly 6 digits")]
    InvalidOtp,
}

/// Shape check equivalent to `^[^\s@]+@[^\s@]+\.[^\s@]+$`
pub fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    // The domain needs a dot with something on both sides of it.
    domain
        .char_indices()
        .any(|(i, c)| c == '.' && i > 0 && i + 1 < domain.len())
}

pub fn validate_email(email: &str) -> Result<(), ValidationError> {
    if email.trim().is_empty() {
        return Err(ValidationError::MissingFields);
    }
    if !is_valid_email(email.trim()) {
        return Err(ValidationError::InvalidEmail);
    }
    Ok(())
}

pub fn validate_login(email: &str, password: &str) -> Result<(), ValidationError> {
    if email.trim().is_empty() || password.is_empty() {
        return Err(ValidationError::MissingFields);
    }
    Ok(())
}

pub fn validate_new_password(password: &str, confirmation: &str) -> Result<(), ValidationError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(ValidationError::PasswordTooShort);
    }
    if password != confirmation {
        return Err(ValidationError::PasswordMismatch);
    }
    Ok(())
}

pub fn validate_registration(
    email: &str,
    password: &str,
    confirmation: &str,
    full_name: &str,
) -> Result<(), ValidationError> {
    if email.trim().is_empty()
        || password.is_empty()
        || confirmation.is_empty()
        || full_name.trim().is_empty()
    {
        return Err(ValidationError::MissingFields);
    }
    validate_email(email)?;
    validate_new_password(password, confirmation)
}

pub fn validate_otp(otp: &str) -> Result<(), ValidationError> {
    if otp.is_empty() {
        return Err(ValidationError::MissingOtp);
    }
    if otp.len() != OTP_LENGTH || !otp.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ValidationError::InvalidOtp);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_shapes() {
        assert!(is_valid_email("lan@mapic.app"));
        assert!(is_valid_email("a.b+c@sub.domain.vn"));
        assert!(!is_valid_email("lan@mapic"));
        assert!(!is_valid_email("@mapic.app"));
        assert!(!is_valid_email("lan@.app"));
        assert!(!is_valid_email("lan@mapic."));
        assert!(!is_valid_email("lan mapic@x.io"));
        assert!(!is_valid_email("lan@@mapic.app"));
        assert!(!is_valid_email("lanmapic.app"));
    }

    #[test]
    fn otp_must_be_six_digits() {
        assert_eq!(validate_otp(""), Err(ValidationError::MissingOtp));
        assert_eq!(validate_otp("12345"), Err(ValidationError::InvalidOtp));
        assert_eq!(validate_otp("1234567"), Err(ValidationError::InvalidOtp));
        assert_eq!(validate_otp("12a456"), Err(ValidationError::InvalidOtp));
        assert_eq!(validate_otp("123456"), Ok(()));
    }

    #[test]
    fn registration_checks_in_order() {
        assert_eq!(
            validate_registration("", "secret1", "secret1", "Lan"),
            Err(ValidationError::MissingFields)
        );
        assert_eq!(
            validate_registration("lan", "secret1", "secret1", "Lan"),
            Err(ValidationError::InvalidEmail)
        );
        assert_eq!(
            validate_registration("lan@mapic.app", "abc", "abc", "Lan"),
            Err(ValidationError::PasswordTooShort)
        );
        assert_eq!(
            validate_registration("lan@mapic.app", "secret1", "secret2", "Lan"),
            Err(ValidationError::PasswordMismatch)
        );
        assert_eq!(
            validate_registration(" lan@mapic.app ", "secret1", "secret1", "Lan"),
            Ok(())
        );
    }

    #[test]
    fn login_only_requires_both_fields() {
        assert_eq!(validate_login("  ", "pw"), Err(ValidationError::MissingFields));
        assert_eq!(validate_login("lan@mapic.app", ""), Err(ValidationError::MissingFields));
        assert_eq!(validate_login("lan@mapic.app", "pw"), Ok(()));
    }

    #[test]
    fn password_length_counts_characters() {
        assert_eq!(validate_new_password("mậtkhẩu", "mậtkhẩu"), Ok(()));
        assert_eq!(
            validate_new_password("ẩẩẩ", "ẩẩẩ"),
            Err(ValidationError::PasswordTooShort)
        );
    }
}
