//! Password strength policy.
//!
//! Character classes are Unicode-aware throughout: `É` is uppercase, `٣` is a
//! digit, `€` is special. Special means any character that is not
//! alphanumeric, whitespace or a control character.

use thiserror::Error;

use riskgate_core::error::RiskGateError;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PasswordError {
    #[error("password must be at least {min} characters long")]
    TooShort { min: usize },
    #[error("password must contain at least one uppercase letter")]
    MissingUppercase,
    #[error("password must contain at least one lowercase letter")]
    MissingLowercase,
    #[error("password must contain at least one digit")]
    MissingDigit,
    #[error("password must contain at least one special character")]
    MissingSpecial,
}

impl From<PasswordError> for RiskGateError {
    fn from(e: PasswordError) -> Self {
        RiskGateError::InvalidInput(e.to_string())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PasswordPolicy {
    pub min_length: usize,
    pub require_strength: bool,
}

impl PasswordPolicy {
    /// First failing rule wins, checked in a fixed order.
    pub fn check(&self, password: &str) -> Result<(), PasswordError> {
        if password.chars().count() < self.min_length {
            return Err(PasswordError::TooShort { min: self.min_length });
        }
        if !self.require_strength {
            return Ok(());
        }
        if !password.chars().any(char::is_uppercase) {
            return Err(PasswordError::MissingUppercase);
        }
        if !password.chars().any(char::is_lowercase) {
            return Err(PasswordError::MissingLowercase);
        }
        if !password.chars().any(char::is_numeric) {
            return Err(PasswordError::MissingDigit);
        }
        if !password.chars().any(is_special) {
            return Err(PasswordError::MissingSpecial);
        }
        Ok(())
    }
}

fn is_special(c: char) -> bool {
    !c.is_alphanumeric() && !c.is_whitespace() && !c.is_control()
}

#[cfg(test)]
mod tests {
    use super::*;

    const STRICT: PasswordPolicy = PasswordPolicy { min_length: 12, require_strength: true };

    #[test]
    fn reports_each_missing_class() {
        assert_eq!(STRICT.check("Short1!"), Err(PasswordError::TooShort { min: 12 }));
        assert_eq!(STRICT.check("alllowercase1!"), Err(PasswordError::MissingUppercase));
        assert_eq!(STRICT.check("ALLUPPERCASE1!"), Err(PasswordError::MissingLowercase));
        assert_eq!(STRICT.check("NoDigitsHere!!"), Err(PasswordError::MissingDigit));
        assert_eq!(STRICT.check("NoSpecials1234"), Err(PasswordError::MissingSpecial));
        assert_eq!(STRICT.check("Correct-Horse-9"), Ok(()));
    }

    #[test]
    fn length_only_when_strength_disabled() {
        let lax = PasswordPolicy { min_length: 8, require_strength: false };
        assert!(lax.check("abcdefgh").is_ok());
        assert!(lax.check("abc").is_err());
    }

    #[test]
    fn classes_are_unicode_aware() {
        assert_eq!(STRICT.check("Kostprijs-€uro9"), Ok(()));
        assert_eq!(STRICT.check("NoAsciiSymbol9€"), Ok(()));
        assert_eq!(STRICT.check("ÉCOLEÉCOLE1!"), Err(PasswordError::MissingLowercase));
        assert_eq!(STRICT.check("Arabic-digit-٣"), Ok(()));
        assert_eq!(STRICT.check("Tab\tonly\tNo1x"), Err(PasswordError::MissingSpecial));
    }

    #[test]
    fn space_is_not_special() {
        assert_eq!(STRICT.check("Has Spaces 123"), Err(PasswordError::MissingSpecial));
    }
}
