//! Login and onboarding form checks.

pub const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Email é obrigatório")]
    EmailRequired,
    #[error("Email inválido")]
    EmailInvalid,
    #[error("Senha deve ter no mínimo 6 caracteres")]
    PasswordTooShort,
    #[error("Nome da lavanderia é obrigatório")]
    NameRequired,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
    pub remember_me: bool,
}

impl LoginForm {
    /// Collects every failing field, email first.
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();
        if let Err(e) = validate_email(&self.email) {
            errors.push(e);
        }
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            errors.push(ValidationError::PasswordTooShort);
        }
        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

pub fn validate_email(email: &str) -> Result<(), ValidationError> {
    let email = email.trim();
    if email.is_empty() {
        return Err(ValidationError::EmailRequired);
    }
    let Some((local, domain)) = email.split_once('@') else {
        return Err(ValidationError::EmailInvalid);
    };
    let domain_ok = domain.contains('.') && domain.split('.').all(|label| !label.is_empty());
    if local.is_empty() || !domain_ok || domain.contains('@') || email.chars().any(char::is_whitespace) {
        return Err(ValidationError::EmailInvalid);
    }
    Ok(())
}

pub fn validate_laundromat_name(name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        Err(ValidationError::NameRequired)
    } else {
        Ok(())
    }
}
