use serde::Deserialize;

/// Ambient session state shared by every screen. This is the only state that
/// survives navigation; screens re-fetch everything else on entry.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthSession {
    pub user_id: String,
    pub email: String,
    pub access_token: String,
}

/// Session gate: resolving at startup, then signed out or signed in. A failed
/// session check lands on `SignedOut`; there is no retry or backoff.
#[derive(Debug, Clone, Default)]
pub enum SessionPhase {
    #[default]
    SignedOut,
    Resolving,
    SignedIn(AuthSession),
}

impl SessionPhase {
    pub fn session(&self) -> Option<&AuthSession> {
        match self {
            Self::SignedIn(session) => Some(session),
            _ => None,
        }
    }

    pub fn is_resolving(&self) -> bool {
        matches!(self, Self::Resolving)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignInField {
    Email,
    Password,
}

impl SignInField {
    fn toggle(self) -> Self {
        match self {
            Self::Email => Self::Password,
            Self::Password => Self::Email,
        }
    }
}

/// Editable state for the sign-in screen.
#[derive(Debug, Clone)]
pub struct SignInForm {
    pub email: String,
    pub password: String,
    field: SignInField,
    pub status: Option<String>,
}

impl SignInForm {
    pub fn new() -> Self {
        Self {
            email: String::new(),
            password: String::new(),
            field: SignInField::Email,
            status: None,
        }
    }

    pub fn with_credentials(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
            field: SignInField::Email,
            status: None,
        }
    }

    pub fn active_field(&self) -> SignInField {
        self.field
    }

    pub fn next_field(&mut self) {
        self.field = self.field.toggle();
    }

    pub fn push_char(&mut self, ch: char) {
        match self.field {
            SignInField::Email => self.email.push(ch),
            SignInField::Password => self.password.push(ch),
        }
        self.status = None;
    }

    pub fn backspace(&mut self) {
        match self.field {
            SignInField::Email => {
                self.email.pop();
            }
            SignInField::Password => {
                self.password.pop();
            }
        }
        self.status = None;
    }

    pub fn is_submittable(&self) -> bool {
        !self.email.trim().is_empty() && !self.password.is_empty()
    }

    pub fn set_status<S: Into<String>>(&mut self, status: S) {
        self.status = Some(status.into());
    }

    pub fn masked_password(&self) -> String {
        if self.password.is_empty() {
            "<empty>".to_string()
        } else {
            "*".repeat(self.password.chars().count())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typing_targets_the_active_field() {
        let mut form = SignInForm::new();
        form.push_char('a');
        form.next_field();
        form.push_char('b');
        assert_eq!(form.email, "a");
        assert_eq!(form.password, "b");
    }

    #[test]
    fn backspace_edits_the_active_field_only() {
        let mut form = SignInForm::with_credentials("learner@example.test", "secret");
        form.next_field();
        form.backspace();
        assert_eq!(form.email, "learner@example.test");
        assert_eq!(form.password, "secre");
    }

    #[test]
    fn submission_requires_both_fields() {
        let mut form = SignInForm::new();
        assert!(!form.is_submittable());
        form.email = "learner@example.test".to_string();
        assert!(!form.is_submittable());
        form.password = "secret".to_string();
        assert!(form.is_submittable());
    }

    #[test]
    fn password_is_masked_for_display() {
        let form = SignInForm::with_credentials("a@b.c", "secret");
        assert_eq!(form.masked_password(), "******");
    }
}
