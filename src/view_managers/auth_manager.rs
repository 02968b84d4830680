use super::catalog_manager::CatalogManager;
use crate::{
    App, AppView, StoreTaskMessage,
    log_util::log_debug,
    screen::{MutationState, ScreenState},
    session::{AuthSession, SessionPhase, SignInForm},
};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

/// Session gate: sign-in form handling, session resolution, and sign-out.
pub(crate) struct AuthManager<'a> {
    app: &'a mut App,
}

impl<'a> AuthManager<'a> {
    pub(crate) fn new(app: &'a mut App) -> Self {
        Self { app }
    }

    pub(crate) fn handle_key(&mut self, key: KeyEvent) {
        if self.app.session.is_resolving() {
            // One resolution attempt at a time; keys are ignored until it lands.
            if matches!(key.code, KeyCode::Esc) {
                self.app.running = false;
            }
            return;
        }

        match (key.modifiers, key.code) {
            (_, KeyCode::Esc) => self.app.running = false,
            (KeyModifiers::NONE, KeyCode::Tab | KeyCode::Down | KeyCode::Up)
            | (KeyModifiers::SHIFT, KeyCode::BackTab) => {
                self.app.sign_in_form.next_field();
            }
            (KeyModifiers::NONE, KeyCode::Backspace) => self.app.sign_in_form.backspace(),
            (KeyModifiers::NONE, KeyCode::Enter) => Self::submit_sign_in(self.app),
            (KeyModifiers::NONE | KeyModifiers::SHIFT, KeyCode::Char(ch)) => {
                self.app.sign_in_form.push_char(ch);
            }
            _ => {}
        }
    }

    /// Submit the sign-in form and start resolving a session.
    pub(crate) fn submit_sign_in(app: &mut App) {
        if !app.sign_in_form.is_submittable() {
            app.sign_in_form
                .set_status("Enter an email and password to sign in.");
            return;
        }
        let Some(store) = app.store.clone() else {
            App::push_error(
                &mut app.error,
                "Store unavailable. Configure store_url and store_api_key.".to_string(),
            );
            return;
        };

        let email = app.sign_in_form.email.trim().to_string();
        let password = app.sign_in_form.password.clone();
        app.session = SessionPhase::Resolving;
        app.sign_in_form.set_status("Signing in…");
        log_debug("AuthManager: resolving session");

        app.run_store_task(async move {
            match store.sign_in(&email, &password).await {
                Ok(session) => StoreTaskMessage::SessionResolved(session),
                Err(err) => StoreTaskMessage::SessionFailed(err.to_string()),
            }
        });
    }

    pub(crate) fn apply_session_resolved(app: &mut App, session: AuthSession) {
        log_debug(&format!(
            "AuthManager: signed in as {} ({})",
            session.email, session.user_id
        ));
        app.session = SessionPhase::SignedIn(session);
        app.sign_in_form.status = None;
        CatalogManager::show_catalog(app);
    }

    /// A failed session check yields no user; the sign-in screen stays up.
    pub(crate) fn apply_session_failed(app: &mut App, reason: String) {
        log_debug(&format!("AuthManager: session resolution failed: {}", reason));
        app.session = SessionPhase::SignedOut;
        app.view = AppView::SignIn;
        app.sign_in_form
            .set_status(format!("Sign-in failed: {}", reason));
    }

    /// Drop the session and all screen-scoped data, returning to sign-in.
    pub(crate) fn sign_out(app: &mut App) {
        log_debug("AuthManager: signed out");
        app.session = SessionPhase::SignedOut;
        app.view = AppView::SignIn;
        app.sign_in_form = SignInForm::new();
        app.catalog = ScreenState::Loading;
        app.catalog_index = 0;
        app.enrolled_course_ids.clear();
        app.enroll_mutation = MutationState::Idle;
        app.enroll_pending_course = None;
        app.course_detail = ScreenState::Loading;
        app.active_course_id = None;
        app.lesson_index = 0;
        app.lesson_detail = ScreenState::Loading;
        app.active_lesson_id = None;
        app.completion_mutation = MutationState::Idle;
        app.certificates = ScreenState::Loading;
        app.certificate_index = 0;
        app.error = None;
        app.status = Some("Signed out.".to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_session_check_yields_signed_out() {
        let mut app = App::for_tests();
        app.session = SessionPhase::Resolving;
        app.view = AppView::SignIn;

        AuthManager::apply_session_failed(&mut app, "invalid credentials".to_string());

        assert!(app.session.session().is_none());
        assert_eq!(app.view, AppView::SignIn);
        assert!(
            app.sign_in_form
                .status
                .as_deref()
                .is_some_and(|status| status.contains("invalid credentials"))
        );
    }

    #[test]
    fn sign_out_drops_screen_scoped_state() {
        let mut app = App::for_tests();
        app.view = AppView::Catalog;
        app.enrolled_course_ids.insert("c1".to_string());
        app.catalog = ScreenState::Empty;
        app.certificate_index = 3;
        app.error = Some("stale".to_string());

        AuthManager::sign_out(&mut app);

        assert_eq!(app.view, AppView::SignIn);
        assert!(app.session.session().is_none());
        assert!(app.enrolled_course_ids.is_empty());
        assert!(app.catalog.is_loading());
        assert_eq!(app.certificate_index, 0);
        assert!(app.error.is_none());
    }
}
