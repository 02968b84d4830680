mod config;
mod log_util;
mod model;
mod screen;
mod session;
mod store_client;
mod ui_renderer;
mod view_managers;

use color_eyre::Result;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use dotenvy::dotenv;
use log_util::log_debug;
use model::{CourseSummary, EarnedCertificate, Lesson};
use ratatui::{DefaultTerminal, Frame};
use screen::{MutationState, ScreenState};
use session::{AuthSession, SessionPhase, SignInForm};
use std::{
    collections::BTreeSet,
    future::Future,
    sync::mpsc::{self, Receiver, Sender, TryRecvError},
    thread,
    time::Duration,
};
use store_client::StoreClient;
use tokio::runtime::Runtime;
use ui_renderer::UiRenderer;
use view_managers::{
    AuthManager, CatalogManager, CertificatesManager, CourseManager, LessonManager,
};

pub(crate) const LOADING_FRAMES: [&str; 4] = ["-", "\\", "|", "/"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AppView {
    SignIn,
    Catalog,
    CourseDetail,
    LessonDetail,
    Certificates,
}

/// Payload of a loaded course detail screen.
#[derive(Debug, Clone)]
pub(crate) struct CourseDetailData {
    pub(crate) course: model::Course,
    pub(crate) lessons: Vec<Lesson>,
}

/// Payload of a loaded lesson detail screen. Previous/next neighbors are
/// derived from the sibling list by array position, not recomputed ordering.
#[derive(Debug, Clone)]
pub(crate) struct LessonDetailData {
    pub(crate) lesson: Lesson,
    pub(crate) siblings: Vec<Lesson>,
}

/// Results reported back from background store tasks.
#[derive(Debug)]
pub(crate) enum StoreTaskMessage {
    SessionResolved(AuthSession),
    SessionFailed(String),
    CatalogLoaded {
        courses: Vec<CourseSummary>,
        enrolled_course_ids: Vec<String>,
    },
    CatalogFailed(String),
    EnrollCommitted {
        course_id: String,
    },
    EnrollFailed {
        course_id: String,
        reason: String,
    },
    CourseLoaded {
        course_id: String,
        data: CourseDetailData,
    },
    CourseFailed {
        course_id: String,
        reason: String,
    },
    LessonLoaded {
        lesson_id: String,
        data: LessonDetailData,
    },
    LessonFailed {
        lesson_id: String,
        reason: String,
    },
    CompletionCommitted {
        lesson_id: String,
    },
    CompletionFailed {
        lesson_id: String,
        reason: String,
    },
    CertificatesLoaded(Vec<EarnedCertificate>),
    CertificatesFailed(String),
    Fault(String),
}

fn main() -> color_eyre::Result<()> {
    dotenv().ok();
    color_eyre::install()?;
    let terminal = ratatui::init();
    let result = App::new().run(terminal);
    ratatui::restore();
    result
}

/// The main application which holds the state and logic of the application.
#[derive(Debug)]
pub(crate) struct App {
    /// Is the application running?
    pub(crate) running: bool,
    /// Current view being displayed.
    pub(crate) view: AppView,
    /// Ambient session state, the only state shared across screens.
    pub(crate) session: SessionPhase,
    /// Editable sign-in form state.
    pub(crate) sign_in_form: SignInForm,
    /// Explicitly constructed data-access client; absent when unconfigured.
    pub(crate) store: Option<StoreClient>,
    /// Course catalog rows with enrollment counts.
    pub(crate) catalog: ScreenState<Vec<CourseSummary>>,
    /// Currently selected catalog row.
    pub(crate) catalog_index: usize,
    /// Course ids the viewer is enrolled in, confirmed by the store.
    pub(crate) enrolled_course_ids: BTreeSet<String>,
    /// Lifecycle of the most recent enroll write.
    pub(crate) enroll_mutation: MutationState,
    /// Course id pending enrollment confirmation, if any.
    pub(crate) enroll_pending_course: Option<String>,
    /// Course detail screen data.
    pub(crate) course_detail: ScreenState<CourseDetailData>,
    /// Course the detail screen is bound to.
    pub(crate) active_course_id: Option<String>,
    /// Currently selected lesson row on the course detail screen.
    pub(crate) lesson_index: usize,
    /// Lesson detail screen data.
    pub(crate) lesson_detail: ScreenState<LessonDetailData>,
    /// Lesson the detail screen is bound to.
    pub(crate) active_lesson_id: Option<String>,
    /// Lifecycle of the most recent completion write.
    pub(crate) completion_mutation: MutationState,
    /// Derived certificates for fully completed courses.
    pub(crate) certificates: ScreenState<Vec<EarnedCertificate>>,
    /// Currently selected certificate row.
    pub(crate) certificate_index: usize,
    /// Any error encountered while loading configuration or dispatching work.
    pub(crate) error: Option<String>,
    /// Latest short status message shown in the status panel.
    pub(crate) status: Option<String>,
    /// Spinner frame index for active loading indicators.
    pub(crate) loading_frame: usize,
    /// Sends background store task results back to the event loop.
    task_sender: Sender<StoreTaskMessage>,
    /// Receives background store task results.
    task_receiver: Receiver<StoreTaskMessage>,
}

impl App {
    /// Construct a new instance of [`App`].
    pub(crate) fn new() -> Self {
        let mut aggregated_error: Option<String> = None;

        if let Err(err) = config::initialize() {
            Self::push_error(
                &mut aggregated_error,
                format!("Configuration load failed: {}", err),
            );
        }
        let app_config = config::current();

        let store = match StoreClient::from_config(&app_config) {
            Ok(client) => Some(client),
            Err(err) => {
                Self::push_error(&mut aggregated_error, format!("Store unavailable: {}", err));
                None
            }
        };

        let sign_in_form = if app_config.has_sign_in_credentials() {
            SignInForm::with_credentials(
                app_config.sign_in_email.clone(),
                app_config.sign_in_password.clone(),
            )
        } else {
            SignInForm::new()
        };

        let (task_sender, task_receiver) = mpsc::channel();

        let mut app = Self {
            running: false,
            view: AppView::SignIn,
            session: SessionPhase::SignedOut,
            sign_in_form,
            store,
            catalog: ScreenState::Loading,
            catalog_index: 0,
            enrolled_course_ids: BTreeSet::new(),
            enroll_mutation: MutationState::Idle,
            enroll_pending_course: None,
            course_detail: ScreenState::Loading,
            active_course_id: None,
            lesson_index: 0,
            lesson_detail: ScreenState::Loading,
            active_lesson_id: None,
            completion_mutation: MutationState::Idle,
            certificates: ScreenState::Loading,
            certificate_index: 0,
            error: aggregated_error,
            status: None,
            loading_frame: 0,
            task_sender,
            task_receiver,
        };

        // Initial session resolution: configured credentials are tried once;
        // failure simply yields the sign-in screen.
        if app.store.is_some() && app_config.has_sign_in_credentials() {
            AuthManager::submit_sign_in(&mut app);
        }

        app
    }

    /// Run the application's main loop.
    pub(crate) fn run(mut self, mut terminal: DefaultTerminal) -> Result<()> {
        self.running = true;
        let tick_rate = Duration::from_millis(120);
        while self.running {
            self.poll_task_messages();
            terminal.draw(|frame| self.render(frame))?;
            self.handle_crossterm_events(tick_rate)?;
        }
        Ok(())
    }

    /// Dispatch rendering based on the active view.
    fn render(&mut self, frame: &mut Frame) {
        UiRenderer::new(self).render(frame);
    }

    /// Reads the crossterm events and updates the state of [`App`].
    fn handle_crossterm_events(&mut self, tick_rate: Duration) -> Result<()> {
        if event::poll(tick_rate)? {
            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => self.on_key_event(key),
                Event::Mouse(_) => {}
                Event::Resize(_, _) => {}
                _ => {}
            }
            self.poll_task_messages();
        } else {
            self.on_tick();
        }
        Ok(())
    }

    fn on_tick(&mut self) {
        if self.any_screen_loading() {
            self.loading_frame = (self.loading_frame + 1) % LOADING_FRAMES.len();
        }
        self.poll_task_messages();
    }

    fn any_screen_loading(&self) -> bool {
        self.session.is_resolving()
            || match self.view {
                AppView::SignIn => false,
                AppView::Catalog => self.catalog.is_loading(),
                AppView::CourseDetail => self.course_detail.is_loading(),
                AppView::LessonDetail => self.lesson_detail.is_loading(),
                AppView::Certificates => self.certificates.is_loading(),
            }
    }

    fn poll_task_messages(&mut self) {
        loop {
            match self.task_receiver.try_recv() {
                Ok(message) => self.apply_task_message(message),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => break,
            }
        }
    }

    /// Route a background task result to the screen it belongs to. Results for
    /// a screen the user has already left are dropped, never applied.
    fn apply_task_message(&mut self, message: StoreTaskMessage) {
        match message {
            StoreTaskMessage::SessionResolved(session) => {
                AuthManager::apply_session_resolved(self, session);
            }
            StoreTaskMessage::SessionFailed(reason) => {
                AuthManager::apply_session_failed(self, reason);
            }
            StoreTaskMessage::CatalogLoaded {
                courses,
                enrolled_course_ids,
            } => CatalogManager::apply_loaded(self, courses, enrolled_course_ids),
            StoreTaskMessage::CatalogFailed(reason) => CatalogManager::apply_failed(self, reason),
            StoreTaskMessage::EnrollCommitted { course_id } => {
                CatalogManager::apply_enroll_committed(self, course_id);
            }
            StoreTaskMessage::EnrollFailed { course_id, reason } => {
                CatalogManager::apply_enroll_failed(self, course_id, reason);
            }
            StoreTaskMessage::CourseLoaded { course_id, data } => {
                CourseManager::apply_loaded(self, course_id, data);
            }
            StoreTaskMessage::CourseFailed { course_id, reason } => {
                CourseManager::apply_failed(self, course_id, reason);
            }
            StoreTaskMessage::LessonLoaded { lesson_id, data } => {
                LessonManager::apply_loaded(self, lesson_id, data);
            }
            StoreTaskMessage::LessonFailed { lesson_id, reason } => {
                LessonManager::apply_failed(self, lesson_id, reason);
            }
            StoreTaskMessage::CompletionCommitted { lesson_id } => {
                LessonManager::apply_completion_committed(self, lesson_id);
            }
            StoreTaskMessage::CompletionFailed { lesson_id, reason } => {
                LessonManager::apply_completion_failed(self, lesson_id, reason);
            }
            StoreTaskMessage::CertificatesLoaded(certificates) => {
                CertificatesManager::apply_loaded(self, certificates);
            }
            StoreTaskMessage::CertificatesFailed(reason) => {
                CertificatesManager::apply_failed(self, reason);
            }
            StoreTaskMessage::Fault(reason) => {
                Self::push_error(&mut self.error, reason.clone());
                log_debug(&format!("App: background task fault: {}", reason));
            }
        }
    }

    /// Run one async store task on a background worker thread and report its
    /// result over the task channel.
    pub(crate) fn run_store_task<Fut>(&self, future: Fut)
    where
        Fut: Future<Output = StoreTaskMessage> + Send + 'static,
    {
        let sender = self.task_sender.clone();
        thread::spawn(move || {
            let runtime = match Runtime::new() {
                Ok(runtime) => runtime,
                Err(err) => {
                    let _ = sender.send(StoreTaskMessage::Fault(format!(
                        "Failed to build Tokio runtime: {}",
                        err
                    )));
                    return;
                }
            };

            let message = runtime.block_on(future);
            drop(runtime);
            let _ = sender.send(message);
        });
    }

    /// Clone the store client and session needed to dispatch a task, or report
    /// why the task cannot run.
    pub(crate) fn store_and_session(&mut self) -> Option<(StoreClient, AuthSession)> {
        let Some(store) = self.store.clone() else {
            Self::push_error(
                &mut self.error,
                "Store unavailable. Configure store_url and store_api_key.".to_string(),
            );
            return None;
        };
        let Some(session) = self.session.session().cloned() else {
            log_debug("App: store task skipped without a signed-in session");
            return None;
        };
        Some((store, session))
    }

    /// Handles the key events and updates the state of [`App`].
    fn on_key_event(&mut self, key: KeyEvent) {
        if matches!(key.modifiers, KeyModifiers::CONTROL)
            && matches!(key.code, KeyCode::Char('c') | KeyCode::Char('C'))
        {
            self.quit();
            return;
        }

        // The sign-in screen consumes plain characters for text entry.
        if self.view == AppView::SignIn {
            AuthManager::new(self).handle_key(key);
            return;
        }

        match (key.modifiers, key.code) {
            (_, KeyCode::Esc | KeyCode::Char('q')) => self.quit(),
            (KeyModifiers::NONE, KeyCode::Char('s')) => AuthManager::sign_out(self),
            (KeyModifiers::NONE, KeyCode::Char('1')) => CatalogManager::show_catalog(self),
            (KeyModifiers::NONE, KeyCode::Char('2')) => {
                CertificatesManager::show_certificates(self)
            }
            (KeyModifiers::NONE, KeyCode::Tab) => self.toggle_shell_tab(),
            _ => match self.view {
                AppView::SignIn => {}
                AppView::Catalog => CatalogManager::new(self).handle_key(key),
                AppView::CourseDetail => CourseManager::new(self).handle_key(key),
                AppView::LessonDetail => LessonManager::new(self).handle_key(key),
                AppView::Certificates => CertificatesManager::new(self).handle_key(key),
            },
        }
    }

    /// Navigation shell tab switch between the catalog and certificates.
    fn toggle_shell_tab(&mut self) {
        match self.view {
            AppView::Certificates => CatalogManager::show_catalog(self),
            _ => CertificatesManager::show_certificates(self),
        }
    }

    /// Fall back to the catalog when a screen's subject cannot be resolved.
    pub(crate) fn return_to_catalog(&mut self) {
        CatalogManager::show_catalog(self);
    }

    /// Set running to false to quit the application.
    fn quit(&mut self) {
        self.running = false;
    }

    /// Append a message to an optional error slot.
    pub(crate) fn push_error(slot: &mut Option<String>, message: String) {
        if let Some(existing) = slot {
            existing.push_str(" | ");
            existing.push_str(&message);
        } else {
            *slot = Some(message);
        }
    }
}

#[cfg(test)]
impl App {
    /// Bare application state for view-manager tests; no store client and no
    /// terminal are involved.
    pub(crate) fn for_tests() -> Self {
        let (task_sender, task_receiver) = mpsc::channel();
        Self {
            running: false,
            view: AppView::SignIn,
            session: SessionPhase::SignedIn(AuthSession {
                user_id: "user-1".to_string(),
                email: "learner@example.test".to_string(),
                access_token: "token".to_string(),
            }),
            sign_in_form: SignInForm::new(),
            store: None,
            catalog: ScreenState::Loading,
            catalog_index: 0,
            enrolled_course_ids: BTreeSet::new(),
            enroll_mutation: MutationState::Idle,
            enroll_pending_course: None,
            course_detail: ScreenState::Loading,
            active_course_id: None,
            lesson_index: 0,
            lesson_detail: ScreenState::Loading,
            active_lesson_id: None,
            completion_mutation: MutationState::Idle,
            certificates: ScreenState::Loading,
            certificate_index: 0,
            error: None,
            status: None,
            loading_frame: 0,
            task_sender,
            task_receiver,
        }
    }
}
