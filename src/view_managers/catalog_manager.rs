use super::course_manager::CourseManager;
use crate::{
    App, AppView, StoreTaskMessage,
    log_util::log_debug,
    model::CourseSummary,
    screen::{MutationState, ScreenState, rows_state},
};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use std::collections::BTreeSet;

/// Course catalog: course list with enrollment counts plus the enroll action.
pub(crate) struct CatalogManager<'a> {
    app: &'a mut App,
}

impl<'a> CatalogManager<'a> {
    pub(crate) fn new(app: &'a mut App) -> Self {
        Self { app }
    }

    /// Enter the catalog view and issue its two reads: the course list with
    /// enrollment counts, and the viewer's enrolled course ids.
    pub(crate) fn show_catalog(app: &mut App) {
        app.view = AppView::Catalog;
        app.catalog = ScreenState::Loading;
        app.catalog_index = 0;
        let Some((store, session)) = app.store_and_session() else {
            app.catalog = ScreenState::Failed("No signed-in session.".to_string());
            return;
        };

        app.run_store_task(async move {
            let (courses, enrolled) = tokio::join!(
                store.fetch_course_summaries(&session),
                store.fetch_enrolled_course_ids(&session),
            );
            let courses = match courses {
                Ok(courses) => courses,
                Err(err) => return StoreTaskMessage::CatalogFailed(err.to_string()),
            };
            // A failed enrollment read degrades to "enrolled in nothing"
            // rather than failing the whole screen.
            let enrolled_course_ids = enrolled.unwrap_or_else(|err| {
                log_debug(&format!(
                    "CatalogManager: enrollment read failed, assuming none: {}",
                    err
                ));
                Vec::new()
            });
            StoreTaskMessage::CatalogLoaded {
                courses,
                enrolled_course_ids,
            }
        });
        log_debug("CatalogManager: catalog fetch dispatched");
    }

    pub(crate) fn handle_key(&mut self, key: KeyEvent) {
        match (key.modifiers, key.code) {
            (KeyModifiers::NONE, KeyCode::Down | KeyCode::Char('j')) => self.select_next(),
            (KeyModifiers::NONE, KeyCode::Up | KeyCode::Char('k')) => self.select_previous(),
            (KeyModifiers::NONE, KeyCode::Enter) => self.activate_selected(),
            (KeyModifiers::NONE, KeyCode::Char('r')) => Self::show_catalog(self.app),
            _ => {}
        }
    }

    fn course_count(&self) -> usize {
        self.app
            .catalog
            .loaded()
            .map(|courses| courses.len())
            .unwrap_or(0)
    }

    fn select_next(&mut self) {
        let count = self.course_count();
        if count == 0 {
            return;
        }
        self.app.catalog_index = (self.app.catalog_index + 1) % count;
    }

    fn select_previous(&mut self) {
        let count = self.course_count();
        if count == 0 {
            return;
        }
        if self.app.catalog_index == 0 {
            self.app.catalog_index = count - 1;
        } else {
            self.app.catalog_index -= 1;
        }
    }

    /// Open the selected course when enrolled, otherwise enroll in it.
    fn activate_selected(&mut self) {
        let Some(course_id) = self
            .app
            .catalog
            .loaded()
            .and_then(|courses| courses.get(self.app.catalog_index))
            .map(|summary| summary.course.id.clone())
        else {
            return;
        };

        if self.app.enrolled_course_ids.contains(&course_id) {
            CourseManager::show_course(self.app, course_id);
        } else {
            self.enroll(course_id);
        }
    }

    /// Write one enrollment row. Local state advances only once the store
    /// confirms the write.
    fn enroll(&mut self, course_id: String) {
        if self.app.enroll_mutation.is_pending() {
            log_debug("CatalogManager: enroll already pending; ignoring duplicate request");
            return;
        }
        let Some((store, session)) = self.app.store_and_session() else {
            return;
        };

        self.app.enroll_mutation = MutationState::Pending;
        self.app.enroll_pending_course = Some(course_id.clone());
        self.app.status = Some("Enrolling…".to_string());
        log_debug(&format!("CatalogManager: enroll dispatched for {}", course_id));

        self.app.run_store_task(async move {
            match store.enroll(&session, &course_id).await {
                Ok(()) => StoreTaskMessage::EnrollCommitted { course_id },
                Err(err) => StoreTaskMessage::EnrollFailed {
                    course_id,
                    reason: err.to_string(),
                },
            }
        });
    }

    pub(crate) fn apply_loaded(
        app: &mut App,
        courses: Vec<CourseSummary>,
        enrolled_course_ids: Vec<String>,
    ) {
        if app.view != AppView::Catalog {
            log_debug("CatalogManager: dropping catalog result for an inactive screen");
            return;
        }
        app.enrolled_course_ids = enrolled_course_ids.into_iter().collect::<BTreeSet<_>>();
        app.catalog = rows_state(courses);
        let count = app.catalog.loaded().map(|c| c.len()).unwrap_or(0);
        app.catalog_index = app.catalog_index.min(count.saturating_sub(1));
        log_debug(&format!("CatalogManager: catalog loaded with {} course(s)", count));
    }

    pub(crate) fn apply_failed(app: &mut App, reason: String) {
        if app.view != AppView::Catalog {
            log_debug("CatalogManager: dropping catalog failure for an inactive screen");
            return;
        }
        log_debug(&format!("CatalogManager: catalog fetch failed: {}", reason));
        app.catalog = ScreenState::Failed(reason);
    }

    /// The store confirmed the enrollment; now the enrolled-set advances. The
    /// set makes repeated confirmations idempotent.
    pub(crate) fn apply_enroll_committed(app: &mut App, course_id: String) {
        app.enrolled_course_ids.insert(course_id.clone());
        if app.enroll_pending_course.as_deref() == Some(course_id.as_str()) {
            app.enroll_pending_course = None;
        }
        app.enroll_mutation = MutationState::Committed;
        app.status = Some("Enrolled. Press Enter to start learning.".to_string());
        log_debug(&format!("CatalogManager: enrollment committed for {}", course_id));
    }

    pub(crate) fn apply_enroll_failed(app: &mut App, course_id: String, reason: String) {
        log_debug(&format!(
            "CatalogManager: enrollment failed for {}: {}",
            course_id, reason
        ));
        if app.enroll_pending_course.as_deref() == Some(course_id.as_str()) {
            app.enroll_pending_course = None;
        }
        app.enroll_mutation = MutationState::Failed(reason);
        app.status = Some("Enrollment failed. See the status panel.".to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Course;

    fn summary(id: &str) -> CourseSummary {
        CourseSummary {
            course: Course {
                id: id.to_string(),
                title: format!("Course {id}"),
                ..Course::default()
            },
            enrollments: Vec::new(),
        }
    }

    #[test]
    fn repeated_enroll_confirmations_keep_one_entry() {
        let mut app = App::for_tests();
        app.view = AppView::Catalog;

        CatalogManager::apply_enroll_committed(&mut app, "c1".to_string());
        CatalogManager::apply_enroll_committed(&mut app, "c1".to_string());

        assert_eq!(app.enrolled_course_ids.len(), 1);
        assert_eq!(app.enroll_mutation, MutationState::Committed);
    }

    #[test]
    fn enroll_failure_leaves_enrolled_set_untouched() {
        let mut app = App::for_tests();
        app.view = AppView::Catalog;
        app.enroll_mutation = MutationState::Pending;
        app.enroll_pending_course = Some("c2".to_string());

        CatalogManager::apply_enroll_failed(&mut app, "c2".to_string(), "conflict".to_string());

        assert!(app.enrolled_course_ids.is_empty());
        assert_eq!(
            app.enroll_mutation,
            MutationState::Failed("conflict".to_string())
        );
        assert!(app.enroll_pending_course.is_none());
    }

    #[test]
    fn loaded_catalog_collapses_zero_courses_into_empty() {
        let mut app = App::for_tests();
        app.view = AppView::Catalog;

        CatalogManager::apply_loaded(&mut app, Vec::new(), Vec::new());

        assert_eq!(app.catalog, ScreenState::Empty);
    }

    #[test]
    fn catalog_result_for_another_screen_is_dropped() {
        let mut app = App::for_tests();
        app.view = AppView::Certificates;

        CatalogManager::apply_loaded(&mut app, vec![summary("c1")], vec!["c1".to_string()]);

        assert!(app.catalog.is_loading());
        assert!(app.enrolled_course_ids.is_empty());
    }

    #[test]
    fn selection_wraps_over_loaded_courses() {
        let mut app = App::for_tests();
        app.view = AppView::Catalog;
        CatalogManager::apply_loaded(&mut app, vec![summary("a"), summary("b")], Vec::new());

        CatalogManager::new(&mut app).select_next();
        assert_eq!(app.catalog_index, 1);
        CatalogManager::new(&mut app).select_next();
        assert_eq!(app.catalog_index, 0);
        CatalogManager::new(&mut app).select_previous();
        assert_eq!(app.catalog_index, 1);
    }
}
