use super::lesson_manager::LessonManager;
use crate::{
    App, AppView, CourseDetailData, StoreTaskMessage, log_util::log_debug, screen::ScreenState,
};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

/// Course detail: the course record plus its lessons joined with the viewer's
/// progress flags.
pub(crate) struct CourseManager<'a> {
    app: &'a mut App,
}

impl<'a> CourseManager<'a> {
    pub(crate) fn new(app: &'a mut App) -> Self {
        Self { app }
    }

    /// Enter the course detail view and issue its two reads concurrently: the
    /// course record and the joined lesson list, ordered by the store on
    /// `order_index`.
    pub(crate) fn show_course(app: &mut App, course_id: String) {
        app.view = AppView::CourseDetail;
        app.active_course_id = Some(course_id.clone());
        app.course_detail = ScreenState::Loading;
        app.lesson_index = 0;
        let Some((store, session)) = app.store_and_session() else {
            app.course_detail = ScreenState::Failed("No signed-in session.".to_string());
            return;
        };

        app.run_store_task(async move {
            let (course, lessons) = tokio::join!(
                store.fetch_course(&session, &course_id),
                store.fetch_course_lessons(&session, &course_id),
            );
            match (course, lessons) {
                (Ok(course), Ok(lessons)) => StoreTaskMessage::CourseLoaded {
                    course_id,
                    data: CourseDetailData { course, lessons },
                },
                (Err(err), _) | (_, Err(err)) => StoreTaskMessage::CourseFailed {
                    course_id,
                    reason: err.to_string(),
                },
            }
        });
        log_debug("CourseManager: course detail fetch dispatched");
    }

    pub(crate) fn handle_key(&mut self, key: KeyEvent) {
        match (key.modifiers, key.code) {
            (KeyModifiers::NONE, KeyCode::Down | KeyCode::Char('j')) => self.select_next(),
            (KeyModifiers::NONE, KeyCode::Up | KeyCode::Char('k')) => self.select_previous(),
            (KeyModifiers::NONE, KeyCode::Enter) => self.open_selected_lesson(),
            (KeyModifiers::NONE, KeyCode::Char('b')) => self.app.return_to_catalog(),
            (KeyModifiers::NONE, KeyCode::Char('r')) => self.reload(),
            _ => {}
        }
    }

    fn reload(&mut self) {
        if let Some(course_id) = self.app.active_course_id.clone() {
            Self::show_course(self.app, course_id);
        } else {
            self.app.return_to_catalog();
        }
    }

    fn lesson_count(&self) -> usize {
        self.app
            .course_detail
            .loaded()
            .map(|data| data.lessons.len())
            .unwrap_or(0)
    }

    fn select_next(&mut self) {
        let count = self.lesson_count();
        if count == 0 {
            return;
        }
        self.app.lesson_index = (self.app.lesson_index + 1) % count;
    }

    fn select_previous(&mut self) {
        let count = self.lesson_count();
        if count == 0 {
            return;
        }
        if self.app.lesson_index == 0 {
            self.app.lesson_index = count - 1;
        } else {
            self.app.lesson_index -= 1;
        }
    }

    fn open_selected_lesson(&mut self) {
        let Some(lesson_id) = self
            .app
            .course_detail
            .loaded()
            .and_then(|data| data.lessons.get(self.app.lesson_index))
            .map(|lesson| lesson.id.clone())
        else {
            return;
        };
        LessonManager::show_lesson(self.app, lesson_id);
    }

    pub(crate) fn apply_loaded(app: &mut App, course_id: String, data: CourseDetailData) {
        if app.view != AppView::CourseDetail
            || app.active_course_id.as_deref() != Some(course_id.as_str())
        {
            log_debug("CourseManager: dropping course result for an inactive screen");
            return;
        }
        let lesson_count = data.lessons.len();
        app.lesson_index = app.lesson_index.min(lesson_count.saturating_sub(1));
        app.course_detail = ScreenState::Loaded(data);
        log_debug(&format!(
            "CourseManager: course {} loaded with {} lesson(s)",
            course_id, lesson_count
        ));
    }

    pub(crate) fn apply_failed(app: &mut App, course_id: String, reason: String) {
        if app.view != AppView::CourseDetail
            || app.active_course_id.as_deref() != Some(course_id.as_str())
        {
            log_debug("CourseManager: dropping course failure for an inactive screen");
            return;
        }
        log_debug(&format!(
            "CourseManager: course {} fetch failed: {}",
            course_id, reason
        ));
        app.course_detail = ScreenState::Failed(reason);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Course, Lesson, ProgressTrack};

    fn lesson(id: &str, order_index: i64, completed: Option<bool>) -> Lesson {
        Lesson {
            id: id.to_string(),
            order_index,
            title: format!("Lesson {id}"),
            progress_tracks: completed
                .map(|completed| {
                    vec![ProgressTrack {
                        id: format!("pt-{id}"),
                        completed,
                    }]
                })
                .unwrap_or_default(),
            ..Lesson::default()
        }
    }

    fn detail(lessons: Vec<Lesson>) -> CourseDetailData {
        CourseDetailData {
            course: Course {
                id: "c1".to_string(),
                title: "Rust Basics".to_string(),
                ..Course::default()
            },
            lessons,
        }
    }

    #[test]
    fn loaded_course_applies_only_to_the_matching_screen() {
        let mut app = App::for_tests();
        app.view = AppView::CourseDetail;
        app.active_course_id = Some("other".to_string());

        CourseManager::apply_loaded(&mut app, "c1".to_string(), detail(Vec::new()));

        assert!(app.course_detail.is_loading());
    }

    #[test]
    fn completion_badges_follow_progress_rows() {
        let mut app = App::for_tests();
        app.view = AppView::CourseDetail;
        app.active_course_id = Some("c1".to_string());
        let lessons = vec![
            lesson("l1", 0, Some(true)),
            lesson("l2", 1, Some(true)),
            lesson("l3", 2, None),
        ];

        CourseManager::apply_loaded(&mut app, "c1".to_string(), detail(lessons));

        let data = app.course_detail.loaded().expect("course should be loaded");
        assert!(data.lessons[0].is_completed());
        assert!(data.lessons[1].is_completed());
        assert!(!data.lessons[2].is_completed());
    }

    #[test]
    fn selection_is_clamped_to_the_loaded_lesson_list() {
        let mut app = App::for_tests();
        app.view = AppView::CourseDetail;
        app.active_course_id = Some("c1".to_string());
        app.lesson_index = 10;

        CourseManager::apply_loaded(
            &mut app,
            "c1".to_string(),
            detail(vec![lesson("l1", 0, None), lesson("l2", 1, None)]),
        );

        assert_eq!(app.lesson_index, 1);
    }
}
