use crate::{
    App, AppView, StoreTaskMessage,
    log_util::log_debug,
    model::{CertificateCourse, EarnedCertificate, derive_certificate},
    screen::{ScreenState, rows_state},
};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use std::collections::BTreeSet;

/// Certificates: derives "fully completed" courses by comparing each course's
/// lesson count to the viewer's completed progress count.
pub(crate) struct CertificatesManager<'a> {
    app: &'a mut App,
}

impl<'a> CertificatesManager<'a> {
    pub(crate) fn new(app: &'a mut App) -> Self {
        Self { app }
    }

    /// Enter the certificates view: fetch enrollments joined with course and
    /// lesson ids, then one completed-count query per enrollment. A failed
    /// sub-count degrades to zero, undercounting rather than erroring.
    pub(crate) fn show_certificates(app: &mut App) {
        app.view = AppView::Certificates;
        app.certificates = ScreenState::Loading;
        app.certificate_index = 0;
        let Some((store, session)) = app.store_and_session() else {
            app.certificates = ScreenState::Failed("No signed-in session.".to_string());
            return;
        };

        app.run_store_task(async move {
            let enrollments = match store.fetch_enrollment_courses(&session).await {
                Ok(enrollments) => enrollments,
                Err(err) => return StoreTaskMessage::CertificatesFailed(err.to_string()),
            };

            let mut entries = Vec::with_capacity(enrollments.len());
            for enrollment in enrollments {
                let lesson_ids: Vec<String> = enrollment
                    .course
                    .lessons
                    .iter()
                    .map(|lesson| lesson.id.clone())
                    .collect();
                let completed = match store.count_completed(&session, &lesson_ids).await {
                    Ok(count) => count,
                    Err(err) => {
                        log_debug(&format!(
                            "CertificatesManager: completed count failed for course {}: {}",
                            enrollment.course.id, err
                        ));
                        0
                    }
                };
                entries.push((enrollment.course, completed));
            }

            StoreTaskMessage::CertificatesLoaded(derive_earned(entries))
        });
        log_debug("CertificatesManager: certificates fetch dispatched");
    }

    pub(crate) fn handle_key(&mut self, key: KeyEvent) {
        match (key.modifiers, key.code) {
            (KeyModifiers::NONE, KeyCode::Down | KeyCode::Char('j')) => self.select_next(),
            (KeyModifiers::NONE, KeyCode::Up | KeyCode::Char('k')) => self.select_previous(),
            (KeyModifiers::NONE, KeyCode::Char('d') | KeyCode::Enter) => self.download_selected(),
            (KeyModifiers::NONE, KeyCode::Char('b')) => self.app.return_to_catalog(),
            (KeyModifiers::NONE, KeyCode::Char('r')) => Self::show_certificates(self.app),
            _ => {}
        }
    }

    fn certificate_count(&self) -> usize {
        self.app
            .certificates
            .loaded()
            .map(|certificates| certificates.len())
            .unwrap_or(0)
    }

    fn select_next(&mut self) {
        let count = self.certificate_count();
        if count == 0 {
            return;
        }
        self.app.certificate_index = (self.app.certificate_index + 1) % count;
    }

    fn select_previous(&mut self) {
        let count = self.certificate_count();
        if count == 0 {
            return;
        }
        if self.app.certificate_index == 0 {
            self.app.certificate_index = count - 1;
        } else {
            self.app.certificate_index -= 1;
        }
    }

    /// Placeholder action; no document generation exists.
    fn download_selected(&mut self) {
        let Some(certificate) = self
            .app
            .certificates
            .loaded()
            .and_then(|certificates| certificates.get(self.app.certificate_index))
        else {
            return;
        };
        self.app.status = Some(format!(
            "A certificate for \"{}\" would be generated here.",
            certificate.course_title
        ));
    }

    pub(crate) fn apply_loaded(app: &mut App, certificates: Vec<EarnedCertificate>) {
        if app.view != AppView::Certificates {
            log_debug("CertificatesManager: dropping certificates result for an inactive screen");
            return;
        }
        let count = certificates.len();
        app.certificates = rows_state(certificates);
        app.certificate_index = app.certificate_index.min(count.saturating_sub(1));
        log_debug(&format!(
            "CertificatesManager: derived {} certificate(s)",
            count
        ));
    }

    pub(crate) fn apply_failed(app: &mut App, reason: String) {
        if app.view != AppView::Certificates {
            log_debug("CertificatesManager: dropping certificates failure for an inactive screen");
            return;
        }
        log_debug(&format!(
            "CertificatesManager: certificates fetch failed: {}",
            reason
        ));
        app.certificates = ScreenState::Failed(reason);
    }
}

/// Filter (course, completed count) pairs down to earned certificates. Each
/// course appears at most once even if enrollment rows are duplicated.
pub(crate) fn derive_earned(entries: Vec<(CertificateCourse, u64)>) -> Vec<EarnedCertificate> {
    let mut seen = BTreeSet::new();
    entries
        .into_iter()
        .filter(|(course, _)| seen.insert(course.id.clone()))
        .filter_map(|(course, completed)| derive_certificate(&course, completed))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::LessonId;

    fn course(id: &str, lesson_count: usize) -> CertificateCourse {
        CertificateCourse {
            id: id.to_string(),
            title: format!("Course {id}"),
            lessons: (0..lesson_count)
                .map(|i| LessonId {
                    id: format!("{id}-l{i}"),
                })
                .collect(),
        }
    }

    #[test]
    fn partially_completed_course_is_excluded() {
        let earned = derive_earned(vec![(course("c1", 3), 2)]);
        assert!(earned.is_empty());
    }

    #[test]
    fn fully_completed_course_appears_exactly_once() {
        let earned = derive_earned(vec![(course("c1", 3), 3)]);
        assert_eq!(earned.len(), 1);
        assert_eq!(earned[0].course_id, "c1");
        assert_eq!(earned[0].lesson_count, 3);
    }

    #[test]
    fn zero_lesson_course_never_appears() {
        let earned = derive_earned(vec![(course("empty", 0), 0)]);
        assert!(earned.is_empty());
    }

    #[test]
    fn duplicate_enrollment_rows_yield_one_certificate() {
        let earned = derive_earned(vec![(course("c1", 2), 2), (course("c1", 2), 2)]);
        assert_eq!(earned.len(), 1);
    }

    #[test]
    fn failed_sub_count_degraded_to_zero_excludes_the_course() {
        // The fetch task maps a failed count query to zero before derivation.
        let earned = derive_earned(vec![(course("c1", 3), 0), (course("c2", 2), 2)]);
        assert_eq!(earned.len(), 1);
        assert_eq!(earned[0].course_id, "c2");
    }

    #[test]
    fn stale_certificates_result_is_dropped() {
        let mut app = App::for_tests();
        app.view = AppView::Catalog;

        CertificatesManager::apply_loaded(
            &mut app,
            derive_earned(vec![(course("c1", 1), 1)]),
        );

        assert!(app.certificates.is_loading());
    }

    #[test]
    fn loaded_empty_derivation_collapses_into_empty() {
        let mut app = App::for_tests();
        app.view = AppView::Certificates;

        CertificatesManager::apply_loaded(&mut app, Vec::new());

        assert_eq!(app.certificates, ScreenState::Empty);
    }
}
