use serde::{Deserialize, Serialize};

/// Course record as returned by the store's `courses` table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Course {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
}

/// Course row joined with its enrollment count aggregate.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CourseSummary {
    #[serde(flatten)]
    pub course: Course,
    #[serde(default)]
    pub enrollments: Vec<EnrollmentCount>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct EnrollmentCount {
    #[serde(default)]
    pub count: u64,
}

impl CourseSummary {
    /// Enrollment total, defaulting to zero when the count join is missing.
    pub fn enrolled_count(&self) -> u64 {
        self.enrollments.first().map(|c| c.count).unwrap_or(0)
    }
}

/// Lesson record, optionally joined with the viewer's progress rows.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Lesson {
    pub id: String,
    #[serde(default)]
    pub course_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub video_url: Option<String>,
    #[serde(default)]
    pub order_index: i64,
    #[serde(default)]
    pub progress_tracks: Vec<ProgressTrack>,
}

impl Lesson {
    /// A lesson counts as completed only when a joined progress row says so.
    /// No progress row at all means "in progress", never "completed".
    pub fn is_completed(&self) -> bool {
        self.progress_tracks
            .first()
            .map(|track| track.completed)
            .unwrap_or(false)
    }

    /// The viewer's progress row, if one exists. The backend is assumed to
    /// keep at most one row per (user, lesson) pair; extras are ignored.
    pub fn progress_track(&self) -> Option<&ProgressTrack> {
        self.progress_tracks.first()
    }

    /// Display label matching the store's zero-based ordering index.
    pub fn display_label(&self) -> String {
        format!("Lesson {}: {}", self.order_index + 1, self.title)
    }
}

/// Progress row linking the viewer to one lesson.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgressTrack {
    pub id: String,
    #[serde(default)]
    pub completed: bool,
}

/// Row shape for `enrollments?select=course_id`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EnrollmentCourseId {
    pub course_id: String,
}

/// Enrollment joined with its course and that course's lesson id list, as
/// fetched by the certificates screen.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EnrollmentCourse {
    pub course: CertificateCourse,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CertificateCourse {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub lessons: Vec<LessonId>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct LessonId {
    pub id: String,
}

/// A certificate is derived at view time, never stored: the course qualifies
/// once every one of its lessons has a completed progress row.
#[derive(Debug, Clone, PartialEq)]
pub struct EarnedCertificate {
    pub course_id: String,
    pub course_title: String,
    pub lesson_count: usize,
}

pub fn derive_certificate(
    course: &CertificateCourse,
    completed_lessons: u64,
) -> Option<EarnedCertificate> {
    let total = course.lessons.len();
    if total == 0 || completed_lessons != total as u64 {
        return None;
    }
    Some(EarnedCertificate {
        course_id: course.id.clone(),
        course_title: course.title.clone(),
        lesson_count: total,
    })
}

/// Locate the previous and next lessons by array position around `lesson_id`
/// within a sibling list already ordered by `order_index`.
pub fn neighbor_lessons<'a>(
    siblings: &'a [Lesson],
    lesson_id: &str,
) -> (Option<&'a Lesson>, Option<&'a Lesson>) {
    let Some(position) = siblings.iter().position(|lesson| lesson.id == lesson_id) else {
        return (None, None);
    };
    let previous = position.checked_sub(1).and_then(|i| siblings.get(i));
    let next = siblings.get(position + 1);
    (previous, next)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lesson(id: &str, order_index: i64) -> Lesson {
        Lesson {
            id: id.to_string(),
            order_index,
            ..Lesson::default()
        }
    }

    fn lesson_with_progress(id: &str, completed: bool) -> Lesson {
        Lesson {
            id: id.to_string(),
            progress_tracks: vec![ProgressTrack {
                id: format!("pt-{id}"),
                completed,
            }],
            ..Lesson::default()
        }
    }

    #[test]
    fn lesson_without_progress_row_is_in_progress() {
        let lesson = lesson("l1", 0);
        assert!(!lesson.is_completed());
        assert!(lesson.progress_track().is_none());
    }

    #[test]
    fn lesson_with_incomplete_progress_row_is_in_progress() {
        let lesson = lesson_with_progress("l1", false);
        assert!(!lesson.is_completed());
        assert!(lesson.progress_track().is_some());
    }

    #[test]
    fn lesson_with_completed_progress_row_is_completed() {
        assert!(lesson_with_progress("l1", true).is_completed());
    }

    #[test]
    fn neighbors_follow_array_position() {
        let siblings = vec![lesson("a", 0), lesson("b", 1), lesson("c", 2)];

        let (prev, next) = neighbor_lessons(&siblings, "a");
        assert!(prev.is_none());
        assert_eq!(next.map(|l| l.id.as_str()), Some("b"));

        let (prev, next) = neighbor_lessons(&siblings, "b");
        assert_eq!(prev.map(|l| l.id.as_str()), Some("a"));
        assert_eq!(next.map(|l| l.id.as_str()), Some("c"));

        let (prev, next) = neighbor_lessons(&siblings, "c");
        assert_eq!(prev.map(|l| l.id.as_str()), Some("b"));
        assert!(next.is_none());
    }

    #[test]
    fn neighbors_of_unknown_lesson_are_absent() {
        let siblings = vec![lesson("a", 0)];
        let (prev, next) = neighbor_lessons(&siblings, "missing");
        assert!(prev.is_none());
        assert!(next.is_none());
    }

    #[test]
    fn zero_lesson_course_never_certifies() {
        let course = CertificateCourse {
            id: "c1".to_string(),
            title: "Empty".to_string(),
            lessons: Vec::new(),
        };
        assert!(derive_certificate(&course, 0).is_none());
    }

    #[test]
    fn partially_completed_course_does_not_certify() {
        let course = CertificateCourse {
            id: "c1".to_string(),
            title: "Rust Basics".to_string(),
            lessons: vec![
                LessonId { id: "l1".into() },
                LessonId { id: "l2".into() },
                LessonId { id: "l3".into() },
            ],
        };
        assert!(derive_certificate(&course, 2).is_none());
    }

    #[test]
    fn fully_completed_course_certifies() {
        let course = CertificateCourse {
            id: "c1".to_string(),
            title: "Rust Basics".to_string(),
            lessons: vec![LessonId { id: "l1".into() }, LessonId { id: "l2".into() }],
        };
        let cert = derive_certificate(&course, 2).expect("course should certify");
        assert_eq!(cert.course_id, "c1");
        assert_eq!(cert.lesson_count, 2);
    }

    #[test]
    fn enrollment_count_defaults_to_zero_without_join() {
        let summary = CourseSummary::default();
        assert_eq!(summary.enrolled_count(), 0);
    }

    #[test]
    fn display_label_uses_one_based_ordering() {
        let mut l = lesson("l1", 2);
        l.title = "Ownership".to_string();
        assert_eq!(l.display_label(), "Lesson 3: Ownership");
    }
}
