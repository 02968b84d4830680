pub mod auth_manager;
pub mod catalog_manager;
pub mod certificates_manager;
pub mod course_manager;
pub mod lesson_manager;

pub(crate) use auth_manager::AuthManager;
pub(crate) use catalog_manager::CatalogManager;
pub(crate) use certificates_manager::CertificatesManager;
pub(crate) use course_manager::CourseManager;
pub(crate) use lesson_manager::LessonManager;
