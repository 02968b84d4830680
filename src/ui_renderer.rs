use crate::{
    App, AppView, LOADING_FRAMES,
    model::neighbor_lessons,
    screen::{MutationState, ScreenState},
    session::SignInField,
};
use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Modifier, Style, Stylize},
    text::Line,
    widgets::{Block, List, ListItem, ListState, Paragraph, Wrap},
};

pub(crate) struct UiRenderer<'a> {
    app: &'a mut App,
}

impl<'a> UiRenderer<'a> {
    pub(crate) fn new(app: &'a mut App) -> Self {
        Self { app }
    }

    pub(crate) fn render(&mut self, frame: &mut Frame) {
        match self.app.view {
            AppView::SignIn => self.render_sign_in(frame),
            AppView::Catalog => self.render_catalog(frame),
            AppView::CourseDetail => self.render_course_detail(frame),
            AppView::LessonDetail => self.render_lesson_detail(frame),
            AppView::Certificates => self.render_certificates(frame),
        }
    }

    fn shell_layout(&self, frame: &mut Frame) -> std::rc::Rc<[Rect]> {
        Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Min(6),
                Constraint::Length(4),
            ])
            .split(frame.area())
    }

    fn header_title(&self, screen_name: &str) -> Line<'static> {
        let viewer = self
            .app
            .session
            .session()
            .map(|session| session.email.clone())
            .unwrap_or_else(|| "signed out".to_string());
        Line::from(format!("coursedeck • {} • {}", screen_name, viewer))
            .bold()
            .blue()
            .centered()
    }

    fn render_header(&self, frame: &mut Frame, area: Rect, screen_name: &str) {
        let tabs = match self.app.view {
            AppView::Certificates => "Courses | [Certificates]",
            AppView::SignIn => "Sign In",
            _ => "[Courses] | Certificates",
        };
        frame.render_widget(
            Paragraph::new(tabs)
                .block(Block::bordered().title(self.header_title(screen_name)))
                .centered(),
            area,
        );
    }

    fn render_status(&self, frame: &mut Frame, area: Rect, hints: &[&str]) {
        let mut status_lines = Vec::new();
        if let Some(error) = &self.app.error {
            status_lines.push(format!("Error: {}", error));
        }
        if let Some(status) = &self.app.status {
            status_lines.push(status.clone());
        }
        for hint in hints {
            status_lines.push((*hint).to_string());
        }
        frame.render_widget(
            Paragraph::new(status_lines.join("\n"))
                .wrap(Wrap { trim: false })
                .block(Block::bordered().title(Line::from("Status"))),
            area,
        );
    }

    fn spinner(&self) -> &'static str {
        LOADING_FRAMES[self.app.loading_frame % LOADING_FRAMES.len()]
    }

    fn render_sign_in(&mut self, frame: &mut Frame) {
        let layout = self.shell_layout(frame);
        self.render_header(frame, layout[0], "Sign In");

        let app = &*self.app;
        let body_text = if app.session.is_resolving() {
            format!("{} Resolving session…", self.spinner())
        } else {
            let email_marker = if app.sign_in_form.active_field() == SignInField::Email {
                "▶"
            } else {
                " "
            };
            let password_marker = if app.sign_in_form.active_field() == SignInField::Password {
                "▶"
            } else {
                " "
            };
            let mut lines = vec![
                format!("{} Email:    {}", email_marker, app.sign_in_form.email),
                format!(
                    "{} Password: {}",
                    password_marker,
                    app.sign_in_form.masked_password()
                ),
            ];
            if let Some(status) = &app.sign_in_form.status {
                lines.push(String::new());
                lines.push(status.clone());
            }
            lines.join("\n")
        };

        frame.render_widget(
            Paragraph::new(body_text)
                .wrap(Wrap { trim: false })
                .block(Block::bordered().title(Line::from("Sign in to continue"))),
            layout[1],
        );

        self.render_status(
            frame,
            layout[2],
            &[
                "Type to edit. Tab switches fields. Enter signs in.",
                "Esc or Ctrl-C to quit.",
            ],
        );
    }

    fn render_catalog(&mut self, frame: &mut Frame) {
        let layout = self.shell_layout(frame);
        self.render_header(frame, layout[0], "Course Catalog");

        let app = &*self.app;
        match &app.catalog {
            ScreenState::Loading => self.render_loading(frame, layout[1], "Loading courses…"),
            ScreenState::Empty => {
                frame.render_widget(
                    Paragraph::new("No courses are available yet.")
                        .block(Block::bordered().title(Line::from("Courses"))),
                    layout[1],
                );
            }
            ScreenState::Failed(reason) => self.render_failure(frame, layout[1], "Courses", reason),
            ScreenState::Loaded(courses) => {
                let body = Layout::default()
                    .direction(Direction::Horizontal)
                    .constraints([Constraint::Percentage(45), Constraint::Percentage(55)])
                    .split(layout[1]);

                let items: Vec<ListItem> = courses
                    .iter()
                    .map(|summary| {
                        let enrolled = app.enrolled_course_ids.contains(&summary.course.id);
                        let badge = if enrolled { "[enrolled]" } else { "          " };
                        ListItem::new(format!(
                            "{} {:<32} {} enrolled",
                            badge,
                            summary.course.title,
                            summary.enrolled_count()
                        ))
                    })
                    .collect();

                let mut list_state = ListState::default();
                list_state.select(Some(app.catalog_index.min(courses.len() - 1)));
                frame.render_stateful_widget(
                    List::new(items)
                        .block(Block::bordered().title(Line::from("Courses")))
                        .highlight_symbol("▶ ")
                        .highlight_style(Style::default().add_modifier(Modifier::REVERSED)),
                    body[0],
                    &mut list_state,
                );

                let detail_text = courses
                    .get(app.catalog_index)
                    .map(|summary| {
                        let enrolled = app.enrolled_course_ids.contains(&summary.course.id);
                        let action = if enrolled {
                            "Enter: continue learning"
                        } else if app.enroll_mutation.is_pending() {
                            "Enrollment pending…"
                        } else {
                            "Enter: enroll now"
                        };
                        let thumbnail = summary
                            .course
                            .thumbnail_url
                            .as_deref()
                            .unwrap_or("<no thumbnail>");
                        format!(
                            "{}\n\n{}\n\nThumbnail: {}\nEnrolled: {}\n\n{}",
                            summary.course.title,
                            summary.course.description,
                            thumbnail,
                            summary.enrolled_count(),
                            action
                        )
                    })
                    .unwrap_or_else(|| "Select a course to view its details.".to_string());

                frame.render_widget(
                    Paragraph::new(detail_text)
                        .wrap(Wrap { trim: false })
                        .block(Block::bordered().title(Line::from("Details"))),
                    body[1],
                );
            }
        }

        self.render_status(
            frame,
            layout[2],
            &[
                "↑/↓ or j/k to choose. Enter to enroll or open. r to refresh.",
                "Tab or 2 for certificates. s to sign out. q to quit.",
            ],
        );
    }

    fn render_course_detail(&mut self, frame: &mut Frame) {
        let layout = self.shell_layout(frame);
        self.render_header(frame, layout[0], "Course");

        let app = &*self.app;
        match &app.course_detail {
            ScreenState::Loading => self.render_loading(frame, layout[1], "Loading course…"),
            ScreenState::Empty => {
                frame.render_widget(
                    Paragraph::new("Course not found.")
                        .block(Block::bordered().title(Line::from("Course"))),
                    layout[1],
                );
            }
            ScreenState::Failed(reason) => self.render_failure(frame, layout[1], "Course", reason),
            ScreenState::Loaded(data) => {
                let sections = Layout::default()
                    .direction(Direction::Vertical)
                    .constraints([Constraint::Length(4), Constraint::Min(4)])
                    .split(layout[1]);

                frame.render_widget(
                    Paragraph::new(data.course.description.clone())
                        .wrap(Wrap { trim: false })
                        .block(Block::bordered().title(Line::from(data.course.title.clone()))),
                    sections[0],
                );

                if data.lessons.is_empty() {
                    frame.render_widget(
                        Paragraph::new("This course has no lessons yet.")
                            .block(Block::bordered().title(Line::from("Lessons"))),
                        sections[1],
                    );
                } else {
                    let items: Vec<ListItem> = data
                        .lessons
                        .iter()
                        .map(|lesson| {
                            let badge = if lesson.is_completed() {
                                "Completed  "
                            } else {
                                "In Progress"
                            };
                            ListItem::new(format!("[{}] {}", badge, lesson.display_label()))
                        })
                        .collect();
                    let mut list_state = ListState::default();
                    list_state.select(Some(app.lesson_index.min(data.lessons.len() - 1)));
                    frame.render_stateful_widget(
                        List::new(items)
                            .block(Block::bordered().title(Line::from("Lessons")))
                            .highlight_symbol("▶ ")
                            .highlight_style(Style::default().add_modifier(Modifier::REVERSED)),
                        sections[1],
                        &mut list_state,
                    );
                }
            }
        }

        self.render_status(
            frame,
            layout[2],
            &[
                "↑/↓ or j/k to choose a lesson. Enter to open it.",
                "b back to the catalog. r to refresh. q to quit.",
            ],
        );
    }

    fn render_lesson_detail(&mut self, frame: &mut Frame) {
        let layout = self.shell_layout(frame);
        self.render_header(frame, layout[0], "Lesson");

        let app = &*self.app;
        match &app.lesson_detail {
            ScreenState::Loading => self.render_loading(frame, layout[1], "Loading lesson…"),
            ScreenState::Empty => {
                frame.render_widget(
                    Paragraph::new("Lesson not found.")
                        .block(Block::bordered().title(Line::from("Lesson"))),
                    layout[1],
                );
            }
            ScreenState::Failed(reason) => self.render_failure(frame, layout[1], "Lesson", reason),
            ScreenState::Loaded(data) => {
                let (previous, next) = neighbor_lessons(&data.siblings, &data.lesson.id);
                let video_line = match data.lesson.video_url.as_deref() {
                    Some(url) => format!("Video: {} (press v to play)", url),
                    None => "Video: <none>".to_string(),
                };
                let completion_line = if data.lesson.is_completed() {
                    "✓ Completed".to_string()
                } else {
                    match &app.completion_mutation {
                        MutationState::Pending => "Saving progress…".to_string(),
                        MutationState::Failed(reason) => {
                            format!("Progress not saved: {}", reason)
                        }
                        _ => "Mark as complete with c or Enter.".to_string(),
                    }
                };
                let nav_line = format!(
                    "Previous: {}   Next: {}",
                    previous
                        .map(|lesson| lesson.display_label())
                        .unwrap_or_else(|| "<none>".to_string()),
                    next.map(|lesson| lesson.display_label())
                        .unwrap_or_else(|| "<none>".to_string()),
                );

                let body = format!(
                    "{}\n\n{}\n\n{}\n\n{}\n{}",
                    data.lesson.display_label(),
                    video_line,
                    data.lesson.content,
                    completion_line,
                    nav_line
                );
                frame.render_widget(
                    Paragraph::new(body)
                        .wrap(Wrap { trim: false })
                        .block(Block::bordered().title(Line::from(data.lesson.title.clone()))),
                    layout[1],
                );
            }
        }

        self.render_status(
            frame,
            layout[2],
            &[
                "←/→ or p/n for previous/next lesson. c or Enter marks complete.",
                "v plays the video. r reloads. b back to the course. q to quit.",
            ],
        );
    }

    fn render_certificates(&mut self, frame: &mut Frame) {
        let layout = self.shell_layout(frame);
        self.render_header(frame, layout[0], "Certificates");

        let app = &*self.app;
        match &app.certificates {
            ScreenState::Loading => {
                self.render_loading(frame, layout[1], "Deriving certificates…")
            }
            ScreenState::Empty => {
                frame.render_widget(
                    Paragraph::new(
                        "No certificates yet.\nComplete a course to earn your first certificate!",
                    )
                    .centered()
                    .block(Block::bordered().title(Line::from("Your Certificates"))),
                    layout[1],
                );
            }
            ScreenState::Failed(reason) => {
                self.render_failure(frame, layout[1], "Your Certificates", reason)
            }
            ScreenState::Loaded(certificates) => {
                let items: Vec<ListItem> = certificates
                    .iter()
                    .map(|certificate| {
                        ListItem::new(format!(
                            "🏆 {:<32} Completed all {} lessons",
                            certificate.course_title, certificate.lesson_count
                        ))
                    })
                    .collect();
                let mut list_state = ListState::default();
                list_state.select(Some(app.certificate_index.min(certificates.len() - 1)));
                frame.render_stateful_widget(
                    List::new(items)
                        .block(Block::bordered().title(Line::from("Your Certificates")))
                        .highlight_symbol("▶ ")
                        .highlight_style(Style::default().add_modifier(Modifier::REVERSED)),
                    layout[1],
                    &mut list_state,
                );
            }
        }

        self.render_status(
            frame,
            layout[2],
            &[
                "↑/↓ or j/k to choose. d to download (placeholder). r to refresh.",
                "Tab or 1 for the catalog. s to sign out. q to quit.",
            ],
        );
    }

    fn render_loading(&self, frame: &mut Frame, area: Rect, message: &str) {
        frame.render_widget(
            Paragraph::new(format!("{} {}", self.spinner(), message))
                .centered()
                .block(Block::bordered()),
            area,
        );
    }

    fn render_failure(&self, frame: &mut Frame, area: Rect, title: &str, reason: &str) {
        frame.render_widget(
            Paragraph::new(format!("Something went wrong:\n{}\n\nPress r to retry.", reason))
                .wrap(Wrap { trim: false })
                .block(Block::bordered().title(Line::from(title.to_string()))),
            area,
        );
    }
}
