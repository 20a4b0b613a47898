//! Built-in sample dataset. The store starts from this so it is usable with
//! no persisted snapshot and no network.

use chrono::NaiveDate;
use std::collections::BTreeMap;

use crate::models::*;
use crate::paths;

/// Sample-content workarounds. These exist for demo data only and are kept
/// out of the store's general rules.
#[derive(Debug, Clone)]
pub struct DemoContent {
    /// Built-in courses whose authored modules must survive a stale snapshot.
    pub pinned_course_ids: Vec<String>,
    /// Retired sample titles never listed to learners.
    pub excluded_titles: Vec<String>,
}

impl Default for DemoContent {
    fn default() -> Self {
        DemoContent {
            pinned_course_ids: vec!["prog-basics".into(), "html-css-basics".into()],
            excluded_titles: vec![
                "Intro to Web Development (Legacy)".into(),
                "jQuery Crash Course".into(),
            ],
        }
    }
}

impl DemoContent {
    pub fn is_pinned(&self, id: &str) -> bool {
        self.pinned_course_ids.iter().any(|p| p == id)
    }

    pub fn is_excluded_title(&self, title: &str) -> bool {
        self.excluded_titles.iter().any(|t| t == title)
    }
}

pub fn initial_state() -> StoreState {
    let quiz_configs = initial_quizzes()
        .into_iter()
        .map(|q| (q.id.clone(), q))
        .collect::<BTreeMap<_, _>>();
    StoreState {
        courses: initial_courses(),
        assignments: initial_assignments(),
        quiz_configs,
    }
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap_or_default()
}

fn item(id: &str, title: &str, kind: ItemKind, minutes: u32) -> ModuleItem {
    ModuleItem {
        id: id.into(),
        title: title.into(),
        kind,
        content: None,
        video_url: None,
        duration_minutes: Some(minutes),
    }
}

fn module(id: &str, title: &str, items: Vec<ModuleItem>) -> Module {
    Module {
        id: id.into(),
        title: title.into(),
        description: None,
        items,
    }
}

fn course(
    id: &str,
    title: &str,
    description: &str,
    status: CourseStatus,
    role: &str,
    updated: NaiveDate,
    modules: Vec<Module>,
) -> Course {
    let roles = vec![role.to_string()];
    Course {
        id: id.into(),
        backend_id: None,
        title: title.into(),
        description: description.into(),
        video_url: None,
        status,
        path_slug: paths::infer_path_slug(&roles).to_string(),
        roles,
        modules,
        last_updated: updated,
        enrolled_count: 0,
        completion_rate: 0.0,
        instructor: Some("LMS Team".into()),
        skills: Vec::new(),
        phase: None,
        course_order: None,
        prerequisite_course_ids: Vec::new(),
    }
}

fn initial_courses() -> Vec<Course> {
    const FULLSTACK: &str = "Full Stack Web Development";

    let mut prog_basics = course(
        "prog-basics",
        "Programming Basics",
        "Variables, control flow and functions for first-time programmers.",
        CourseStatus::Draft,
        FULLSTACK,
        date(2025, 1, 10),
        vec![
            module(
                "prog-basics-m1",
                "Thinking in Steps",
                vec![
                    item("pb-1-1", "What is a program?", ItemKind::Video, 8),
                    item("pb-1-2", "Variables and types", ItemKind::Lesson, 15),
                    item("pb-1-3", "Check your understanding", ItemKind::Quiz, 10),
                ],
            ),
            module(
                "prog-basics-m2",
                "Control Flow",
                vec![
                    item("pb-2-1", "Conditionals", ItemKind::Lesson, 20),
                    item("pb-2-2", "Loops", ItemKind::Lesson, 20),
                    item("pb-2-3", "FizzBuzz exercise", ItemKind::Assignment, 30),
                ],
            ),
        ],
    );
    prog_basics.phase = Some("Foundations".into());
    prog_basics.course_order = Some(1);
    prog_basics.skills = vec!["Problem solving".into(), "JavaScript".into()];

    let mut html_css = course(
        "html-css-basics",
        "HTML & CSS Foundations",
        "Structure and style your first web pages.",
        CourseStatus::Published,
        FULLSTACK,
        date(2025, 1, 20),
        vec![
            module(
                "html-css-m1",
                "Semantic HTML",
                vec![
                    item("hc-1-1", "Document structure", ItemKind::Video, 12),
                    item("hc-1-2", "Forms and inputs", ItemKind::Reading, 15),
                ],
            ),
            module(
                "html-css-m2",
                "Layout with CSS",
                vec![
                    item("hc-2-1", "The box model", ItemKind::Lesson, 15),
                    item("hc-2-2", "Flexbox and grid", ItemKind::Video, 25),
                    item("hc-2-3", "Build a landing page", ItemKind::Assignment, 60),
                ],
            ),
        ],
    );
    html_css.phase = Some("Foundations".into());
    html_css.course_order = Some(2);
    html_css.prerequisite_course_ids = vec!["prog-basics".into()];
    html_css.enrolled_count = 128;
    html_css.completion_rate = 0.64;

    let mut js = course(
        "js-essentials",
        "JavaScript Essentials",
        "The language of the browser, from closures to promises.",
        CourseStatus::Published,
        FULLSTACK,
        date(2025, 2, 3),
        vec![module(
            "js-m1",
            "Functions and Scope",
            vec![
                item("js-1-1", "Closures", ItemKind::Lesson, 20),
                item("js-1-2", "Async and promises", ItemKind::Video, 25),
            ],
        )],
    );
    js.phase = Some("Core".into());
    js.course_order = Some(3);
    js.enrolled_count = 96;
    js.completion_rate = 0.41;

    let react = course(
        "react-fundamentals",
        "React Fundamentals",
        "Components, state and effects.",
        CourseStatus::PendingApproval,
        FULLSTACK,
        date(2025, 2, 14),
        Vec::new(),
    );

    let legacy = course(
        "legacy-web-intro",
        "Intro to Web Development (Legacy)",
        "Superseded by HTML & CSS Foundations.",
        CourseStatus::Published,
        FULLSTACK,
        date(2024, 9, 1),
        Vec::new(),
    );

    let mut pandas = course(
        "python-data-analysis",
        "Data Analysis with Python",
        "Cleaning, exploring and visualising data with pandas.",
        CourseStatus::Published,
        "Data Science",
        date(2025, 1, 28),
        vec![module(
            "pda-m1",
            "DataFrames",
            vec![
                item("pda-1-1", "Loading data", ItemKind::Lesson, 15),
                item("pda-1-2", "Group by and aggregate", ItemKind::Video, 20),
            ],
        )],
    );
    pandas.phase = Some("Core".into());

    let ux = course(
        "ui-design-principles",
        "UI Design Principles",
        "Hierarchy, contrast and spacing.",
        CourseStatus::Archived,
        "UI/UX Design",
        date(2024, 11, 5),
        Vec::new(),
    );

    vec![prog_basics, html_css, js, react, legacy, pandas, ux]
}

fn initial_assignments() -> Vec<Assignment> {
    vec![
        Assignment {
            id: "asg-fizzbuzz".into(),
            title: "FizzBuzz".into(),
            course_id: "prog-basics".into(),
            module_id: Some("prog-basics-m2".into()),
            role: "Full Stack Web Development".into(),
            kind: AssignmentType::Coding,
            due_date: date(2025, 3, 1),
            status: AssignmentStatus::Assigned,
            description: Some("Print 1..100 with Fizz, Buzz and FizzBuzz substitutions.".into()),
            ai_feedback: None,
        },
        Assignment {
            id: "asg-landing-page".into(),
            title: "Landing Page".into(),
            course_id: "html-css-basics".into(),
            module_id: Some("html-css-m2".into()),
            role: "Full Stack Web Development".into(),
            kind: AssignmentType::Project,
            due_date: date(2025, 3, 15),
            status: AssignmentStatus::Due,
            description: Some("Build a responsive landing page using flexbox or grid.".into()),
            ai_feedback: None,
        },
        Assignment {
            id: "asg-eda-report".into(),
            title: "Exploratory Analysis Report".into(),
            course_id: "python-data-analysis".into(),
            module_id: Some("pda-m1".into()),
            role: "Data Science".into(),
            kind: AssignmentType::Essay,
            due_date: date(2025, 4, 2),
            status: AssignmentStatus::Assigned,
            description: None,
            ai_feedback: None,
        },
    ]
}

fn question(id: &str, prompt: &str, options: &[&str], correct: usize) -> QuizQuestion {
    QuizQuestion {
        id: id.into(),
        prompt: prompt.into(),
        options: options.iter().map(|o| o.to_string()).collect(),
        correct_option: correct,
        explanation: None,
    }
}

fn initial_quizzes() -> Vec<QuizConfig> {
    vec![
        QuizConfig {
            id: "quiz-prog-basics-1".into(),
            title: "Programming Basics Check".into(),
            course_id: "prog-basics".into(),
            module_id: Some("prog-basics-m1".into()),
            question_count: 2,
            time_limit_minutes: 10,
            passing_score: 70,
            attempt_limit: 3,
            questions: vec![
                question(
                    "q1",
                    "Which keyword declares a block-scoped variable in JavaScript?",
                    &["var", "let", "function", "global"],
                    1,
                ),
                question(
                    "q2",
                    "What does a loop do?",
                    &["Repeats a block", "Defines a type", "Imports a module", "Stops the program"],
                    0,
                ),
            ],
        },
        QuizConfig {
            id: "quiz-html-css-1".into(),
            title: "HTML Semantics".into(),
            course_id: "html-css-basics".into(),
            module_id: Some("html-css-m1".into()),
            question_count: 1,
            time_limit_minutes: 5,
            passing_score: 60,
            attempt_limit: 2,
            questions: vec![question(
                "q1",
                "Which element marks the primary content of a page?",
                &["<div>", "<main>", "<span>", "<section>"],
                1,
            )],
        },
    ]
}
