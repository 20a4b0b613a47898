use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::identity::ExternalRef;
use crate::paths;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum CourseStatus {
    Draft,
    PendingApproval,
    Published,
    Archived,
    Rejected,
}

impl CourseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CourseStatus::Draft => "draft",
            CourseStatus::PendingApproval => "pending_approval",
            CourseStatus::Published => "published",
            CourseStatus::Archived => "archived",
            CourseStatus::Rejected => "rejected",
        }
    }

    /// Case-insensitive; accepts `-` or space in place of `_`.
    pub fn parse(v: &str) -> Option<Self> {
        let v = v.trim().to_ascii_lowercase().replace(&['-', ' '][..], "_");
        match v.as_str() {
            "draft" => Some(CourseStatus::Draft),
            "pending_approval" => Some(CourseStatus::PendingApproval),
            "published" => Some(CourseStatus::Published),
            "archived" => Some(CourseStatus::Archived),
            "rejected" => Some(CourseStatus::Rejected),
            _ => None,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Lesson,
    Video,
    Reading,
    Quiz,
    Assignment,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ModuleItem {
    pub id: String,
    pub title: String,
    pub kind: ItemKind,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub video_url: Option<String>,
    #[serde(default)]
    pub duration_minutes: Option<u32>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Module {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    // older snapshots call these chapters
    #[serde(default, alias = "chapters")]
    pub items: Vec<ModuleItem>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend_id: Option<String>,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub video_url: Option<String>,
    pub status: CourseStatus,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default = "default_path_slug")]
    pub path_slug: String,
    #[serde(default)]
    pub modules: Vec<Module>,
    #[serde(default = "today")]
    pub last_updated: NaiveDate,

    // presentation only
    #[serde(default)]
    pub enrolled_count: u32,
    #[serde(default)]
    pub completion_rate: f32,
    #[serde(default)]
    pub instructor: Option<String>,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub phase: Option<String>,
    #[serde(default)]
    pub course_order: Option<u32>,
    #[serde(default)]
    pub prerequisite_course_ids: Vec<String>,
}

impl Course {
    /// A local draft with no remote counterpart yet.
    pub fn new(id: impl Into<String>, title: impl Into<String>, roles: Vec<String>) -> Self {
        let path_slug = paths::infer_path_slug(&roles).to_string();
        Course {
            id: id.into(),
            backend_id: None,
            title: title.into(),
            description: String::new(),
            video_url: None,
            status: CourseStatus::Draft,
            roles,
            path_slug,
            modules: Vec::new(),
            last_updated: today(),
            enrolled_count: 0,
            completion_rate: 0.0,
            instructor: None,
            skills: Vec::new(),
            phase: None,
            course_order: None,
            prerequisite_course_ids: Vec::new(),
        }
    }

    pub fn external_ref(&self) -> ExternalRef {
        ExternalRef::new(self.id.clone(), self.backend_id.clone())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignmentStatus {
    Assigned,
    Due,
    Submitted,
    Reviewed,
    Overdue,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AssignmentType {
    Project,
    Coding,
    Essay,
    Presentation,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    pub id: String,
    pub title: String,
    pub course_id: String,
    #[serde(default)]
    pub module_id: Option<String>,
    #[serde(default)]
    pub role: String,
    #[serde(rename = "type")]
    pub kind: AssignmentType,
    pub due_date: NaiveDate,
    pub status: AssignmentStatus,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub ai_feedback: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QuizQuestion {
    pub id: String,
    pub prompt: String,
    pub options: Vec<String>,
    pub correct_option: usize,
    #[serde(default)]
    pub explanation: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QuizConfig {
    pub id: String,
    pub title: String,
    pub course_id: String,
    #[serde(default)]
    pub module_id: Option<String>,
    pub question_count: u32,
    pub time_limit_minutes: u32,
    /// Percentage, 0..=100.
    pub passing_score: u32,
    pub attempt_limit: u32,
    #[serde(default)]
    pub questions: Vec<QuizQuestion>,
}

/// The whole persisted blob.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StoreState {
    #[serde(default)]
    pub courses: Vec<Course>,
    #[serde(default)]
    pub assignments: Vec<Assignment>,
    #[serde(default)]
    pub quiz_configs: BTreeMap<String, QuizConfig>,
}

impl StoreState {
    pub fn find_course(&self, key: &str) -> Option<&Course> {
        self.courses.iter().find(|c| c.external_ref().matches_key(key))
    }

    pub fn course_position(&self, key: &str) -> Option<usize> {
        self.courses
            .iter()
            .position(|c| c.external_ref().matches_key(key))
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct CoursePatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub video_url: Option<String>,
    pub status: Option<CourseStatus>,
    pub roles: Option<Vec<String>>,
    pub path_slug: Option<String>,
    pub phase: Option<String>,
    pub instructor: Option<String>,
    pub skills: Option<Vec<String>>,
    pub course_order: Option<u32>,
    pub prerequisite_course_ids: Option<Vec<String>>,
}

impl CoursePatch {
    pub fn status(status: CourseStatus) -> Self {
        CoursePatch {
            status: Some(status),
            ..Default::default()
        }
    }

    /// Changing roles without an explicit path re-infers the path.
    pub fn apply_to(self, course: &mut Course) {
        if let Some(v) = self.title {
            course.title = v;
        }
        if let Some(v) = self.description {
            course.description = v;
        }
        if let Some(v) = self.video_url {
            course.video_url = Some(v).filter(|u| !u.trim().is_empty());
        }
        if let Some(v) = self.status {
            course.status = v;
        }
        if let Some(roles) = self.roles {
            course.path_slug = paths::infer_path_slug(&roles).to_string();
            course.roles = roles;
        }
        if let Some(slug) = self.path_slug {
            course.path_slug = slug;
        }
        if let Some(v) = self.phase {
            course.phase = Some(v);
        }
        if let Some(v) = self.instructor {
            course.instructor = Some(v);
        }
        if let Some(v) = self.skills {
            course.skills = v;
        }
        if let Some(v) = self.course_order {
            course.course_order = Some(v);
        }
        if let Some(v) = self.prerequisite_course_ids {
            course.prerequisite_course_ids = v;
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentPatch {
    pub title: Option<String>,
    pub module_id: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub status: Option<AssignmentStatus>,
    pub description: Option<String>,
    pub ai_feedback: Option<String>,
}

impl AssignmentPatch {
    pub fn apply_to(self, a: &mut Assignment) {
        if let Some(v) = self.title {
            a.title = v;
        }
        if let Some(v) = self.module_id {
            a.module_id = Some(v);
        }
        if let Some(v) = self.due_date {
            a.due_date = v;
        }
        if let Some(v) = self.status {
            a.status = v;
        }
        if let Some(v) = self.description {
            a.description = Some(v);
        }
        if let Some(v) = self.ai_feedback {
            a.ai_feedback = Some(v);
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AssessmentKind {
    Assignment,
    Quiz,
}

/// Calendar-facing summary of an assignment or a quiz.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Assessment {
    pub id: String,
    pub kind: AssessmentKind,
    pub title: String,
    pub course_id: String,
    pub module_id: Option<String>,
    pub due_date: Option<NaiveDate>,
}

impl From<&Assignment> for Assessment {
    fn from(a: &Assignment) -> Self {
        Assessment {
            id: a.id.clone(),
            kind: AssessmentKind::Assignment,
            title: a.title.clone(),
            course_id: a.course_id.clone(),
            module_id: a.module_id.clone(),
            due_date: Some(a.due_date),
        }
    }
}

impl From<&QuizConfig> for Assessment {
    fn from(q: &QuizConfig) -> Self {
        Assessment {
            id: q.id.clone(),
            kind: AssessmentKind::Quiz,
            title: q.title.clone(),
            course_id: q.course_id.clone(),
            module_id: q.module_id.clone(),
            due_date: None,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CreateCourseReq {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub video_url: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub status: Option<CourseStatus>,
    #[serde(default)]
    pub instructor: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CreateAssignmentReq {
    pub title: String,
    pub course_id: String,
    #[serde(default)]
    pub module_id: Option<String>,
    #[serde(default)]
    pub role: String,
    #[serde(rename = "type")]
    pub kind: AssignmentType,
    pub due_date: NaiveDate,
    #[serde(default)]
    pub description: Option<String>,
}

pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}

fn default_path_slug() -> String {
    paths::DEFAULT_PATH_SLUG.to_string()
}
