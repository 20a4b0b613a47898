use async_trait::async_trait;
use chrono::{DateTime, Utc};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::{Deserialize, Deserializer, Serialize};
use serde_with::{serde_as, DefaultOnNull, NoneAsEmptyString};
use std::time::Duration;
use thiserror::Error;

use crate::models::{Course, CourseStatus};

// unreserved characters stay literal in a path segment
const SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("course api request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("course api returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("course api response could not be decoded: {0}")]
    Decode(#[from] serde_json::Error),
}

/// A course as the remote course API reports it.
#[serde_as]
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RemoteCourse {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    pub title: String,
    #[serde_as(as = "DefaultOnNull")]
    #[serde(default)]
    pub description: String,
    #[serde_as(as = "NoneAsEmptyString")]
    #[serde(default)]
    pub video_url: Option<String>,
    pub status: String,
    #[serde_as(as = "DefaultOnNull")]
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, deserialize_with = "opt_id_string")]
    pub created_by: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Body for `POST /courses` and `PATCH /courses/:id`.
#[derive(Serialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RemoteCourseWrite {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<CourseStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

impl RemoteCourseWrite {
    pub fn from_course(course: &Course) -> Self {
        RemoteCourseWrite {
            title: Some(course.title.clone()),
            description: Some(course.description.clone()),
            video_url: course.video_url.clone(),
            status: Some(course.status),
            tags: Some(course.roles.clone()),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Int(i64),
    Float(f64),
}

impl From<RawId> for String {
    fn from(raw: RawId) -> Self {
        match raw {
            RawId::Text(s) => s.trim().to_string(),
            RawId::Int(n) => n.to_string(),
            RawId::Float(f) => f.to_string(),
        }
    }
}

fn id_string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    RawId::deserialize(d).map(String::from)
}

fn opt_id_string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    Option::<RawId>::deserialize(d).map(|raw| raw.map(String::from))
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CoursePage {
    Bare(Vec<RemoteCourse>),
    Wrapped {
        #[serde(alias = "data")]
        courses: Vec<RemoteCourse>,
    },
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CourseEnvelope {
    Wrapped { course: RemoteCourse },
    Bare(RemoteCourse),
}

pub fn decode_course_page(raw: &str) -> Result<Vec<RemoteCourse>, RemoteError> {
    Ok(match serde_json::from_str::<CoursePage>(raw)? {
        CoursePage::Bare(courses) | CoursePage::Wrapped { courses } => courses,
    })
}

fn decode_course(raw: &str) -> Result<RemoteCourse, RemoteError> {
    Ok(match serde_json::from_str::<CourseEnvelope>(raw)? {
        CourseEnvelope::Wrapped { course } | CourseEnvelope::Bare(course) => course,
    })
}

/// Read side of the remote course API, as consumed by reconciliation.
#[async_trait]
pub trait CourseSource: Send + Sync {
    async fn list_courses(&self, limit: usize) -> Result<Vec<RemoteCourse>, RemoteError>;
}

#[derive(Debug, Clone)]
pub struct RemoteCourseApi {
    client: reqwest::Client,
    base_url: String,
}

impl RemoteCourseApi {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, RemoteError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, base_url))
    }

    pub fn with_client(client: reqwest::Client, base_url: &str) -> Self {
        RemoteCourseApi {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn courses_url(&self) -> String {
        format!("{}/courses", self.base_url)
    }

    fn course_url(&self, remote_id: &str) -> String {
        format!(
            "{}/courses/{}",
            self.base_url,
            utf8_percent_encode(remote_id.trim(), SEGMENT)
        )
    }

    pub async fn create_course(&self, body: &RemoteCourseWrite) -> Result<RemoteCourse, RemoteError> {
        let resp = self.client.post(self.courses_url()).json(body).send().await?;
        decode_course(&read_success(resp).await?)
    }

    pub async fn update_course(
        &self,
        remote_id: &str,
        body: &RemoteCourseWrite,
    ) -> Result<RemoteCourse, RemoteError> {
        let resp = self
            .client
            .patch(self.course_url(remote_id))
            .json(body)
            .send()
            .await?;
        decode_course(&read_success(resp).await?)
    }

    pub async fn delete_course(&self, remote_id: &str) -> Result<(), RemoteError> {
        let resp = self.client.delete(self.course_url(remote_id)).send().await?;
        read_success(resp).await?;
        Ok(())
    }
}

#[async_trait]
impl CourseSource for RemoteCourseApi {
    async fn list_courses(&self, limit: usize) -> Result<Vec<RemoteCourse>, RemoteError> {
        let resp = self
            .client
            .get(self.courses_url())
            .query(&[("limit", limit)])
            .send()
            .await?;
        let raw = read_success(resp).await?;
        let courses = decode_course_page(&raw)?;
        tracing::debug!(count = courses.len(), "fetched remote courses");
        Ok(courses)
    }
}

async fn read_success(resp: reqwest::Response) -> Result<String, RemoteError> {
    let status = resp.status();
    let body = resp.text().await?;
    if !status.is_success() {
        return Err(RemoteError::Status {
            status: status.as_u16(),
            body,
        });
    }
    Ok(body)
}
