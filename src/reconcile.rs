//! One-way merge of the remote course list into the canonical state.
//!
//! Remote is authoritative for the fields it knows about (title, description,
//! video, status, freshness). Local is authoritative for everything the remote
//! schema does not carry: modules, path placement, phase and role tags.

use serde::{Deserialize, Serialize};

use crate::models::{today, Course, CourseStatus, StoreState};
use crate::remote::RemoteCourse;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// Passive pass: only courses unknown locally are appended.
    AppendOnly,
    /// Manual pass: also refreshes already-known courses.
    UpdateExisting,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub fetched: usize,
    pub added: Vec<String>,
    pub updated: Vec<String>,
}

impl SyncReport {
    pub fn changed(&self) -> bool {
        !self.added.is_empty() || !self.updated.is_empty()
    }
}

pub fn remote_status(remote: &RemoteCourse) -> CourseStatus {
    CourseStatus::parse(&remote.status).unwrap_or_else(|| {
        tracing::warn!(
            remote_id = %remote.id,
            status = %remote.status,
            "unknown remote course status, treating as draft"
        );
        CourseStatus::Draft
    })
}

fn remote_date(remote: &RemoteCourse) -> chrono::NaiveDate {
    remote
        .updated_at
        .or(remote.created_at)
        .map(|t| t.date_naive())
        .unwrap_or_else(today)
}

/// A canonical course for a remote record nobody has seen locally.
pub fn course_from_remote(remote: &RemoteCourse) -> Course {
    let mut course = Course::new(remote.id.clone(), remote.title.clone(), remote.tags.clone());
    course.backend_id = Some(remote.id.clone());
    course.description = remote.description.clone();
    course.video_url = remote.video_url.clone();
    course.status = remote_status(remote);
    course.last_updated = remote_date(remote);
    course.instructor = remote.created_by.clone();
    course
}

/// Remote wins on ordinary fields; local keeps what only it knows.
pub fn merge_remote_course(local: &Course, remote: &RemoteCourse) -> Course {
    Course {
        // once attached, a backend id is never replaced or dropped
        backend_id: local.backend_id.clone().or_else(|| Some(remote.id.clone())),
        title: remote.title.clone(),
        description: remote.description.clone(),
        // the remote sends "" or nothing for a course without video; that is
        // not a request to clear the local link
        video_url: remote.video_url.clone().or_else(|| local.video_url.clone()),
        status: remote_status(remote),
        last_updated: remote_date(remote),
        roles: if local.roles.is_empty() {
            remote.tags.clone()
        } else {
            local.roles.clone()
        },
        ..local.clone()
    }
}

/// Pure: returns the next state and what changed. The input is untouched.
pub fn reconcile(state: &StoreState, remote: &[RemoteCourse], mode: SyncMode) -> (StoreState, SyncReport) {
    let mut next = state.clone();
    let mut report = SyncReport {
        fetched: remote.len(),
        ..Default::default()
    };

    for rc in remote {
        match next.course_position(&rc.id) {
            Some(idx) => {
                if mode == SyncMode::AppendOnly {
                    continue;
                }
                let merged = merge_remote_course(&next.courses[idx], rc);
                if merged != next.courses[idx] {
                    report.updated.push(merged.id.clone());
                    next.courses[idx] = merged;
                }
            }
            None => {
                let course = course_from_remote(rc);
                report.added.push(course.id.clone());
                next.courses.push(course);
            }
        }
    }

    (next, report)
}
