//! Inbound payloads and the rules they must satisfy before the engine
//! touches the store.
//!
//! Each input is normalized first (trimmed, tags lowercased, blank optionals
//! dropped) and then checked, so lengths are measured on what gets stored.

use std::borrow::Cow;

use serde::Deserialize;
use validator::{Validate, ValidationError, ValidationErrors};

use hive_shared::errors::{AppError, AppResult, ErrorCode};

use crate::models::{Difficulty, ProjectStatus};

pub const MAX_TAGS: usize = 5;
pub const MAX_TAG_LEN: usize = 50;
pub const MAX_LINKS: usize = 10;
pub const MAX_ATTACHMENTS: usize = 5;
pub const MAX_URL_LEN: usize = 500;
pub const REASON_MIN: usize = 10;
pub const REASON_MAX: usize = 1000;
pub const CHAT_MESSAGE_MAX: usize = 5000;
pub const MAX_SKILLS: usize = 10;
pub const MAX_SKILL_LEN: usize = 50;
const GITHUB_PREFIX: &str = "https://github.com/";

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct NewProject {
    #[validate(length(min = 5, max = 200, message = "title must be 5-200 characters"))]
    pub title: String,
    #[validate(length(min = 20, max = 5000, message = "description must be 20-5000 characters"))]
    pub description: String,
    #[validate(length(min = 1, max = 5000, message = "what_it_does must be 1-5000 characters"))]
    pub what_it_does: String,
    #[validate(length(max = 5000))]
    pub inputs_dependencies: Option<String>,
    #[validate(length(min = 20, max = 2000, message = "desired_outputs must be 20-2000 characters"))]
    pub desired_outputs: String,
    pub difficulty: Option<Difficulty>,
    #[validate(length(max = 50))]
    pub estimated_time: Option<String>,
    pub github_url: Option<String>,
    #[serde(default)]
    #[validate(length(max = 5, message = "at most 5 tags"))]
    pub tags: Vec<String>,
    /// DRAFT or OPEN; defaults to OPEN.
    pub status: Option<ProjectStatus>,
}

impl NewProject {
    pub fn normalized(mut self) -> Self {
        trim(&mut self.title);
        trim(&mut self.description);
        trim(&mut self.what_it_does);
        trim(&mut self.desired_outputs);
        blank_to_none(&mut self.inputs_dependencies);
        blank_to_none(&mut self.estimated_time);
        blank_to_none(&mut self.github_url);
        self.tags = normalize_tags(self.tags);
        self
    }

    pub fn check(&self) -> AppResult<()> {
        let mut errors = collect(self.validate());
        check_github_url(&mut errors, self.github_url.as_deref());
        check_tags(&mut errors, &self.tags);
        if self.status == Some(ProjectStatus::Closed) {
            field_error(&mut errors, "status", "initial_status", "a project starts as DRAFT or OPEN");
        }
        finish(errors)
    }
}

/// Partial edit of a project. Absent fields stay as they are.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct ProjectChanges {
    #[validate(length(min = 5, max = 200, message = "title must be 5-200 characters"))]
    pub title: Option<String>,
    #[validate(length(min = 20, max = 5000, message = "description must be 20-5000 characters"))]
    pub description: Option<String>,
    #[validate(length(min = 1, max = 5000))]
    pub what_it_does: Option<String>,
    #[validate(length(max = 5000))]
    pub inputs_dependencies: Option<String>,
    #[validate(length(min = 20, max = 2000, message = "desired_outputs must be 20-2000 characters"))]
    pub desired_outputs: Option<String>,
    pub difficulty: Option<Difficulty>,
    #[validate(length(max = 50))]
    pub estimated_time: Option<String>,
    pub github_url: Option<String>,
    #[validate(length(max = 5, message = "at most 5 tags"))]
    pub tags: Option<Vec<String>>,
    pub status: Option<ProjectStatus>,
}

impl ProjectChanges {
    pub fn normalized(mut self) -> Self {
        for field in [
            &mut self.title,
            &mut self.description,
            &mut self.what_it_does,
            &mut self.inputs_dependencies,
            &mut self.desired_outputs,
            &mut self.estimated_time,
            &mut self.github_url,
        ] {
            if let Some(value) = field.as_mut() {
                trim(value);
            }
        }
        self.tags = self.tags.map(normalize_tags);
        self
    }

    pub fn check(&self) -> AppResult<()> {
        let mut errors = collect(self.validate());
        if let Some(url) = self.github_url.as_deref().filter(|u| !u.is_empty()) {
            check_github_url(&mut errors, Some(url));
        }
        if let Some(tags) = &self.tags {
            check_tags(&mut errors, tags);
        }
        finish(errors)
    }
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct NewContribution {
    #[validate(length(max = 200))]
    pub title: Option<String>,
    #[validate(length(min = 20, max = 5000, message = "body must be 20-5000 characters"))]
    pub body: String,
    #[serde(default)]
    #[validate(length(max = 10, message = "at most 10 links"))]
    pub links: Vec<String>,
    #[serde(default)]
    #[validate(length(max = 5, message = "at most 5 attachments"))]
    pub attachments: Vec<String>,
}

impl NewContribution {
    pub fn normalized(mut self) -> Self {
        trim(&mut self.body);
        blank_to_none(&mut self.title);
        self.links = normalize_urls(self.links);
        self.attachments = normalize_urls(self.attachments);
        self
    }

    pub fn check(&self) -> AppResult<()> {
        let mut errors = collect(self.validate());
        check_urls(&mut errors, "links", &self.links);
        check_urls(&mut errors, "attachments", &self.attachments);
        finish(errors)
    }
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct ContributionChanges {
    #[validate(length(max = 200))]
    pub title: Option<String>,
    #[validate(length(min = 20, max = 5000, message = "body must be 20-5000 characters"))]
    pub body: Option<String>,
    #[validate(length(max = 10, message = "at most 10 links"))]
    pub links: Option<Vec<String>>,
    #[validate(length(max = 5, message = "at most 5 attachments"))]
    pub attachments: Option<Vec<String>>,
}

impl ContributionChanges {
    pub fn normalized(mut self) -> Self {
        if let Some(body) = self.body.as_mut() {
            trim(body);
        }
        if let Some(title) = self.title.as_mut() {
            trim(title);
        }
        self.links = self.links.map(normalize_urls);
        self.attachments = self.attachments.map(normalize_urls);
        self
    }

    pub fn check(&self) -> AppResult<()> {
        let mut errors = collect(self.validate());
        if let Some(links) = &self.links {
            check_urls(&mut errors, "links", links);
        }
        if let Some(attachments) = &self.attachments {
            check_urls(&mut errors, "attachments", attachments);
        }
        finish(errors)
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RegisterInput {
    #[validate(email(message = "invalid email format"))]
    pub email: String,
    pub password: String,
    #[validate(length(min = 2, max = 50, message = "display_name must be 2-50 characters"))]
    pub display_name: String,
}

impl RegisterInput {
    pub fn normalized(mut self) -> Self {
        self.email = self.email.trim().to_lowercase();
        trim(&mut self.display_name);
        self
    }
}

/// Partial edit of the caller's own profile. Absent fields stay as they
/// are; an empty `github_url` or `portfolio_url` clears it.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct ProfileChanges {
    #[validate(length(min = 2, max = 50, message = "display_name must be 2-50 characters"))]
    pub display_name: Option<String>,
    #[validate(length(max = 1000, message = "bio must be at most 1000 characters"))]
    pub bio: Option<String>,
    #[validate(length(max = 10, message = "at most 10 skills"))]
    pub skills: Option<Vec<String>>,
    pub github_url: Option<String>,
    pub portfolio_url: Option<String>,
}

impl ProfileChanges {
    pub fn normalized(mut self) -> Self {
        for field in [
            &mut self.display_name,
            &mut self.bio,
            &mut self.github_url,
            &mut self.portfolio_url,
        ] {
            if let Some(value) = field.as_mut() {
                trim(value);
            }
        }
        self.skills = self.skills.map(|skills| {
            let mut out: Vec<String> = Vec::with_capacity(skills.len());
            for skill in skills {
                let skill = skill.trim().to_string();
                if !skill.is_empty() && !out.iter().any(|s| s.eq_ignore_ascii_case(&skill)) {
                    out.push(skill);
                }
            }
            out
        });
        self
    }

    pub fn check(&self) -> AppResult<()> {
        let mut errors = collect(self.validate());
        if let Some(url) = self.github_url.as_deref().filter(|u| !u.is_empty()) {
            check_github_url(&mut errors, Some(url));
        }
        if let Some(url) = self.portfolio_url.as_deref().filter(|u| !u.is_empty()) {
            if !is_http_url(url) || url.chars().count() > MAX_URL_LEN {
                field_error(&mut errors, "portfolio_url", "url", "portfolio_url must be an http(s) URL");
            }
        }
        if let Some(skills) = &self.skills {
            if skills.iter().any(|s| s.chars().count() > MAX_SKILL_LEN) {
                field_error(&mut errors, "skills", "skill_length", "skills must be at most 50 characters");
            }
        }
        finish(errors)
    }
}

/// Moderation reasons: 10..=1000 characters once trimmed.
pub fn validate_reason(reason: &str) -> AppResult<String> {
    let trimmed = reason.trim();
    let len = trimmed.chars().count();
    if len < REASON_MIN {
        return Err(AppError::new(
            ErrorCode::ReasonTooShort,
            format!("reason must be at least {REASON_MIN} characters"),
        ));
    }
    if len > REASON_MAX {
        return Err(AppError::new(
            ErrorCode::ValidationError,
            format!("reason must be at most {REASON_MAX} characters"),
        ));
    }
    Ok(trimmed.to_string())
}

pub fn validate_chat_message(content: &str) -> AppResult<String> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err(AppError::new(ErrorCode::ValidationError, "message cannot be empty"));
    }
    if trimmed.chars().count() > CHAT_MESSAGE_MAX {
        return Err(AppError::new(
            ErrorCode::MessageTooLong,
            format!("message must be at most {CHAT_MESSAGE_MAX} characters"),
        ));
    }
    Ok(trimmed.to_string())
}

/// Lowercase, trim, drop blanks and duplicates, keep first-seen order.
pub fn normalize_tags(tags: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.trim().to_lowercase();
        if !tag.is_empty() && !out.contains(&tag) {
            out.push(tag);
        }
    }
    out
}

fn normalize_urls(urls: Vec<String>) -> Vec<String> {
    urls.into_iter()
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty())
        .collect()
}

fn is_http_url(value: &str) -> bool {
    let rest = value
        .strip_prefix("https://")
        .or_else(|| value.strip_prefix("http://"));
    matches!(rest, Some(host) if !host.is_empty() && !host.starts_with('/') && !host.contains(char::is_whitespace))
}

fn check_urls(errors: &mut ValidationErrors, field: &'static str, urls: &[String]) {
    if urls.iter().any(|u| !is_http_url(u)) {
        field_error(errors, field, "url", "every entry must be an http(s) URL");
    }
    if urls.iter().any(|u| u.chars().count() > MAX_URL_LEN) {
        field_error(errors, field, "url_length", "URLs must be at most 500 characters");
    }
}

fn check_github_url(errors: &mut ValidationErrors, url: Option<&str>) {
    if let Some(url) = url {
        if !url.starts_with(GITHUB_PREFIX) || url.len() == GITHUB_PREFIX.len() || url.chars().count() > MAX_URL_LEN {
            field_error(errors, "github_url", "github_url", "github_url must start with https://github.com/");
        }
    }
}

fn check_tags(errors: &mut ValidationErrors, tags: &[String]) {
    if tags.len() > MAX_TAGS {
        field_error(errors, "tags", "length", "at most 5 tags");
    }
    if tags.iter().any(|t| t.chars().count() > MAX_TAG_LEN) {
        field_error(errors, "tags", "tag_length", "tags must be at most 50 characters");
    }
}

fn trim(value: &mut String) {
    let trimmed = value.trim();
    if trimmed.len() != value.len() {
        *value = trimmed.to_string();
    }
}

fn blank_to_none(value: &mut Option<String>) {
    *value = value
        .take()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());
}

fn field_error(errors: &mut ValidationErrors, field: &'static str, code: &'static str, message: &'static str) {
    let mut error = ValidationError::new(code);
    error.message = Some(Cow::Borrowed(message));
    errors.add(field, error);
}

fn collect(result: Result<(), ValidationErrors>) -> ValidationErrors {
    result.err().unwrap_or_else(ValidationErrors::new)
}

fn finish(errors: ValidationErrors) -> AppResult<()> {
    if errors.errors().is_empty() {
        Ok(())
    } else {
        Err(errors.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project() -> NewProject {
        NewProject {
            title: "Build a parser".into(),
            description: "A parser for the hive config language.".into(),
            what_it_does: "Parses things".into(),
            desired_outputs: "A tested crate with a small CLI front".into(),
            ..Default::default()
        }
    }

    fn contribution(body: &str) -> NewContribution {
        NewContribution {
            body: body.into(),
            ..Default::default()
        }
    }

    #[test]
    fn valid_project_passes() {
        assert!(project().normalized().check().is_ok());
    }

    #[test]
    fn tags_are_normalized_then_counted() {
        let mut p = project();
        p.tags = vec![" Rust ".into(), "rust".into(), "".into(), "WASM".into()];
        let p = p.normalized();
        assert_eq!(p.tags, vec!["rust".to_string(), "wasm".to_string()]);
        assert!(p.check().is_ok());

        let mut p = project();
        p.tags = (0..6).map(|i| format!("t{i}")).collect();
        let err = p.normalized().check().unwrap_err();
        assert_eq!(err.code(), ErrorCode::ValidationError);
    }

    #[test]
    fn github_url_must_point_at_github() {
        let mut p = project();
        p.github_url = Some("https://gitlab.com/x/y".into());
        assert!(p.normalized().check().is_err());

        let mut p = project();
        p.github_url = Some("https://github.com/hive/parser".into());
        assert!(p.normalized().check().is_ok());
    }

    #[test]
    fn project_cannot_start_closed() {
        let mut p = project();
        p.status = Some(ProjectStatus::Closed);
        assert!(p.normalized().check().is_err());
    }

    #[test]
    fn short_body_is_rejected() {
        let err = contribution("too short").normalized().check().unwrap_err();
        assert_eq!(err.code(), ErrorCode::ValidationError);
    }

    #[test]
    fn body_length_is_measured_after_trim() {
        let padded = format!("   {}   ", "x".repeat(19));
        assert!(contribution(&padded).normalized().check().is_err());
    }

    #[test]
    fn link_limits() {
        let mut c = contribution("a perfectly reasonable contribution body");
        c.links = (0..11).map(|i| format!("https://example.com/{i}")).collect();
        assert!(c.normalized().check().is_err());

        let mut c = contribution("a perfectly reasonable contribution body");
        c.links = vec!["ftp://example.com/file".into()];
        assert!(c.normalized().check().is_err());

        let mut c = contribution("a perfectly reasonable contribution body");
        c.links = vec!["https://example.com/pr/1".into(), "http://example.org".into()];
        assert!(c.normalized().check().is_ok());
    }

    #[test]
    fn profile_changes_are_checked() {
        let changes = ProfileChanges {
            bio: Some("  Rust and coffee  ".into()),
            skills: Some(vec!["Rust".into(), " rust ".into(), "".into(), "SQL".into()]),
            github_url: Some("https://github.com/ada".into()),
            portfolio_url: Some("".into()),
            ..Default::default()
        }
        .normalized();
        assert_eq!(changes.bio.as_deref(), Some("Rust and coffee"));
        assert_eq!(changes.skills, Some(vec!["Rust".to_string(), "SQL".to_string()]));
        assert!(changes.check().is_ok());

        let bad = ProfileChanges {
            github_url: Some("https://gitlab.com/ada".into()),
            portfolio_url: Some("ada.dev".into()),
            skills: Some((0..11).map(|i| format!("skill{i}")).collect()),
            ..Default::default()
        };
        let err = bad.normalized().check().unwrap_err();
        assert_eq!(err.code(), ErrorCode::ValidationError);
    }

    #[test]
    fn attachment_limit() {
        let mut c = contribution("a perfectly reasonable contribution body");
        c.attachments = (0..6).map(|i| format!("https://cdn.example.com/{i}.png")).collect();
        assert!(c.normalized().check().is_err());
    }

    #[test]
    fn reason_rules() {
        assert_eq!(validate_reason("spam").unwrap_err().code(), ErrorCode::ReasonTooShort);
        assert_eq!(validate_reason("   spam spam   ").unwrap_err().code(), ErrorCode::ReasonTooShort);
        assert_eq!(validate_reason("  duplicate award  ").unwrap(), "duplicate award");
        assert!(validate_reason(&"x".repeat(1001)).is_err());
    }

    #[test]
    fn chat_message_rules() {
        assert!(validate_chat_message("   ").is_err());
        assert_eq!(validate_chat_message(&"x".repeat(5001)).unwrap_err().code(), ErrorCode::MessageTooLong);
        assert_eq!(validate_chat_message(" hi ").unwrap(), "hi");
    }
}
