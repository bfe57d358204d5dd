use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::DocketError;

pub const MAX_TITLE_LEN: usize = 100;
pub const MAX_DESCRIPTION_LEN: usize = 500;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskSort {
    /// Oldest first.
    #[default]
    Created,
    /// Alphabetical by title.
    Title,
}

impl TaskSort {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskSort::Created => "created",
            TaskSort::Title => "title",
        }
    }

    pub fn parse_str(s: &str) -> Option<Self> {
        match s {
            "created" | "date" => Some(TaskSort::Created),
            "title" => Some(TaskSort::Title),
            _ => None,
        }
    }
}

impl fmt::Display for TaskSort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub title: String,
    pub description: String,
    pub category_id: Option<String>,
    pub tag_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTask {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category_id: Option<String>,
    #[serde(default)]
    pub tag_id: Option<String>,
}

impl CreateTask {
    pub fn validate(&self) -> Result<(), DocketError> {
        validate_title(&self.title)?;
        validate_description(&self.description)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateTask {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category_id: Option<Option<String>>,
    pub tag_id: Option<Option<String>>,
}

impl UpdateTask {
    pub fn validate(&self) -> Result<(), DocketError> {
        if let Some(ref title) = self.title {
            validate_title(title)?;
        }
        if let Some(ref description) = self.description {
            validate_description(description)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    /// Case-insensitive substring match on the title.
    pub title: Option<String>,
    pub category_id: Option<String>,
    pub tag_id: Option<String>,
    pub sort: TaskSort,
    pub limit: Option<i64>,
}

fn validate_title(title: &str) -> Result<(), DocketError> {
    if title.trim().is_empty() {
        return Err(DocketError::InvalidInput("title must not be empty".into()));
    }
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(DocketError::InvalidInput(format!(
            "title exceeds {MAX_TITLE_LEN} characters"
        )));
    }
    Ok(())
}

fn validate_description(description: &str) -> Result<(), DocketError> {
    if description.chars().count() > MAX_DESCRIPTION_LEN {
        return Err(DocketError::InvalidInput(format!(
            "description exceeds {MAX_DESCRIPTION_LEN} characters"
        )));
    }
    Ok(())
}
