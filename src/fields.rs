//! Enumerations and field types for day planning.
//!
//! This module defines the structured values used to categorise and rank tasks:
//! the work category a task belongs to, its priority and its lifecycle status.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Area of work a task belongs to. Each category owns one period of the daily template.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, ValueEnum, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    #[serde(alias = "Academy")]
    Academy,
    #[serde(alias = "Freelance")]
    Freelance,
    #[serde(alias = "Support")]
    Support,
    #[serde(alias = "Project")]
    Project,
    #[serde(alias = "Company")]
    Company,
    #[serde(alias = "Other")]
    Other,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::Academy,
        Category::Freelance,
        Category::Support,
        Category::Project,
        Category::Company,
        Category::Other,
    ];

    /// Weight contributed to the priority score.
    pub fn score_weight(self) -> u32 {
        match self {
            Category::Company => 25,
            Category::Support => 30,
            Category::Academy => 20,
            Category::Freelance => 10,
            Category::Project | Category::Other => 15,
        }
    }

    /// Parse a category name leniently (case-insensitive).
    pub fn parse(s: &str) -> Option<Category> {
        match s.trim().to_lowercase().as_str() {
            "academy" => Some(Category::Academy),
            "freelance" => Some(Category::Freelance),
            "support" => Some(Category::Support),
            "project" => Some(Category::Project),
            "company" => Some(Category::Company),
            "other" => Some(Category::Other),
            _ => None,
        }
    }
}

/// Task importance.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ValueEnum, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    /// Ordering rank used by schedule sorting (high=3, medium=2, low=1).
    pub fn rank(self) -> u8 {
        match self {
            Priority::High => 3,
            Priority::Medium => 2,
            Priority::Low => 1,
        }
    }

    /// Base value of the priority score.
    pub fn score_weight(self) -> u32 {
        match self {
            Priority::High => 30,
            Priority::Medium => 20,
            Priority::Low => 10,
        }
    }

    pub fn parse(s: &str) -> Option<Priority> {
        match s.trim().to_lowercase().as_str() {
            "low" => Some(Priority::Low),
            "medium" => Some(Priority::Medium),
            "high" => Some(Priority::High),
            _ => None,
        }
    }
}

/// Task lifecycle status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ValueEnum, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum Status {
    #[serde(alias = "Pending")]
    Pending,
    #[serde(alias = "InProgress", alias = "in_progress")]
    InProgress,
    #[serde(alias = "Completed")]
    Completed,
    #[serde(alias = "Cancelled")]
    Cancelled,
}

impl Status {
    /// Neither completed nor cancelled.
    pub fn is_open(self) -> bool {
        matches!(self, Status::Pending | Status::InProgress)
    }

    pub fn parse(s: &str) -> Option<Status> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Some(Status::Pending),
            "in-progress" | "in_progress" => Some(Status::InProgress),
            "completed" => Some(Status::Completed),
            "cancelled" => Some(Status::Cancelled),
            _ => None,
        }
    }
}

/// Recurrence descriptor. Only monthly renewal exists.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RecurringPattern {
    Monthly,
}

/// Available sorting options for task lists.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum SortKey {
    Due,
    Priority,
    Score,
}
