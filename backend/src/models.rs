use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::policy::Authored;

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub is_active: bool,
    pub date_joined: DateTime<Utc>,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct Group {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub description: String,
}

/// A post row joined with its author's username.
#[derive(Debug, sqlx::FromRow)]
pub struct Post {
    pub id: i64,
    pub text: String,
    pub pub_date: DateTime<Utc>,
    pub author_id: i64,
    pub author: String,
    pub image: Option<String>,
    pub group_id: Option<i64>,
}

#[derive(Debug, sqlx::FromRow)]
pub struct Comment {
    pub id: i64,
    pub author_id: i64,
    pub author: String,
    pub post_id: i64,
    pub text: String,
    pub created: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
pub struct Follow {
    pub id: i64,
    pub user: String,
    pub following: String,
}

impl Authored for Post {
    fn author_id(&self) -> i64 {
        self.author_id
    }
}

impl Authored for Comment {
    fn author_id(&self) -> i64 {
        self.author_id
    }
}
