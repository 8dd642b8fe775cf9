//! Wire representations and request-body validation.
//!
//! Bodies are read as loose JSON objects first so that every field problem
//! can be reported at once, keyed by field name, before the typed input is
//! handed to the `validator` rules.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use validator::{Validate, ValidationErrors};

use crate::error::{AppError, FieldErrors};
use crate::models::{Comment, Follow, Post};

pub const REQUIRED: &str = "This field is required.";
pub const NULL: &str = "This field may not be null.";
pub const BLANK: &str = "This field may not be blank.";
pub const NOT_A_STRING: &str = "Not a valid string.";

#[derive(Serialize)]
pub struct PostResponse {
    pub id: i64,
    pub author: String,
    pub text: String,
    pub pub_date: DateTime<Utc>,
    pub image: Option<String>,
    pub group: Option<i64>,
}

impl From<Post> for PostResponse {
    fn from(post: Post) -> Self {
        Self {
            id: post.id,
            author: post.author,
            text: post.text,
            pub_date: post.pub_date,
            image: post.image,
            group: post.group_id,
        }
    }
}

#[derive(Serialize)]
pub struct CommentResponse {
    pub id: i64,
    pub author: String,
    pub post: i64,
    pub text: String,
    pub created: DateTime<Utc>,
}

impl From<Comment> for CommentResponse {
    fn from(comment: Comment) -> Self {
        Self {
            id: comment.id,
            author: comment.author,
            post: comment.post_id,
            text: comment.text,
            created: comment.created,
        }
    }
}

#[derive(Serialize)]
pub struct FollowResponse {
    pub id: i64,
    pub user: String,
    pub following: String,
}

impl From<Follow> for FollowResponse {
    fn from(follow: Follow) -> Self {
        Self {
            id: follow.id,
            user: follow.user,
            following: follow.following,
        }
    }
}

/// Writable post fields. `None` means the field was not sent.
#[derive(Debug, Default, Validate)]
pub struct PostInput {
    pub text: Option<String>,
    pub image: Option<Option<String>>,
    pub group: Option<Option<i64>>,
}

#[derive(Debug, Default, Validate)]
pub struct CommentInput {
    #[validate(length(max = 300, message = "Ensure this field has no more than 300 characters."))]
    pub text: Option<String>,
}

#[derive(Debug, Default, Validate)]
pub struct FollowInput {
    #[validate(length(max = 150, message = "Ensure this field has no more than 150 characters."))]
    pub following: Option<String>,
}

/// Flattens `validator` output into the field-keyed error map.
pub fn validation_errors(errors: ValidationErrors) -> FieldErrors {
    errors
        .field_errors()
        .into_iter()
        .map(|(field, errs)| {
            let messages = errs
                .iter()
                .map(|e| {
                    e.message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| e.code.to_string())
                })
                .collect();
            (field.to_string(), messages)
        })
        .collect()
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "NoneType",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "int",
        Value::String(_) => "str",
        Value::Array(_) => "list",
        Value::Object(_) => "dict",
    }
}

/// Field reader over a JSON request body that accumulates errors.
pub struct Fields<'a> {
    data: &'a Map<String, Value>,
    partial: bool,
    errors: FieldErrors,
}

impl<'a> Fields<'a> {
    /// `partial` relaxes the required-field check, as for PATCH.
    pub fn new(body: &'a Value, partial: bool) -> Result<Self, AppError> {
        let Value::Object(data) = body else {
            return Err(AppError::field(
                "non_field_errors",
                format!(
                    "Invalid data. Expected a dictionary, but got {}.",
                    type_name(body)
                ),
            ));
        };
        Ok(Self {
            data,
            partial,
            errors: FieldErrors::new(),
        })
    }

    pub fn reject(&mut self, field: &str, message: impl Into<String>) {
        self.errors
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    fn missing(&mut self, field: &str, required: bool) {
        if required && !self.partial {
            self.reject(field, REQUIRED);
        }
    }

    fn string_value(&mut self, field: &str, value: &Value) -> Option<String> {
        let raw = match value {
            Value::String(s) => s.trim().to_string(),
            Value::Number(n) => n.to_string(),
            _ => {
                self.reject(field, NOT_A_STRING);
                return None;
            }
        };
        if raw.is_empty() {
            self.reject(field, BLANK);
            return None;
        }
        Some(raw)
    }

    /// A non-null, non-blank text field.
    pub fn text(&mut self, field: &str, required: bool) -> Option<String> {
        match self.data.get(field) {
            None => {
                self.missing(field, required);
                None
            }
            Some(Value::Null) => {
                self.reject(field, NULL);
                None
            }
            Some(value) => self.string_value(field, value),
        }
    }

    /// An optional text field that accepts `null`. The outer `None` means absent.
    pub fn nullable_text(&mut self, field: &str) -> Option<Option<String>> {
        match self.data.get(field) {
            None => None,
            Some(Value::Null) => Some(None),
            Some(Value::String(s)) if s.trim().is_empty() => Some(None),
            Some(value) => self.string_value(field, value).map(Some),
        }
    }

    /// An optional primary-key reference that accepts `null`.
    pub fn nullable_pk(&mut self, field: &str) -> Option<Option<i64>> {
        match self.data.get(field) {
            None => None,
            Some(Value::Null) => Some(None),
            Some(Value::Number(n)) if n.as_i64().is_some() => Some(n.as_i64()),
            Some(Value::String(s)) if s.trim().parse::<i64>().is_ok() => {
                Some(s.trim().parse::<i64>().ok())
            }
            Some(Value::String(s)) if s.trim().is_empty() => Some(None),
            Some(value) => {
                let message = format!(
                    "Incorrect type. Expected pk value, received {}.",
                    type_name(value)
                );
                self.reject(field, message);
                None
            }
        }
    }

    /// Runs the `validator` rules on `input` and fails with every collected error.
    pub fn finish<T: Validate>(mut self, input: T) -> Result<T, AppError> {
        if let Err(errors) = input.validate() {
            for (field, messages) in validation_errors(errors) {
                self.errors.entry(field).or_default().extend(messages);
            }
        }
        if self.errors.is_empty() {
            Ok(input)
        } else {
            Err(AppError::Validation(self.errors))
        }
    }
}

impl PostInput {
    pub fn read(fields: &mut Fields<'_>) -> Self {
        Self {
            text: fields.text("text", true),
            image: fields.nullable_text("image"),
            group: fields.nullable_pk("group"),
        }
    }
}

impl CommentInput {
    pub fn read(fields: &mut Fields<'_>) -> Self {
        Self {
            text: fields.text("text", true),
        }
    }
}

impl FollowInput {
    pub fn read(fields: &mut Fields<'_>) -> Self {
        Self {
            following: fields.text("following", true),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn errors_of<T: std::fmt::Debug>(result: Result<T, AppError>) -> FieldErrors {
        match result {
            Err(AppError::Validation(errors)) => errors,
            other => panic!("expected validation errors, got {other:?}"),
        }
    }

    #[test]
    fn missing_text_is_required_unless_partial() {
        let body = json!({});
        let mut fields = Fields::new(&body, false).unwrap();
        let input = PostInput::read(&mut fields);
        let errors = errors_of(fields.finish(input));
        assert_eq!(errors["text"], vec![REQUIRED.to_string()]);

        let mut fields = Fields::new(&body, true).unwrap();
        let input = PostInput::read(&mut fields);
        assert!(fields.finish(input).is_ok());
    }

    #[test]
    fn blank_and_null_text() {
        let body = json!({ "text": "   " });
        let mut fields = Fields::new(&body, false).unwrap();
        let input = CommentInput::read(&mut fields);
        assert_eq!(errors_of(fields.finish(input))["text"], vec![BLANK.to_string()]);

        let body = json!({ "text": null });
        let mut fields = Fields::new(&body, false).unwrap();
        let input = CommentInput::read(&mut fields);
        assert_eq!(errors_of(fields.finish(input))["text"], vec![NULL.to_string()]);
    }

    #[test]
    fn comment_text_is_capped() {
        let body = json!({ "text": "x".repeat(301) });
        let mut fields = Fields::new(&body, false).unwrap();
        let input = CommentInput::read(&mut fields);
        assert_eq!(
            errors_of(fields.finish(input))["text"],
            vec!["Ensure this field has no more than 300 characters.".to_string()]
        );
    }

    #[test]
    fn group_accepts_ids_and_null() {
        let body = json!({ "text": "hi", "group": "7", "image": null });
        let mut fields = Fields::new(&body, false).unwrap();
        let input = PostInput::read(&mut fields);
        let input = fields.finish(input).unwrap();
        assert_eq!(input.group, Some(Some(7)));
        assert_eq!(input.image, Some(None));

        let body = json!({ "text": "hi", "group": [1] });
        let mut fields = Fields::new(&body, false).unwrap();
        let input = PostInput::read(&mut fields);
        assert_eq!(
            errors_of(fields.finish(input))["group"],
            vec!["Incorrect type. Expected pk value, received list.".to_string()]
        );
    }

    #[test]
    fn numbers_are_coerced_to_text() {
        let body = json!({ "following": 42 });
        let mut fields = Fields::new(&body, false).unwrap();
        let input = FollowInput::read(&mut fields);
        assert_eq!(fields.finish(input).unwrap().following.as_deref(), Some("42"));
    }

    #[test]
    fn non_object_body() {
        let body = json!(["text"]);
        let errors = errors_of(Fields::new(&body, false).map(|_| ()));
        assert_eq!(
            errors["non_field_errors"],
            vec!["Invalid data. Expected a dictionary, but got list.".to_string()]
        );
    }
}
