//! Per-endpoint authorization.
//!
//! Every endpoint owns a [`Policy`]: a fixed set of [`Permission`]s that must
//! all pass. The request-level check runs before any object is loaded, the
//! object-level check once the target record is known.

use axum::http::Method;

use crate::error::AppError;
use crate::extractors::Identity;

/// Records with a single owning author.
pub trait Authored {
    fn author_id(&self) -> i64;
}

pub fn is_safe(method: &Method) -> bool {
    matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    /// Reads are open; writes need an authenticated requester.
    AuthenticatedOrReadOnly,
    /// Reads are open; writes on an object need its author.
    AuthorOrReadOnly,
    /// Every method needs an authenticated requester.
    Authenticated,
}

impl Permission {
    pub fn has_permission(self, method: &Method, identity: &Identity) -> bool {
        match self {
            Permission::AuthenticatedOrReadOnly => {
                is_safe(method) || identity.is_authenticated()
            }
            Permission::AuthorOrReadOnly => true,
            Permission::Authenticated => identity.is_authenticated(),
        }
    }

    pub fn has_object_permission(
        self,
        method: &Method,
        identity: &Identity,
        object: &dyn Authored,
    ) -> bool {
        match self {
            Permission::AuthorOrReadOnly => {
                is_safe(method) || identity.user_id() == Some(object.author_id())
            }
            Permission::AuthenticatedOrReadOnly | Permission::Authenticated => true,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Policy(&'static [Permission]);

pub const POSTS: Policy = Policy(&[
    Permission::AuthenticatedOrReadOnly,
    Permission::AuthorOrReadOnly,
]);
pub const COMMENTS: Policy = POSTS;
pub const GROUPS: Policy = Policy(&[Permission::AuthenticatedOrReadOnly]);
pub const FOLLOWS: Policy = Policy(&[Permission::Authenticated]);

impl Policy {
    pub fn permissions(&self) -> &'static [Permission] {
        self.0
    }

    pub fn check(&self, method: &Method, identity: &Identity) -> Result<(), AppError> {
        if self.0.iter().all(|p| p.has_permission(method, identity)) {
            Ok(())
        } else {
            Err(denied(identity))
        }
    }

    pub fn check_object(
        &self,
        method: &Method,
        identity: &Identity,
        object: &dyn Authored,
    ) -> Result<(), AppError> {
        if self
            .0
            .iter()
            .all(|p| p.has_object_permission(method, identity, object))
        {
            Ok(())
        } else {
            Err(denied(identity))
        }
    }
}

// Anonymous requesters are asked to authenticate rather than refused outright.
fn denied(identity: &Identity) -> AppError {
    if identity.is_authenticated() {
        AppError::PermissionDenied
    } else {
        AppError::NotAuthenticated
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::models::User;

    struct Owned(i64);

    impl Authored for Owned {
        fn author_id(&self) -> i64 {
            self.0
        }
    }

    fn user(id: i64) -> Identity {
        Identity::User(User {
            id,
            username: format!("user{id}"),
            is_active: true,
            date_joined: Utc::now(),
        })
    }

    #[test]
    fn anonymous_may_read_but_not_write() {
        assert!(POSTS.check(&Method::GET, &Identity::Anonymous).is_ok());
        assert!(matches!(
            POSTS.check(&Method::POST, &Identity::Anonymous),
            Err(AppError::NotAuthenticated)
        ));
        assert!(matches!(
            FOLLOWS.check(&Method::GET, &Identity::Anonymous),
            Err(AppError::NotAuthenticated)
        ));
    }

    #[test]
    fn only_the_author_may_write() {
        let post = Owned(1);
        assert!(POSTS.check_object(&Method::PATCH, &user(1), &post).is_ok());
        assert!(POSTS.check_object(&Method::GET, &user(2), &post).is_ok());
        assert!(matches!(
            POSTS.check_object(&Method::DELETE, &user(2), &post),
            Err(AppError::PermissionDenied)
        ));
    }

    #[test]
    fn groups_have_no_object_rule() {
        assert_eq!(
            GROUPS.permissions(),
            &[Permission::AuthenticatedOrReadOnly]
        );
        assert!(GROUPS.check_object(&Method::DELETE, &user(2), &Owned(1)).is_ok());
    }
}
