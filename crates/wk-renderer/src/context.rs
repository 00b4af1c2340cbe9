//! Per-render context passed to handlers and macro expansion.

use serde::{Deserialize, Serialize};

/// Username of a visitor without a session.
pub const ANONYMOUS: &str = "anonymous";
/// Username of a visitor identified by a cookie but not logged in.
pub const ASSERTED: &str = "asserted";

/// Identity of the user a page is rendered for.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserContext {
    pub username: Option<String>,
    pub display_name: Option<String>,
}

impl UserContext {
    /// An authenticated user.
    #[must_use]
    pub fn named(username: impl Into<String>) -> Self {
        Self {
            username: Some(username.into()),
            display_name: None,
        }
    }

    #[must_use]
    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }
}

/// Authentication state derived from a [`UserContext`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginStatus {
    Anonymous,
    Asserted,
    Authenticated,
}

impl LoginStatus {
    #[must_use]
    pub fn of(user: Option<&UserContext>) -> Self {
        match user.and_then(|u| u.username.as_deref()) {
            None | Some("" | ANONYMOUS) => Self::Anonymous,
            Some(ASSERTED) => Self::Asserted,
            Some(_) => Self::Authenticated,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Anonymous => "Anonymous",
            Self::Asserted => "Asserted",
            Self::Authenticated => "Authenticated",
        }
    }
}

/// Request metadata, carried for plugins and diagnostics only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestInfo {
    pub path: Option<String>,
    pub user_agent: Option<String>,
    pub client_ip: Option<String>,
}

/// Immutable inputs of one render call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseContext {
    pub page_name: String,
    /// Username, or `anonymous` when no user is known.
    pub user_name: String,
    pub user: Option<UserContext>,
    pub request: Option<RequestInfo>,
}

impl ParseContext {
    #[must_use]
    pub fn new(page_name: impl Into<String>) -> Self {
        Self {
            page_name: page_name.into(),
            user_name: ANONYMOUS.to_owned(),
            user: None,
            request: None,
        }
    }

    #[must_use]
    pub fn with_user(mut self, user: UserContext) -> Self {
        self.user_name = user
            .username
            .clone()
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| ANONYMOUS.to_owned());
        self.user = Some(user);
        self
    }

    #[must_use]
    pub fn with_request(mut self, request: RequestInfo) -> Self {
        self.request = Some(request);
        self
    }

    /// Name shown for `$username`.
    pub fn display_user_name(&self) -> String {
        let Some(user) = &self.user else {
            return "Anonymous".to_owned();
        };
        match user.username.as_deref() {
            None | Some("" | ANONYMOUS) => "Anonymous".to_owned(),
            Some(ASSERTED) => user
                .display_name
                .clone()
                .unwrap_or_else(|| "Asserted User".to_owned()),
            Some(name) => user.display_name.clone().unwrap_or_else(|| name.to_owned()),
        }
    }

    pub fn login_status(&self) -> LoginStatus {
        LoginStatus::of(self.user.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_anonymous_by_default() {
        let ctx = ParseContext::new("Welcome");

        assert_eq!(ctx.user_name, "anonymous");
        assert_eq!(ctx.display_user_name(), "Anonymous");
        assert_eq!(ctx.login_status(), LoginStatus::Anonymous);
    }

    #[test]
    fn test_authenticated_user_prefers_display_name() {
        let ctx = ParseContext::new("Welcome")
            .with_user(UserContext::named("jdoe").with_display_name("Jane Doe"));

        assert_eq!(ctx.user_name, "jdoe");
        assert_eq!(ctx.display_user_name(), "Jane Doe");
        assert_eq!(ctx.login_status(), LoginStatus::Authenticated);

        let ctx = ParseContext::new("Welcome").with_user(UserContext::named("jdoe"));
        assert_eq!(ctx.display_user_name(), "jdoe");
    }

    #[test]
    fn test_asserted_user() {
        let ctx = ParseContext::new("Welcome").with_user(UserContext::named(ASSERTED));

        assert_eq!(ctx.display_user_name(), "Asserted User");
        assert_eq!(ctx.login_status().as_str(), "Asserted");
    }

    #[test]
    fn test_explicit_anonymous_user() {
        let ctx = ParseContext::new("Welcome").with_user(UserContext::named(ANONYMOUS));

        assert_eq!(ctx.display_user_name(), "Anonymous");
        assert_eq!(ctx.login_status(), LoginStatus::Anonymous);
    }
}
