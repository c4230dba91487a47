//! Portal route table and navigation entries.
//!
//! Paths without an entry are public. Pattern segments starting with `:` match
//! any single non-empty path segment.

use crate::session::{
    guard::{Decision, RequiredRoles, RouteGuard},
    role::Role,
    state::Session,
};
use serde::Serialize;

#[derive(Clone, Debug)]
struct ProtectedRoute {
    pattern: &'static str,
    roles: RequiredRoles,
}

#[derive(Clone, Debug, Default)]
pub struct RouteTable {
    routes: Vec<ProtectedRoute>,
}

impl RouteTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Protects `pattern` behind `roles`.
    #[must_use]
    pub fn protect(mut self, pattern: &'static str, roles: RequiredRoles) -> Self {
        self.routes.push(ProtectedRoute { pattern, roles });
        self
    }

    /// Routes of the internship portal.
    #[must_use]
    pub fn portal() -> Self {
        let student = [
            "/student/dashboard",
            "/student/profile",
            "/student/mentors",
            "/student/applications",
        ];
        let mentor = ["/mentor/dashboard", "/mentor/profile", "/mentors/:id"];
        let admin = [
            "/admin/dashboard",
            "/admin/internships/new",
            "/admin/internships/edit/:id",
        ];

        let mut table = Self::new();
        for (patterns, role) in [
            (&student[..], Role::Student),
            (&mentor[..], Role::Mentor),
            (&admin[..], Role::Admin),
        ] {
            for &pattern in patterns {
                table = table.protect(pattern, RequiredRoles::only([role]));
            }
        }
        table
    }

    /// Roles required for `path`, or `None` if the path is public.
    #[must_use]
    pub fn required_roles(&self, path: &str) -> Option<&RequiredRoles> {
        let path = strip_query(path);
        self.routes
            .iter()
            .find(|route| matches_pattern(route.pattern, path))
            .map(|route| &route.roles)
    }

    /// Public paths always render; protected ones go through the guard.
    #[must_use]
    pub fn resolve(&self, path: &str, guard: &RouteGuard) -> Decision {
        self.required_roles(path)
            .map_or(Decision::Render, |roles| guard.authorize(roles))
    }
}

fn strip_query(path: &str) -> &str {
    path.split(['?', '#']).next().unwrap_or(path)
}

fn matches_pattern(pattern: &str, path: &str) -> bool {
    let mut expected = pattern.trim_end_matches('/').split('/');
    let mut actual = path.trim_end_matches('/').split('/');
    loop {
        match (expected.next(), actual.next()) {
            (None, None) => return true,
            (Some(want), Some(got)) => {
                let param = want.starts_with(':') && !got.is_empty();
                if !param && want != got {
                    return false;
                }
            }
            _ => return false,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NavAction {
    Navigate(&'static str),
    Logout,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct NavLink {
    pub label: &'static str,
    pub action: NavAction,
}

impl NavLink {
    const fn to(label: &'static str, path: &'static str) -> Self {
        Self {
            label,
            action: NavAction::Navigate(path),
        }
    }

    const fn logout() -> Self {
        Self {
            label: "Logout",
            action: NavAction::Logout,
        }
    }
}

/// Navbar entries for the current session. Pending sessions get the public set.
#[must_use]
pub fn nav_links(session: &Session) -> Vec<NavLink> {
    match session.role() {
        None => vec![
            NavLink::to("Internships", "/internships"),
            NavLink::to("Login", "/login"),
            NavLink::to("Register", "/register"),
        ],
        Some(Role::Student) => vec![
            NavLink::to("Dashboard", Role::Student.home_path()),
            NavLink::to("Internships", "/internships"),
            NavLink::to("My Mentors", "/student/mentors"),
            NavLink::to("Profile", "/student/profile"),
            NavLink::logout(),
        ],
        Some(Role::Mentor) => vec![
            NavLink::to("Dashboard", Role::Mentor.home_path()),
            NavLink::to("Profile", "/mentor/profile"),
            NavLink::logout(),
        ],
        Some(Role::Admin) => vec![
            NavLink::to("Dashboard", Role::Admin.home_path()),
            NavLink::logout(),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::state::{SessionStore, SessionUser};

    fn user(role: Role) -> SessionUser {
        SessionUser {
            subject: "alice".to_string(),
            role,
        }
    }

    #[test]
    fn public_paths_have_no_requirement() {
        let table = RouteTable::portal();
        for path in ["/", "/login", "/register", "/internships", "/internships/7", "/unauthorized"] {
            assert!(table.required_roles(path).is_none(), "{path} should be public");
        }
    }

    #[test]
    fn protected_paths_map_to_roles() {
        let table = RouteTable::portal();
        let cases = [
            ("/student/dashboard", Role::Student),
            ("/student/applications/", Role::Student),
            ("/mentors/42", Role::Mentor),
            ("/mentor/profile?tab=bio", Role::Mentor),
            ("/admin/internships/edit/9", Role::Admin),
        ];
        for (path, role) in cases {
            let roles = table.required_roles(path).expect("protected path");
            assert_eq!(roles.iter().collect::<Vec<_>>(), vec![role], "{path}");
        }
    }

    #[test]
    fn patterns_match_whole_segments_only() {
        let table = RouteTable::portal();
        assert!(table.required_roles("/student/dashboards").is_none());
        assert!(table.required_roles("/mentors/").is_none());
        assert!(table.required_roles("/mentors/1/extra").is_none());
        assert!(table.required_roles("/admin/internships/edit").is_none());
    }

    #[test]
    fn resolve_guards_protected_paths_only() {
        let store = SessionStore::new();
        let guard = RouteGuard::new(store.clone());
        let table = RouteTable::portal();

        assert_eq!(table.resolve("/internships", &guard), Decision::Render);
        assert_eq!(table.resolve("/admin/dashboard", &guard), Decision::Pending);

        store.set(Some(user(Role::Student)));
        assert_eq!(table.resolve("/student/profile", &guard), Decision::Render);
        assert_eq!(
            table.resolve("/admin/dashboard", &guard),
            Decision::RedirectToForbidden
        );

        store.set(None);
        assert_eq!(
            table.resolve("/student/profile", &guard),
            Decision::RedirectToLogin
        );
    }

    #[test]
    fn nav_links_follow_role() {
        let labels = |session: &Session| -> Vec<&'static str> {
            nav_links(session).iter().map(|link| link.label).collect()
        };

        assert_eq!(labels(&Session::pending()), ["Internships", "Login", "Register"]);
        assert_eq!(labels(&Session::anonymous()), ["Internships", "Login", "Register"]);
        assert_eq!(
            labels(&Session::authenticated(user(Role::Student))),
            ["Dashboard", "Internships", "My Mentors", "Profile", "Logout"]
        );
        assert_eq!(
            labels(&Session::authenticated(user(Role::Mentor))),
            ["Dashboard", "Profile", "Logout"]
        );

        let admin = nav_links(&Session::authenticated(user(Role::Admin)));
        assert_eq!(admin[0].action, NavAction::Navigate("/admin/dashboard"));
        assert_eq!(admin[1].action, NavAction::Logout);
    }
}
