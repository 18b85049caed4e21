use std::fmt;

use crate::models::GraphId;

/// Navigable screens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Landing,
    GraphList,
    Graph(GraphId),
    /// Sign-up when `is_sign_up`, sign-in otherwise.
    SignUp { is_sign_up: bool },
}

impl Route {
    pub fn sign_in() -> Self {
        Route::SignUp { is_sign_up: false }
    }

    pub fn sign_up() -> Self {
        Route::SignUp { is_sign_up: true }
    }

    pub fn requires_session(&self) -> bool {
        matches!(self, Route::GraphList | Route::Graph(_))
    }

    /// Parses a path with optional query string. Unknown paths yield `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        let (path, query) = match raw.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (raw, None),
        };
        let path = path.trim_end_matches('/');

        match path {
            "" => Some(Route::Landing),
            "/graphlist" => Some(Route::GraphList),
            "/signup" => {
                // Missing or unrecognised flag means sign-up.
                let is_sign_up = query
                    .into_iter()
                    .flat_map(|query| query.split('&'))
                    .filter_map(|pair| pair.split_once('='))
                    .find(|(key, _)| *key == "isSignUp")
                    .map(|(_, value)| value != "false")
                    .unwrap_or(true);
                Some(Route::SignUp { is_sign_up })
            }
            _ => {
                let graph_id = path.strip_prefix("/graph/")?;
                if graph_id.is_empty() || graph_id.contains('/') {
                    return None;
                }
                Some(Route::Graph(GraphId::from(graph_id)))
            }
        }
    }

    /// Where a navigation to `self` actually lands for the given session state.
    pub fn resolve(self, signed_in: bool) -> Route {
        match self {
            route if route.requires_session() && !signed_in => Route::sign_in(),
            Route::SignUp { .. } if signed_in => Route::GraphList,
            route => route,
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Route::Landing => f.write_str("/"),
            Route::GraphList => f.write_str("/graphlist"),
            Route::Graph(graph_id) => write!(f, "/graph/{graph_id}"),
            Route::SignUp { is_sign_up } => write!(f, "/signup?isSignUp={is_sign_up}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Route;
    use crate::models::GraphId;

    #[test]
    fn parses_known_paths() {
        assert_eq!(Route::parse("/"), Some(Route::Landing));
        assert_eq!(Route::parse("/graphlist"), Some(Route::GraphList));
        assert_eq!(
            Route::parse("/graph/1718000000000"),
            Some(Route::Graph(GraphId::from("1718000000000")))
        );
        assert_eq!(Route::parse("/signup?isSignUp=false"), Some(Route::sign_in()));
        assert_eq!(Route::parse("/signup"), Some(Route::sign_up()));
        assert_eq!(Route::parse("/graph/"), None);
        assert_eq!(Route::parse("/about"), None);
    }

    #[test]
    fn display_matches_parse() {
        for route in [
            Route::Landing,
            Route::GraphList,
            Route::Graph(GraphId::from("17")),
            Route::sign_in(),
        ] {
            assert_eq!(Route::parse(&route.to_string()), Some(route));
        }
    }

    #[test]
    fn gated_routes_redirect_without_session() {
        assert_eq!(Route::GraphList.resolve(false), Route::sign_in());
        assert_eq!(
            Route::Graph(GraphId::from("17")).resolve(false),
            Route::sign_in()
        );
        assert_eq!(Route::Landing.resolve(false), Route::Landing);
        assert_eq!(Route::sign_up().resolve(true), Route::GraphList);
        assert_eq!(Route::GraphList.resolve(true), Route::GraphList);
    }
}
