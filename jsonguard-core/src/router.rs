//! Simple router: exact path match.

use std::collections::HashMap;

#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub struct RouteId(pub u32);

/// Maps (method, path) -> RouteId. Leading and trailing slashes are ignored.
pub struct Router {
    table: HashMap<(String, String), RouteId>,
}

impl Router {
    pub fn new() -> Self {
        Self {
            table: HashMap::new(),
        }
    }

    pub fn add(&mut self, method: &str, path: &str, id: RouteId) {
        let path = path.trim_matches('/');
        self.table
            .insert((method.to_uppercase(), path.to_owned()), id);
    }

    pub fn match_route(&self, method: &str, path: &str) -> Option<RouteId> {
        let path = path.trim_matches('/');
        self.table
            .get(&(method.to_uppercase(), path.to_owned()))
            .copied()
    }

    /// True if any method is registered for `path` (distinguishes 405 from 404).
    pub fn has_path(&self, path: &str) -> bool {
        let path = path.trim_matches('/');
        self.table.keys().any(|(_, p)| p == path)
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}
