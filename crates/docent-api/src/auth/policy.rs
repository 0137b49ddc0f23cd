//! Public/protected route partition
//!
//! A pattern ending in `*` matches by prefix, anything else matches the
//! exact path. Rules are sorted once by specificity, so declaration order
//! never matters:
//!
//! 1. exact before prefix
//! 2. longer pattern before shorter
//! 3. protected before public on a tie
//!
//! The first matching rule decides. Paths no rule matches are protected.

use docent_core::AuthConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Public,
    Protected,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Pattern {
    Exact(String),
    Prefix(String),
}

impl Pattern {
    fn parse(raw: &str) -> Self {
        match raw.trim().strip_suffix('*') {
            Some(prefix) => Pattern::Prefix(prefix.to_string()),
            None => Pattern::Exact(raw.trim().to_string()),
        }
    }

    fn matches(&self, path: &str) -> bool {
        match self {
            Pattern::Exact(exact) => path == exact,
            Pattern::Prefix(prefix) => path.starts_with(prefix.as_str()),
        }
    }

    fn rank(&self) -> (u8, std::cmp::Reverse<usize>) {
        match self {
            Pattern::Exact(p) => (0, std::cmp::Reverse(p.len())),
            Pattern::Prefix(p) => (1, std::cmp::Reverse(p.len())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteRule {
    pattern: Pattern,
    access: Access,
}

impl RouteRule {
    pub fn new(pattern: &str, access: Access) -> Self {
        Self {
            pattern: Pattern::parse(pattern),
            access,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RoutePolicy {
    rules: Vec<RouteRule>,
}

impl RoutePolicy {
    pub fn new(rules: impl IntoIterator<Item = RouteRule>) -> Self {
        let mut rules: Vec<RouteRule> = rules.into_iter().collect();
        rules.sort_by_key(|rule| {
            let (kind, len) = rule.pattern.rank();
            let tie = match rule.access {
                Access::Protected => 0u8,
                Access::Public => 1,
            };
            (kind, len, tie)
        });
        Self { rules }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        let public = config
            .public_routes
            .iter()
            .map(|p| RouteRule::new(p, Access::Public));
        let protected = config
            .protected_routes
            .iter()
            .map(|p| RouteRule::new(p, Access::Protected));
        Self::new(public.chain(protected))
    }

    pub fn classify(&self, path: &str) -> Access {
        self.rules
            .iter()
            .find(|rule| rule.pattern.matches(path))
            .map(|rule| rule.access)
            .unwrap_or(Access::Protected)
    }

    pub fn is_public(&self, path: &str) -> bool {
        self.classify(path) == Access::Public
    }
}

impl Default for RoutePolicy {
    fn default() -> Self {
        Self::from_config(&AuthConfig::default())
    }
}
