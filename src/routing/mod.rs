//! Route classification.
//!
//! # Data Flow
//! ```text
//! Request path
//!     → matcher.rs (segment-aligned prefix checks)
//!     → RouteTable (first matching entry wins)
//!     → RouteClass { tier, csrf }
//! ```
//!
//! # Design Decisions
//! - The table is static; nothing is inferred from handlers
//! - Unclassified paths get no rate-limit tier but keep CSRF protection

pub mod matcher;

use crate::security::rate_limit::Tier;
use matcher::PathPrefixMatcher;

/// What the pipeline applies to a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteClass {
    pub name: &'static str,
    pub tier: Option<Tier>,
    pub csrf: bool,
}

impl RouteClass {
    pub const UNCLASSIFIED: RouteClass = RouteClass {
        name: "unclassified",
        tier: None,
        csrf: true,
    };
}

#[derive(Debug, Clone)]
struct RouteEntry {
    matcher: PathPrefixMatcher,
    class: RouteClass,
}

/// Ordered prefix → class table.
#[derive(Debug, Clone)]
pub struct RouteTable {
    entries: Vec<RouteEntry>,
}

impl RouteTable {
    /// `/public` → public, `/auth` → auth, `/admin` → admin. All CSRF-protected.
    pub fn standard() -> Self {
        Self::new(vec![
            (
                "/public",
                RouteClass {
                    name: "public",
                    tier: Some(Tier::Public),
                    csrf: true,
                },
            ),
            (
                "/auth",
                RouteClass {
                    name: "auth",
                    tier: Some(Tier::Auth),
                    csrf: true,
                },
            ),
            (
                "/admin",
                RouteClass {
                    name: "admin",
                    tier: Some(Tier::Admin),
                    csrf: true,
                },
            ),
        ])
    }

    pub fn new(entries: Vec<(&str, RouteClass)>) -> Self {
        Self {
            entries: entries
                .into_iter()
                .map(|(prefix, class)| RouteEntry {
                    matcher: PathPrefixMatcher::new(prefix),
                    class,
                })
                .collect(),
        }
    }

    pub fn classify(&self, path: &str) -> RouteClass {
        self.entries
            .iter()
            .find(|e| e.matcher.matches(path))
            .map(|e| e.class)
            .unwrap_or(RouteClass::UNCLASSIFIED)
    }
}

impl Default for RouteTable {
    fn default() -> Self {
        Self::standard()
    }
}
