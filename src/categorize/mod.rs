pub mod extract;
pub mod filter;
pub mod patterns;
pub mod stats;
pub mod tree;

use std::fmt::Write;

use crate::post::Post;
use extract::{extract_assignment, extract_problem};
use patterns::PatternSet;
pub use tree::CategoryTree;
use tree::{ALL, GENERAL, UNCATEGORIZED};

/// Where a single post lands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub assignment: Option<String>,
    pub problem: Option<String>,
}

impl Route {
    /// Bucket keys for this route. A problem id without an assignment is dropped.
    pub fn bucket(&self) -> (&str, &str) {
        match (&self.assignment, &self.problem) {
            (Some(a), Some(p)) => (a.as_str(), p.as_str()),
            (Some(a), None) => (a.as_str(), GENERAL),
            (None, _) => (UNCATEGORIZED, ALL),
        }
    }
}

/// Sorts posts into assignment/problem buckets using a fixed pattern set.
pub struct Categorizer {
    patterns: PatternSet,
}

impl Categorizer {
    pub fn new(patterns: PatternSet) -> Self {
        Self { patterns }
    }

    pub fn route(&self, post: &Post) -> Route {
        Route {
            assignment: extract_assignment(post, &self.patterns.assignment),
            problem: extract_problem(post, &self.patterns.problem),
        }
    }

    /// Build the category tree. Uncategorized posts are collected last.
    pub fn categorize(&self, posts: &[Post]) -> CategoryTree {
        let mut tree = CategoryTree::new();
        let mut uncategorized = Vec::new();

        for post in posts {
            let route = self.route(post);
            match route.bucket() {
                (UNCATEGORIZED, _) => uncategorized.push(post.clone()),
                (assignment, problem) => tree.push(assignment, problem, post.clone()),
            }
        }

        tree.insert_bucket(UNCATEGORIZED, ALL, uncategorized);
        tree
    }
}

/// Per-assignment and per-problem counts, keys sorted.
pub fn format_summary(tree: &CategoryTree) -> String {
    let mut out = String::from("Categorization Summary:\n");

    let mut assignments: Vec<_> = tree.assignments().collect();
    assignments.sort_by(|a, b| a.0.cmp(b.0));

    for (assignment, problems) in assignments {
        let count: usize = problems.values().map(Vec::len).sum();
        let _ = writeln!(out, "  {}: {} posts", assignment, count);

        let mut keys: Vec<_> = problems.iter().collect();
        keys.sort_by(|a, b| a.0.cmp(b.0));
        for (problem, posts) in keys {
            let _ = writeln!(out, "    - {}: {} posts", problem, posts.len());
        }
    }

    let _ = write!(out, "Total categorized: {} posts", tree.total_posts());
    out
}

// ── Tests ──
