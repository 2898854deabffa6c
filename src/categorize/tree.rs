use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::post::Post;

pub const UNCATEGORIZED: &str = "uncategorized";
pub const GENERAL: &str = "general";
pub const ALL: &str = "all";

pub type Bucket = Vec<Post>;
pub type Problems = IndexMap<String, Bucket>;

/// Posts grouped assignment → problem → bucket, in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryTree(IndexMap<String, Problems>);

impl CategoryTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a post, creating the bucket on first use.
    pub(crate) fn push(&mut self, assignment: &str, problem: &str, post: Post) {
        self.0
            .entry(assignment.to_string())
            .or_default()
            .entry(problem.to_string())
            .or_default()
            .push(post);
    }

    /// Insert a whole non-empty bucket.
    pub(crate) fn insert_bucket(&mut self, assignment: &str, problem: &str, posts: Bucket) {
        if posts.is_empty() {
            return;
        }
        self.0
            .entry(assignment.to_string())
            .or_default()
            .insert(problem.to_string(), posts);
    }

    #[cfg(test)]
    pub fn get(&self, assignment: &str, problem: &str) -> Option<&[Post]> {
        self.0
            .get(assignment)
            .and_then(|p| p.get(problem))
            .map(Vec::as_slice)
    }

    #[cfg(test)]
    pub fn assignment(&self, assignment: &str) -> Option<&Problems> {
        self.0.get(assignment)
    }

    pub fn assignments(&self) -> impl Iterator<Item = (&str, &Problems)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Every (assignment, problem, bucket) in tree order.
    pub fn buckets(&self) -> impl Iterator<Item = (&str, &str, &[Post])> {
        self.0.iter().flat_map(|(a, problems)| {
            problems
                .iter()
                .map(move |(p, posts)| (a.as_str(), p.as_str(), posts.as_slice()))
        })
    }

    #[cfg(test)]
    pub fn posts(&self) -> impl Iterator<Item = &Post> {
        self.buckets().flat_map(|(_, _, posts)| posts)
    }

    pub fn total_posts(&self) -> usize {
        self.buckets().map(|(_, _, posts)| posts.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
