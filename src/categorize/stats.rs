use indexmap::IndexMap;
use serde::Serialize;

use super::tree::{CategoryTree, UNCATEGORIZED};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Statistics {
    pub total_posts: usize,
    /// Assignment keys, not counting `uncategorized`.
    pub total_psets: usize,
    pub posts_by_pset: IndexMap<String, usize>,
    pub posts_by_type: IndexMap<String, usize>,
    pub resolved_count: usize,
    pub unresolved_count: usize,
    pub total_answers: usize,
    pub total_followups: usize,
}

pub fn compute_statistics(tree: &CategoryTree) -> Statistics {
    let mut stats = Statistics::default();

    for (assignment, problems) in tree.assignments() {
        if assignment != UNCATEGORIZED {
            stats.total_psets += 1;
        }

        let mut count = 0;
        for post in problems.values().flatten() {
            count += 1;
            let kind = if post.post_type.is_empty() {
                "unknown"
            } else {
                post.post_type.as_str()
            };
            *stats.posts_by_type.entry(kind.to_string()).or_default() += 1;

            if post.is_resolved {
                stats.resolved_count += 1;
            } else {
                stats.unresolved_count += 1;
            }
            stats.total_answers += post.answers.len();
            stats.total_followups += post.followups.len();
        }

        stats.total_posts += count;
        stats.posts_by_pset.insert(assignment.to_string(), count);
    }

    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::categorize::tree::{ALL, GENERAL};
    use crate::post::{Answer, Followup, Post};

    fn p(kind: &str, resolved: bool, answers: usize, followups: usize) -> Post {
        Post {
            post_type: kind.to_string(),
            is_resolved: resolved,
            answers: vec![Answer::default(); answers],
            followups: vec![Followup::default(); followups],
            ..Post::default()
        }
    }

    #[test]
    fn counts_exclude_uncategorized_key() {
        let mut tree = CategoryTree::new();
        for i in 0..5 {
            let bucket = if i < 2 { GENERAL } else { "problem1" };
            tree.push("pset1", bucket, p("question", i < 3, 1, 0));
        }
        tree.push(UNCATEGORIZED, ALL, p("note", false, 0, 2));
        tree.push(UNCATEGORIZED, ALL, p("", false, 0, 1));

        let s = compute_statistics(&tree);
        assert_eq!(s.total_psets, 1);
        assert_eq!(s.total_posts, 7);
        assert_eq!(s.resolved_count, 3);
        assert_eq!(s.unresolved_count, 4);
        assert_eq!(s.total_answers, 5);
        assert_eq!(s.total_followups, 3);
        assert_eq!(s.posts_by_pset.get("pset1"), Some(&5));
        assert_eq!(s.posts_by_pset.get(UNCATEGORIZED), Some(&2));
        assert_eq!(s.posts_by_type.get("question"), Some(&5));
        assert_eq!(s.posts_by_type.get("note"), Some(&1));
        assert_eq!(s.posts_by_type.get("unknown"), Some(&1));
    }

    #[test]
    fn empty_tree() {
        assert_eq!(compute_statistics(&CategoryTree::new()), Statistics::default());
    }
}
