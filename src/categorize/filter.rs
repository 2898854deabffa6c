use crate::post::AuthorRole;

use super::tree::CategoryTree;

/// New tree holding only posts by `allowed` roles. Buckets left empty are
/// dropped, as are assignments with no buckets left.
pub fn filter_by_role(tree: &CategoryTree, allowed: &[AuthorRole]) -> CategoryTree {
    let mut out = CategoryTree::new();
    for (assignment, problem, posts) in tree.buckets() {
        let kept: Vec<_> = posts
            .iter()
            .filter(|p| allowed.contains(&p.author_role))
            .cloned()
            .collect();
        out.insert_bucket(assignment, problem, kept);
    }
    out
}
