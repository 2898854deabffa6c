use regex::Regex;

use crate::post::Post;
use crate::text::head_chars;

/// Only the start of a body is searched; identifiers deep in long posts are
/// usually quotes or links.
pub const ASSIGNMENT_CONTENT_WINDOW: usize = 500;
pub const PROBLEM_CONTENT_WINDOW: usize = 300;

pub const ASSIGNMENT_PREFIX: &str = "pset";
pub const PROBLEM_PREFIX: &str = "problem";

/// First capture of the first pattern (in order) that matches `text`.
fn first_capture<'t>(patterns: &[Regex], text: &'t str) -> Option<&'t str> {
    patterns
        .iter()
        .find_map(|re| re.captures(text).and_then(|c| c.get(1)).map(|m| m.as_str()))
}

/// Try each source text in order; the first text with any matching pattern wins.
fn first_hit<'t, I>(patterns: &[Regex], sources: I) -> Option<&'t str>
where
    I: IntoIterator<Item = &'t str>,
{
    sources
        .into_iter()
        .find_map(|text| first_capture(patterns, text))
}

/// Assignment id from folders → tags → title → head of content.
pub fn extract_assignment(post: &Post, patterns: &[Regex]) -> Option<String> {
    let sources = post
        .folders
        .iter()
        .chain(&post.tags)
        .map(String::as_str)
        .chain([
            post.title.as_str(),
            head_chars(&post.content, ASSIGNMENT_CONTENT_WINDOW),
        ]);
    first_hit(patterns, sources).map(|id| format!("{}{}", ASSIGNMENT_PREFIX, id))
}

/// Problem id from title → folders → head of content. The token is lower-cased.
pub fn extract_problem(post: &Post, patterns: &[Regex]) -> Option<String> {
    let sources = std::iter::once(post.title.as_str())
        .chain(post.folders.iter().map(String::as_str))
        .chain(std::iter::once(head_chars(&post.content, PROBLEM_CONTENT_WINDOW)));
    first_hit(patterns, sources).map(|id| format!("{}{}", PROBLEM_PREFIX, id.to_lowercase()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::categorize::patterns::PatternSet;

    fn post(title: &str, folders: &[&str], tags: &[&str], content: &str) -> Post {
        Post {
            title: title.to_string(),
            folders: folders.iter().map(|s| s.to_string()).collect(),
            tags: tags.iter().map(|s| s.to_string()).collect(),
            content: content.to_string(),
            ..Post::default()
        }
    }

    fn assignment(p: &Post) -> Option<String> {
        extract_assignment(p, &PatternSet::default().assignment)
    }

    fn problem(p: &Post) -> Option<String> {
        extract_problem(p, &PatternSet::default().problem)
    }

    #[test]
    fn folder_beats_title() {
        let p = post("pset9 question", &["pset2 stuff"], &[], "");
        assert_eq!(assignment(&p).as_deref(), Some("pset2"));
    }

    #[test]
    fn tags_beat_title_but_not_folders() {
        let p = post("hw 7", &["logistics"], &["Homework 4"], "");
        assert_eq!(assignment(&p).as_deref(), Some("pset4"));
        let p = post("hw 7", &["hw1"], &["Homework 4"], "");
        assert_eq!(assignment(&p).as_deref(), Some("pset1"));
    }

    #[test]
    fn folders_searched_in_order() {
        let p = post("", &["general", "assignment 5", "pset 6"], &[], "");
        assert_eq!(assignment(&p).as_deref(), Some("pset5"));
    }

    #[test]
    fn pattern_order_within_field() {
        // "problem set" is listed before "hw", so it wins within the same title
        let p = post("Problem Set 3 hw 8", &[], &[], "");
        assert_eq!(assignment(&p).as_deref(), Some("pset3"));
    }

    #[test]
    fn number_is_verbatim() {
        let p = post("PSET 01", &[], &[], "");
        assert_eq!(assignment(&p).as_deref(), Some("pset01"));
    }

    #[test]
    fn assignment_content_window() {
        let mut body = "x".repeat(600);
        body.push_str(" pset 4");
        assert_eq!(assignment(&post("", &[], &[], &body)), None);

        let mut body = "y".repeat(480);
        body.push_str(" pset 4");
        // "pset 4" ends at char 487, inside the window
        assert_eq!(assignment(&post("", &[], &[], &body)).as_deref(), Some("pset4"));
    }

    #[test]
    fn window_counts_chars_not_bytes() {
        // 490 two-byte chars put the match past byte 500 but inside char 500
        let mut body = "é".repeat(490);
        body.push_str("hw2");
        assert_eq!(assignment(&post("", &[], &[], &body)).as_deref(), Some("pset2"));
    }

    #[test]
    fn problem_title_first_then_folders() {
        let p = post("Question 2a clarification", &["part 7"], &[], "");
        assert_eq!(problem(&p).as_deref(), Some("problem2a"));
        let p = post("stuck", &["pset1", "Part 3B"], &[], "");
        assert_eq!(problem(&p).as_deref(), Some("problem3b"));
    }

    #[test]
    fn problem_ignores_tags() {
        let p = post("stuck", &[], &["q4"], "");
        assert_eq!(problem(&p), None);
    }

    #[test]
    fn problem_variants() {
        assert_eq!(problem(&post("Q1.2", &[], &[], "")).as_deref(), Some("problem1.2"));
        assert_eq!(problem(&post("prob. 5", &[], &[], "")).as_deref(), Some("problem5"));
        assert_eq!(problem(&post("about (3c)", &[], &[], "")).as_deref(), Some("problem3c"));
    }

    #[test]
    fn problem_content_window() {
        let mut body = "z ".repeat(200);
        body.push_str("question 6");
        assert_eq!(problem(&post("", &[], &[], &body)), None);
        assert_eq!(problem(&post("", &[], &[], "see question 6")).as_deref(), Some("problem6"));
    }

    #[test]
    fn problem_window_boundary() {
        // "q7" occupies chars 298..300, the last two inside the window
        let body = format!("{}q7", "y".repeat(298));
        assert_eq!(problem(&post("", &[], &[], &body)).as_deref(), Some("problem7"));

        // the digit falls on char 300, just outside
        let body = format!("{}q7", "y".repeat(299));
        assert_eq!(problem(&post("", &[], &[], &body)), None);

        let body = format!("{}q7", "y".repeat(300));
        assert_eq!(problem(&post("", &[], &[], &body)), None);
    }

    #[test]
    fn no_match_is_none() {
        let p = post("random", &["logistics"], &["other"], "nothing here");
        assert_eq!(assignment(&p), None);
    }
}
