use std::fmt::Write;

use crate::post::Post;
use crate::text::head_chars;

pub const MAX_POSTS_PER_ANALYSIS: usize = 50;
const ANSWER_CHARS: usize = 500;
const FOLLOWUP_CHARS: usize = 200;
const MAX_FOLLOWUPS: usize = 3;

const TEMPLATE: &str = r#"You are an expert educational analyst helping TAs and instructors improve their course problem sets based on student feedback from Piazza.

Analyze the following student posts about {assignment} - {problem}. These posts include questions, discussions, and feedback from students.

For each post, I've included:
- Title and content
- Any answers and followups
- Whether the question was resolved

Based on this data, provide a comprehensive analysis with the following structure:

1. **Sentiment Analysis** (1-5 scale where 1=very negative, 5=very positive)
   - Overall score
   - Brief justification

2. **Common Issues** (list the top 3-5 confusion points or difficulties students faced)
   - Be specific about what students struggled with
   - Include approximate frequency if multiple students mentioned the same issue

3. **Actionable Suggestions** (provide 3-5 concrete recommendations)
   - How to improve the problem statement
   - Additional resources or hints that could help
   - Changes to make for future iterations

4. **Summary Statistics**
   - Total posts analyzed
   - Resolution rate
   - Key themes

Return your analysis as a valid JSON object with the following structure:
{
    "sentiment": {
        "score": <float 1-5>,
        "summary": "<brief justification>"
    },
    "common_issues": [
        {
            "issue": "<description>",
            "frequency": "<how many students mentioned this>",
            "severity": "<low/medium/high>"
        }
    ],
    "suggestions": [
        {
            "suggestion": "<actionable recommendation>",
            "priority": "<low/medium/high>",
            "effort": "<low/medium/high>"
        }
    ],
    "statistics": {
        "total_posts": <int>,
        "resolved_count": <int>,
        "key_themes": ["<theme1>", "<theme2>"]
    }
}

STUDENT POSTS:
{posts}

Return ONLY the JSON object, no additional text or markdown formatting."#;

fn or_default<'a>(s: &'a str, fallback: &'a str) -> &'a str {
    if s.is_empty() {
        fallback
    } else {
        s
    }
}

/// Render up to [`MAX_POSTS_PER_ANALYSIS`] posts as plain text blocks.
pub fn format_posts(posts: &[Post]) -> String {
    let mut blocks = Vec::new();

    for (i, post) in posts.iter().take(MAX_POSTS_PER_ANALYSIS).enumerate() {
        let mut block = String::new();
        let _ = writeln!(block, "--- Post {} ---", i + 1);
        let _ = writeln!(block, "Title: {}", or_default(&post.title, "No title"));
        let _ = writeln!(block, "Content: {}", or_default(&post.content, "No content"));
        let _ = writeln!(block, "Type: {}", or_default(&post.post_type, "unknown"));
        let _ = writeln!(block, "Resolved: {}", if post.is_resolved { "Yes" } else { "No" });
        let _ = writeln!(block, "Views: {}", post.unique_views);

        if !post.answers.is_empty() {
            block.push_str("\nAnswers:\n");
            for ans in &post.answers {
                let _ = writeln!(
                    block,
                    "  [{}]: {}",
                    or_default(&ans.kind, "unknown"),
                    head_chars(&ans.content, ANSWER_CHARS)
                );
            }
        }

        if !post.followups.is_empty() {
            block.push_str("\nFollowups:\n");
            for fu in post.followups.iter().take(MAX_FOLLOWUPS) {
                let _ = writeln!(block, "  - {}", head_chars(&fu.content, FOLLOWUP_CHARS));
            }
        }

        blocks.push(block);
    }

    blocks.join("\n")
}

pub fn build_prompt(assignment: &str, problem: &str, posts: &[Post]) -> String {
    TEMPLATE
        .replacen("{assignment}", assignment, 1)
        .replacen("{problem}", problem, 1)
        .replacen("{posts}", &format_posts(posts), 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::post::{Answer, Followup};

    #[test]
    fn caps_post_count() {
        let posts = vec![Post::default(); MAX_POSTS_PER_ANALYSIS + 10];
        let text = format_posts(&posts);
        assert!(text.contains(&format!("--- Post {} ---", MAX_POSTS_PER_ANALYSIS)));
        assert!(!text.contains(&format!("--- Post {} ---", MAX_POSTS_PER_ANALYSIS + 1)));
    }

    #[test]
    fn placeholders_for_empty_fields() {
        let text = format_posts(&[Post::default()]);
        assert!(text.contains("Title: No title"));
        assert!(text.contains("Content: No content"));
        assert!(text.contains("Type: unknown"));
        assert!(text.contains("Resolved: No"));
        assert!(!text.contains("Answers:"));
    }

    #[test]
    fn truncates_answers_and_followups() {
        let post = Post {
            title: "pset1 q2".into(),
            is_resolved: true,
            answers: vec![Answer {
                kind: "instructor".into(),
                content: "a".repeat(800),
                ..Answer::default()
            }],
            followups: (0..5)
                .map(|i| Followup {
                    content: format!("fu{} {}", i, "b".repeat(300)),
                    ..Followup::default()
                })
                .collect(),
            ..Post::default()
        };
        let text = format_posts(&[post]);
        assert!(text.contains(&format!("  [instructor]: {}\n", "a".repeat(500))));
        assert!(text.contains("  - fu2 "));
        assert!(!text.contains("fu3"));
        assert!(!text.contains(&"b".repeat(200)));
    }

    #[test]
    fn prompt_names_bucket() {
        let prompt = build_prompt("pset2", "problem3a", &[Post::default()]);
        assert!(prompt.contains("about pset2 - problem3a."));
        assert!(prompt.contains("--- Post 1 ---"));
        assert!(prompt.contains("\"sentiment\": {"));
        assert!(!prompt.contains("{posts}"));
    }
}
