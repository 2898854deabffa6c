use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::text::clean_html;

/// Who wrote a post, as far as the feed payload tells us.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum AuthorRole {
    #[default]
    Student,
    Instructor,
    Ta,
    Anonymous,
}

impl AuthorRole {
    /// Roles kept by `--students-only`.
    pub const STUDENTS: &'static [AuthorRole] = &[AuthorRole::Student, AuthorRole::Anonymous];
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Answer {
    /// "instructor" or "student"
    #[serde(rename = "type")]
    pub kind: String,
    pub content: String,
    pub created_at: String,
    pub endorsements: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Reply {
    pub content: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Followup {
    pub content: String,
    pub created_at: String,
    pub replies: Vec<Reply>,
}

/// A forum post after cleaning. Every field defaults when absent so a
/// partial record still categorizes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Post {
    pub id: String,
    pub nr: i64,
    pub title: String,
    pub content: String,
    #[serde(rename = "type")]
    pub post_type: String,
    pub folders: Vec<String>,
    pub tags: Vec<String>,
    pub author_role: AuthorRole,
    pub created_at: String,
    pub updated_at: String,
    pub num_favorites: i64,
    pub unique_views: i64,
    pub answers: Vec<Answer>,
    pub followups: Vec<Followup>,
    pub is_resolved: bool,
}

// ── Raw payload → Post ──

fn str_field(v: &Value, key: &str) -> String {
    v.get(key)
        .and_then(|s| s.as_str())
        .unwrap_or_default()
        .to_string()
}

fn int_field(v: &Value, key: &str) -> i64 {
    v.get(key).and_then(|n| n.as_i64()).unwrap_or(0)
}

fn str_list(v: &Value, key: &str) -> Vec<String> {
    v.get(key)
        .and_then(|a| a.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|s| s.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

fn children(v: &Value) -> &[Value] {
    v.get("children")
        .and_then(|c| c.as_array())
        .map(Vec::as_slice)
        .unwrap_or_default()
}

fn first_history(v: &Value) -> Option<&Value> {
    v.get("history").and_then(|h| h.as_array()).and_then(|h| h.first())
}

fn author_role(raw: &Value) -> AuthorRole {
    if let Some(author) = first_history(raw) {
        if author.get("anon").and_then(|a| a.as_str()) == Some("full") {
            return AuthorRole::Anonymous;
        }
    }
    if raw.get("bucket_name").and_then(|b| b.as_str()) == Some("Instructors") {
        return AuthorRole::Instructor;
    }
    AuthorRole::Student
}

fn answers(raw: &Value) -> Vec<Answer> {
    children(raw)
        .iter()
        .filter_map(|child| {
            let kind = match child.get("type").and_then(|t| t.as_str()) {
                Some("i_answer") => "instructor",
                Some("s_answer") => "student",
                _ => return None,
            };
            let content = first_history(child)
                .map(|h| str_field(h, "content"))
                .unwrap_or_default();
            Some(Answer {
                kind: kind.to_string(),
                content: clean_html(&content),
                created_at: str_field(child, "created"),
                endorsements: child
                    .get("tag_endorse")
                    .and_then(|e| e.as_array())
                    .map_or(0, Vec::len),
            })
        })
        .collect()
}

fn followups(raw: &Value) -> Vec<Followup> {
    children(raw)
        .iter()
        .filter(|child| child.get("type").and_then(|t| t.as_str()) == Some("followup"))
        .map(|child| Followup {
            content: clean_html(&str_field(child, "subject")),
            created_at: str_field(child, "created"),
            replies: children(child)
                .iter()
                .filter(|r| r.get("type").and_then(|t| t.as_str()) == Some("feedback"))
                .map(|r| Reply {
                    content: clean_html(&str_field(r, "subject")),
                    created_at: str_field(r, "created"),
                })
                .collect(),
        })
        .collect()
}

/// Build a [`Post`] from a `content.get` result payload.
pub fn parse_post(raw: &Value) -> Post {
    let latest = first_history(raw);
    let title = latest.map(|h| str_field(h, "subject")).unwrap_or_default();
    let content = latest.map(|h| str_field(h, "content")).unwrap_or_default();

    Post {
        id: str_field(raw, "id"),
        nr: int_field(raw, "nr"),
        title,
        content: clean_html(&content),
        post_type: str_field(raw, "type"),
        folders: str_list(raw, "folders"),
        tags: str_list(raw, "tags"),
        author_role: author_role(raw),
        created_at: str_field(raw, "created"),
        updated_at: str_field(raw, "updated"),
        num_favorites: int_field(raw, "num_favorites"),
        unique_views: int_field(raw, "unique_views"),
        answers: answers(raw),
        followups: followups(raw),
        is_resolved: int_field(raw, "no_answer") == 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Value {
        json!({
            "id": "kx1",
            "nr": 42,
            "type": "question",
            "folders": ["pset2", "logistics"],
            "tags": ["student"],
            "no_answer": 0,
            "unique_views": 17,
            "history": [{ "subject": "Pset 2 Q1", "content": "<p>Why &amp; how?</p>", "anon": "no" }],
            "children": [
                { "type": "i_answer", "created": "t1", "tag_endorse": [{}, {}],
                  "history": [{ "content": "<b>Because</b>" }] },
                { "type": "s_answer", "history": [] },
                { "type": "followup", "subject": "follow <i>up</i>", "created": "t2",
                  "children": [
                      { "type": "feedback", "subject": "reply one" },
                      { "type": "other", "subject": "ignored" }
                  ] }
            ]
        })
    }

    #[test]
    fn parses_full_payload() {
        let p = parse_post(&sample());
        assert_eq!(p.id, "kx1");
        assert_eq!(p.nr, 42);
        assert_eq!(p.title, "Pset 2 Q1");
        assert_eq!(p.content, "Why & how?");
        assert_eq!(p.post_type, "question");
        assert_eq!(p.folders, vec!["pset2", "logistics"]);
        assert_eq!(p.author_role, AuthorRole::Student);
        assert!(p.is_resolved);
        assert_eq!(p.unique_views, 17);

        assert_eq!(p.answers.len(), 2);
        assert_eq!(p.answers[0].kind, "instructor");
        assert_eq!(p.answers[0].content, "Because");
        assert_eq!(p.answers[0].endorsements, 2);
        assert_eq!(p.answers[1].kind, "student");
        assert_eq!(p.answers[1].content, "");

        assert_eq!(p.followups.len(), 1);
        assert_eq!(p.followups[0].content, "follow up");
        assert_eq!(p.followups[0].replies.len(), 1);
        assert_eq!(p.followups[0].replies[0].content, "reply one");
    }

    #[test]
    fn author_role_detection() {
        let anon = json!({ "history": [{ "anon": "full" }], "bucket_name": "Instructors" });
        assert_eq!(parse_post(&anon).author_role, AuthorRole::Anonymous);

        let instr = json!({ "history": [{ "anon": "no" }], "bucket_name": "Instructors" });
        assert_eq!(parse_post(&instr).author_role, AuthorRole::Instructor);
    }

    #[test]
    fn empty_payload_defaults() {
        let p = parse_post(&json!({}));
        assert_eq!(p, Post { is_resolved: true, ..Post::default() });
    }

    #[test]
    fn unresolved_when_no_answer_set() {
        let p = parse_post(&json!({ "no_answer": 1 }));
        assert!(!p.is_resolved);
    }

    #[test]
    fn deserialize_tolerates_missing_fields() {
        let p: Post = serde_json::from_str(r#"{"title":"hw3","author_role":"ta"}"#).unwrap();
        assert_eq!(p.title, "hw3");
        assert_eq!(p.author_role, AuthorRole::Ta);
        assert!(p.folders.is_empty());
        assert!(!p.is_resolved);
    }
}
