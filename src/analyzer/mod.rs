pub mod anthropic;
pub mod prompt;
pub mod report;

use anyhow::{Context, Result};
use indexmap::IndexMap;
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::categorize::tree::UNCATEGORIZED;
use crate::categorize::CategoryTree;
use crate::post::Post;
use anthropic::AnthropicClient;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Sentiment {
    /// 1 (very negative) to 5 (very positive); absent when nothing was analyzed.
    pub score: Option<f64>,
    #[serde(default)]
    pub summary: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub issue: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub frequency: String,
    #[serde(default = "medium")]
    pub severity: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    pub suggestion: String,
    #[serde(default = "medium")]
    pub priority: String,
    #[serde(default = "medium")]
    pub effort: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisStats {
    pub total_posts: usize,
    pub resolved_count: usize,
    pub key_themes: Vec<String>,
}

/// Feedback for one (assignment, problem) bucket, as returned by the model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    pub sentiment: Sentiment,
    pub common_issues: Vec<Issue>,
    pub suggestions: Vec<Suggestion>,
    #[serde(default)]
    pub statistics: AnalysisStats,
}

impl Analysis {
    fn empty() -> Self {
        Self {
            sentiment: Sentiment {
                score: None,
                summary: "No posts to analyze".into(),
            },
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BucketAnalysis {
    Failed {
        error: String,
        #[serde(default)]
        raw_response: Option<String>,
    },
    Done(Analysis),
}

pub type AnalysisResults = IndexMap<String, IndexMap<String, BucketAnalysis>>;

fn medium() -> String {
    "medium".into()
}

fn string_or_number<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    })
}

/// Drop a surrounding Markdown code fence (```json ... ```), if any.
fn strip_fence(text: &str) -> &str {
    let text = text.trim();
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let body = match rest.find("```") {
        Some(end) => &rest[..end],
        None => rest,
    };
    body.strip_prefix("json").unwrap_or(body).trim()
}

/// Parse and shape-check a model reply.
pub fn parse_analysis(text: &str) -> Result<Analysis> {
    serde_json::from_str(strip_fence(text)).context("Failed to parse LLM response as analysis JSON")
}

pub struct FeedbackAnalyzer {
    client: AnthropicClient,
}

impl FeedbackAnalyzer {
    pub fn new(client: AnthropicClient) -> Self {
        Self { client }
    }

    /// Analyze one bucket. Failures are recorded, not raised, so one bad
    /// reply does not sink the whole run.
    pub async fn analyze_problem(&self, assignment: &str, problem: &str, posts: &[Post]) -> BucketAnalysis {
        if posts.is_empty() {
            return BucketAnalysis::Done(Analysis::empty());
        }

        let prompt = prompt::build_prompt(assignment, problem, posts);
        let reply = match self.client.complete(&prompt).await {
            Ok(r) => r,
            Err(e) => {
                warn!("LLM analysis failed for {}/{}: {:#}", assignment, problem, e);
                return BucketAnalysis::Failed {
                    error: format!("{:#}", e),
                    raw_response: None,
                };
            }
        };

        match parse_analysis(&reply) {
            Ok(analysis) => BucketAnalysis::Done(analysis),
            Err(e) => {
                warn!("{}/{}: {:#}", assignment, problem, e);
                BucketAnalysis::Failed {
                    error: "Failed to parse response".into(),
                    raw_response: Some(reply),
                }
            }
        }
    }

    /// Analyze every bucket except `uncategorized`, in tree order.
    pub async fn analyze_all(&self, tree: &CategoryTree) -> Result<AnalysisResults> {
        let targets: Vec<_> = tree
            .buckets()
            .filter(|(assignment, _, _)| *assignment != UNCATEGORIZED)
            .collect();
        info!("Analyzing {} buckets with {}", targets.len(), self.client.model());

        let pb = ProgressBar::new(targets.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] {pos}/{len} {msg}")?,
        );

        let mut results = AnalysisResults::new();
        for (assignment, problem, posts) in targets {
            pb.set_message(format!("{}/{}", assignment, problem));
            let analysis = self.analyze_problem(assignment, problem, posts).await;
            results
                .entry(assignment.to_string())
                .or_default()
                .insert(problem.to_string(), analysis);
            pb.inc(1);
        }

        pb.finish_and_clear();
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REPLY: &str = r#"{
        "sentiment": {"score": 3.5, "summary": "Mixed"},
        "common_issues": [
            {"issue": "Unclear notation", "frequency": 4, "severity": "high"},
            {"issue": "Off-by-one in loop"}
        ],
        "suggestions": [{"suggestion": "Add an example", "priority": "high", "effort": "low"}],
        "statistics": {"total_posts": 6, "resolved_count": 5, "key_themes": ["notation"]}
    }"#;

    #[test]
    fn parses_plain_json() {
        let a = parse_analysis(REPLY).unwrap();
        assert_eq!(a.sentiment.score, Some(3.5));
        assert_eq!(a.common_issues[0].frequency, "4");
        assert_eq!(a.common_issues[1].frequency, "");
        assert_eq!(a.common_issues[1].severity, "medium");
        assert_eq!(a.suggestions[0].effort, "low");
        assert_eq!(a.statistics.key_themes, vec!["notation"]);
    }

    #[test]
    fn parses_fenced_json() {
        let fenced = format!("```json\n{}\n```", REPLY);
        assert_eq!(parse_analysis(&fenced).unwrap(), parse_analysis(REPLY).unwrap());
        let bare = format!("```\n{}\n```", REPLY);
        assert!(parse_analysis(&bare).is_ok());
    }

    #[test]
    fn missing_statistics_defaults() {
        let a = parse_analysis(r#"{"sentiment":{"score":2},"common_issues":[],"suggestions":[]}"#).unwrap();
        assert_eq!(a.statistics, AnalysisStats::default());
        assert_eq!(a.sentiment.summary, "");
    }

    #[test]
    fn wrong_shape_is_error() {
        assert!(parse_analysis(r#"{"sentiment": 4}"#).is_err());
        assert!(parse_analysis("Here is my analysis: great").is_err());
    }

    #[test]
    fn bucket_analysis_round_trips_both_variants() {
        let failed = BucketAnalysis::Failed {
            error: "Failed to parse response".into(),
            raw_response: Some("oops".into()),
        };
        let json = serde_json::to_string(&failed).unwrap();
        assert!(json.contains("\"raw_response\":\"oops\""));
        assert_eq!(serde_json::from_str::<BucketAnalysis>(&json).unwrap(), failed);

        let done = BucketAnalysis::Done(Analysis::empty());
        let json = serde_json::to_string(&done).unwrap();
        assert!(json.contains("No posts to analyze"));
        assert_eq!(serde_json::from_str::<BucketAnalysis>(&json).unwrap(), done);
    }

    #[tokio::test]
    async fn empty_bucket_skips_the_model() {
        let analyzer = FeedbackAnalyzer::new(AnthropicClient::new("unused", "m"));
        let result = analyzer.analyze_problem("pset1", "general", &[]).await;
        assert_eq!(result, BucketAnalysis::Done(Analysis::empty()));
    }
}
