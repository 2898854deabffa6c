use std::fmt::Write;

use super::{AnalysisResults, BucketAnalysis};

/// Title-case a bucket key: a letter is uppercased when it follows a
/// non-letter and lowercased otherwise, so `problem2a` renders as `Problem2A`.
fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_letter = false;
    for c in s.chars() {
        if c.is_alphabetic() {
            if prev_letter {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            prev_letter = true;
        } else {
            out.push(c);
            prev_letter = false;
        }
    }
    out
}

/// Markdown report over all analyzed buckets, sorted by assignment then problem.
pub fn generate_report(results: &AnalysisResults) -> String {
    let mut out = String::from("# Piazza Feedback Analysis Report\n");

    let mut assignments: Vec<_> = results.iter().collect();
    assignments.sort_by(|a, b| a.0.cmp(b.0));

    for (assignment, problems) in assignments {
        let _ = write!(out, "\n## {}\n", assignment.to_uppercase());

        let mut problems: Vec<_> = problems.iter().collect();
        problems.sort_by(|a, b| a.0.cmp(b.0));

        for (problem, result) in problems {
            let _ = write!(out, "\n### {}\n", title_case(problem));

            let analysis = match result {
                BucketAnalysis::Failed { error, .. } => {
                    let _ = writeln!(out, "*Analysis error: {}*", error);
                    continue;
                }
                BucketAnalysis::Done(a) => a,
            };

            let score = analysis
                .sentiment
                .score
                .map_or_else(|| "N/A".to_string(), |s| s.to_string());
            let _ = writeln!(out, "**Sentiment Score:** {}/5", score);
            let _ = writeln!(out, "> {}", analysis.sentiment.summary);

            if !analysis.common_issues.is_empty() {
                out.push_str("\n**Common Issues:**\n");
                for issue in &analysis.common_issues {
                    let _ = writeln!(out, "- [{}] {}", issue.severity.to_uppercase(), issue.issue);
                }
            }

            if !analysis.suggestions.is_empty() {
                out.push_str("\n**Suggestions:**\n");
                for s in &analysis.suggestions {
                    let _ = writeln!(out, "- [{}] {}", s.priority.to_uppercase(), s.suggestion);
                }
            }

            let _ = writeln!(
                out,
                "\n*Posts analyzed: {}, Resolved: {}*",
                analysis.statistics.total_posts, analysis.statistics.resolved_count
            );
        }
    }

    out
}
