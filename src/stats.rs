use chrono::NaiveDate;
use std::collections::HashMap;

use crate::models::RepoActivity;

/// Commit counts per author, most active first. Ties break alphabetically
/// so the ordering is stable.
pub fn contributor_stats(activity: &RepoActivity) -> Vec<(String, usize)> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for commit in &activity.commits {
        *counts.entry(commit.author.as_str()).or_default() += 1;
    }

    let mut stats: Vec<(String, usize)> = counts
        .into_iter()
        .map(|(author, count)| (author.to_string(), count))
        .collect();
    stats.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    stats
}

/// Commits per calendar day, oldest first. Undated commits are skipped.
pub fn daily_commit_activity(activity: &RepoActivity) -> Vec<(NaiveDate, usize)> {
    let mut counts: HashMap<NaiveDate, usize> = HashMap::new();
    for commit in &activity.commits {
        if let Some(date) = commit.date {
            *counts.entry(date.date_naive()).or_default() += 1;
        }
    }

    let mut daily: Vec<(NaiveDate, usize)> = counts.into_iter().collect();
    daily.sort_by_key(|(date, _)| *date);
    daily
}

/// Markdown overview of a snapshot: counts, latest releases, top
/// contributors, notable issues and pull requests.
pub fn overview_report(activity: &RepoActivity) -> String {
    let contributors = contributor_stats(activity);

    let mut report = format!(
        "# Activity Summary for {} over the past {} days\n\n",
        activity.repo_name, activity.time_period_days
    );
    report.push_str("## Overview\n");
    report.push_str(&format!("- Total commits: {}\n", activity.commits.len()));
    report.push_str(&format!("- New issues: {}\n", activity.issues.len()));
    report.push_str(&format!(
        "- Pull requests: {}\n",
        activity.pull_requests.len()
    ));
    report.push_str(&format!("- New releases: {}\n", activity.releases.len()));
    report.push_str(&format!("- Active contributors: {}\n\n", contributors.len()));

    if !activity.releases.is_empty() {
        report.push_str("## Latest Releases\n");
        for release in activity.releases.iter().take(3) {
            let date = release
                .published_at
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_else(|| "unpublished".to_string());
            report.push_str(&format!(
                "- {} - {} (released on {})\n",
                release.tag_name, release.name, date
            ));
        }
        report.push('\n');
    }

    if !contributors.is_empty() {
        report.push_str("## Top Contributors\n");
        for (author, count) in contributors.iter().take(5) {
            report.push_str(&format!("- {}: {} commits\n", author, count));
        }
        report.push('\n');
    }

    if !activity.issues.is_empty() {
        report.push_str("## Notable Issues\n");
        for issue in activity.issues.iter().take(5) {
            report.push_str(&format!(
                "- #{} - {} (created on {} by {})\n",
                issue.number,
                issue.title,
                issue.created_at.format("%Y-%m-%d"),
                issue.author
            ));
        }
        report.push('\n');
    }

    if !activity.pull_requests.is_empty() {
        report.push_str("## Notable Pull Requests\n");
        for pr in activity.pull_requests.iter().take(5) {
            report.push_str(&format!(
                "- #{} - {} (created on {} by {})\n",
                pr.number,
                pr.title,
                pr.created_at.format("%Y-%m-%d"),
                pr.author
            ));
        }
        report.push('\n');
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CommitRecord, IssueRecord, ReleaseRecord, RepoActivity, RepoInfo};
    use chrono::{TimeZone, Utc};

    fn commit(author: &str, day: u32) -> CommitRecord {
        CommitRecord {
            sha: format!("sha-{}-{}", author, day),
            author: author.to_string(),
            date: Some(Utc.with_ymd_and_hms(2024, 3, day, 12, 0, 0).unwrap()),
            message: "change".to_string(),
            url: String::new(),
        }
    }

    fn activity(commits: Vec<CommitRecord>) -> RepoActivity {
        RepoActivity {
            repo_name: "owner/repo".to_string(),
            repo_info: RepoInfo {
                full_name: "owner/repo".to_string(),
                description: None,
                stars: 0,
                forks: 0,
                open_issues: 0,
                url: String::new(),
            },
            commits,
            issues: vec![],
            pull_requests: vec![],
            releases: vec![],
            time_period_days: 7,
            collection_date: Utc::now(),
        }
    }

    #[test]
    fn test_contributor_stats_sorted() {
        let activity = activity(vec![
            commit("alice", 1),
            commit("bob", 1),
            commit("alice", 2),
            commit("carol", 2),
            commit("alice", 3),
            commit("bob", 3),
        ]);

        let stats = contributor_stats(&activity);
        assert_eq!(
            stats,
            vec![
                ("alice".to_string(), 3),
                ("bob".to_string(), 2),
                ("carol".to_string(), 1),
            ]
        );
    }

    #[test]
    fn test_daily_commit_activity() {
        let mut undated = commit("dave", 1);
        undated.date = None;

        let activity = activity(vec![
            commit("alice", 1),
            commit("bob", 1),
            commit("alice", 3),
            undated,
        ]);

        let daily = daily_commit_activity(&activity);
        assert_eq!(daily.len(), 2);
        assert_eq!(daily[0].1, 2);
        assert_eq!(daily[1].1, 1);
        assert!(daily[0].0 < daily[1].0);
    }

    #[test]
    fn test_overview_report_sections() {
        let mut act = activity(vec![commit("alice", 1)]);
        act.issues.push(IssueRecord {
            number: 7,
            title: "Things break".to_string(),
            state: "open".to_string(),
            created_at: Utc.with_ymd_and_hms(2024, 3, 2, 9, 0, 0).unwrap(),
            updated_at: Utc.with_ymd_and_hms(2024, 3, 2, 9, 0, 0).unwrap(),
            author: "reporter".to_string(),
            labels: vec![],
            url: String::new(),
        });
        act.releases.push(ReleaseRecord {
            tag_name: "v1.0.0".to_string(),
            name: "First".to_string(),
            published_at: Some(Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()),
            author: "maintainer".to_string(),
            url: String::new(),
        });

        let report = overview_report(&act);
        assert!(report.starts_with("# Activity Summary for owner/repo"));
        assert!(report.contains("- Total commits: 1"));
        assert!(report.contains("## Latest Releases"));
        assert!(report.contains("v1.0.0 - First (released on 2024-03-01)"));
        assert!(report.contains("#7 - Things break (created on 2024-03-02 by reporter)"));
        // No PRs, so no PR section
        assert!(!report.contains("## Notable Pull Requests"));
    }
}
