use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::agent::ActivityAgent;
use crate::models::RepoActivity;
use crate::stats;

/// Assemble and write the per-repository markdown report: statistics
/// overview, AI activity summary, key developments.
pub async fn write_repo_report(
    agent: &ActivityAgent,
    activity: &RepoActivity,
    dir: &Path,
) -> Result<PathBuf> {
    let overview = stats::overview_report(activity);
    let summary = agent.activity_summary(activity).await?;
    let developments = agent.key_developments(activity).await?;

    let mut report = format!("{}\n\n## AI-Generated Activity Summary\n\n{}\n\n", overview, summary);
    report.push_str("## Key Developments\n\n");
    for development in &developments {
        report.push_str(development);
        report.push_str("\n\n");
    }

    let path = dir.join(format!(
        "report_{}_{}.md",
        activity.repo_name.replace('/', "_"),
        activity.collection_date.format("%Y-%m-%d"),
    ));
    std::fs::write(&path, report).with_context(|| format!("failed to write report {:?}", path))?;
    info!(repo = %activity.repo_name, path = ?path, "report written");
    Ok(path)
}

/// Write the cross-repository comparison report. Skipped (with a warning)
/// when there is only one snapshot to compare.
pub async fn write_comparison_report(
    agent: &ActivityAgent,
    activities: &[RepoActivity],
    dir: &Path,
) -> Result<Option<PathBuf>> {
    if activities.len() < 2 {
        warn!("only one repository analyzed, skipping comparison report");
        return Ok(None);
    }

    let comparison = agent.compare_repositories(activities).await?;
    let date = activities
        .iter()
        .map(|a| a.collection_date)
        .max()
        .expect("at least two activities")
        .format("%Y-%m-%d");

    let path = dir.join(format!("comparison_report_{}.md", date));
    std::fs::write(
        &path,
        format!("# Comparative Analysis of Repositories\n\n{}", comparison),
    )
    .with_context(|| format!("failed to write report {:?}", path))?;
    info!(path = ?path, "comparison report written");
    Ok(Some(path))
}

/// Generate all reports for a run; returns the written paths.
pub async fn write_reports(
    agent: &ActivityAgent,
    activities: &[RepoActivity],
    dir: &Path,
) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for activity in activities {
        paths.push(write_repo_report(agent, activity, dir).await?);
    }
    if let Some(path) = write_comparison_report(agent, activities, dir).await? {
        paths.push(path);
    }
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::ActivityAgent;
    use crate::external::{
        ChatClient, EmbeddingClient, IndexPoint, SearchHit, VectorIndex,
    };
    use crate::models::{CommitRecord, RepoActivity, RepoInfo};
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use mockall::mock;
    use tempfile::tempdir;

    mock! {
        pub Chat {}

        #[async_trait]
        impl ChatClient for Chat {
            async fn complete(&self, system: &str, user: &str) -> Result<String>;
        }
    }

    mock! {
        pub Embeddings {}

        #[async_trait]
        impl EmbeddingClient for Embeddings {
            async fn embed(&self, text: &str) -> Result<Vec<f32>>;
            async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
        }
    }

    mock! {
        pub Index {}

        #[async_trait]
        impl VectorIndex for Index {
            async fn reset(&self) -> Result<()>;
            async fn upsert(&self, points: Vec<IndexPoint>) -> Result<()>;
            async fn search(&self, vector: Vec<f32>, limit: u64) -> Result<Vec<SearchHit>>;
        }
    }

    fn activity(repo: &str) -> RepoActivity {
        RepoActivity {
            repo_name: repo.to_string(),
            repo_info: RepoInfo {
                full_name: repo.to_string(),
                description: None,
                stars: 0,
                forks: 0,
                open_issues: 0,
                url: String::new(),
            },
            commits: vec![CommitRecord {
                sha: "abc1234".to_string(),
                author: "alice".to_string(),
                date: Some(Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()),
                message: "Initial work".to_string(),
                url: String::new(),
            }],
            issues: vec![],
            pull_requests: vec![],
            releases: vec![],
            time_period_days: 7,
            collection_date: Utc.with_ymd_and_hms(2024, 3, 2, 0, 0, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_repo_report_combines_sections() {
        let mut chat = MockChat::new();
        // First call: summary, second call: key developments.
        chat.expect_complete()
            .times(2)
            .returning(|system, _| {
                if system.contains("technical analyst") {
                    Ok("LLM summary text.".to_string())
                } else {
                    Ok("1. [POINT]: Something happened.".to_string())
                }
            });

        let agent = ActivityAgent::new(
            Box::new(chat),
            Box::new(MockEmbeddings::new()),
            Box::new(MockIndex::new()),
        );

        let dir = tempdir().unwrap();
        let path = write_repo_report(&agent, &activity("owner/repo"), dir.path())
            .await
            .unwrap();

        assert_eq!(
            path.file_name().unwrap().to_str().unwrap(),
            "report_owner_repo_2024-03-02.md"
        );

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("# Activity Summary for owner/repo"));
        assert!(content.contains("## AI-Generated Activity Summary\n\nLLM summary text."));
        assert!(content.contains("## Key Developments\n\n1. [POINT]: Something happened."));
    }

    #[tokio::test]
    async fn test_comparison_skipped_for_single_repo() {
        let agent = ActivityAgent::new(
            Box::new(MockChat::new()),
            Box::new(MockEmbeddings::new()),
            Box::new(MockIndex::new()),
        );

        let dir = tempdir().unwrap();
        let result = write_comparison_report(&agent, &[activity("owner/repo")], dir.path())
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_comparison_written_for_multiple_repos() {
        let mut chat = MockChat::new();
        chat.expect_complete()
            .times(1)
            .returning(|_, _| Ok("Both projects are active.".to_string()));

        let agent = ActivityAgent::new(
            Box::new(chat),
            Box::new(MockEmbeddings::new()),
            Box::new(MockIndex::new()),
        );

        let dir = tempdir().unwrap();
        let activities = vec![activity("a/b"), activity("c/d")];
        let path = write_comparison_report(&agent, &activities, dir.path())
            .await
            .unwrap()
            .expect("comparison report path");

        assert_eq!(
            path.file_name().unwrap().to_str().unwrap(),
            "comparison_report_2024-03-02.md"
        );
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("# Comparative Analysis of Repositories"));
        assert!(content.contains("Both projects are active."));
    }
}
