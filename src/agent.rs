use anyhow::{anyhow, Result};
use std::collections::HashMap;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::Config;
use crate::external::{
    ChatClient, EmbeddingClient, IndexPoint, OpenAiChat, OpenAiEmbeddings, VectorDB, VectorIndex,
};
use crate::models::{CommitRecord, IssueRecord, ReleaseRecord, RepoActivity};

const SUMMARY_SYSTEM: &str = "You are a technical analyst specialized in blockchain development. \
Your task is to analyze GitHub repository activity and provide a concise but insightful summary. \
Focus on highlighting important development trends, key changes, and significant discussions. \
Be specific about what you observe in the data, and try to identify patterns that would be \
valuable for a blockchain developer or researcher.";

const DEVELOPMENTS_SYSTEM: &str = "You are a blockchain development analyst specializing in \
identifying significant trends and developments in GitHub repositories. Your task is to analyze \
repository activity and extract the 3-5 most important developments or points of interest, \
especially those related to blockchain technology, smart contracts, or decentralized systems.";

const COMPARISON_SYSTEM: &str = "You are a blockchain development analyst comparing activity \
across different repositories. Your task is to analyze the provided repository summaries and \
identify interesting patterns, connections, or contrasts between the projects. Focus on \
technical aspects, development pace, community engagement, and emerging trends that would be \
relevant to blockchain developers.";

const ANSWER_SYSTEM: &str = "You are a technical assistant specialized in blockchain development. \
Your task is to answer questions about GitHub repository activity based on the provided context.";

/// How many context records a question is answered from.
const RETRIEVAL_LIMIT: u64 = 10;

/// LLM orchestration over collected snapshots: summaries, key-development
/// extraction, cross-repo comparison, and RAG question answering.
pub struct ActivityAgent {
    chat: Box<dyn ChatClient>,
    embeddings: Box<dyn EmbeddingClient>,
    index: Box<dyn VectorIndex>,
}

impl ActivityAgent {
    pub fn new(
        chat: Box<dyn ChatClient>,
        embeddings: Box<dyn EmbeddingClient>,
        index: Box<dyn VectorIndex>,
    ) -> Self {
        Self {
            chat,
            embeddings,
            index,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::new(
            Box::new(OpenAiChat::new(config.llm.clone())?),
            Box::new(OpenAiEmbeddings::new(config.embedding.clone())?),
            Box::new(VectorDB::new(config.vector_db.clone())?),
        ))
    }

    /// Generate a comprehensive summary of repository activity.
    pub async fn activity_summary(&self, activity: &RepoActivity) -> Result<String> {
        let user = format!(
            "Please analyze the following GitHub repository activity data and provide a \
             concise, insightful summary. Focus on key developments, important changes, and \
             significant trends.\n\n\
             Repository: {}\n\
             Time period: {} days\n\n\
             COMMITS:\n{}\n\n\
             ISSUES:\n{}\n\n\
             PULL REQUESTS:\n{}\n\n\
             RELEASES:\n{}\n\n\
             Your summary should be professional, technical, and highlight the most important \
             developments that a blockchain developer or researcher would find valuable.",
            activity.repo_name,
            activity.time_period_days,
            format_commits(&activity.commits, 20),
            format_issues(&activity.issues, 10, "issues"),
            format_issues(&activity.pull_requests, 10, "pull requests"),
            format_releases(&activity.releases),
        );

        info!(repo = %activity.repo_name, "generating activity summary");
        self.chat.complete(SUMMARY_SYSTEM, &user).await
    }

    /// Identify key developments and points of interest in the activity.
    pub async fn key_developments(&self, activity: &RepoActivity) -> Result<Vec<String>> {
        let user = format!(
            "Based on the following GitHub repository activity, identify the 3-5 most \
             important developments or points of interest. Focus on significant code changes, \
             important technical discussions, or emerging technical directions.\n\n\
             Repository: {}\n\n\
             COMMITS:\n{}\n\n\
             ISSUES:\n{}\n\n\
             PULL REQUESTS:\n{}\n\n\
             List each key development as a separate point in this format:\n\
             1. [TITLE OF DEVELOPMENT]: Brief explanation of why this is significant.",
            activity.repo_name,
            format_commits(&activity.commits, 30),
            format_issues(&activity.issues, 15, "issues"),
            format_issues(&activity.pull_requests, 15, "pull requests"),
        );

        info!(repo = %activity.repo_name, "identifying key developments");
        let response = self.chat.complete(DEVELOPMENTS_SYSTEM, &user).await?;
        Ok(split_developments(&response))
    }

    /// Compare activity across multiple repositories to identify trends.
    pub async fn compare_repositories(&self, activities: &[RepoActivity]) -> Result<String> {
        if activities.len() < 2 {
            return Err(anyhow!("need at least two repositories to compare"));
        }

        let summaries: Vec<String> = activities.iter().map(repo_stat_block).collect();
        let user = format!(
            "Please compare the following blockchain repositories and provide insights on the \
             differences and similarities in their recent development activity:\n\n{}\n\n\
             In your analysis, consider:\n\
             1. Which repositories are most active?\n\
             2. Are there any common themes or parallel developments?\n\
             3. How do the community dynamics differ?\n\
             4. Are there technical approaches that one project is taking that others could \
             benefit from?\n\n\
             Provide a concise but insightful comparison that would help a blockchain researcher \
             understand the current state and direction of these projects.",
            summaries.join("\n\n"),
        );

        info!(repos = activities.len(), "comparing repositories");
        self.chat.complete(COMPARISON_SYSTEM, &user).await
    }

    /// Embed every commit, issue and PR into the vector index. The index is
    /// reset first so stale snapshots do not leak into retrieval.
    pub async fn build_index(&self, activities: &[RepoActivity]) -> Result<usize> {
        let documents = index_documents(activities);
        if documents.is_empty() {
            debug!("no activity records to index");
            return Ok(0);
        }

        self.index.reset().await?;

        let texts: Vec<String> = documents.iter().map(|(text, _)| text.clone()).collect();
        let vectors = self.embeddings.embed_batch(&texts).await?;

        let points: Vec<IndexPoint> = documents
            .into_iter()
            .zip(vectors)
            .map(|((text, mut payload), vector)| {
                payload.insert("content".to_string(), text);
                IndexPoint {
                    id: Uuid::new_v4(),
                    vector,
                    payload,
                }
            })
            .collect();

        let indexed = points.len();
        self.index.upsert(points).await?;
        info!(records = indexed, "vector index built");
        Ok(indexed)
    }

    /// Answer a free-form question grounded in retrieved activity records.
    pub async fn answer(&self, query: &str) -> Result<String> {
        let vector = self.embeddings.embed(query).await?;
        let hits = self.index.search(vector, RETRIEVAL_LIMIT).await?;

        let context: Vec<String> = hits
            .iter()
            .enumerate()
            .map(|(i, hit)| {
                format!(
                    "{}. {} [Source: {}, Type: {}]",
                    i + 1,
                    hit.payload.get("content").map(String::as_str).unwrap_or(""),
                    hit.payload.get("repo").map(String::as_str).unwrap_or("?"),
                    hit.payload.get("type").map(String::as_str).unwrap_or("?"),
                )
            })
            .collect();

        let user = format!(
            "Based on the following information about blockchain repository activity, please \
             answer this question:\n\n\
             Question: {}\n\n\
             Context from repositories:\n{}\n\n\
             Provide a concise but informative answer based only on the provided context.",
            query,
            context.join("\n"),
        );

        debug!(hits = hits.len(), "answering query from retrieved context");
        self.chat.complete(ANSWER_SYSTEM, &user).await
    }
}

fn format_commits(commits: &[CommitRecord], limit: usize) -> String {
    if commits.is_empty() {
        return "No commits in this period.".to_string();
    }
    commits
        .iter()
        .take(limit)
        .map(|c| {
            let sha = if c.sha.len() >= 7 { &c.sha[..7] } else { &c.sha };
            format!("- {} by {}: {}", sha, c.author, c.message)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_issues(issues: &[IssueRecord], limit: usize, kind: &str) -> String {
    if issues.is_empty() {
        return format!("No {} in this period.", kind);
    }
    issues
        .iter()
        .take(limit)
        .map(|i| {
            format!(
                "- #{} - {} (by {}, state: {})",
                i.number, i.title, i.author, i.state
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_releases(releases: &[ReleaseRecord]) -> String {
    if releases.is_empty() {
        return "No releases in this period.".to_string();
    }
    releases
        .iter()
        .map(|r| format!("- {} - {} (by {})", r.tag_name, r.name, r.author))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Per-repo statistics block for the comparison prompt.
fn repo_stat_block(activity: &RepoActivity) -> String {
    let contributors: std::collections::HashSet<&str> = activity
        .commits
        .iter()
        .map(|c| c.author.as_str())
        .collect();

    let mut block = format!(
        "Repository: {}\nActivity:\n\
         - Commits: {}\n\
         - Issues: {}\n\
         - PRs: {}\n\
         - Releases: {}\n\
         - Contributors: {}\n",
        activity.repo_name,
        activity.commits.len(),
        activity.issues.len(),
        activity.pull_requests.len(),
        activity.releases.len(),
        contributors.len(),
    );

    if !activity.commits.is_empty() {
        block.push_str("\nRecent commits:\n");
        for commit in activity.commits.iter().take(5) {
            block.push_str(&format!("- {}...\n", truncate_chars(&commit.message, 100)));
        }
    }

    block
}

/// Char-boundary-safe prefix, at most `limit` characters.
fn truncate_chars(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

fn split_developments(response: &str) -> Vec<String> {
    response
        .split("\n\n")
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// One retrievable document per commit, issue and pull request.
fn index_documents(activities: &[RepoActivity]) -> Vec<(String, HashMap<String, String>)> {
    let mut documents = Vec::new();

    for activity in activities {
        let repo = &activity.repo_name;

        for commit in &activity.commits {
            let mut payload = HashMap::new();
            payload.insert("repo".to_string(), repo.clone());
            payload.insert("type".to_string(), "commit".to_string());
            payload.insert("author".to_string(), commit.author.clone());
            payload.insert("sha".to_string(), commit.sha.clone());
            if let Some(date) = commit.date {
                payload.insert("date".to_string(), date.to_rfc3339());
            }
            documents.push((format!("Commit in {}: {}", repo, commit.message), payload));
        }

        for issue in &activity.issues {
            let mut payload = HashMap::new();
            payload.insert("repo".to_string(), repo.clone());
            payload.insert("type".to_string(), "issue".to_string());
            payload.insert("number".to_string(), issue.number.to_string());
            payload.insert("author".to_string(), issue.author.clone());
            payload.insert("state".to_string(), issue.state.clone());
            payload.insert("url".to_string(), issue.url.clone());
            documents.push((format!("Issue in {}: {}", repo, issue.title), payload));
        }

        for pr in &activity.pull_requests {
            let mut payload = HashMap::new();
            payload.insert("repo".to_string(), repo.clone());
            payload.insert("type".to_string(), "pull_request".to_string());
            payload.insert("number".to_string(), pr.number.to_string());
            payload.insert("author".to_string(), pr.author.clone());
            payload.insert("state".to_string(), pr.state.clone());
            payload.insert("url".to_string(), pr.url.clone());
            documents.push((format!("Pull request in {}: {}", repo, pr.title), payload));
        }
    }

    documents
}
