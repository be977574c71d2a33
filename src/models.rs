use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Raw GitHub wire types. Only the fields we actually read are listed;
/// everything else in the payload is ignored during deserialization.
pub mod raw {
    use super::*;

    #[derive(Debug, Clone, Deserialize)]
    pub struct Actor {
        pub login: String,
    }

    #[derive(Debug, Clone, Deserialize)]
    pub struct Repo {
        pub full_name: String,
        pub description: Option<String>,
        #[serde(default)]
        pub stargazers_count: u64,
        #[serde(default)]
        pub forks_count: u64,
        #[serde(default)]
        pub open_issues_count: u64,
        pub html_url: String,
    }

    #[derive(Debug, Clone, Deserialize)]
    pub struct GitAuthor {
        pub name: Option<String>,
        pub date: Option<DateTime<Utc>>,
    }

    #[derive(Debug, Clone, Deserialize)]
    pub struct CommitMeta {
        pub author: Option<GitAuthor>,
        #[serde(default)]
        pub message: String,
    }

    #[derive(Debug, Clone, Deserialize)]
    pub struct Commit {
        pub sha: String,
        pub author: Option<Actor>,
        pub commit: CommitMeta,
        pub html_url: String,
    }

    #[derive(Debug, Clone, Deserialize)]
    pub struct Label {
        pub name: String,
    }

    /// The `/issues` feed mixes issues and pull requests; records with a
    /// `pull_request` key are PRs.
    #[derive(Debug, Clone, Deserialize)]
    pub struct Issue {
        pub number: u64,
        pub title: String,
        pub state: String,
        pub created_at: DateTime<Utc>,
        pub updated_at: DateTime<Utc>,
        pub user: Option<Actor>,
        #[serde(default)]
        pub labels: Vec<Label>,
        pub html_url: String,
        pub pull_request: Option<serde_json::Value>,
    }

    impl Issue {
        pub fn is_pull_request(&self) -> bool {
            self.pull_request.is_some()
        }
    }

    #[derive(Debug, Clone, Deserialize)]
    pub struct Release {
        pub tag_name: String,
        pub name: Option<String>,
        pub published_at: Option<DateTime<Utc>>,
        pub author: Option<Actor>,
        pub html_url: String,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoInfo {
    pub full_name: String,
    pub description: Option<String>,
    pub stars: u64,
    pub forks: u64,
    pub open_issues: u64,
    pub url: String,
}

impl From<raw::Repo> for RepoInfo {
    fn from(repo: raw::Repo) -> Self {
        Self {
            full_name: repo.full_name,
            description: repo.description,
            stars: repo.stargazers_count,
            forks: repo.forks_count,
            open_issues: repo.open_issues_count,
            url: repo.html_url,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitRecord {
    pub sha: String,
    pub author: String,
    pub date: Option<DateTime<Utc>>,
    pub message: String,
    pub url: String,
}

impl From<raw::Commit> for CommitRecord {
    fn from(commit: raw::Commit) -> Self {
        // Prefer the GitHub login, fall back to the git author name.
        let author = commit
            .author
            .map(|a| a.login)
            .or_else(|| commit.commit.author.as_ref().and_then(|a| a.name.clone()))
            .unwrap_or_else(|| "Unknown".to_string());
        let date = commit.commit.author.as_ref().and_then(|a| a.date);
        let message = commit
            .commit
            .message
            .lines()
            .next()
            .unwrap_or_default()
            .to_string();

        Self {
            sha: commit.sha,
            author,
            date,
            message,
            url: commit.html_url,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueRecord {
    pub number: u64,
    pub title: String,
    pub state: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub author: String,
    pub labels: Vec<String>,
    pub url: String,
}

impl From<raw::Issue> for IssueRecord {
    fn from(issue: raw::Issue) -> Self {
        Self {
            number: issue.number,
            title: issue.title,
            state: issue.state,
            created_at: issue.created_at,
            updated_at: issue.updated_at,
            author: issue
                .user
                .map(|u| u.login)
                .unwrap_or_else(|| "Unknown".to_string()),
            labels: issue.labels.into_iter().map(|l| l.name).collect(),
            url: issue.html_url,
        }
    }
}

/// PRs come out of the same feed as issues and carry the same fields.
pub type PullRequestRecord = IssueRecord;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseRecord {
    pub tag_name: String,
    pub name: String,
    pub published_at: Option<DateTime<Utc>>,
    pub author: String,
    pub url: String,
}

impl From<raw::Release> for ReleaseRecord {
    fn from(release: raw::Release) -> Self {
        Self {
            name: release.name.unwrap_or_else(|| release.tag_name.clone()),
            tag_name: release.tag_name,
            published_at: release.published_at,
            author: release
                .author
                .map(|a| a.login)
                .unwrap_or_else(|| "Unknown".to_string()),
            url: release.html_url,
        }
    }
}

/// One collected snapshot of recent activity for a repository.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoActivity {
    pub repo_name: String,
    pub repo_info: RepoInfo,
    pub commits: Vec<CommitRecord>,
    pub issues: Vec<IssueRecord>,
    pub pull_requests: Vec<PullRequestRecord>,
    pub releases: Vec<ReleaseRecord>,
    pub time_period_days: u64,
    pub collection_date: DateTime<Utc>,
}
