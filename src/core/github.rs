// src/core/github.rs

use crate::core::action::{SystemAction, SystemActionOutput};
use crate::core::action_real::SystemActionReal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GitHubError {
    #[error("API Call failed with exit code = {exit_code}, stdout=\"{stdout}\", stderr=\"{stderr}\"")]
    ApiCallFailure {
        exit_code: i32,
        stdout: String,
        stderr: String,
    },
    #[error("Could not handle GitHub JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Options of `gh api`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiOption {
    /// `--field key=value` (typed by `gh`).
    Field(String, String),
    Hostname(String),
    IncludeHttpResponse,
    /// Request body read from a file.
    RequestBodyFile(String),
    /// Request body passed on stdin.
    RequestBody(String),
    JqSelect(String),
    HttpMethod(String),
    /// `--raw-field key=value` (always a string).
    RawField(String, String),
    Silent,
}

impl ApiOption {
    fn hostname(hostname: Option<&str>) -> Vec<ApiOption> {
        hostname
            .map(|h| vec![ApiOption::Hostname(h.to_string())])
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateAccess {
    Internal,
    Private,
    Public,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateOption {
    Description(String),
    Gitignore(String),
    Homepage(String),
    License(String),
    Access(CreateAccess),
    Team(u64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CollaboratorPermission {
    Pull,
    Push,
    Admin,
    Maintain,
    Triage,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CollaboratorPermissions {
    pub pull: bool,
    pub push: bool,
    pub admin: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Collaborator {
    pub login: String,
    pub id: u64,
    pub avatar_url: String,
    pub url: String,
    pub permissions: CollaboratorPermissions,
}

#[derive(Debug, Default, Serialize)]
struct CreateRepositoryBody<'a> {
    name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    homepage: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    private: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    visibility: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    gitignore_template: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    license_template: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    team_id: Option<u64>,
}

#[derive(Serialize)]
struct PermissionBody {
    permission: CollaboratorPermission,
}

/// Wraps the `gh` command line. Each call spawns `gh api` through a [`SystemAction`].
#[derive(Debug)]
pub struct GitHub {
    action: Box<dyn SystemAction>,
}

impl Default for GitHub {
    fn default() -> Self {
        Self::new(Box::new(SystemActionReal::new()))
    }
}

impl GitHub {
    pub fn new(action: Box<dyn SystemAction>) -> Self {
        Self { action }
    }

    /// Calls `gh api <endpoint>`. Any output on stderr counts as a failure, like a non-zero exit.
    pub fn api(
        &self,
        endpoint: &str,
        options: &[ApiOption],
    ) -> Result<SystemActionOutput, GitHubError> {
        let mut command = vec!["gh".to_string(), "api".to_string(), endpoint.to_string()];
        let mut stdin = None;

        for option in options {
            match option {
                ApiOption::Field(key, value) => {
                    command.extend(["--field".to_string(), format!("{}={}", key, value)])
                }
                ApiOption::Hostname(host) => {
                    command.extend(["--hostname".to_string(), host.clone()])
                }
                ApiOption::IncludeHttpResponse => command.push("--include".to_string()),
                ApiOption::RequestBodyFile(file) => {
                    command.extend(["--input".to_string(), file.clone()])
                }
                ApiOption::RequestBody(body) => {
                    command.extend(["--input".to_string(), "-".to_string()]);
                    stdin = Some(body.as_str());
                }
                ApiOption::JqSelect(query) => command.extend(["--jq".to_string(), query.clone()]),
                ApiOption::HttpMethod(method) => {
                    command.extend(["--method".to_string(), method.clone()])
                }
                ApiOption::RawField(key, value) => {
                    command.extend(["--raw-field".to_string(), format!("{}={}", key, value)])
                }
                ApiOption::Silent => command.push("--silent".to_string()),
            }
        }

        let output = self.action.run(None, &command, stdin);
        if !output.is_success() || !output.stderr.is_empty() {
            return Err(GitHubError::ApiCallFailure {
                exit_code: output.exit_code,
                stdout: output.stdout,
                stderr: output.stderr,
            });
        }
        Ok(output)
    }

    /// Creates a repository under `organization` on github.com.
    pub fn create_repository(
        &self,
        organization: &str,
        name: &str,
        options: &[CreateOption],
    ) -> Result<(), GitHubError> {
        let mut body = CreateRepositoryBody {
            name,
            ..CreateRepositoryBody::default()
        };
        for option in options {
            match option {
                CreateOption::Description(text) => body.description = Some(text.as_str()),
                CreateOption::Gitignore(template) => body.gitignore_template = Some(template.as_str()),
                CreateOption::Homepage(url) => body.homepage = Some(url.as_str()),
                CreateOption::License(template) => body.license_template = Some(template.as_str()),
                CreateOption::Team(id) => body.team_id = Some(*id),
                CreateOption::Access(access) => {
                    let (private, visibility) = match access {
                        CreateAccess::Internal => (true, "internal"),
                        CreateAccess::Private => (true, "private"),
                        CreateAccess::Public => (false, "public"),
                    };
                    body.private = Some(private);
                    body.visibility = Some(visibility);
                }
            }
        }

        let json = serde_json::to_string(&body)?;
        self.api(
            &format!("/orgs/{}/repos", organization),
            &[
                ApiOption::HttpMethod("POST".to_string()),
                ApiOption::RequestBody(json),
            ],
        )?;
        Ok(())
    }

    pub fn repository_collaborators(
        &self,
        owner: &str,
        repo: &str,
        hostname: Option<&str>,
    ) -> Result<Vec<Collaborator>, GitHubError> {
        let output = self.api(
            &format!("/repos/{}/{}/collaborators", owner, repo),
            &ApiOption::hostname(hostname),
        )?;
        Ok(serde_json::from_str(&output.stdout)?)
    }

    /// Invites or updates a collaborator. Returns the raw response body.
    pub fn add_repository_collaborator(
        &self,
        owner: &str,
        repo: &str,
        username: &str,
        permission: CollaboratorPermission,
        hostname: Option<&str>,
    ) -> Result<String, GitHubError> {
        let body = serde_json::to_string(&PermissionBody { permission })?;
        let mut options = ApiOption::hostname(hostname);
        options.push(ApiOption::HttpMethod("PUT".to_string()));
        options.push(ApiOption::RequestBody(body));

        let output = self.api(
            &format!("/repos/{}/{}/collaborators/{}", owner, repo, username),
            &options,
        )?;
        Ok(output.stdout)
    }

    pub fn remove_repository_collaborator(
        &self,
        owner: &str,
        repo: &str,
        username: &str,
        hostname: Option<&str>,
    ) -> Result<(), GitHubError> {
        let mut options = ApiOption::hostname(hostname);
        options.push(ApiOption::HttpMethod("DELETE".to_string()));
        self.api(
            &format!("/repos/{}/{}/collaborators/{}", owner, repo, username),
            &options,
        )?;
        Ok(())
    }
}
