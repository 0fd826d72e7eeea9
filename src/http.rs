//! HTTP plumbing shared by the plugins
//!
//! [`HttpClient`] wraps a `reqwest::Client` configured from [`HttpConfig`],
//! retries transient failures, and turns non-success statuses into
//! [`Error::HttpStatus`]. File downloads stream to a `.part` file next to the
//! destination and are renamed only once the body is complete, so a failed
//! transfer never leaves a truncated file behind.

use crate::config::{Config, HttpConfig, RetryConfig};
use crate::error::{Error, Result};
use crate::retry::with_retry;
use regex::Regex;
use reqwest::header::{CONTENT_DISPOSITION, LOCATION};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

/// Upper bound on redirects followed for authenticated requests
const MAX_REDIRECTS: usize = 10;

/// Username and password sent as HTTP basic auth
#[derive(Clone)]
struct Credentials {
    username: String,
    password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// HTTP client with retry, status checking and file download helpers
#[derive(Clone, Debug)]
pub struct HttpClient {
    client: Client,
    retry: RetryConfig,
    credentials: Option<Credentials>,
}

impl HttpClient {
    /// Build an anonymous client from the shared configuration
    pub fn new(config: &Config) -> Result<Self> {
        let client = builder(&config.http)
            .build()
            .map_err(|e| Error::config("HttpClient", format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            retry: config.retry.clone(),
            credentials: None,
        })
    }

    /// Build a client that authenticates every hop with HTTP basic auth
    ///
    /// Login services such as NASA Earthdata redirect to a different host for
    /// authentication and then back with a session cookie. reqwest drops the
    /// `Authorization` header on cross-host redirects, so redirects are
    /// followed manually here with the credentials re-attached, and cookies
    /// are kept for the lifetime of the client.
    pub fn with_basic_auth(config: &Config, username: &str, password: &str) -> Result<Self> {
        let client = builder(&config.http)
            .redirect(reqwest::redirect::Policy::none())
            .cookie_store(true)
            .build()
            .map_err(|e| Error::config("HttpClient", format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            retry: config.retry.clone(),
            credentials: Some(Credentials {
                username: username.to_string(),
                password: password.to_string(),
            }),
        })
    }

    /// Send a request built by `build`, retrying transient failures
    ///
    /// `build` is called once per attempt. Any non-2xx status is an error.
    pub async fn send<F>(&self, build: F) -> Result<Response>
    where
        F: Fn(&Client) -> RequestBuilder,
    {
        with_retry(&self.retry, || {
            let request = build(&self.client);
            async move { check_status(request.send().await?) }
        })
        .await
    }

    /// GET `url`, following redirects with credentials when configured
    pub async fn get(&self, url: &str) -> Result<Response> {
        match &self.credentials {
            None => self.send(|client| client.get(url)).await,
            Some(credentials) => {
                with_retry(&self.retry, move || self.get_authenticated(url, credentials)).await
            }
        }
    }

    async fn get_authenticated(&self, url: &str, credentials: &Credentials) -> Result<Response> {
        let mut current = url::Url::parse(url).map_err(|e| Error::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        for _ in 0..=MAX_REDIRECTS {
            let response = self
                .client
                .get(current.clone())
                .basic_auth(&credentials.username, Some(&credentials.password))
                .send()
                .await?;

            if !response.status().is_redirection() {
                return check_status(response);
            }

            let location = response
                .headers()
                .get(LOCATION)
                .and_then(|value| value.to_str().ok())
                .ok_or_else(|| {
                    Error::InvalidResponse(format!("redirect from {} without Location", current))
                })?;
            let next = current.join(location).map_err(|e| Error::InvalidUrl {
                url: location.to_string(),
                reason: e.to_string(),
            })?;
            debug!(from = %current, to = %next, "following redirect");
            current = next;
        }

        Err(Error::InvalidResponse(format!(
            "too many redirects for {}",
            url
        )))
    }

    /// GET `url` and return the body as text
    pub async fn get_text(&self, url: &str) -> Result<String> {
        Ok(self.get(url).await?.text().await?)
    }

    /// GET `url` and deserialize the JSON body
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let body = self.get_text(url).await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Download `url` into `dir`, naming the file after the response
    ///
    /// Returns the path of the written file.
    pub async fn download_to_dir(&self, url: &str, dir: &Path) -> Result<PathBuf> {
        let response = self.get(url).await?;
        let dest = dir.join(filename_from_response(&response, url));
        write_body(response, &dest).await?;
        Ok(dest)
    }

    /// Download `url` to exactly `dest`
    pub async fn download(&self, url: &str, dest: &Path) -> Result<()> {
        let response = self.get(url).await?;
        write_body(response, dest).await
    }

    /// Download the file or wildcard set of files at `url` into `dir`
    pub async fn get_file(&self, url: &str, dir: &Path) -> Result<Vec<PathBuf>> {
        let urls = self.file_list(url).await?;
        info!(url, files = urls.len(), dir = ?dir, "downloading");

        let mut written = Vec::with_capacity(urls.len());
        for file_url in &urls {
            written.push(self.download_to_dir(file_url, dir).await?);
        }
        Ok(written)
    }

    /// Expand a URL whose last segment may contain `*` into concrete file URLs
    ///
    /// A URL without `*` is returned unchanged. Otherwise the parent
    /// directory listing is fetched and every `href` whose basename matches
    /// the pattern is returned, in listing order and without duplicates.
    pub async fn file_list(&self, url: &str) -> Result<Vec<String>> {
        if !url.contains('*') {
            return Ok(vec![url.to_string()]);
        }

        let (base, pattern) = url.rsplit_once('/').unwrap_or(("", url));
        if !(pattern.contains('.') && pattern.contains('*')) {
            return Err(Error::InvalidUrl {
                url: url.to_string(),
                reason: "URL does not point to a file or set of files".to_string(),
            });
        }

        let matcher = glob_regex(pattern)?;
        let listing = self.get_text(base).await?;
        let prefix = url::Url::parse(base)
            .map(|u| u.origin().ascii_serialization())
            .unwrap_or_else(|_| base.to_string());

        let mut result: Vec<String> = Vec::new();
        for href in extract_hrefs(&listing) {
            let basename = href.rsplit('/').next().unwrap_or(&href);
            if !matcher.is_match(basename) {
                continue;
            }
            let file_url = if href.starts_with('/') {
                format!("{}{}", prefix, href)
            } else {
                format!("{}/{}", base, href)
            };
            if !result.contains(&file_url) {
                result.push(file_url);
            }
        }

        debug!(url, matches = result.len(), "expanded wildcard URL");
        Ok(result)
    }
}

fn builder(http: &HttpConfig) -> reqwest::ClientBuilder {
    Client::builder()
        .timeout(http.request_timeout)
        .connect_timeout(http.connect_timeout)
        .user_agent(http.user_agent.clone())
        .danger_accept_invalid_certs(http.accept_invalid_certs)
}

fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(Error::HttpStatus {
            status: status.as_u16(),
            url: response.url().to_string(),
        })
    }
}

/// Stream the body to `<dest>.part`, then rename it into place
async fn write_body(mut response: Response, dest: &Path) -> Result<()> {
    let mut part = dest.as_os_str().to_owned();
    part.push(".part");
    let part = PathBuf::from(part);

    let result = async {
        let mut file = tokio::fs::File::create(&part).await?;
        let mut bytes = 0u64;
        while let Some(chunk) = response.chunk().await? {
            file.write_all(&chunk).await?;
            bytes += chunk.len() as u64;
        }
        file.flush().await?;
        tokio::fs::rename(&part, dest).await?;
        debug!(dest = ?dest, bytes, "download complete");
        Ok::<_, Error>(())
    }
    .await;

    if result.is_err() {
        let _ = tokio::fs::remove_file(&part).await;
    }
    result
}

/// Name to save a response under
///
/// Uses the `Content-Disposition` filename if present, otherwise the last
/// URL path segment, otherwise `"download"`. Only the final path component
/// is kept so a hostile header cannot escape the target directory.
pub fn filename_from_response(response: &Response, url: &str) -> String {
    let from_header = response
        .headers()
        .get(CONTENT_DISPOSITION)
        .and_then(|value| value.to_str().ok())
        .and_then(filename_from_disposition);

    let from_url = || {
        url::Url::parse(url)
            .ok()
            .and_then(|parsed| {
                parsed
                    .path_segments()
                    .and_then(|mut segments| segments.next_back().map(str::to_string))
            })
            .and_then(|segment| urlencoding::decode(&segment).ok().map(|s| s.into_owned()))
            .filter(|segment| !segment.is_empty())
    };

    from_header
        .or_else(from_url)
        .and_then(|name| {
            Path::new(&name)
                .file_name()
                .and_then(|n| n.to_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| "download".to_string())
}

fn filename_from_disposition(value: &str) -> Option<String> {
    for part in value.split(';') {
        let part = part.trim();
        if let Some(encoded) = part.strip_prefix("filename*=") {
            // charset'lang'encoded-filename
            let encoded = encoded.rsplit('\'').next().unwrap_or(encoded);
            if let Ok(decoded) = urlencoding::decode(encoded.trim_matches('"')) {
                return Some(decoded.into_owned());
            }
        } else if let Some(name) = part.strip_prefix("filename=") {
            let name = name.trim().trim_matches('"');
            if !name.is_empty() {
                return Some(name.to_string());
            }
        }
    }
    None
}

/// Translate a `*`-only glob into an anchored regex
fn glob_regex(pattern: &str) -> Result<Regex> {
    let body = pattern
        .split('*')
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(".*");
    Regex::new(&format!("^{}$", body)).map_err(|e| Error::InvalidUrl {
        url: pattern.to_string(),
        reason: e.to_string(),
    })
}

fn extract_hrefs(html: &str) -> Vec<String> {
    static HREF: OnceLock<Option<Regex>> = OnceLock::new();
    let Some(re) = HREF
        .get_or_init(|| Regex::new(r#"(?i)<a\s[^>]*?href\s*=\s*["']([^"']+)["']"#).ok())
        .as_ref()
    else {
        return Vec::new();
    };
    re.captures_iter(html)
        .map(|cap| cap[1].trim().to_string())
        .collect()
}
