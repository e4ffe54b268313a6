use crate::{
    config::RemoteConfig,
    error::{describe, NetworkError},
    remote::{is_image, RemoteSource, Resolution},
};
use bytes::Bytes;
use futures::future::{BoxFuture, FutureExt};
use http::{header::AUTHORIZATION, HeaderMap, HeaderValue};
use regex::Regex;
use reqwest::{Client, Response, Url};
use serde::Deserialize;
use std::{sync::Arc, time::Duration};

/// A [`RemoteSource`] backed by a GitHub repository.
#[derive(Debug, Clone)]
pub struct GithubSource {
    client: Client,
    config: Arc<RemoteConfig>,
}

impl GithubSource {
    /// The User-Agent sent with every request. GitHub rejects API requests
    /// without one.
    pub const USER_AGENT: &'static str =
        concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);

    /// Create a [`GithubSource`] with its own [`Client`].
    pub fn new(config: RemoteConfig) -> Result<Self, NetworkError> {
        let client = Client::builder()
            .user_agent(GithubSource::USER_AGENT)
            .build()
            .map_err(NetworkError::Transport)?;

        Ok(GithubSource::with_client(client, config))
    }

    /// Create a [`GithubSource`] with an already initialized [`Client`].
    pub fn with_client(client: Client, config: RemoteConfig) -> Self {
        GithubSource {
            client,
            config: Arc::new(config),
        }
    }

    /// The config this source was created with.
    pub fn config(&self) -> &RemoteConfig { &self.config }

    /// The REST API endpoint listing the full-resolution directory.
    pub fn contents_url(&self) -> Result<Url, NetworkError> {
        contents_url(&self.config)
    }

    /// The web page for the full-resolution directory.
    pub fn tree_url(&self) -> Result<Url, NetworkError> {
        tree_url(&self.config)
    }

    /// Where to download a MatCap from.
    pub fn raw_url(
        &self,
        source_key: &str,
        resolution: Resolution,
    ) -> Result<Url, NetworkError> {
        raw_url(&self.config, source_key, resolution)
    }
}

impl RemoteSource for GithubSource {
    fn list_available(
        &self,
    ) -> BoxFuture<'static, Result<Vec<String>, NetworkError>> {
        let client = self.client.clone();
        let config = Arc::clone(&self.config);

        async move {
            match list_via_api(&client, &config).await {
                Ok(names) => Ok(names),
                Err(e) => {
                    log::warn!(
                        "Unable to list MatCaps with the contents API, falling back to the tree page: {}",
                        describe(&e)
                    );
                    list_via_tree_page(&client, &config).await
                },
            }
        }
        .boxed()
    }

    fn fetch(
        &self,
        source_key: &str,
        resolution: Resolution,
    ) -> BoxFuture<'static, Result<Bytes, NetworkError>> {
        let client = self.client.clone();
        let url = self.raw_url(source_key, resolution);
        let timeout = match resolution {
            Resolution::Preview => self.config.preview_timeout(),
            Resolution::Full => self.config.download_timeout(),
        };

        async move {
            let url = url?;
            log::debug!("Fetching \"{}\"", url);
            let response = get(&client, url, timeout, HeaderMap::new()).await?;
            let bytes = response.bytes().await?;
            Ok::<_, NetworkError>(bytes)
        }
        .boxed()
    }
}

/// Send a GET request, turning unsuccessful status codes into errors.
async fn get(
    client: &Client,
    url: Url,
    timeout: Duration,
    extra_headers: HeaderMap,
) -> Result<Response, NetworkError> {
    let response = client
        .get(url)
        .headers(extra_headers)
        .timeout(timeout)
        .send()
        .await?
        .error_for_status()?;

    Ok(response)
}

async fn list_via_api(
    client: &Client,
    config: &RemoteConfig,
) -> Result<Vec<String>, NetworkError> {
    let url = contents_url(config)?;
    log::debug!("Listing MatCaps with \"{}\"", url);

    let body = get(client, url, config.list_timeout(), api_headers(config))
        .await?
        .text()
        .await?;
    let names = parse_contents_listing(&body)?;

    log::info!("The contents API listed {} MatCaps", names.len());
    Ok(names)
}

async fn list_via_tree_page(
    client: &Client,
    config: &RemoteConfig,
) -> Result<Vec<String>, NetworkError> {
    let url = tree_url(config)?;
    log::debug!("Scraping \"{}\"", url);

    let html = get(client, url, config.list_timeout(), HeaderMap::new())
        .await?
        .text()
        .await?;
    let names = scrape_tree_page(&html, &config.branch, &config.full_dir);

    log::info!("Scraped {} MatCaps from the tree page", names.len());
    Ok(names)
}

fn api_headers(config: &RemoteConfig) -> HeaderMap {
    let mut headers = HeaderMap::new();

    if let Some(token) = &config.token {
        match HeaderValue::from_str(&format!("token {}", token)) {
            Ok(mut value) => {
                value.set_sensitive(true);
                headers.insert(AUTHORIZATION, value);
            },
            Err(_) => log::warn!(
                "The API token contains invalid characters, sending requests anonymously"
            ),
        }
    }

    headers
}

#[derive(Debug, Deserialize)]
struct ContentItem {
    name: String,
    #[serde(rename = "type")]
    kind: String,
}

/// Extract the image file names from a GitHub contents API response.
pub fn parse_contents_listing(
    body: &str,
) -> Result<Vec<String>, serde_json::Error> {
    let items: Vec<ContentItem> = serde_json::from_str(body)?;

    let mut names: Vec<String> = items
        .into_iter()
        .filter(|item| item.kind == "file" && is_image(&item.name))
        .map(|item| item.name)
        .collect();
    names.sort();
    names.dedup();

    Ok(names)
}

/// Pull image file names out of the HTML for a GitHub tree page.
///
/// This looks for both `/blob/{branch}/{dir}/{name}` links and the
/// `"path":"{dir}/{name}"` JSON GitHub embeds in the page.
pub fn scrape_tree_page(html: &str, branch: &str, dir: &str) -> Vec<String> {
    let dir = dir.trim_matches('/');
    let pattern = format!(
        r#"(?:/blob/{branch}/{dir}/|"path":"{dir}/)([^"/?#]+\.(?i:png|jpe?g))""#,
        branch = regex::escape(branch),
        dir = regex::escape(dir),
    );

    let re = match Regex::new(&pattern) {
        Ok(re) => re,
        Err(e) => {
            log::error!("Unable to build the tree page pattern: {}", e);
            return Vec::new();
        },
    };

    let mut names: Vec<String> = re
        .captures_iter(html)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .collect();
    names.sort();
    names.dedup();

    names
}

fn contents_url(config: &RemoteConfig) -> Result<Url, NetworkError> {
    let mut url = with_segments(
        &config.api_base,
        &["repos", &config.owner, &config.repo, "contents"],
        &config.full_dir,
        None,
    )?;
    url.query_pairs_mut().append_pair("ref", &config.branch);

    Ok(url)
}

fn tree_url(config: &RemoteConfig) -> Result<Url, NetworkError> {
    with_segments(
        &config.web_base,
        &[&config.owner, &config.repo, "tree", &config.branch],
        &config.full_dir,
        None,
    )
}

fn raw_url(
    config: &RemoteConfig,
    source_key: &str,
    resolution: Resolution,
) -> Result<Url, NetworkError> {
    let dir = match resolution {
        Resolution::Preview => &config.preview_dir,
        Resolution::Full => &config.full_dir,
    };

    with_segments(
        &config.raw_base,
        &[&config.owner, &config.repo, &config.branch],
        dir,
        Some(source_key),
    )
}

fn with_segments(
    base: &str,
    prefix: &[&str],
    dir: &str,
    file: Option<&str>,
) -> Result<Url, NetworkError> {
    let mut url = Url::parse(base)?;

    {
        let mut segments = url
            .path_segments_mut()
            .map_err(|_| url::ParseError::RelativeUrlWithCannotBeABaseBase)?;
        segments.pop_if_empty();
        segments.extend(prefix);
        segments.extend(dir.split('/').filter(|s| !s.is_empty()));
        if let Some(file) = file {
            segments.push(file);
        }
    }

    Ok(url)
}
