//! Anonymous access to public S3 buckets over plain HTTPS.
//!
//! Only two calls are needed: `ListObjectsV2` to enumerate partition files
//! under a release prefix, and `GET` to download one object.

use std::io::Write;
use std::path::Path;
use std::time::Duration;

use regex::Regex;
use reqwest::Client;
use tracing::debug;
use url::Url;

/// One object returned by a bucket listing
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectEntry {
    pub key: String,
    pub size: u64,
}

/// One page of a `ListObjectsV2` response
#[derive(Debug, Default, PartialEq)]
pub struct ListPage {
    pub entries: Vec<ObjectEntry>,
    pub next_token: Option<String>,
}

/// Client for a single public bucket
pub struct ObjectStoreClient {
    client: Client,
    endpoint: Url,
    key_re: Regex,
    size_re: Regex,
    contents_re: Regex,
    token_re: Regex,
}

impl ObjectStoreClient {
    /// Virtual-hosted endpoint for `bucket` in `region`
    pub fn new(bucket: &str, region: &str) -> Result<Self, String> {
        let endpoint = Url::parse(&format!("https://{}.s3.{}.amazonaws.com/", bucket, region))
            .map_err(|e| format!("invalid bucket endpoint for '{}': {}", bucket, e))?;
        Self::with_endpoint(endpoint)
    }

    pub fn with_endpoint(endpoint: Url) -> Result<Self, String> {
        let client = Client::builder()
            .user_agent("sextant/0.1 (poi extraction)")
            .connect_timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| format!("failed to create HTTP client: {}", e))?;

        Ok(Self {
            client,
            endpoint,
            key_re: Regex::new(r"<Key>([^<]*)</Key>").map_err(|e| e.to_string())?,
            size_re: Regex::new(r"<Size>(\d+)</Size>").map_err(|e| e.to_string())?,
            contents_re: Regex::new(r"(?s)<Contents>(.*?)</Contents>").map_err(|e| e.to_string())?,
            token_re: Regex::new(r"<NextContinuationToken>([^<]*)</NextContinuationToken>")
                .map_err(|e| e.to_string())?,
        })
    }

    /// List every object under `prefix`, following continuation tokens
    pub async fn list(&self, prefix: &str) -> Result<Vec<ObjectEntry>, String> {
        let mut entries = Vec::new();
        let mut token: Option<String> = None;

        loop {
            let mut url = self.endpoint.clone();
            {
                let mut query = url.query_pairs_mut();
                query.append_pair("list-type", "2");
                query.append_pair("prefix", prefix);
                if let Some(ref t) = token {
                    query.append_pair("continuation-token", t);
                }
            }

            let response = self
                .client
                .get(url)
                .send()
                .await
                .map_err(|e| format!("listing '{}' failed: {}", prefix, e))?;

            if !response.status().is_success() {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                return Err(format!(
                    "listing '{}' returned {}: {}",
                    prefix,
                    status,
                    body.chars().take(200).collect::<String>()
                ));
            }

            let body = response
                .text()
                .await
                .map_err(|e| format!("listing '{}' body unreadable: {}", prefix, e))?;
            let page = self.parse_list_page(&body);
            debug!("Listed {} objects under {}", page.entries.len(), prefix);

            entries.extend(page.entries);
            match page.next_token {
                Some(next) => token = Some(next),
                None => break,
            }
        }

        Ok(entries)
    }

    /// Parse the XML body of a listing page
    pub fn parse_list_page(&self, body: &str) -> ListPage {
        let entries = self
            .contents_re
            .captures_iter(body)
            .filter_map(|contents| {
                let block = contents.get(1)?.as_str();
                let key = self.key_re.captures(block)?.get(1)?.as_str();
                let size = self
                    .size_re
                    .captures(block)
                    .and_then(|c| c.get(1))
                    .and_then(|m| m.as_str().parse().ok())
                    .unwrap_or(0);
                Some(ObjectEntry {
                    key: unescape_xml(key),
                    size,
                })
            })
            .collect();

        let next_token = self
            .token_re
            .captures(body)
            .and_then(|c| c.get(1))
            .map(|m| unescape_xml(m.as_str()))
            .filter(|t| !t.is_empty());

        ListPage {
            entries,
            next_token,
        }
    }

    /// URL of an object key (each path segment percent-encoded)
    pub fn object_url(&self, key: &str) -> Result<Url, String> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| format!("endpoint {} cannot hold a path", self.endpoint))?
            .pop_if_empty()
            .extend(key.split('/'));
        Ok(url)
    }

    /// Stream one object into `dest`, returning the byte count
    pub async fn download(&self, key: &str, dest: &mut impl Write) -> Result<u64, String> {
        let url = self.object_url(key)?;
        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| format!("download of '{}' failed: {}", key, e))?;

        if !response.status().is_success() {
            return Err(format!(
                "download of '{}' returned {}",
                key,
                response.status()
            ));
        }

        let mut written = 0u64;
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| format!("download of '{}' interrupted: {}", key, e))?
        {
            dest.write_all(&chunk)
                .map_err(|e| format!("failed buffering '{}': {}", key, e))?;
            written += chunk.len() as u64;
        }
        dest.flush()
            .map_err(|e| format!("failed buffering '{}': {}", key, e))?;

        Ok(written)
    }
}

/// Last path segment of a key
pub fn key_file_name(key: &str) -> &str {
    Path::new(key)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(key)
}

fn unescape_xml(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
