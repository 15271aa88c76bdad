//! Primary network translation provider.
//!
//! Tries each configured LibreTranslate-compatible host in order, then the
//! free MyMemory service. Rate limiting (429) and empty 200 responses both
//! mean "move on to the next host" rather than a hard failure.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::config::TranslateConfig;
use crate::translate::{TranslateError, TranslationProvider};

/// Public instances appended after any configured hosts.
const DEFAULT_HOSTS: [&str; 3] = [
    "https://libretranslate.com",
    "https://libretranslate.de",
    "https://translate.argosopentech.com",
];

pub struct LibreProvider {
    client: reqwest::Client,
    hosts: Vec<String>,
    api_key: String,
    mymemory_url: String,
}

impl LibreProvider {
    pub fn new(cfg: &TranslateConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            hosts: host_list(&cfg.libre_urls),
            api_key: cfg.libre_api_key.clone(),
            mymemory_url: cfg.mymemory_url.clone(),
        })
    }

    /// Hosts tried in order, for diagnostics.
    pub fn hosts(&self) -> &[String] {
        &self.hosts
    }

    async fn try_host(
        &self,
        base: &str,
        text: &str,
        source: &str,
        target: &str,
    ) -> Result<String, TranslateError> {
        let mut payload = json!({
            "q": text,
            "source": if source.is_empty() { "auto" } else { source },
            "target": target,
            "format": "text",
        });
        if !self.api_key.is_empty() {
            payload["api_key"] = Value::String(self.api_key.clone());
        }

        let response = self
            .client
            .post(format!("{}/translate", base))
            .json(&payload)
            .send()
            .await?;

        if response.status().as_u16() == 429 {
            return Err(TranslateError::RateLimited);
        }
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(TranslateError::Api {
                status,
                body: body.chars().take(300).collect(),
            });
        }

        let data: Value = response.json().await?;
        let out = data
            .get("translatedText")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string();
        if out.is_empty() {
            return Err(TranslateError::Empty);
        }
        Ok(out)
    }

    async fn try_mymemory(
        &self,
        text: &str,
        source: &str,
        target: &str,
    ) -> Result<String, TranslateError> {
        let langpair = format!(
            "{}|{}",
            if source.is_empty() { "en" } else { source },
            target
        );

        let response = self
            .client
            .get(&self.mymemory_url)
            .query(&[("q", text), ("langpair", langpair.as_str())])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(TranslateError::Api {
                status,
                body: body.chars().take(300).collect(),
            });
        }

        let data: Value = response.json().await?;
        let out = data
            .get("responseData")
            .and_then(|d| d.get("translatedText"))
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string();
        if out.is_empty() {
            return Err(TranslateError::Empty);
        }
        Ok(out)
    }
}

#[async_trait]
impl TranslationProvider for LibreProvider {
    fn name(&self) -> &'static str {
        "libre"
    }

    async fn translate(
        &self,
        text: &str,
        source: &str,
        target: &str,
    ) -> Result<String, TranslateError> {
        if text.is_empty() {
            return Err(TranslateError::Empty);
        }

        let mut last_err = TranslateError::Empty;
        for base in &self.hosts {
            match self.try_host(base, text, source, target).await {
                Ok(out) => return Ok(out),
                Err(err) => {
                    warn!(base = %base, error = %err, "LibreTranslate host failed");
                    last_err = err;
                }
            }
        }

        match self.try_mymemory(text, source, target).await {
            Ok(out) => {
                info!("MyMemory fallback produced the translation");
                Ok(out)
            }
            Err(err) => {
                warn!(error = %err, "MyMemory fallback failed");
                Err(last_err)
            }
        }
    }
}

/// Comma-separated configured hosts plus the defaults, deduplicated in order.
fn host_list(configured: &str) -> Vec<String> {
    let mut hosts = Vec::new();
    let candidates = configured
        .split(',')
        .map(|part| part.trim().trim_end_matches('/'))
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .chain(DEFAULT_HOSTS.iter().map(|s| s.to_string()));

    for host in candidates {
        if !hosts.contains(&host) {
            hosts.push(host);
        }
    }
    hosts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_list_dedups_preserving_order() {
        let hosts = host_list("https://my.libre/ , https://libretranslate.de");
        assert_eq!(
            hosts,
            vec![
                "https://my.libre".to_string(),
                "https://libretranslate.de".to_string(),
                "https://libretranslate.com".to_string(),
                "https://translate.argosopentech.com".to_string(),
            ]
        );
    }

    #[test]
    fn test_host_list_empty_config_uses_defaults() {
        let hosts = host_list("");
        assert_eq!(hosts.len(), DEFAULT_HOSTS.len());
        assert_eq!(hosts[0], "https://libretranslate.com");
    }
}
