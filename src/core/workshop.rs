//! Steam Workshop URL resolution.
//!
//! A workshop item is downloaded as `"{app_id}:{file_id}"`. Operators usually
//! paste the item's page URL instead, so the engine fetches the page and
//! scrapes the owning app id and the item title from it.

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use thiserror::Error;

static FILE_ID: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[?&]id=(\d+)").unwrap());
static DATA_APPID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"data-appid="(\d+)""#).unwrap());
static APP_LINK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"/app/(\d+)").unwrap());
static TITLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"class="workshopItemTitle"[^>]*>([^<]*)</div>"#).unwrap()
});

#[derive(Debug, Error)]
pub enum WorkshopError {
    #[error("Invalid workshop URL: {0}")]
    InvalidUrl(String),
    #[error("Could not find the game AppID on the workshop page")]
    MissingAppId,
    #[error("Failed to fetch workshop page: {0}")]
    Fetch(#[from] reqwest::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkshopItem {
    pub app_id: String,
    pub file_id: String,
    pub title: Option<String>,
}

impl WorkshopItem {
    pub fn content_id(&self) -> String {
        format!("{}:{}", self.app_id, self.file_id)
    }
}

pub fn is_workshop_url(input: &str) -> bool {
    input.contains("steamcommunity.com/sharedfiles") || input.contains("?id=")
}

pub fn parse_file_id(url: &str) -> Option<String> {
    FILE_ID.captures(url).map(|c| c[1].to_string())
}

pub fn parse_page(html: &str, file_id: &str) -> Result<WorkshopItem, WorkshopError> {
    let app_id = DATA_APPID
        .captures(html)
        .or_else(|| APP_LINK.captures(html))
        .map(|c| c[1].to_string())
        .ok_or(WorkshopError::MissingAppId)?;

    let title = TITLE
        .captures(html)
        .map(|c| c[1].trim().to_string())
        .filter(|t| !t.is_empty());

    Ok(WorkshopItem {
        app_id,
        file_id: file_id.to_string(),
        title,
    })
}

/// HTTP client for page lookups. A page that stalls past `timeout` fails
/// with [`WorkshopError::Fetch`].
pub fn http_client(timeout: Duration) -> Result<reqwest::Client, WorkshopError> {
    Ok(reqwest::Client::builder().timeout(timeout).build()?)
}

/// Fetch a workshop page and resolve it to an item.
pub async fn resolve(client: &reqwest::Client, url: &str) -> Result<WorkshopItem, WorkshopError> {
    let file_id = parse_file_id(url).ok_or_else(|| WorkshopError::InvalidUrl(url.to_string()))?;

    let html = client
        .get(url)
        .header(reqwest::header::USER_AGENT, "Mozilla/5.0")
        .send()
        .await?
        .error_for_status()?
        .text()
        .await?;

    parse_page(&html, &file_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <div class="apphub_AppName">Garry's Mod</div>
        <a href="https://steamcommunity.com/app/4000/workshop/">Workshop</a>
        <div class="workshopItemTitle">  Wiremod  </div>
        <span data-appid="4000"></span>
    "#;

    #[test]
    fn test_detects_workshop_urls() {
        assert!(is_workshop_url(
            "https://steamcommunity.com/sharedfiles/filedetails/?id=160250458"
        ));
        assert!(!is_workshop_url("740"));
    }

    #[test]
    fn test_parse_file_id() {
        assert_eq!(
            parse_file_id("https://steamcommunity.com/sharedfiles/filedetails/?id=160250458&searchtext="),
            Some("160250458".to_string())
        );
        assert_eq!(parse_file_id("https://steamcommunity.com/"), None);
    }

    #[test]
    fn test_parse_page() {
        let item = parse_page(PAGE, "160250458").unwrap();

        assert_eq!(item.app_id, "4000");
        assert_eq!(item.title.as_deref(), Some("Wiremod"));
        assert_eq!(item.content_id(), "4000:160250458");
    }

    #[test]
    fn test_parse_page_falls_back_to_app_link() {
        let html = r#"<a href="/app/294100/">RimWorld</a>"#;
        let item = parse_page(html, "1").unwrap();

        assert_eq!(item.app_id, "294100");
        assert!(item.title.is_none());
    }

    #[tokio::test]
    async fn test_resolve_times_out_on_silent_server() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let client = http_client(Duration::from_millis(200)).unwrap();
        let url = format!("http://{}/sharedfiles/filedetails/?id=1", addr);
        let err = tokio::time::timeout(Duration::from_secs(5), resolve(&client, &url))
            .await
            .expect("lookup never gave up")
            .unwrap_err();

        match err {
            WorkshopError::Fetch(e) => assert!(e.is_timeout()),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_parse_page_without_app_id() {
        let err = parse_page("<html></html>", "1").unwrap_err();
        assert!(matches!(err, WorkshopError::MissingAppId));
    }
}
