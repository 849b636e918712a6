//! Resolving an album URL into its ordered asset list.

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;

use crate::error::{Error, Result};
use crate::url::AlbumId;

const HOST_PAGE: &str = "https://www.pixiv.net/";

/// One downloadable asset discovered on an album page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetRef {
    /// Direct URL of the full-resolution asset.
    pub url: String,
    /// Filename the source site would give the asset, when derivable.
    pub suggested_filename: Option<String>,
}

/// Turns an album URL into the ordered list of its assets.
///
/// Implementations own all knowledge of the remote site's markup; the
/// pipeline only ever sees the returned list.
#[async_trait]
pub trait AlbumResolver: Send + Sync {
    /// Resolves the album page at `url`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Resolution`] when the page is unreachable or its
    /// markup cannot be understood. The failure is scoped to this album.
    async fn resolve(&self, url: &str) -> Result<Vec<AssetRef>>;
}

static PRELOAD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<meta[^>]*id="meta-preload-data"[^>]*content='([^']+)'"#).expect("valid regex")
});

static THUMB_DIR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"/c/250x250_80_a2/(?:custom-thumb|img-master)").expect("valid regex")
});

static QUALITY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(_square1200|_custom1200)\.jpg$").expect("valid regex"));

static PAGE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"p\d+").expect("valid regex"));

/// Resolver for Pixiv artwork pages.
///
/// The artwork page embeds a `meta-preload-data` JSON blob carrying the
/// thumbnail URL and page count. Full-resolution image URLs are derived from
/// the thumbnail by rewriting its path to the master directory and
/// substituting the page number, one URL per page.
pub struct PixivResolver {
    client: reqwest::Client,
}

impl PixivResolver {
    /// Builds a resolver with the given page-fetch timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl AlbumResolver for PixivResolver {
    async fn resolve(&self, url: &str) -> Result<Vec<AssetRef>> {
        let id = AlbumId::from_url(url)?;

        let response = self
            .client
            .get(url)
            .header("Referer", HOST_PAGE)
            .send()
            .await
            .map_err(|e| Error::Resolution(format!("fetch album page: {e}")))?;
        if !response.status().is_success() {
            return Err(Error::Resolution(format!(
                "album page responded {}",
                response.status()
            )));
        }
        let html = response
            .text()
            .await
            .map_err(|e| Error::Resolution(format!("read album page: {e}")))?;

        parse_album_page(&id, &html)
    }
}

/// Extracts the asset list from an artwork page's markup.
pub(crate) fn parse_album_page(id: &AlbumId, html: &str) -> Result<Vec<AssetRef>> {
    let content = PRELOAD_RE
        .captures(html)
        .map(|caps| caps[1].to_string())
        .ok_or_else(|| Error::Resolution("no preload data on album page".to_string()))?;

    // The JSON sits inside an HTML attribute, so its quotes arrive escaped.
    let decoded = content
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&");
    let data: serde_json::Value = serde_json::from_str(&decoded)
        .map_err(|e| Error::Resolution(format!("malformed preload data: {e}")))?;

    let artwork = data
        .get("illust")
        .and_then(|illusts| illusts.get(id.as_str()))
        .ok_or_else(|| {
            Error::Resolution(format!("album {id} not present in preload data"))
        })?;

    let thumb = artwork
        .get("url")
        .or_else(|| artwork.pointer("/urls/small"))
        .and_then(serde_json::Value::as_str)
        .ok_or_else(|| Error::Resolution("album entry has no image URL".to_string()))?;
    let page_count = artwork
        .get("pageCount")
        .and_then(serde_json::Value::as_u64)
        .unwrap_or(1)
        .max(1);

    let assets = (0..page_count)
        .map(|page| {
            let url = image_url(thumb, page);
            let suggested = url.rsplit('/').next().map(ToString::to_string);
            AssetRef {
                url,
                suggested_filename: suggested,
            }
        })
        .collect();
    Ok(assets)
}

/// Rewrites a thumbnail URL into the full-resolution URL of one page.
pub(crate) fn image_url(thumb: &str, page: u64) -> String {
    let url = THUMB_DIR_RE.replace_all(thumb, "/img-master");
    let url = QUALITY_RE.replace(&url, "_master1200.jpg");
    PAGE_RE.replace(&url, format!("p{page}")).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    const THUMB: &str =
        "https://i.pximg.net/c/250x250_80_a2/custom-thumb/img/2024/01/02/00/00/00/4242_p0_custom1200.jpg";

    fn page_html(id: &str, page_count: u64) -> String {
        let json = format!(
            r#"{{"illust":{{"{id}":{{"url":"{THUMB}","pageCount":{page_count}}}}}}}"#
        );
        let escaped = json.replace('"', "&quot;");
        format!(
            "<html><head><meta charset=\"utf-8\">\
             <meta id=\"meta-preload-data\" content='{escaped}'>\
             </head><body></body></html>"
        )
    }

    #[test]
    fn image_url_rewrites_thumbnail() {
        assert_eq!(
            image_url(THUMB, 0),
            "https://i.pximg.net/img-master/img/2024/01/02/00/00/00/4242_p0_master1200.jpg"
        );
    }

    #[test]
    fn image_url_substitutes_page_number() {
        assert_eq!(
            image_url(THUMB, 7),
            "https://i.pximg.net/img-master/img/2024/01/02/00/00/00/4242_p7_master1200.jpg"
        );
    }

    #[test]
    fn image_url_handles_square_thumbnails() {
        let square = "https://i.pximg.net/c/250x250_80_a2/img-master/img/x/4242_p0_square1200.jpg";
        assert_eq!(
            image_url(square, 1),
            "https://i.pximg.net/img-master/img/x/4242_p1_master1200.jpg"
        );
    }

    #[test]
    fn parses_multi_page_album() {
        let id = AlbumId::from_raw("4242");
        let assets = parse_album_page(&id, &page_html("4242", 3)).unwrap();
        assert_eq!(assets.len(), 3);
        assert!(assets[0].url.ends_with("4242_p0_master1200.jpg"));
        assert!(assets[2].url.ends_with("4242_p2_master1200.jpg"));
        assert_eq!(
            assets[1].suggested_filename.as_deref(),
            Some("4242_p1_master1200.jpg")
        );
    }

    #[test]
    fn single_page_album_yields_one_asset() {
        let id = AlbumId::from_raw("4242");
        let assets = parse_album_page(&id, &page_html("4242", 1)).unwrap();
        assert_eq!(assets.len(), 1);
    }

    #[test]
    fn zero_page_count_still_yields_one_asset() {
        let id = AlbumId::from_raw("4242");
        let assets = parse_album_page(&id, &page_html("4242", 0)).unwrap();
        assert_eq!(assets.len(), 1);
    }

    #[test]
    fn page_without_preload_data_fails_resolution() {
        let id = AlbumId::from_raw("4242");
        let err = parse_album_page(&id, "<html><body>login required</body></html>").unwrap_err();
        assert!(matches!(err, Error::Resolution(_)));
    }

    #[test]
    fn malformed_preload_json_fails_resolution() {
        let id = AlbumId::from_raw("4242");
        let html = "<meta id=\"meta-preload-data\" content='not json'>";
        let err = parse_album_page(&id, html).unwrap_err();
        assert!(matches!(err, Error::Resolution(_)));
    }

    #[test]
    fn preload_data_for_a_different_album_fails_resolution() {
        let id = AlbumId::from_raw("9999");
        let err = parse_album_page(&id, &page_html("4242", 2)).unwrap_err();
        assert!(matches!(err, Error::Resolution(_)));
    }
}
