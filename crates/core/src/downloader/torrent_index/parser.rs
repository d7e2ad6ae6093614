//! HTML extraction for the torrent index search and detail pages.

use scraper::{ElementRef, Html, Selector};

use crate::downloader::DownloadError;

/// Links found on a topic detail page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DetailLinks {
    pub magnet: Option<String>,
    pub torrent: Option<String>,
}

fn selector(css: &str) -> Result<Selector, DownloadError> {
    Selector::parse(css).map_err(|e| DownloadError::Parse(e.to_string()))
}

fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// Detail-page href of the first search result.
///
/// `Ok(None)` means the result table is empty. A first row without a
/// recognizable topic link is a parse error.
pub fn first_topic_link(html: &str) -> Result<Option<String>, DownloadError> {
    let document = Html::parse_document(html);
    let row_selector = selector("#topic_list tbody tr")?;
    let view_selector = selector(r#"a[href*="/topics/view/"]"#)?;
    let title_selector = selector(".title a")?;

    let Some(row) = document.select(&row_selector).next() else {
        return Ok(None);
    };

    let href = row
        .select(&view_selector)
        .next()
        .or_else(|| row.select(&title_selector).next())
        .and_then(|a| a.value().attr("href"))
        .map(str::trim)
        .filter(|href| !href.is_empty());

    match href {
        Some(href) => Ok(Some(href.to_string())),
        None => Err(DownloadError::Parse(
            "first search result has no topic link".to_string(),
        )),
    }
}

/// Magnet and torrent-file links from a detail page.
pub fn detail_links(html: &str) -> Result<DetailLinks, DownloadError> {
    let document = Html::parse_document(html);
    let magnet_selector = selector("#a_magnet, #magnet")?;
    let torrent_selector = selector(r#"#tabs-1 a[href$=".torrent"]"#)?;

    let magnet = document.select(&magnet_selector).find_map(|a| {
        let text = element_text(a);
        if text.starts_with("magnet:") {
            Some(text)
        } else {
            a.value()
                .attr("href")
                .map(str::trim)
                .filter(|href| href.starts_with("magnet:"))
                .map(str::to_string)
        }
    });

    let torrent = document
        .select(&torrent_selector)
        .next()
        .and_then(|a| a.value().attr("href"))
        .map(|href| href.trim().to_string());

    Ok(DetailLinks { magnet, torrent })
}

/// Resolve a page link against the index base URL.
///
/// `//host/x` becomes `https://host/x`, `/x` becomes `{base}/x`, anything
/// else is returned unchanged.
pub fn normalize_link(base_url: &str, href: &str) -> String {
    if let Some(rest) = href.strip_prefix("//") {
        format!("https://{}", rest)
    } else if href.starts_with('/') {
        format!("{}{}", base_url.trim_end_matches('/'), href)
    } else {
        href.to_string()
    }
}

/// File name for a downloaded torrent, derived from its URL.
pub fn torrent_filename(url: &str) -> String {
    let segment = last_path_segment(url);
    let decoded = urlencoding::decode(&segment)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| segment.clone());
    // Decoded names may contain separators.
    let name = decoded.replace(['/', '\\'], "_");
    let name = name.trim();

    if name.is_empty() {
        "download.torrent".to_string()
    } else if name.ends_with(".torrent") {
        name.to_string()
    } else {
        format!("{}.torrent", name)
    }
}

/// Last path segment, still percent-encoded. The host never counts.
fn last_path_segment(url: &str) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        return parsed
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .unwrap_or_default()
            .to_string();
    }

    let path = url.split(['?', '#']).next().unwrap_or_default();
    let path = match path.strip_prefix("//") {
        Some(rest) => rest.split_once('/').map(|(_, p)| p).unwrap_or_default(),
        None => path,
    };
    path.rsplit('/').next().unwrap_or_default().to_string()
}
