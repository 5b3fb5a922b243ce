//! Links embedded in assistant replies.

use crate::units::normalize_name;

const RECON_LINK_PREFIX: &str = "/map/uav-recon/";

/// Bare keyword the assistant uses to point at the intercepted-comms recording.
const COMINT_KEYWORD: &str = "intercept_communication";
const COMINT_ANALYSIS_URL: &str = "/media/airbushlt_rus_trs_trad.mkv";

#[derive(Clone, Debug, PartialEq)]
pub enum ChatLink {
    /// Focus a recon drone by (normalized) name.
    ReconDrone(String),
    /// Video or other media served by the backend.
    Media { title: String, url: String },
    External(String),
}

/// Path part of an absolute URL, or the input when it is already a path.
fn path_of(url: &str) -> &str {
    let rest = match url
        .strip_prefix("http://")
        .or_else(|| url.strip_prefix("https://"))
    {
        Some(rest) => rest,
        None => return url,
    };
    match rest.find('/') {
        Some(idx) => {
            let path = &rest[idx..];
            path.split(['?', '#']).next().unwrap_or(path)
        }
        None => "",
    }
}

/// Drone name carried by a `/map/uav-recon/<name>` link.
pub fn recon_unit_name(url: &str) -> Option<String> {
    let encoded = path_of(url).strip_prefix(RECON_LINK_PREFIX)?;
    if encoded.is_empty() {
        return None;
    }
    urlencoding::decode(encoded)
        .ok()
        .map(|name| normalize_name(&name))
}

pub fn classify(url: &str, api_base: &str, label: Option<&str>) -> ChatLink {
    if let Some(name) = recon_unit_name(url) {
        return ChatLink::ReconDrone(name);
    }

    let resolved = if url.starts_with("http://") || url.starts_with("https://") {
        url.to_string()
    } else {
        format!("{api_base}{url}")
    };

    let lower = resolved.to_ascii_lowercase();
    if lower.ends_with(".mkv") || lower.contains("/media/") {
        let title = match label.map(str::trim) {
            Some(l) if !l.is_empty() => l.to_string(),
            _ => resolved.rsplit('/').next().unwrap_or("video").to_string(),
        };
        return ChatLink::Media {
            title,
            url: resolved,
        };
    }
    ChatLink::External(resolved)
}

/// A clickable span found in a chat message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LinkRef {
    pub label: String,
    pub url: String,
}

/// Markdown `[label](url)` links with an absolute or root-relative url,
/// plus the bare comms keyword, in order of appearance.
pub fn extract_links(content: &str) -> Vec<LinkRef> {
    let mut found = Vec::new();
    let mut rest = content;

    while !rest.is_empty() {
        let bracket = rest.find('[');
        let keyword = find_keyword(rest);

        match (bracket, keyword) {
            (Some(b), k) if k.map_or(true, |k| b < k) => {
                match markdown_link(&rest[b..]) {
                    Some((link, used)) => {
                        found.push(link);
                        rest = &rest[b + used..];
                    }
                    None => rest = &rest[b + 1..],
                }
            }
            (_, Some(k)) => {
                found.push(LinkRef {
                    label: COMINT_KEYWORD.to_string(),
                    url: COMINT_ANALYSIS_URL.to_string(),
                });
                rest = &rest[k + COMINT_KEYWORD.len()..];
            }
            _ => break,
        }
    }
    found
}

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Keyword occurrence on word boundaries.
fn find_keyword(text: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut from = 0;
    while let Some(off) = text[from..].find(COMINT_KEYWORD) {
        let start = from + off;
        let end = start + COMINT_KEYWORD.len();
        let left_ok = start == 0 || !is_word_byte(bytes[start - 1]);
        let right_ok = end == bytes.len() || !is_word_byte(bytes[end]);
        if left_ok && right_ok {
            return Some(start);
        }
        from = end;
    }
    None
}

/// Parse `[label](url)` at the start of `text`; returns the link and bytes consumed.
fn markdown_link(text: &str) -> Option<(LinkRef, usize)> {
    let close = text.find(']')?;
    let label = &text[1..close];
    if label.is_empty() || label.contains('[') {
        return None;
    }
    let after = &text[close + 1..];
    let inner = after.strip_prefix('(')?;
    let end = inner.find(|c: char| c == ')' || c.is_whitespace())?;
    if !inner[end..].starts_with(')') {
        return None;
    }
    let url = &inner[..end];
    let absolute = url.starts_with("http://") || url.starts_with("https://");
    if url.is_empty() || !(absolute || url.starts_with('/')) {
        return None;
    }
    let used = close + 1 + 1 + end + 1;
    Some((
        LinkRef {
            label: label.to_string(),
            url: url.to_string(),
        },
        used,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    const API: &str = "http://localhost:8000";

    #[test]
    fn recon_link_decodes_name() {
        assert_eq!(recon_unit_name("/map/uav-recon/uav-rec-001"), Some("UAV-REC-001".into()));
        assert_eq!(
            recon_unit_name("/map/uav-recon/UAV%20REC%20002"),
            Some("UAV REC 002".into())
        );
    }

    #[test]
    fn recon_link_from_absolute_url() {
        assert_eq!(
            recon_unit_name("https://c2.example/map/uav-recon/UAV-REC-001?x=1"),
            Some("UAV-REC-001".into())
        );
    }

    #[test]
    fn recon_link_needs_a_name() {
        assert_eq!(recon_unit_name("/map/uav-recon/"), None);
        assert_eq!(recon_unit_name("/map/other/UAV"), None);
        assert_eq!(recon_unit_name("https://c2.example"), None);
    }

    #[test]
    fn media_links_resolve_against_api() {
        let link = classify("/media/airbushlt_rus_trs_trad.mkv", API, None);
        assert_eq!(
            link,
            ChatLink::Media {
                title: "airbushlt_rus_trs_trad.mkv".into(),
                url: "http://localhost:8000/media/airbushlt_rus_trs_trad.mkv".into(),
            }
        );
    }

    #[test]
    fn media_label_wins_over_filename() {
        let link = classify("/media/clip.mkv", API, Some(" intercept "));
        assert!(matches!(link, ChatLink::Media { title, .. } if title == "intercept"));
    }

    #[test]
    fn other_links_are_external() {
        assert_eq!(
            classify("https://example.org/doc", API, None),
            ChatLink::External("https://example.org/doc".into())
        );
    }

    #[test]
    fn extracts_markdown_links_in_order() {
        let text = "Drone ready: [UAV-REC-001](/map/uav-recon/UAV-REC-001), docs [here](https://x.org/a).";
        let links = extract_links(text);
        assert_eq!(
            links,
            vec![
                LinkRef {
                    label: "UAV-REC-001".into(),
                    url: "/map/uav-recon/UAV-REC-001".into()
                },
                LinkRef {
                    label: "here".into(),
                    url: "https://x.org/a".into()
                },
            ]
        );
    }

    #[test]
    fn relative_or_spaced_urls_are_not_links() {
        assert!(extract_links("[a](foo/bar) [b](/x y)").is_empty());
        assert!(extract_links("just [brackets] here").is_empty());
    }

    #[test]
    fn comms_keyword_maps_to_recording() {
        let links = extract_links("see intercept_communication for the audio");
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].url, COMINT_ANALYSIS_URL);
        assert!(extract_links("intercept_communications").is_empty());
    }
}
