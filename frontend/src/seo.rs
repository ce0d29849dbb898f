use seed::prelude::*;
use seed::*;

#[derive(Debug, Clone, PartialEq)]
pub struct PageMeta {
    pub title: String,
    pub description: String,
    pub canonical: String,
    pub image: Option<String>,
}

impl Default for PageMeta {
    fn default() -> Self {
        Self {
            title: "FlockHopper | Routes that avoid ALPR cameras".to_string(),
            description: "Map automated license plate reader cameras near you and plan \
                          driving, cycling or walking routes that pass as few of them as possible."
                .to_string(),
            canonical: "https://flockhopper.app/".to_string(),
            image: Some("https://flockhopper.app/og-image.png".to_string()),
        }
    }
}

/// `<meta>` tags for a page as (selector attribute, key, content).
pub fn meta_tags(meta: &PageMeta) -> Vec<(&'static str, &'static str, String)> {
    let mut tags = vec![
        ("name", "description", meta.description.clone()),
        ("property", "og:title", meta.title.clone()),
        ("property", "og:description", meta.description.clone()),
        ("property", "og:url", meta.canonical.clone()),
        ("property", "og:type", "website".to_string()),
        ("name", "twitter:card", "summary_large_image".to_string()),
    ];
    if let Some(image) = &meta.image {
        tags.push(("property", "og:image", image.clone()));
    }
    tags
}

/// Write title, description, canonical link and Open Graph tags into the
/// document head, updating tags that already exist.
pub fn apply_page_meta(meta: &PageMeta) {
    let document = seed::document();
    document.set_title(&meta.title);

    let Ok(Some(head)) = document.query_selector("head") else {
        return;
    };

    for (attr, key, content) in meta_tags(meta) {
        let selector = format!("meta[{attr}=\"{key}\"]");
        let element = match document.query_selector(&selector) {
            Ok(Some(existing)) => existing,
            _ => match document.create_element("meta") {
                Ok(created) => {
                    let _ = created.set_attribute(attr, key);
                    let _ = head.append_child(&created);
                    created
                }
                Err(_) => continue,
            },
        };
        let _ = element.set_attribute("content", &content);
    }

    let canonical = match document.query_selector("link[rel=\"canonical\"]") {
        Ok(Some(existing)) => Some(existing),
        _ => document.create_element("link").ok().map(|link| {
            let _ = link.set_attribute("rel", "canonical");
            let _ = head.append_child(&link);
            link
        }),
    };
    if let Some(link) = canonical {
        let _ = link.set_attribute("href", &meta.canonical);
    }

    log!("page meta applied", meta.title);
}
