use crate::types::{PublishedItem, PublishedSnapshot, Result};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::io::Write;
use std::path::Path;
use tracing::info;

pub const SITEMAP_NS: &str = "http://www.sitemaps.org/schemas/sitemap/0.9";
pub const NEWS_NS: &str = "http://www.google.com/schemas/sitemap-news/0.9";

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Publication block shown in every `news:news` entry.
#[derive(Debug, Clone)]
pub struct Publication {
    pub name: String,
    pub language: String,
}

impl Default for Publication {
    fn default() -> Self {
        Self {
            name: "AI News (AI API Pro)".to_string(),
            language: "en".to_string(),
        }
    }
}

fn write_text_element<W: Write>(writer: &mut Writer<W>, name: &str, text: &str) -> Result<()> {
    writer.write_event(Event::Start(BytesStart::new(name)))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

fn write_entry<W: Write>(writer: &mut Writer<W>, item: &PublishedItem, publication: &Publication) -> Result<()> {
    let last_modified = item.newest_activity.unwrap_or(item.published);

    writer.write_event(Event::Start(BytesStart::new("url")))?;
    write_text_element(writer, "loc", &item.ap_id)?;
    write_text_element(writer, "lastmod", &last_modified.format(DATE_FORMAT).to_string())?;

    writer.write_event(Event::Start(BytesStart::new("news:news")))?;
    writer.write_event(Event::Start(BytesStart::new("news:publication")))?;
    write_text_element(writer, "news:name", &publication.name)?;
    write_text_element(writer, "news:language", &publication.language)?;
    writer.write_event(Event::End(BytesEnd::new("news:publication")))?;
    write_text_element(
        writer,
        "news:publication_date",
        &item.published.format(DATE_FORMAT).to_string(),
    )?;
    write_text_element(writer, "news:title", &item.title)?;
    writer.write_event(Event::End(BytesEnd::new("news:news")))?;

    writer.write_event(Event::End(BytesEnd::new("url")))?;
    Ok(())
}

/// Render a Google News sitemap of the snapshot, newest post first.
pub fn render_sitemap(snapshot: &PublishedSnapshot, publication: &Publication) -> Result<String> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    let mut urlset = BytesStart::new("urlset");
    urlset.push_attribute(("xmlns", SITEMAP_NS));
    urlset.push_attribute(("xmlns:news", NEWS_NS));
    writer.write_event(Event::Start(urlset))?;

    for item in snapshot.newest_first() {
        write_entry(&mut writer, item, publication)?;
    }

    writer.write_event(Event::End(BytesEnd::new("urlset")))?;

    Ok(String::from_utf8_lossy(&writer.into_inner()).into_owned())
}

pub fn write_sitemap(snapshot: &PublishedSnapshot, publication: &Publication, path: &Path) -> Result<usize> {
    let xml = render_sitemap(snapshot, publication)?;
    std::fs::write(path, xml)?;
    info!("Wrote sitemap with {} entries to {}", snapshot.len(), path.display());
    Ok(snapshot.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn post(id: i64, title: &str, day: u32, comment_day: Option<u32>) -> PublishedItem {
        let at = |d: u32| NaiveDate::from_ymd_opt(2024, 3, d).unwrap().and_hms_opt(9, 30, 0).unwrap();
        PublishedItem {
            id,
            title: title.to_string(),
            url: format!("https://example.com/{}", id),
            ap_id: format!("https://news.example/post/{}", id),
            published: at(day),
            newest_activity: comment_day.map(at),
            community_id: 4,
        }
    }

    #[test]
    fn renders_newest_first_with_news_block() {
        let snapshot = PublishedSnapshot::new(vec![post(1, "Old & gold", 1, Some(5)), post(2, "Fresh", 2, None)]);
        let xml = render_sitemap(&snapshot, &Publication::default()).unwrap();

        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(xml.contains(r#"<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9" xmlns:news="http://www.google.com/schemas/sitemap-news/0.9">"#));

        let newest = xml.find("https://news.example/post/2").unwrap();
        let oldest = xml.find("https://news.example/post/1").unwrap();
        assert!(newest < oldest);

        assert!(xml.contains("<lastmod>2024-03-05</lastmod>"));
        assert!(xml.contains("<news:publication_date>2024-03-01</news:publication_date>"));
        assert!(xml.contains("<news:title>Old &amp; gold</news:title>"));
        assert!(xml.contains("<news:name>AI News (AI API Pro)</news:name>"));
    }
}
