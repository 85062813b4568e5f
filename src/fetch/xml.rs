//! Sitemap XML parsing.
//!
//! Reads `<urlset><url><loc/><lastmod/></url></urlset>` with a streaming
//! reader. Elements are matched by local name so the sitemaps.org namespace
//! (or any prefix) doesn't matter. Anything that isn't a well-formed urlset
//! is a parse error.

use quick_xml::events::Event;
use quick_xml::Reader;

use super::{FetchError, SitemapEntries};

#[derive(Clone, Copy, PartialEq, Eq)]
enum Field {
    None,
    Loc,
    LastMod,
}

pub fn parse_sitemap(xml: &str) -> Result<SitemapEntries, FetchError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut entries = SitemapEntries::new();
    let mut depth: usize = 0;
    let mut saw_root = false;

    let mut in_url = false;
    let mut field = Field::None;
    let mut loc = String::new();
    let mut lastmod = String::new();

    loop {
        let event = reader.read_event().map_err(|e| {
            FetchError::Parse(format!(
                "malformed xml at byte {}: {e}",
                reader.error_position()
            ))
        })?;

        match event {
            Event::Start(e) => {
                let name = e.local_name();
                let name = name.as_ref();

                if depth == 0 {
                    if name != b"urlset" {
                        return Err(FetchError::Parse(format!(
                            "expected <urlset> root, found <{}>",
                            String::from_utf8_lossy(name)
                        )));
                    }
                    saw_root = true;
                } else if depth == 1 && name == b"url" {
                    in_url = true;
                    loc.clear();
                    lastmod.clear();
                } else if depth == 2 && in_url {
                    field = match name {
                        b"loc" => Field::Loc,
                        b"lastmod" => Field::LastMod,
                        _ => Field::None,
                    };
                }
                depth += 1;
            }
            Event::Empty(e) => {
                if depth == 0 {
                    // a self-closed root carries no urls
                    if e.local_name().as_ref() != b"urlset" {
                        return Err(FetchError::Parse("expected <urlset> root".to_string()));
                    }
                    saw_root = true;
                }
            }
            Event::Text(e) => {
                if field != Field::None {
                    let text = e
                        .unescape()
                        .map_err(|err| FetchError::Parse(format!("bad text content: {err}")))?;
                    push_text(field, &text, &mut loc, &mut lastmod);
                }
            }
            Event::CData(e) => {
                if field != Field::None {
                    let text = String::from_utf8_lossy(&e).to_string();
                    push_text(field, &text, &mut loc, &mut lastmod);
                }
            }
            Event::End(_) => {
                depth = depth.saturating_sub(1);
                if depth == 2 {
                    field = Field::None;
                } else if depth == 1 && in_url {
                    in_url = false;
                    let url = loc.trim();
                    if !url.is_empty() {
                        let modified = lastmod.trim();
                        let modified = (!modified.is_empty()).then(|| modified.to_string());
                        entries.insert(url.to_string(), modified);
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if depth != 0 {
        return Err(FetchError::Parse("document ended before closing all elements".to_string()));
    }
    if !saw_root {
        return Err(FetchError::Parse("no <urlset> element found".to_string()));
    }

    Ok(entries)
}

fn push_text(field: Field, text: &str, loc: &mut String, lastmod: &mut String) {
    match field {
        Field::Loc => loc.push_str(text),
        Field::LastMod => lastmod.push_str(text),
        Field::None => {}
    }
}
