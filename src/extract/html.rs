use std::collections::BTreeSet;

use regex::Regex;
use url::Url;

use crate::extract::text;

/// Extracted text and outbound links of one HTML page.
pub struct HtmlPage {
    pub text: String,
    pub words: BTreeSet<String>,
    pub links: BTreeSet<String>,
}

/// Light-weight HTML extraction: script/style blocks are dropped, every
/// `<a href>` is resolved against the page URL, remaining markup is
/// stripped and the text tokenized. This is a crawler, not a renderer;
/// malformed markup degrades to fewer links, never to an error.
pub fn parse_html(data: &str, base: &str) -> HtmlPage {
    let blocks = Regex::new(r"(?is)<(script|style)[^>]*>.*?</(script|style)\s*>")
        .expect("static pattern");
    let stripped = blocks.replace_all(data, " ");

    let links = extract_links(&stripped, base);

    let tags = Regex::new(r"(?s)<[^>]*>").expect("static pattern");
    let text_only = unescape(&tags.replace_all(&stripped, " "));
    let words = text::words(&text_only);

    HtmlPage {
        text: text_only,
        words,
        links,
    }
}

/// Canonical outbound links: relative hrefs joined with the page URL,
/// fragments removed, http/https only.
fn extract_links(html: &str, base: &str) -> BTreeSet<String> {
    let href = Regex::new(r#"(?is)<a\s[^>]*?href\s*=\s*["']([^"']*)["']"#)
        .expect("static pattern");
    let base_url = Url::parse(base).ok();

    let mut links = BTreeSet::new();
    for capture in href.captures_iter(html) {
        let raw = unescape(&capture[1]);
        let resolved = match &base_url {
            Some(base) => base.join(raw.trim()),
            None => Url::parse(raw.trim()),
        };
        let Ok(mut url) = resolved else {
            continue;
        };
        url.set_fragment(None);
        if matches!(url.scheme(), "http" | "https") {
            links.insert(url.to_string());
        }
    }
    links
}

/// Decode decimal/hex character references and the named entities that
/// occur in ordinary page text. One pass, so a produced '&' is never
/// re-expanded; unknown names stay as written.
fn unescape(text: &str) -> String {
    let entity = Regex::new(r"&(#[xX][0-9a-fA-F]+|#[0-9]+|[a-zA-Z]+[0-9]*);").expect("static pattern");
    entity
        .replace_all(text, |caps: &regex::Captures| {
            let body = &caps[1];
            let decoded = if let Some(hex) = body.strip_prefix("#x").or_else(|| body.strip_prefix("#X")) {
                u32::from_str_radix(hex, 16).ok().and_then(char::from_u32)
            } else if let Some(dec) = body.strip_prefix('#') {
                dec.parse::<u32>().ok().and_then(char::from_u32)
            } else {
                named_entity(body)
            };
            match decoded {
                Some(c) => c.to_string(),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

fn named_entity(name: &str) -> Option<char> {
    Some(match name {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "nbsp" => ' ',
        "copy" => '©',
        "reg" => '®',
        "deg" => '°',
        "middot" => '·',
        "laquo" => '«',
        "raquo" => '»',
        "ndash" => '–',
        "mdash" => '—',
        "hellip" => '…',
        "lsquo" => '\u{2018}',
        "rsquo" => '\u{2019}',
        "ldquo" => '\u{201c}',
        "rdquo" => '\u{201d}',
        "agrave" => 'à',
        "aacute" => 'á',
        "acirc" => 'â',
        "auml" => 'ä',
        "aring" => 'å',
        "aelig" => 'æ',
        "ccedil" => 'ç',
        "egrave" => 'è',
        "eacute" => 'é',
        "ecirc" => 'ê',
        "euml" => 'ë',
        "igrave" => 'ì',
        "iacute" => 'í',
        "icirc" => 'î',
        "iuml" => 'ï',
        "ntilde" => 'ñ',
        "ograve" => 'ò',
        "oacute" => 'ó',
        "ocirc" => 'ô',
        "ouml" => 'ö',
        "oslash" => 'ø',
        "szlig" => 'ß',
        "ugrave" => 'ù',
        "uacute" => 'ú',
        "ucirc" => 'û',
        "uuml" => 'ü',
        _ => return None,
    })
}
