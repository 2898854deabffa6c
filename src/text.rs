use std::sync::LazyLock;

use regex::{Captures, Regex};

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").unwrap());
static SPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
static ENTITY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"&(?:#([0-9]{1,7})|#[xX]([0-9a-fA-F]{1,6})|([a-zA-Z][a-zA-Z0-9]{1,7}));").unwrap()
});

/// Named entities seen in forum posts. Names are case-sensitive.
const NAMED_ENTITIES: &[(&str, &str)] = &[
    ("amp", "&"),
    ("lt", "<"),
    ("gt", ">"),
    ("quot", "\""),
    ("apos", "'"),
    ("nbsp", " "),
    ("lsquo", "\u{2018}"),
    ("rsquo", "\u{2019}"),
    ("ldquo", "\u{201C}"),
    ("rdquo", "\u{201D}"),
    ("laquo", "\u{00AB}"),
    ("raquo", "\u{00BB}"),
    ("hellip", "\u{2026}"),
    ("ndash", "\u{2013}"),
    ("mdash", "\u{2014}"),
    ("bull", "\u{2022}"),
    ("middot", "\u{00B7}"),
    ("copy", "\u{00A9}"),
    ("reg", "\u{00AE}"),
    ("trade", "\u{2122}"),
    ("deg", "\u{00B0}"),
    ("plusmn", "\u{00B1}"),
    ("times", "\u{00D7}"),
    ("divide", "\u{00F7}"),
    ("le", "\u{2264}"),
    ("ge", "\u{2265}"),
    ("ne", "\u{2260}"),
    ("asymp", "\u{2248}"),
    ("infin", "\u{221E}"),
    ("sum", "\u{2211}"),
    ("rarr", "\u{2192}"),
    ("larr", "\u{2190}"),
    ("harr", "\u{2194}"),
    ("alpha", "\u{03B1}"),
    ("beta", "\u{03B2}"),
    ("gamma", "\u{03B3}"),
    ("delta", "\u{03B4}"),
    ("epsilon", "\u{03B5}"),
    ("theta", "\u{03B8}"),
    ("lambda", "\u{03BB}"),
    ("mu", "\u{03BC}"),
    ("pi", "\u{03C0}"),
    ("sigma", "\u{03C3}"),
    ("Sigma", "\u{03A3}"),
    ("Delta", "\u{0394}"),
    ("aacute", "\u{00E1}"),
    ("eacute", "\u{00E9}"),
    ("egrave", "\u{00E8}"),
    ("iacute", "\u{00ED}"),
    ("oacute", "\u{00F3}"),
    ("uacute", "\u{00FA}"),
    ("ntilde", "\u{00F1}"),
    ("ccedil", "\u{00E7}"),
    ("auml", "\u{00E4}"),
    ("ouml", "\u{00F6}"),
    ("uuml", "\u{00FC}"),
    ("szlig", "\u{00DF}"),
];

fn decode_one(caps: &Captures) -> Option<String> {
    let code = if let Some(dec) = caps.get(1) {
        dec.as_str().parse::<u32>().ok()?
    } else if let Some(hex) = caps.get(2) {
        u32::from_str_radix(hex.as_str(), 16).ok()?
    } else {
        let name = caps.get(3)?.as_str();
        return NAMED_ENTITIES
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v.to_string());
    };
    char::from_u32(code).filter(|c| *c != '\0').map(String::from)
}

/// Decode HTML entities in one pass, so `&amp;lt;` becomes `&lt;` and not `<`.
/// Unknown names and invalid code points are left as written.
fn decode_entities(s: &str) -> String {
    ENTITY_RE
        .replace_all(s, |caps: &Captures| {
            decode_one(caps).unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// Strip tags from a post body and collapse whitespace into single spaces.
pub fn clean_html(html: &str) -> String {
    if html.trim().is_empty() {
        return String::new();
    }
    let stripped = TAG_RE.replace_all(html, " ");
    let decoded = decode_entities(&stripped);
    SPACE_RE.replace_all(&decoded, " ").trim().to_string()
}

/// The first `n` characters of `s` (not bytes).
pub fn head_chars(s: &str, n: usize) -> &str {
    match s.char_indices().nth(n) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_tags_and_collapses_whitespace() {
        let html = "<p>Is <b>pset 2</b>\n\n due&nbsp;Friday?</p><br/>";
        assert_eq!(clean_html(html), "Is pset 2 due Friday?");
    }

    #[test]
    fn decodes_amp_last() {
        assert_eq!(clean_html("a &amp;lt; b"), "a &lt; b");
        assert_eq!(clean_html("x &lt; y &amp;&amp; z"), "x < y && z");
    }

    #[test]
    fn decodes_numeric_and_typographic_entities() {
        let html = "<p>I don&#8217;t get &ldquo;part (1a)&rdquo; &#34;x&#34; &hellip; &eacute;</p>";
        assert_eq!(
            clean_html(html),
            "I don\u{2019}t get \u{201C}part (1a)\u{201D} \"x\" \u{2026} \u{00E9}"
        );
        assert_eq!(clean_html("it&#x27;s &#X3C;3 &apos;ok&apos;"), "it's <3 'ok'");
    }

    #[test]
    fn unknown_and_invalid_entities_stay_literal() {
        assert_eq!(clean_html("&bogus; &#xD800; &#0; &amp"), "&bogus; &#xD800; &#0; &amp");
        assert_eq!(clean_html("AT&T and R&D"), "AT&T and R&D");
    }

    #[test]
    fn empty_input() {
        assert_eq!(clean_html(""), "");
        assert_eq!(clean_html("   "), "");
    }

    #[test]
    fn head_chars_counts_characters() {
        assert_eq!(head_chars("héllo", 2), "hé");
        assert_eq!(head_chars("abc", 10), "abc");
        assert_eq!(head_chars("abc", 0), "");
    }
}
