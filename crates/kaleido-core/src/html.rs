//! HTML string utilities
//!
//! Everything here works on plain strings with a handful of anchored
//! regexes; the documents are model output and are never parsed into a tree.

use once_cell::sync::Lazy;
use regex::Regex;

/// Placeholder comment the hero section is asked to contain
pub const IMAGE_SLOT: &str = "<!-- KALEIDOSITE_AI_IMAGE_SLOT -->";

/// Element id of the injected image figure
pub const IMAGE_MARKER_ID: &str = "kaleidosite-ai-image";

static LEADING_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^```[a-zA-Z]*\s*\n?").expect("valid fence regex"));
static TRAILING_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n?```\s*$").expect("valid fence regex"));

static HERO_OPEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)<section[^>]*id=["']hero["'][^>]*>"#).expect("valid hero regex")
});
static MAIN_OPEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<main\b[^>]*>").expect("valid main regex"));
static BODY_OPEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<body\b[^>]*>").expect("valid body regex"));

static COMMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<!--.*?-->").expect("valid regex"));
static INLINE_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t]{2,}").expect("valid regex"));

/// Strip a leading ```` ```lang ```` fence and a trailing ```` ``` ```` fence
#[must_use]
pub fn normalize_fenced_html(input: &str) -> String {
    let out = input.trim();
    let out = LEADING_FENCE.replace(out, "");
    let out = TRAILING_FENCE.replace(&out, "");
    out.trim().to_string()
}

/// Escape text for use in element content or a quoted attribute
#[must_use]
pub fn escape_html(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

fn image_figure(src: &str) -> String {
    format!(
        "\n<figure id=\"{IMAGE_MARKER_ID}\" style=\"max-width:420px;margin:24px auto;border-radius:18px;\
overflow:hidden;box-shadow:0 18px 45px rgba(0,0,0,.25);background:linear-gradient(135deg,\
rgba(255,255,255,.12),rgba(255,255,255,.02));padding:16px;text-align:center\">\
<img src=\"{src}\" alt=\"AI generated illustration\" style=\"width:100%;height:auto;border-radius:14px;display:block;\" />\
<figcaption style=\"margin-top:12px;font-size:14px;letter-spacing:.02em;opacity:.75;\
font-family:system-ui,-apple-system,'Segoe UI',sans-serif;\">Fresh render straight from the Kaleido engine.</figcaption></figure>",
        src = escape_html(src),
    )
}

fn insert_after(html: &str, re: &Regex, insert: &str) -> Option<String> {
    re.find(html).map(|m| {
        let mut out = String::with_capacity(html.len() + insert.len());
        out.push_str(&html[..m.end()]);
        out.push_str(insert);
        out.push_str(&html[m.end()..]);
        out
    })
}

/// Splice the generated image into the document
///
/// No-op without a source or when the figure is already present. Otherwise
/// the first of these anchors wins: the slot comment, the hero section
/// opening tag, `<main>`, `<body>`, `</body>`, end of document.
#[must_use]
pub fn ensure_image(html: &str, image_src: Option<&str>) -> String {
    let Some(src) = image_src.filter(|s| !s.is_empty()) else {
        return html.to_string();
    };
    if html.contains(&format!("id=\"{IMAGE_MARKER_ID}\"")) {
        return html.to_string();
    }

    let figure = image_figure(src);
    if html.contains(IMAGE_SLOT) {
        return html.replacen(IMAGE_SLOT, &figure, 1);
    }
    for anchor in [&*HERO_OPEN, &*MAIN_OPEN, &*BODY_OPEN] {
        if let Some(out) = insert_after(html, anchor, &figure) {
            return out;
        }
    }
    if html.contains("</body>") {
        return html.replacen("</body>", &format!("{figure}</body>"), 1);
    }
    format!("{html}{figure}")
}

/// Shrink a document before storage
///
/// Comments go, runs of spaces and tabs collapse, lines are trimmed and blank
/// lines dropped. Newlines between lines are kept so inline scripts with
/// `//` comments survive.
#[must_use]
pub fn minify_html(input: &str) -> String {
    let stripped = COMMENT.replace_all(input, "");
    let collapsed = INLINE_WS.replace_all(&stripped, " ");
    collapsed
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Static page served when generation is impossible
#[must_use]
pub fn minimal_html(title: &str, subtitle: &str) -> String {
    let title = escape_html(title);
    let subtitle = escape_html(subtitle);
    format!(
        r#"<!doctype html><html lang="en"><head><meta charset="utf-8" />
<meta name="viewport" content="width=device-width, initial-scale=1" />
<title>{title}</title>
<style>
html,body{{height:100%;margin:0}}
body{{display:grid;place-items:center;background:#0b0b10;color:#fff;font:16px/1.6 system-ui}}
.card{{max-width:720px;margin:24px;padding:24px;border-radius:16px;background:rgba(255,255,255,.06);border:1px solid rgba(255,255,255,.12)}}
h1{{font-size:clamp(28px,6vw,48px);margin:0 0 8px}}
p{{opacity:.8}}
</style></head><body>
<main class="card"><h1>{title}</h1><p>{subtitle}</p></main>
</body></html>"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SRC: &str = "data:image/png;base64,AAAA";

    #[test]
    fn fences_are_stripped() {
        assert_eq!(normalize_fenced_html("```html\n<div>x</div>\n```"), "<div>x</div>");
        assert_eq!(normalize_fenced_html("  ```\n<p>y</p>```  "), "<p>y</p>");
        assert_eq!(normalize_fenced_html("<p>plain</p>"), "<p>plain</p>");
    }

    #[test]
    fn escape_covers_attribute_breakers() {
        assert_eq!(escape_html(r#"<a href="x">'&'</a>"#), "&lt;a href=&quot;x&quot;&gt;&#39;&amp;&#39;&lt;/a&gt;");
    }

    #[test]
    fn image_without_source_is_noop() {
        let html = "<body><main></main></body>";
        assert_eq!(ensure_image(html, None), html);
        assert_eq!(ensure_image(html, Some("")), html);
    }

    #[test]
    fn image_prefers_slot_comment() {
        let html = format!("<body><main><section id=\"hero\"><h1>Hi</h1>{IMAGE_SLOT}</section></main></body>");
        let out = ensure_image(&html, Some(SRC));
        assert!(!out.contains(IMAGE_SLOT));
        let h1 = out.find("<h1>").unwrap();
        let figure = out.find(IMAGE_MARKER_ID).unwrap();
        assert!(figure > h1);
    }

    #[test]
    fn image_falls_back_to_hero_then_main_then_body() {
        let hero = ensure_image("<main><section class=\"a\" id='hero'><h1>x</h1></section></main>", Some(SRC));
        assert!(hero.starts_with("<main><section class=\"a\" id='hero'>\n<figure"));

        let main = ensure_image("<body><main class=\"m\"><p>x</p></main></body>", Some(SRC));
        assert!(main.starts_with("<body><main class=\"m\">\n<figure"));

        let body = ensure_image("<body class=\"b\"><p>x</p></body>", Some(SRC));
        assert!(body.starts_with("<body class=\"b\">\n<figure"));

        let appended = ensure_image("<p>x</p>", Some(SRC));
        assert!(appended.starts_with("<p>x</p>\n<figure"));
    }

    #[test]
    fn image_is_inserted_once() {
        let once = ensure_image("<body><p>x</p></body>", Some(SRC));
        let twice = ensure_image(&once, Some(SRC));
        assert_eq!(once, twice);
        assert_eq!(twice.matches(IMAGE_MARKER_ID).count(), 1);
    }

    #[test]
    fn minify_keeps_line_structure() {
        let input = "<html>\n  <!-- note -->\n  <script>\n    // keep me\n    let a   =  1;\n  </script>\n\n</html>";
        assert_eq!(
            minify_html(input),
            "<html>\n<script>\n// keep me\nlet a = 1;\n</script>\n</html>"
        );
    }

    #[test]
    fn minimal_page_escapes_text() {
        let page = minimal_html("KaleidoSite", "<b>warming up</b>");
        assert!(page.starts_with("<!doctype html>"));
        assert!(page.contains("<h1>KaleidoSite</h1>"));
        assert!(page.contains("&lt;b&gt;warming up&lt;/b&gt;"));
        assert!(page.trim_end().ends_with("</html>"));
    }
}
