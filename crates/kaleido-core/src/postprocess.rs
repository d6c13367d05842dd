//! Final document shaping
//!
//! Every block injected here carries a marker id and is skipped when the
//! marker is already present, so [`post_process`] is idempotent.

use crate::html::escape_html;
use once_cell::sync::Lazy;
use regex::Regex;

/// Options for [`post_process`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostProcessOptions {
    /// Site id shown in the footer note or the latest-site link
    pub id: Option<String>,
    /// Inject the floating "New Site" toolbar
    pub embed_controls: bool,
}

impl PostProcessOptions {
    /// Options for a page served with the toolbar
    #[must_use]
    pub fn with_controls(id: Option<String>) -> Self {
        Self {
            id,
            embed_controls: true,
        }
    }

    /// Options for a bare page tagged with its id
    #[must_use]
    pub fn bare(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            embed_controls: false,
        }
    }
}

static HAS_HTML: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<html[\s>]").expect("valid regex"));
static HAS_BODY: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<body[\s>]").expect("valid regex"));
static HEAD_OPEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<head(\b[^>]*)>").expect("valid regex"));
static HTML_OPEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<html(\b[^>]*)>").expect("valid regex"));
static BASE_STYLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)<style[^>]*id=["']kaleidosite-base["']"#).expect("valid regex")
});
static CONTROLS_STYLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)<style[^>]*id=["']kaleidosite-controls-style["']"#).expect("valid regex")
});
static CONTROLS_SCRIPT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)<script[^>]*id=["']kaleidosite-controls-script["']"#).expect("valid regex")
});

const BASE_CSS: &str = r#"<style id="kaleidosite-base">html,body{height:100%;} html{scroll-behavior:smooth;} body{margin:0;} #hero{min-height:100vh;}</style>"#;

const CONTROLS_CSS: &str = concat!(
    r#"<style id="kaleidosite-controls-style">"#,
    "#kaleidosite-controls{position:fixed;top:16px;right:16px;z-index:2147483647;display:flex;align-items:center;gap:10px;",
    "padding:6px 10px;border-radius:999px;background:rgba(12,12,20,.68);backdrop-filter:blur(14px);",
    "box-shadow:0 12px 30px rgba(0,0,0,.35);font-family:system-ui,-apple-system,\"Segoe UI\",sans-serif;",
    "font-size:13px;line-height:1.2;color:#fdfaff;}",
    "#kaleidosite-controls a,#kaleidosite-controls span{display:inline-flex;align-items:center;gap:6px;padding:6px 10px;",
    "border-radius:999px;border:1px solid rgba(255,255,255,.18);background:rgba(255,255,255,.1);color:inherit;",
    "text-decoration:none;max-width:220px;overflow:hidden;text-overflow:ellipsis;white-space:nowrap;}",
    "#kaleidosite-controls a:hover{background:rgba(255,255,255,.2);}",
    "#kaleidosite-controls button{padding:7px 14px;border-radius:999px;border:none;",
    "background:linear-gradient(135deg,#d946ef,#8b5cf6);color:#fff;font-weight:600;cursor:pointer;",
    "box-shadow:0 6px 14px rgba(217,70,239,.3);transition:transform .15s ease,box-shadow .15s ease,opacity .15s ease;}",
    "#kaleidosite-controls button:hover{transform:translateY(-1px);box-shadow:0 9px 20px rgba(217,70,239,.35);}",
    "#kaleidosite-controls button[data-loading]{opacity:.65;cursor:wait;box-shadow:none;transform:none;}",
    "@media(max-width:640px){#kaleidosite-controls{left:10px;right:10px;top:10px;justify-content:space-between;padding:8px 10px;}}",
    "</style>",
);

const CONTROLS_JS: &str = concat!(
    r#"<script id="kaleidosite-controls-script">"#,
    "(function(){const endpoint='/api/pregen';let kicked=false;",
    "function kickoff(){if(kicked)return;kicked=true;try{fetch(endpoint,{method:'POST',keepalive:true}).catch(()=>{});}catch{}}",
    "kickoff();const btn=document.getElementById('kaleidosite-new-site');if(!btn)return;",
    "const original=btn.textContent||'New Site';",
    "btn.addEventListener('click',async function(){if(btn.hasAttribute('data-loading'))return;",
    "btn.setAttribute('data-loading','1');btn.textContent='Generating...';",
    "try{await fetch(endpoint,{method:'POST',keepalive:true});setTimeout(function(){location.reload();},1200);}",
    "catch{btn.textContent='Try Again';}",
    "finally{setTimeout(function(){btn.removeAttribute('data-loading');btn.textContent=original;},1400);}});})();",
    "</script>",
);

/// Wrap a fragment in a full document when `<html>` or `<body>` is missing
fn ensure_skeleton(html: &str) -> String {
    if HAS_HTML.is_match(html) && HAS_BODY.is_match(html) {
        return html.to_string();
    }
    format!(
        "<!doctype html><html lang=\"en\"><head><meta charset=\"utf-8\"/>\
<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\"/>\
<title>KaleidoSite</title></head><body>{}</body></html>",
        html.trim()
    )
}

/// Put `block` at the start of `<head>`, creating the head when needed
fn inject_into_head(html: &str, block: &str) -> String {
    if let Some(caps) = HEAD_OPEN.captures(html) {
        let whole = caps.get(0).map_or(0..0, |m| m.range());
        let attrs = caps.get(1).map_or("", |m| m.as_str());
        return format!("{}<head{attrs}>{block}{}", &html[..whole.start], &html[whole.end..]);
    }
    if let Some(caps) = HTML_OPEN.captures(html) {
        let whole = caps.get(0).map_or(0..0, |m| m.range());
        let attrs = caps.get(1).map_or("", |m| m.as_str());
        return format!(
            "{}<html{attrs}><head>{block}</head>{}",
            &html[..whole.start],
            &html[whole.end..]
        );
    }
    format!("{block}{html}")
}

/// Put `block` before `</body>`, else before `</html>`, else at the end
fn inject_before_close(html: &str, block: &str) -> String {
    for close in ["</body>", "</html>"] {
        if html.contains(close) {
            return html.replacen(close, &format!("{block}\n{close}"), 1);
        }
    }
    format!("{html}{block}")
}

fn inject_base_style(html: &str) -> String {
    if BASE_STYLE.is_match(html) {
        return html.to_string();
    }
    inject_into_head(html, BASE_CSS)
}

fn ensure_footer_with_id(html: &str, id: &str) -> String {
    if id.is_empty() || html.contains(id) {
        return html.to_string();
    }
    let footer = format!(
        "\n<footer><small style=\"position:fixed;left:0;right:0;bottom:8px;text-align:center;opacity:.6\">id: {}</small></footer>",
        escape_html(id)
    );
    inject_before_close(html, &footer)
}

fn inject_control_style(html: &str) -> String {
    if CONTROLS_STYLE.is_match(html) {
        return html.to_string();
    }
    inject_into_head(html, CONTROLS_CSS)
}

fn inject_control_panel(html: &str, id: Option<&str>) -> String {
    if html.contains("id=\"kaleidosite-controls\"") {
        return html.to_string();
    }
    let latest = match id.filter(|id| !id.is_empty()) {
        Some(id) => {
            let id = escape_html(id);
            format!(
                "<a id=\"kaleidosite-latest\" href=\"/site/{id}\" target=\"_blank\" rel=\"noopener noreferrer\">Latest {id}</a>"
            )
        }
        None => "<span id=\"kaleidosite-latest\">Generating...</span>".to_string(),
    };
    let controls = format!(
        "<div id=\"kaleidosite-controls\" role=\"toolbar\" aria-label=\"KaleidoSite controls\">{latest}\
<button id=\"kaleidosite-new-site\" type=\"button\">New Site</button></div>"
    );
    inject_before_close(html, &controls)
}

fn inject_control_script(html: &str) -> String {
    if CONTROLS_SCRIPT.is_match(html) {
        return html.to_string();
    }
    if html.contains("</body>") {
        return html.replacen("</body>", &format!("{CONTROLS_JS}\n</body>"), 1);
    }
    format!("{html}{CONTROLS_JS}")
}

/// Guarantee a full document and inject the shared style and controls
///
/// Applying it twice with the same options yields the same document.
#[must_use]
pub fn post_process(html: &str, options: &PostProcessOptions) -> String {
    let mut out = ensure_skeleton(html);
    out = inject_base_style(&out);

    let id = options.id.as_deref();
    if options.embed_controls {
        out = inject_control_style(&out);
        out = inject_control_panel(&out, id);
        out = inject_control_script(&out);
    } else if let Some(id) = id {
        out = ensure_footer_with_id(&out, id);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn count(haystack: &str, needle: &str) -> usize {
        haystack.matches(needle).count()
    }

    #[test]
    fn fragment_gets_skeleton_and_base_style() {
        let out = post_process("<h1>Hi</h1>", &PostProcessOptions::default());
        assert!(out.starts_with("<!doctype html><html lang=\"en\"><head><style id=\"kaleidosite-base\">"));
        assert!(out.contains("<body><h1>Hi</h1></body>"));
    }

    #[test]
    fn head_is_created_when_missing() {
        let out = post_process("<html><body>x</body></html>", &PostProcessOptions::default());
        assert!(out.starts_with("<html><head><style id=\"kaleidosite-base\">"));
    }

    #[test]
    fn footer_note_only_when_id_absent() {
        let options = PostProcessOptions::bare("site-42");
        let out = post_process("<html><body><p>x</p></body></html>", &options);
        assert!(out.contains("id: site-42</small></footer>\n</body>"));

        let already = post_process("<html><body><p>site-42</p></body></html>", &options);
        assert!(!already.contains("<footer>"));
    }

    #[test]
    fn controls_link_latest_or_show_generating() {
        let with_id = post_process("<p>x</p>", &PostProcessOptions::with_controls(Some("abc".into())));
        assert!(with_id.contains("href=\"/site/abc\""));
        assert!(with_id.contains("New Site"));
        assert!(!with_id.contains("<footer>"));

        let without = post_process("<p>x</p>", &PostProcessOptions::with_controls(None));
        assert!(without.contains("<span id=\"kaleidosite-latest\">Generating...</span>"));
    }

    #[test]
    fn twice_is_same_as_once() {
        let options = PostProcessOptions::with_controls(Some("abc".into()));
        let once = post_process("<html><head><title>t</title></head><body>x</body></html>", &options);
        let twice = post_process(&once, &options);
        assert_eq!(once, twice);
        assert_eq!(count(&twice, "id=\"kaleidosite-base\""), 1);
        assert_eq!(count(&twice, "id=\"kaleidosite-controls-style\""), 1);
        assert_eq!(count(&twice, "id=\"kaleidosite-controls\""), 1);
        assert_eq!(count(&twice, "id=\"kaleidosite-controls-script\""), 1);
    }

    proptest! {
        #[test]
        fn prop_idempotent(
            body in "[a-zA-Z0-9 <>/]{0,60}",
            id in prop::option::of("[a-z0-9]{1,8}"),
            embed in any::<bool>(),
        ) {
            let options = PostProcessOptions { id, embed_controls: embed };
            let once = post_process(&body, &options);
            let twice = post_process(&once, &options);
            prop_assert_eq!(&once, &twice);
            prop_assert_eq!(count(&twice, "id=\"kaleidosite-base\""), 1);
            if embed {
                prop_assert_eq!(count(&twice, "id=\"kaleidosite-controls-script\""), 1);
            }
        }
    }
}
