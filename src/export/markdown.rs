//! HTML to Markdown rendering for rich-text fields (descriptions, question text).
//!
//! Covers the markup the LMS editor produces: paragraphs, breaks, headings,
//! emphasis, links, images, lists and inline code. `<script>` and `<style>`
//! elements are removed with their content; any other tag is dropped and its
//! text kept.

use regex::{Captures, Regex};
use std::sync::OnceLock;

struct Rules {
    script: Regex,
    style: Regex,
    heading: Regex,
    strong: Regex,
    em: Regex,
    code: Regex,
    link: Regex,
    image: Regex,
    br: Regex,
    paragraph_end: Regex,
    list_item: Regex,
    block_end: Regex,
    tag: Regex,
    blank_lines: Regex,
}

fn rules() -> &'static Rules {
    static RULES: OnceLock<Rules> = OnceLock::new();
    RULES.get_or_init(|| {
        let re = |pattern: &str| {
            Regex::new(pattern).unwrap_or_else(|e| panic!("invalid pattern {}: {}", pattern, e))
        };
        Rules {
            script: re(r"(?is)<script\b[^>]*>.*?</script\s*>"),
            style: re(r"(?is)<style\b[^>]*>.*?</style\s*>"),
            heading: re(r"(?is)<h([1-6])\b[^>]*>(.*?)</h[1-6]\s*>"),
            strong: re(r"(?is)<(?:strong|b)\b[^>]*>(.*?)</(?:strong|b)\s*>"),
            em: re(r"(?is)<(?:em|i)\b[^>]*>(.*?)</(?:em|i)\s*>"),
            code: re(r"(?is)<code\b[^>]*>(.*?)</code\s*>"),
            link: re(r#"(?is)<a\b[^>]*?href\s*=\s*["']([^"']*)["'][^>]*>(.*?)</a\s*>"#),
            image: re(r#"(?is)<img\b[^>]*?src\s*=\s*["']([^"']*)["'][^>]*>"#),
            br: re(r"(?i)<br\s*/?>"),
            paragraph_end: re(r"(?i)</p\s*>"),
            list_item: re(r"(?i)<li\b[^>]*>"),
            block_end: re(r"(?i)</(?:ul|ol|div|tr|table|blockquote)\s*>"),
            tag: re(r"(?s)<[^>]+>"),
            blank_lines: re(r"\n[ \t]*\n(?:[ \t]*\n)+"),
        }
    })
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&amp;", "&")
}

/// Converts an HTML fragment to Markdown text.
pub fn html_to_markdown(html: &str) -> String {
    let r = rules();

    let text = r.script.replace_all(html, "");
    let text = r.style.replace_all(&text, "");
    let text = r.heading.replace_all(&text, |caps: &Captures| {
        let level = caps[1].parse::<usize>().unwrap_or(1);
        format!("\n\n{} {}\n\n", "#".repeat(level), caps[2].trim())
    });
    let text = r.strong.replace_all(&text, "**$1**");
    let text = r.em.replace_all(&text, "*$1*");
    let text = r.code.replace_all(&text, "`$1`");
    let text = r.link.replace_all(&text, "[$2]($1)");
    let text = r.image.replace_all(&text, "![]($1)");
    let text = r.br.replace_all(&text, "\n");
    let text = r.paragraph_end.replace_all(&text, "\n\n");
    let text = r.list_item.replace_all(&text, "\n- ");
    let text = r.block_end.replace_all(&text, "\n");
    let text = r.tag.replace_all(&text, "");
    let text = decode_entities(&text);
    let text = r.blank_lines.replace_all(&text, "\n\n");

    text.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("<p>Hello <strong>world</strong></p>", "Hello **world**")]
    #[case("<h2>Part A</h2><p>Answer <em>all</em> questions.</p>", "## Part A\n\nAnswer *all* questions.")]
    #[case("Use <code>cargo test</code>", "Use `cargo test`")]
    #[case(r#"<a href="https://x.test/a" target="_blank">docs</a>"#, "[docs](https://x.test/a)")]
    #[case("line one<br>line two<br/>three", "line one\nline two\nthree")]
    #[case("<ul><li>alpha</li><li>beta</li></ul>", "- alpha\n- beta")]
    #[case("5 &lt; 6 &amp;&amp; 7&nbsp;&gt; 2", "5 < 6 && 7 > 2")]
    fn converts_common_markup(#[case] html: &str, #[case] expected: &str) {
        assert_eq!(html_to_markdown(html), expected);
    }

    #[test]
    fn scripts_and_styles_are_removed_with_their_content() {
        let html = "<style>p { color: red }</style><p>Visible</p><SCRIPT type=\"text/javascript\">alert('x')</SCRIPT>";
        assert_eq!(html_to_markdown(html), "Visible");
    }

    #[test]
    fn images_keep_their_source() {
        assert_eq!(
            html_to_markdown(r#"<p><img src="/files/3/preview" alt="graph"></p>"#),
            "![](/files/3/preview)"
        );
    }

    #[test]
    fn runs_of_blank_lines_collapse() {
        assert_eq!(html_to_markdown("<p>a</p><p></p><p>b</p>"), "a\n\nb");
    }
}
