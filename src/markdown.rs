//! Markdown and LaTeX rendering for chat messages.
//!
//! Assistant messages go through three extraction passes before Markdown sees
//! them: fenced code, then display math `\[..\]`, then inline math `\(..\)`.
//! Each extracted piece is replaced by a `%%..%%` token and substituted back
//! after Markdown rendering, math first and code last. Code content is
//! therefore never read as math or Markdown, and the typesetter only ever
//! sees the literal expression.

use crate::view::escape_html;
use latex2mathml::{latex_to_mathml, DisplayStyle};
use pulldown_cmark::{html, Event, Options, Parser};
use regex::{Captures, Regex};
use std::sync::LazyLock;

static CODE_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```.*?```").expect("code fence pattern"));
static BLOCK_MATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\\\[(.*?)\\\]").expect("block math pattern"));
static INLINE_MATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\\\((.*?)\\\)").expect("inline math pattern"));

static CODE_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"%%CODE_BLOCK_(\d+)%%").expect("code token pattern"));
static BLOCK_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"%%MATH_BLOCK_(\d+)%%").expect("block token pattern"));
static INLINE_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"%%INLINE_MATH_(\d+)%%").expect("inline token pattern"));

/// Typesets a single LaTeX expression. Errors are reported, never panicked.
pub trait MathRenderer: Send + Sync {
    fn render(&self, latex: &str, display: bool) -> Result<String, String>;
}

/// LaTeX to MathML through `latex2mathml`.
#[derive(Debug, Default, Clone, Copy)]
pub struct MathMlRenderer;

impl MathRenderer for MathMlRenderer {
    fn render(&self, latex: &str, display: bool) -> Result<String, String> {
        let style = if display {
            DisplayStyle::Block
        } else {
            DisplayStyle::Inline
        };
        latex_to_mathml(latex, style).map_err(|e| e.to_string())
    }
}

/// Renders a chat message to HTML with the default MathML typesetter.
pub fn format_markdown(text: &str, is_user_message: bool) -> String {
    format_markdown_with(&MathMlRenderer, text, is_user_message)
}

pub fn format_markdown_with(
    math: &dyn MathRenderer,
    text: &str,
    is_user_message: bool,
) -> String {
    // User text is never read as LaTeX.
    if is_user_message {
        return render_markdown(text);
    }

    let mut code_blocks: Vec<String> = Vec::new();
    let text = CODE_FENCE.replace_all(text, |caps: &Captures| {
        code_blocks.push(caps[0].to_string());
        format!("%%CODE_BLOCK_{}%%", code_blocks.len() - 1)
    });

    let mut math_blocks: Vec<String> = Vec::new();
    let text = BLOCK_MATH.replace_all(&text, |caps: &Captures| {
        let expr = &caps[1];
        let rendered = match math.render(expr.trim(), true) {
            Ok(markup) => format!("<div class=\"math-block\">{}</div>", markup),
            Err(e) => {
                log::warn!("Block math rendering failed: {}", e);
                format!("<div class=\"math-block-error\">{}</div>", escape_html(expr))
            }
        };
        math_blocks.push(rendered);
        format!("%%MATH_BLOCK_{}%%", math_blocks.len() - 1)
    });

    let mut inline_math: Vec<String> = Vec::new();
    let text = INLINE_MATH.replace_all(&text, |caps: &Captures| {
        let expr = &caps[1];
        let rendered = match math.render(expr.trim(), false) {
            Ok(markup) => format!("<span class=\"math-inline\">{}</span>", markup),
            Err(e) => {
                log::warn!("Inline math rendering failed: {}", e);
                format!("<span class=\"math-inline-error\">{}</span>", escape_html(expr))
            }
        };
        inline_math.push(rendered);
        format!("%%INLINE_MATH_{}%%", inline_math.len() - 1)
    });

    let formatted = render_markdown(&text);
    let formatted = restore(&BLOCK_TOKEN, &formatted, |i| math_blocks.get(i).cloned());
    let formatted = restore(&INLINE_TOKEN, &formatted, |i| inline_math.get(i).cloned());
    restore(&CODE_TOKEN, &formatted, |i| {
        code_blocks.get(i).map(|block| render_markdown(block))
    })
}

fn restore(token: &Regex, html: &str, lookup: impl Fn(usize) -> Option<String>) -> String {
    token
        .replace_all(html, |caps: &Captures| {
            caps[1]
                .parse::<usize>()
                .ok()
                .and_then(&lookup)
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// GFM-flavoured Markdown with single newlines rendered as line breaks.
pub fn render_markdown(text: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);

    let parser = Parser::new_ext(text, options).map(|event| match event {
        Event::SoftBreak => Event::HardBreak,
        other => other,
    });
    let mut out = String::with_capacity(text.len() * 3 / 2);
    html::push_html(&mut out, parser);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Failing;

    impl MathRenderer for Failing {
        fn render(&self, _latex: &str, _display: bool) -> Result<String, String> {
            Err("unsupported".into())
        }
    }

    /// Records what the typesetter was asked to render.
    struct Echo;

    impl MathRenderer for Echo {
        fn render(&self, latex: &str, display: bool) -> Result<String, String> {
            Ok(format!("[{}:{}]", if display { "D" } else { "I" }, latex))
        }
    }

    #[test]
    fn assistant_inline_math_is_rendered() {
        let html = format_markdown("Inline: \\( x^2 \\)", false);
        assert!(html.contains("<span class=\"math-inline\">"), "{}", html);
        assert!(html.contains("<math"), "{}", html);
        assert!(!html.contains("\\("), "{}", html);
        assert!(!html.contains("%%"), "{}", html);
    }

    #[test]
    fn user_message_math_is_left_alone() {
        let html = format_markdown("\\( x^2 \\)", true);
        assert!(!html.contains("<math"), "{}", html);
        assert!(!html.contains("math-inline"), "{}", html);
        assert!(html.contains("x^2"), "{}", html);
    }

    #[test]
    fn block_math_uses_display_mode() {
        let html = format_markdown_with(&Echo, "Formula:\n\n\\[ a^2 + b^2 = c^2 \\]", false);
        assert!(html.contains("<div class=\"math-block\">[D:a^2 + b^2 = c^2]</div>"), "{}", html);
    }

    #[test]
    fn code_fences_are_not_read_as_math() {
        let text = "Try:\n\n```\nlet s = \"\\( not math \\)\";\n```\n\nand \\(y\\)";
        let html = format_markdown_with(&Echo, text, false);
        assert!(html.contains("<pre><code>"), "{}", html);
        assert!(html.contains("\\( not math \\)"), "{}", html);
        assert!(html.contains("[I:y]"), "{}", html);
        assert!(!html.contains("[I: not math]"), "{}", html);
    }

    #[test]
    fn math_is_not_mangled_by_markdown() {
        // Underscores and asterisks inside math must reach the typesetter verbatim.
        let html = format_markdown_with(&Echo, "\\( a_1 * b_2 * c \\)", false);
        assert!(html.contains("[I:a_1 * b_2 * c]"), "{}", html);
        assert!(!html.contains("<em>"), "{}", html);
    }

    #[test]
    fn failed_typesetting_falls_back_to_raw_expression() {
        let html = format_markdown_with(&Failing, "\\( x < 1 \\) and \\[ y \\]", false);
        assert!(html.contains("<span class=\"math-inline-error\"> x &lt; 1 </span>"), "{}", html);
        assert!(html.contains("<div class=\"math-block-error\"> y </div>"), "{}", html);
    }

    #[test]
    fn single_newlines_become_breaks() {
        let html = render_markdown("line one\nline two");
        assert!(html.contains("<br />"), "{}", html);
    }

    #[test]
    fn multiple_expressions_keep_their_order() {
        let html = format_markdown_with(&Echo, "\\(a\\), \\(b\\), \\[c\\]", false);
        let a = html.find("[I:a]").unwrap();
        let b = html.find("[I:b]").unwrap();
        let c = html.find("[D:c]").unwrap();
        assert!(a < b && b < c, "{}", html);
    }
}
