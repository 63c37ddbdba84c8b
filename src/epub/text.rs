//! HTML转文本模块
//!
//! 把XHTML内容文档转换为可读的纯文本。只处理body中的内容，
//! 跳过脚本、样式和媒体元素。

use once_cell::sync::Lazy;
use scraper::node::Node;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};

static BODY_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("body").expect("body选择器是合法的"));

/// 文本输出格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TextStyle {
    /// 原始HTML
    Html,
    /// 纯文本（所有空白合并为单个空格）
    Text,
    /// 格式化文本（保持段落、标题和列表结构）
    #[default]
    Formatted,
}

impl TextStyle {
    /// 返回对应的转换器
    pub fn converter(self) -> Box<dyn TextConverter> {
        match self {
            TextStyle::Html => Box::new(RawHtml),
            TextStyle::Text => Box::new(PlainText),
            TextStyle::Formatted => Box::new(FormattedText),
        }
    }
}

/// HTML到文本的转换器
///
/// 实现必须是确定性的：相同的输入总是得到相同的输出。
pub trait TextConverter: Send + Sync {
    fn convert(&self, html: &str) -> String;
}

/// 原样返回文档
#[derive(Debug, Clone, Copy, Default)]
pub struct RawHtml;

impl TextConverter for RawHtml {
    fn convert(&self, html: &str) -> String {
        html.to_string()
    }
}

/// 合并所有空白的纯文本
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainText;

impl TextConverter for PlainText {
    fn convert(&self, html: &str) -> String {
        let document = Html::parse_document(html);
        let mut result = String::new();
        if let Some(body) = document.select(&BODY_SELECTOR).next() {
            collect_text(body, &mut result);
        }
        result.split_whitespace().collect::<Vec<_>>().join(" ")
    }
}

fn collect_text(element: ElementRef, result: &mut String) {
    if is_skipped(element.value().name()) {
        return;
    }
    for node in element.children() {
        match node.value() {
            Node::Text(text) => {
                result.push_str(text);
            }
            Node::Element(_) => {
                if let Some(child) = ElementRef::wrap(node) {
                    collect_text(child, result);
                    // 块级元素边界视为空白，避免相邻块的文字粘连
                    let name = child.value().name();
                    if is_block(name) || heading_level(name).is_some() || matches!(name, "br" | "li" | "td" | "th") {
                        result.push(' ');
                    }
                }
            }
            _ => {}
        }
    }
}

/// 保持结构的格式化文本
///
/// 块级元素之间空一行，标题以`#`开头，列表项以`* `开头，`<br>`换行。
/// 非空输出以一个换行符结尾。
#[derive(Debug, Clone, Copy, Default)]
pub struct FormattedText;

impl TextConverter for FormattedText {
    fn convert(&self, html: &str) -> String {
        let document = Html::parse_document(html);
        let mut writer = TextWriter::default();
        if let Some(body) = document.select(&BODY_SELECTOR).next() {
            write_children(body, &mut writer);
        }
        writer.finish()
    }
}

/// 不输出任何文本的元素
fn is_skipped(tag_name: &str) -> bool {
    matches!(
        tag_name,
        "head" | "script" | "style" | "meta" | "link" | "title" | "base" | "noscript"
            | "img" | "svg" | "video" | "audio" | "canvas" | "embed" | "object"
            | "iframe" | "picture" | "source" | "track" | "param" | "area" | "map"
    )
}

fn is_block(tag_name: &str) -> bool {
    matches!(
        tag_name,
        "p" | "div" | "section" | "article" | "aside" | "header" | "footer" | "nav"
            | "main" | "blockquote" | "pre" | "figure" | "figcaption" | "table"
            | "tr" | "ul" | "ol" | "dl" | "dt" | "dd" | "hr" | "address"
    )
}

fn heading_level(tag_name: &str) -> Option<usize> {
    match tag_name {
        "h1" => Some(1),
        "h2" => Some(2),
        "h3" => Some(3),
        "h4" => Some(4),
        "h5" => Some(5),
        "h6" => Some(6),
        _ => None,
    }
}

fn write_children(element: ElementRef, writer: &mut TextWriter) {
    for node in element.children() {
        match node.value() {
            Node::Text(text) => writer.text(text),
            Node::Element(_) => {
                if let Some(child) = ElementRef::wrap(node) {
                    write_element(child, writer);
                }
            }
            _ => {}
        }
    }
}

fn write_element(element: ElementRef, writer: &mut TextWriter) {
    let tag_name = element.value().name();
    if is_skipped(tag_name) {
        return;
    }

    if tag_name == "br" {
        writer.line_break();
    } else if let Some(level) = heading_level(tag_name) {
        writer.paragraph_break();
        writer.start_line(&format!("{} ", "#".repeat(level)));
        write_children(element, writer);
        writer.paragraph_break();
    } else if tag_name == "li" {
        writer.line_break();
        writer.start_line("* ");
        write_children(element, writer);
        writer.line_break();
    } else if matches!(tag_name, "td" | "th") {
        writer.space();
        write_children(element, writer);
        writer.space();
    } else if is_block(tag_name) {
        writer.paragraph_break();
        write_children(element, writer);
        writer.paragraph_break();
    } else {
        write_children(element, writer);
    }
}

/// 负责空白合并与换行的输出缓冲
#[derive(Debug, Default)]
struct TextWriter {
    out: String,
    pending_breaks: usize,
    pending_space: bool,
}

impl TextWriter {
    fn flush_breaks(&mut self) {
        if !self.out.is_empty() && self.pending_breaks > 0 {
            self.out.push_str(&"\n".repeat(self.pending_breaks));
        }
        self.pending_breaks = 0;
    }

    fn text(&mut self, text: &str) {
        let mut words = text.split_whitespace().peekable();
        if words.peek().is_none() {
            if !text.is_empty() {
                self.pending_space = true;
            }
            return;
        }

        if text.starts_with(char::is_whitespace) {
            self.pending_space = true;
        }
        for word in words {
            if self.pending_breaks > 0 {
                self.flush_breaks();
            } else if self.pending_space && !self.out.is_empty() && !self.out.ends_with(['\n', ' ']) {
                self.out.push(' ');
            }
            self.out.push_str(word);
            self.pending_space = true;
        }
        self.pending_space = text.ends_with(char::is_whitespace);
    }

    fn space(&mut self) {
        self.pending_space = true;
    }

    fn request_breaks(&mut self, count: usize) {
        self.pending_breaks = self.pending_breaks.max(count);
        self.pending_space = false;
    }

    fn line_break(&mut self) {
        self.request_breaks(1);
    }

    fn paragraph_break(&mut self) {
        self.request_breaks(2);
    }

    fn start_line(&mut self, prefix: &str) {
        self.flush_breaks();
        self.out.push_str(prefix);
        self.pending_space = false;
    }

    fn finish(self) -> String {
        let trimmed = self.out.trim_end();
        if trimmed.is_empty() {
            String::new()
        } else {
            format!("{}\n", trimmed)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHAPTER: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE html>
<html xmlns="http://www.w3.org/1999/xhtml">
<head><title>第一章</title><style>p { color: red; }</style></head>
<body>
  <h1>第一章</h1>
  <p>这是第一章的
     内容。</p>
  <p>Second <em>paragraph</em>.<br/>New line.</p>
  <ul><li>one</li><li>two</li></ul>
  <img src="a.png" alt="image"/>
</body>
</html>"#;

    #[test]
    fn test_formatted_text() {
        let text = FormattedText.convert(CHAPTER);
        assert_eq!(
            text,
            "# 第一章\n\n这是第一章的 内容。\n\nSecond paragraph.\nNew line.\n\n* one\n* two\n"
        );
    }

    #[test]
    fn test_plain_text() {
        let text = PlainText.convert(CHAPTER);
        assert_eq!(text, "第一章 这是第一章的 内容。 Second paragraph. New line. one two");
    }

    #[test]
    fn test_raw_html() {
        assert_eq!(RawHtml.convert(CHAPTER), CHAPTER);
    }

    #[test]
    fn test_conversion_is_deterministic() {
        assert_eq!(FormattedText.convert(CHAPTER), FormattedText.convert(CHAPTER));
    }

    #[test]
    fn test_empty_body() {
        let html = "<html><head><title>x</title></head><body>  </body></html>";
        assert_eq!(FormattedText.convert(html), "");
        assert_eq!(PlainText.convert(html), "");
    }

    #[test]
    fn test_text_style_converter() {
        assert_eq!(TextStyle::default(), TextStyle::Formatted);
        assert_eq!(TextStyle::Html.converter().convert("<p>a</p>"), "<p>a</p>");
        assert_eq!(TextStyle::Text.converter().convert("<p>a  b</p>"), "a b");
    }
}
