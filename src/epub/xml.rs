//! XML解析模块
//!
//! 提供命名空间常量表、容错的XML解析器配置，以及一个只保留元素和属性的轻量元素树。
//! container.xml和OPF文件都通过这里解析，按命名空间URI和本地名匹配元素。

use crate::epub::error::{decode_utf8, Result};
use std::borrow::Cow;
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::{Namespace, ResolveResult};
use quick_xml::reader::NsReader;
use tracing::warn;

/// EPUB中常用的命名空间
pub mod ns {
    pub const OPF: &str = "http://www.idpf.org/2007/opf";
    pub const CONTAINERS: &str = "urn:oasis:names:tc:opendocument:xmlns:container";
}

/// XML元素
#[derive(Debug, Clone, PartialEq)]
pub struct XmlElement {
    /// 命名空间URI（未绑定时为None）
    pub namespace: Option<String>,
    /// 本地名
    pub local_name: String,
    /// 属性列表，键为原始限定名，按文档顺序
    pub attributes: Vec<(String, String)>,
    /// 子元素，按文档顺序
    pub children: Vec<XmlElement>,
}

impl XmlElement {
    fn from_start(namespace: Option<String>, e: &BytesStart, recover: bool) -> Result<Self> {
        let mut attributes = Vec::new();
        for attr_result in e.attributes().with_checks(!recover) {
            let attr = match attr_result {
                Ok(attr) => attr,
                Err(err) if recover => {
                    warn!("忽略无效属性: {}", err);
                    continue;
                }
                Err(err) => return Err(quick_xml::Error::InvalidAttr(err).into()),
            };
            let key = String::from_utf8_lossy(attr.key.as_ref()).to_string();
            let value = match attr.unescape_value() {
                Ok(value) => value.to_string(),
                // 未知实体（如&nbsp;）保留原文
                Err(_) if recover => String::from_utf8_lossy(&attr.value).to_string(),
                Err(err) => return Err(err.into()),
            };
            attributes.push((key, value));
        }

        Ok(Self {
            namespace,
            local_name: String::from_utf8_lossy(e.local_name().as_ref()).to_string(),
            attributes,
            children: Vec::new(),
        })
    }

    /// 检查元素的命名空间和本地名
    pub fn is(&self, namespace: &str, local_name: &str) -> bool {
        self.namespace.as_deref() == Some(namespace) && self.local_name == local_name
    }

    /// 按限定名获取属性值
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// 查找第一个匹配的直接子元素
    pub fn find_child(&self, namespace: &str, local_name: &str) -> Option<&XmlElement> {
        self.children.iter().find(|child| child.is(namespace, local_name))
    }

    /// 先序遍历元素自身及所有后代元素（文档顺序）
    pub fn iter(&self) -> Descendants<'_> {
        Descendants { stack: vec![self] }
    }
}

/// 元素树的先序遍历迭代器
pub struct Descendants<'a> {
    stack: Vec<&'a XmlElement>,
}

impl<'a> Iterator for Descendants<'a> {
    type Item = &'a XmlElement;

    fn next(&mut self) -> Option<Self::Item> {
        let element = self.stack.pop()?;
        self.stack.extend(element.children.iter().rev());
        Some(element)
    }
}

/// XML解析器配置
///
/// 无状态的配置值，每次解析时显式传入，可以在多个线程间共享。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct XmlParser {
    /// 遇到不规范的标记时尽量恢复而不是报错
    pub recover: bool,
}

impl Default for XmlParser {
    fn default() -> Self {
        Self::lenient()
    }
}

impl XmlParser {
    /// 容错解析：未闭合标签、错配的结束标签、文档末尾的杂散字节都不会导致失败
    pub const fn lenient() -> Self {
        Self { recover: true }
    }

    /// 严格解析：任何语法错误都会返回错误
    pub const fn strict() -> Self {
        Self { recover: false }
    }

    /// 解码字节后解析
    ///
    /// 内容先按UTF-8解码，文档内的encoding声明不会影响解析。
    pub fn parse_bytes(&self, path: &str, bytes: &[u8]) -> Result<Option<XmlElement>> {
        let text = decode_utf8(path, bytes)?;
        self.parse(&text)
    }

    /// 解析XML文本，返回根元素
    ///
    /// 文档中没有任何元素时返回`Ok(None)`。容错模式下，读到根元素之后的语法错误只记录警告，
    /// 解析从错误之后继续；不能开始任何标记的`<`当作普通文本。
    pub fn parse(&self, text: &str) -> Result<Option<XmlElement>> {
        let text = text.trim_start_matches('\u{feff}');
        let text = if self.recover {
            escape_stray_markup(text)
        } else {
            Cow::Borrowed(text)
        };
        let mut reader = NsReader::from_str(&text);
        reader.config_mut().trim_text(true);
        reader.config_mut().expand_empty_elements = true;
        reader.config_mut().check_end_names = !self.recover;

        let mut stack: Vec<XmlElement> = Vec::new();
        let mut root: Option<XmlElement> = None;
        let mut last_error_position = None;

        loop {
            let result = reader
                .read_resolved_event()
                .map(|(resolved, event)| (resolve_namespace(resolved), event));
            let (namespace, event) = match result {
                Ok(resolved) => resolved,
                Err(err) if self.recover && (root.is_some() || !stack.is_empty()) => {
                    let position = reader.buffer_position();
                    if last_error_position == Some(position) {
                        warn!("XML不规范且无法继续，停止解析: {}", err);
                        break;
                    }
                    warn!(position, "跳过不规范的XML: {}", err);
                    last_error_position = Some(position);
                    continue;
                }
                Err(err) => return Err(err.into()),
            };

            match event {
                Event::Start(ref e) => {
                    if root.is_some() {
                        // 根元素之后的内容
                        if self.recover {
                            warn!("忽略根元素之后的多余元素");
                            break;
                        }
                        continue;
                    }
                    stack.push(XmlElement::from_start(namespace, e, self.recover)?);
                }
                Event::End(ref e) => {
                    let local_name = e.local_name();
                    let matched = stack.iter().rposition(|open| {
                        open.namespace == namespace && open.local_name.as_bytes() == local_name.as_ref()
                    });
                    match matched {
                        Some(position) => {
                            while stack.len() > position {
                                close_top(&mut stack, &mut root);
                            }
                        }
                        None => warn!(
                            "忽略没有对应开始标签的结束标签: {}",
                            String::from_utf8_lossy(local_name.as_ref())
                        ),
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if !stack.is_empty() {
            warn!("文档结束时仍有 {} 个未闭合的元素", stack.len());
        }
        while !stack.is_empty() {
            close_top(&mut stack, &mut root);
        }

        Ok(root)
    }
}

/// 把不能开始任何标记的`<`转义为`&lt;`
///
/// 合法的标记以名称字符、`/`、`!`或`?`紧跟在`<`之后。
fn escape_stray_markup(text: &str) -> Cow<'_, str> {
    let is_stray = |i: usize| {
        !text[i + 1..].starts_with(|c: char| c.is_alphabetic() || matches!(c, '_' | ':' | '/' | '!' | '?'))
    };
    if !text.match_indices('<').any(|(i, _)| is_stray(i)) {
        return Cow::Borrowed(text);
    }

    let mut escaped = String::with_capacity(text.len() + 16);
    let mut copied = 0;
    for (i, _) in text.match_indices('<') {
        if is_stray(i) {
            escaped.push_str(&text[copied..i]);
            escaped.push_str("&lt;");
            copied = i + 1;
        }
    }
    escaped.push_str(&text[copied..]);
    Cow::Owned(escaped)
}

fn resolve_namespace(resolved: ResolveResult) -> Option<String> {
    match resolved {
        ResolveResult::Bound(Namespace(uri)) => Some(String::from_utf8_lossy(uri).to_string()),
        _ => None,
    }
}

/// 弹出栈顶元素并挂到父元素（或作为根元素）
fn close_top(stack: &mut Vec<XmlElement>, root: &mut Option<XmlElement>) {
    if let Some(element) = stack.pop() {
        match stack.last_mut() {
            Some(parent) => parent.children.push(element),
            None => *root = Some(element),
        }
    }
}
