//! OPF解析器模块
//!
//! 提供OPF（Open Packaging Format）文件manifest的解析功能。

use crate::epub::error::{EpubError, Result};
use crate::epub::opf::manifest::ManifestItem;
use crate::epub::xml::{ns, XmlParser};
use tracing::debug;

/// OPF文件解析结果
#[derive(Debug, Clone)]
pub struct Opf {
    /// 清单项，按manifest中的文档顺序
    pub manifest: Vec<ManifestItem>,
}

impl Opf {
    /// 解析OPF文件
    ///
    /// manifest必须是根元素在OPF命名空间下的直接子元素，找不到时返回
    /// [`EpubError::MissingManifest`]。manifest下所有OPF命名空间的`item`后代元素
    /// 都会按文档顺序收集。
    ///
    /// # 参数
    /// * `parser` - XML解析器配置
    /// * `rootfile` - OPF文件路径，用于错误信息
    /// * `bytes` - OPF文件的原始字节
    pub fn parse(parser: &XmlParser, rootfile: &str, bytes: &[u8]) -> Result<Opf> {
        let missing_manifest = || EpubError::MissingManifest {
            rootfile: rootfile.to_string(),
        };

        let root = parser.parse_bytes(rootfile, bytes)?.ok_or_else(missing_manifest)?;
        let manifest_element = root
            .find_child(ns::OPF, "manifest")
            .ok_or_else(missing_manifest)?;

        let manifest: Vec<ManifestItem> = manifest_element
            .iter()
            .filter(|element| element.is(ns::OPF, "item"))
            .map(|element| {
                ManifestItem::new(
                    element.attr("id").unwrap_or_default().to_string(),
                    element.attr("href").map(str::to_string),
                    element.attr("media-type"),
                )
            })
            .collect();

        debug!(rootfile, items = manifest.len(), "解析manifest");

        Ok(Opf { manifest })
    }

    /// 按manifest顺序返回所有带href的XHTML内容文档
    pub fn content_documents(&self) -> impl Iterator<Item = &ManifestItem> {
        self.manifest
            .iter()
            .filter(|item| item.is_xhtml() && item.href.is_some())
    }
}
