//! 清单模块
//!
//! 提供EPUB包中文件清单的结构定义。

/// XHTML内容文档的媒体类型
pub const XHTML_MEDIA_TYPE: &str = "application/xhtml+xml";

/// 修正常见的媒体类型错误写法，其余值原样返回
pub fn normalize_media_type(media_type: &str) -> &str {
    match media_type {
        "image/jpg" => "image/jpeg",
        other => other,
    }
}

/// 清单项信息
#[derive(Debug, Clone, PartialEq)]
pub struct ManifestItem {
    /// 项目ID
    pub id: String,
    /// 文件路径(相对于OPF文件所在目录)
    pub href: Option<String>,
    /// 规范化后的媒体类型
    pub media_type: Option<String>,
}

impl ManifestItem {
    /// 创建新的清单项，媒体类型会被规范化
    pub fn new(id: String, href: Option<String>, media_type: Option<&str>) -> Self {
        Self {
            id,
            href,
            media_type: media_type.map(|mt| normalize_media_type(mt).to_string()),
        }
    }

    /// 检查是否为XHTML内容文档
    pub fn is_xhtml(&self) -> bool {
        self.media_type.as_deref() == Some(XHTML_MEDIA_TYPE)
    }
}
