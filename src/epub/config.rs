//! 读取配置模块
//!
//! 提供文本提取的配置项，支持从YAML文件加载。

use crate::epub::error::{EpubError, Result};
use crate::epub::text::TextStyle;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// 文本提取配置
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    /// 内容文档的输出格式
    pub text_style: TextStyle,
    /// 文本条目声明大小的上限（字节），为空表示不限制
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_entry_size: Option<u64>,
}

impl ReaderConfig {
    /// 指定输出格式
    pub fn with_text_style(mut self, text_style: TextStyle) -> Self {
        self.text_style = text_style;
        self
    }

    /// 指定文本条目的大小上限
    pub fn with_max_entry_size(mut self, limit: Option<u64>) -> Self {
        self.max_entry_size = limit;
        self
    }

    /// 从YAML文本解析配置，缺省的字段使用默认值
    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yml::from_str(content)
            .map_err(|e| EpubError::ConfigError(format!("配置文件格式错误: {}", e)))
    }

    /// 从YAML文件加载配置
    ///
    /// # 示例
    ///
    /// ```no_run
    /// use epubtext::ReaderConfig;
    /// let config = ReaderConfig::from_file("epubtext.yaml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .map_err(|e| EpubError::ConfigError(format!("无法读取配置文件: {}", e)))?;
        Self::from_yaml(&content)
    }

    /// 序列化为YAML
    pub fn to_yaml(&self) -> Result<String> {
        serde_yml::to_string(self)
            .map_err(|e| EpubError::ConfigError(format!("序列化配置失败: {}", e)))
    }

    /// 把默认配置写入指定路径
    pub fn write_default<P: AsRef<Path>>(path: P) -> Result<()> {
        let yaml_content = Self::default().to_yaml()?;
        let content_with_header = format!(
            "# epubtext 配置文件\n# text_style: formatted | text | html\n# max_entry_size: 文本条目大小上限（字节），可省略\n\n{}",
            yaml_content
        );

        fs::write(path.as_ref(), content_with_header)
            .map_err(|e| EpubError::ConfigError(format!("写入配置文件失败: {}", e)))
    }
}
