use crate::epub::error::{EpubError, Result};
use crate::epub::xml::{ns, XmlParser};
use tracing::debug;

/// OPF包文件的媒体类型
pub const OPF_MEDIA_TYPE: &str = "application/oebps-package+xml";

/// 容器文件的文件名（按文件名匹配，不要求位于META-INF下）
pub const CONTAINER_FILE_NAME: &str = "container.xml";

/// Container.xml中的rootfile信息
#[derive(Debug, Clone, PartialEq)]
pub struct RootFile {
    pub full_path: String,
    pub media_type: String,
}

/// Container.xml的解析结果
#[derive(Debug, Clone)]
pub struct Container {
    pub rootfiles: Vec<RootFile>,
}

impl Container {
    /// 解析container.xml内容
    ///
    /// 只收集CONTAINERS命名空间下、`media-type`为OPF类型且`full-path`非空的rootfile，
    /// 按文档顺序保留，重复项不去除。没有任何符合条件的rootfile时返回[`EpubError::NoRootfile`]。
    ///
    /// # 参数
    /// * `parser` - XML解析器配置
    /// * `bytes` - container.xml的原始字节
    pub fn parse(parser: &XmlParser, bytes: &[u8]) -> Result<Container> {
        let root = parser.parse_bytes(CONTAINER_FILE_NAME, bytes)?;

        let rootfiles: Vec<RootFile> = root
            .iter()
            .flat_map(|root| root.iter())
            .filter(|element| element.is(ns::CONTAINERS, "rootfile"))
            .filter_map(|element| {
                let media_type = element.attr("media-type")?;
                let full_path = element.attr("full-path")?;
                (media_type == OPF_MEDIA_TYPE && !full_path.is_empty()).then(|| RootFile {
                    full_path: full_path.to_string(),
                    media_type: media_type.to_string(),
                })
            })
            .collect();

        if rootfiles.is_empty() {
            return Err(EpubError::NoRootfile);
        }

        debug!(count = rootfiles.len(), "解析到rootfile");
        Ok(Container { rootfiles })
    }

    /// 所有rootfile的路径，按声明顺序
    pub fn rootfile_paths(&self) -> Vec<String> {
        self.rootfiles.iter().map(|rf| rf.full_path.clone()).collect()
    }
}
