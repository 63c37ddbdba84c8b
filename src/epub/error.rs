use std::io;
use std::string::FromUtf8Error;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, EpubError>;

/// 错误类别，便于调用方按类别匹配而不是比较错误信息
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// 归档结构不符合要求（缺少rootfile、缺少manifest等）
    Structural,
    /// 引用的文件在归档中不存在
    Lookup,
    /// 文本内容无法按UTF-8解码
    Decode,
    /// 底层流或解压错误
    Io,
    /// 配置文件错误
    Config,
}

/// EPUB文本提取相关的错误类型
#[derive(Error, Debug)]
pub enum EpubError {
    #[error("IO错误: {0}")]
    Io(#[from] io::Error),

    #[error("Zip流错误: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("XML解析错误: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("container.xml中没有找到rootfile (EPUB打包不正确，无法定位内容)")]
    NoRootfile,

    #[error("rootfile {rootfile} 中没有manifest")]
    MissingManifest { rootfile: String },

    #[error("声明的rootfile {path} 不存在于归档中")]
    MissingRootfile { path: String },

    #[error("manifest引用的文件 {href} 不存在于归档中 (查找路径: {path})")]
    DanglingReference { href: String, path: String },

    #[error("文件 {path} 不是有效的UTF-8文本: {source}")]
    Decode {
        path: String,
        #[source]
        source: FromUtf8Error,
    },

    #[error("条目 {path} 声明大小 {size} 字节，超过上限 {limit} 字节")]
    EntryTooLarge { path: String, size: u64, limit: u64 },

    #[error("配置文件错误: {0}")]
    ConfigError(String),
}

impl EpubError {
    /// 返回错误所属的类别
    pub fn kind(&self) -> ErrorKind {
        match self {
            EpubError::Io(_) | EpubError::Zip(_) => ErrorKind::Io,
            EpubError::Xml(_)
            | EpubError::NoRootfile
            | EpubError::MissingManifest { .. }
            | EpubError::EntryTooLarge { .. } => ErrorKind::Structural,
            EpubError::MissingRootfile { .. } | EpubError::DanglingReference { .. } => {
                ErrorKind::Lookup
            }
            EpubError::Decode { .. } => ErrorKind::Decode,
            EpubError::ConfigError(_) => ErrorKind::Config,
        }
    }
}

/// 按UTF-8解码条目内容
pub(crate) fn decode_utf8(path: &str, bytes: &[u8]) -> Result<String> {
    String::from_utf8(bytes.to_vec()).map_err(|source| EpubError::Decode {
        path: path.to_string(),
        source,
    })
}
