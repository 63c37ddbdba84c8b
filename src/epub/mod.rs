pub mod error;
pub mod xml;
pub mod archive;
pub mod container;
pub mod normalize;
pub mod opf;
pub mod text;
pub mod config;
pub mod reader;

// 重新导出错误处理
pub use error::{EpubError, ErrorKind, Result};

// 重新导出归档流相关
pub use archive::{is_textual, ArchiveEntry, ArchiveStream, CONTENT_EXTENSIONS};

// 重新导出容器相关
pub use container::{Container, RootFile};

// 重新导出路径规范化相关
pub use normalize::{normalize_paths, FileMap, UncompressedArchive};

// 重新导出OPF相关
pub use opf::{normalize_media_type, ManifestItem, Opf};

// 重新导出文本转换与配置
pub use text::{FormattedText, PlainText, RawHtml, TextConverter, TextStyle};
pub use config::ReaderConfig;
pub use xml::{XmlElement, XmlParser};

// 重新导出EPUB读取器
pub use reader::{Epub, EpubReader};
