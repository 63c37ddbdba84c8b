pub mod epub;

// === 核心API重新导出 ===

/// 出版物文本与读取器（主要接口）
pub use epub::{Epub, EpubReader};

/// 错误处理
pub use epub::{EpubError, ErrorKind, Result};

/// 配置与文本转换
pub use epub::{FormattedText, PlainText, RawHtml, ReaderConfig, TextConverter, TextStyle};

// === 底层组件（高级用法） ===

/// 归档流组件
pub use epub::{is_textual, ArchiveEntry, ArchiveStream};

/// 容器与路径组件
pub use epub::{normalize_paths, Container, FileMap, RootFile, UncompressedArchive};

/// OPF与XML组件
pub use epub::{normalize_media_type, ManifestItem, Opf, XmlElement, XmlParser};

// === 库信息 ===

/// 库的版本信息
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// 库的描述
pub const DESCRIPTION: &str = "从EPUB出版物中流式提取纯文本";

// === 便捷函数 ===

/// 使用默认配置从字节流读取所有出版物
///
/// 这是 `EpubReader::new().read` 的便捷包装函数。输入不需要支持Seek。
///
/// # 示例
///
/// ```no_run
/// let file = std::fs::File::open("book.epub")?;
/// let epubs = epubtext::read(file)?;
/// println!("{}", epubs[0].dump_contents());
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn read<R: std::io::Read>(reader: R) -> Result<Vec<Epub>> {
    EpubReader::new().read(reader)
}

/// 使用默认配置读取EPUB文件
pub fn open<P: AsRef<std::path::Path>>(path: P) -> Result<Vec<Epub>> {
    EpubReader::new().read_path(path)
}
