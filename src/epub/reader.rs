use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::{debug, info};

use crate::epub::archive::ArchiveStream;
use crate::epub::config::ReaderConfig;
use crate::epub::container::{Container, CONTAINER_FILE_NAME};
use crate::epub::error::{decode_utf8, EpubError, Result};
use crate::epub::normalize::{resolve_href, rootfile_directory, FileMap, UncompressedArchive};
use crate::epub::opf::Opf;
use crate::epub::text::TextConverter;
use crate::epub::xml::XmlParser;

/// 一个出版物的文本内容
///
/// `texts`中每一项对应manifest中的一个XHTML内容文档，顺序与manifest一致。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Epub {
    rootfile: String,
    texts: Vec<String>,
}

impl Epub {
    /// 创建新的Epub实例
    pub fn new(rootfile: String, texts: Vec<String>) -> Self {
        Self { rootfile, texts }
    }

    /// 该出版物对应的rootfile路径
    pub fn rootfile(&self) -> &str {
        &self.rootfile
    }

    /// 各内容文档的文本，按manifest顺序
    pub fn texts(&self) -> &[String] {
        &self.texts
    }

    pub fn into_texts(self) -> Vec<String> {
        self.texts
    }

    pub fn len(&self) -> usize {
        self.texts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.texts.is_empty()
    }

    /// 按顺序拼接所有文本，不插入任何分隔符
    pub fn dump_contents(&self) -> String {
        self.texts.concat()
    }
}

/// EPUB文本读取器
///
/// 持有解析配置，不持有任何归档状态；每次读取都使用独立的流和文件表，
/// 同一个读取器可以在多个线程中并行处理不同的归档。
pub struct EpubReader {
    config: ReaderConfig,
    xml: XmlParser,
    converter: Box<dyn TextConverter>,
}

impl Default for EpubReader {
    fn default() -> Self {
        Self::new()
    }
}

impl EpubReader {
    /// 使用默认配置创建读取器
    pub fn new() -> Self {
        Self::with_config(ReaderConfig::default())
    }

    /// 使用指定配置创建读取器
    pub fn with_config(config: ReaderConfig) -> Self {
        let converter = config.text_style.converter();
        Self {
            config,
            xml: XmlParser::lenient(),
            converter,
        }
    }

    /// 替换HTML转文本的实现
    pub fn with_converter(mut self, converter: Box<dyn TextConverter>) -> Self {
        self.converter = converter;
        self
    }

    /// 替换XML解析器配置
    pub fn with_xml_parser(mut self, xml: XmlParser) -> Self {
        self.xml = xml;
        self
    }

    pub fn config(&self) -> &ReaderConfig {
        &self.config
    }

    /// 从字节流读取所有出版物
    ///
    /// 流只会被顺序读取一次。任何一个出版物出错都会使整个读取失败。
    ///
    /// # 示例
    ///
    /// ```no_run
    /// use epubtext::EpubReader;
    ///
    /// let file = std::fs::File::open("book.epub")?;
    /// for epub in EpubReader::new().read(file)? {
    ///     println!("{}", epub.dump_contents());
    /// }
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn read<R: Read>(&self, reader: R) -> Result<Vec<Epub>> {
        let archive = self.uncompress(reader)?;
        self.read_uncompressed(&archive)
    }

    /// 从文件路径读取所有出版物
    pub fn read_path<P: AsRef<Path>>(&self, path: P) -> Result<Vec<Epub>> {
        let file = File::open(path.as_ref())?;
        info!(path = %path.as_ref().display(), "读取EPUB");
        self.read(BufReader::new(file))
    }

    /// 解压归档：收集文本条目、解析container.xml并规范化路径
    pub fn uncompress<R: Read>(&self, reader: R) -> Result<UncompressedArchive> {
        let stream = ArchiveStream::new(reader).with_max_entry_size(self.config.max_entry_size);

        let mut files: FileMap = HashMap::new();
        let mut rootfile_paths: Vec<String> = Vec::new();

        for entry in stream {
            let entry = entry?;
            let file_name = entry.file_name().to_string();
            let Some(payload) = entry.payload else {
                continue;
            };

            if file_name == CONTAINER_FILE_NAME {
                let container = Container::parse(&self.xml, &payload)?;
                rootfile_paths = container.rootfile_paths();
            } else {
                files.insert(entry.path, payload);
            }
        }

        if rootfile_paths.is_empty() {
            return Err(EpubError::NoRootfile);
        }

        debug!(rootfiles = ?rootfile_paths, files = files.len(), "归档解压完成");
        Ok(UncompressedArchive::new(rootfile_paths, files))
    }

    /// 逐个提取出版物，每个rootfile对应一个结果
    ///
    /// 与[`read`](Self::read)不同，一个出版物出错不会影响其他出版物。
    pub fn publications<'a>(
        &'a self,
        archive: &'a UncompressedArchive,
    ) -> impl Iterator<Item = Result<Epub>> + 'a {
        archive
            .rootfile_paths
            .iter()
            .map(move |rootfile| self.extract_publication(rootfile, &archive.files))
    }

    /// 按rootfile声明顺序提取所有出版物
    pub fn read_uncompressed(&self, archive: &UncompressedArchive) -> Result<Vec<Epub>> {
        self.publications(archive).collect()
    }

    fn extract_publication(&self, rootfile: &str, files: &FileMap) -> Result<Epub> {
        let rootfile_bytes = files.get(rootfile).ok_or_else(|| EpubError::MissingRootfile {
            path: rootfile.to_string(),
        })?;

        let opf = Opf::parse(&self.xml, rootfile, rootfile_bytes)?;
        let root_dir = rootfile_directory(rootfile);

        let mut texts = Vec::new();
        for item in opf.content_documents() {
            let Some(href) = item.href.as_deref() else {
                continue;
            };
            let path = resolve_href(root_dir, href);
            let contents = files.get(&path).ok_or_else(|| EpubError::DanglingReference {
                href: href.to_string(),
                path: path.clone(),
            })?;

            let html = decode_utf8(&path, contents)?;
            texts.push(self.converter.convert(&html));
        }

        info!(rootfile, documents = texts.len(), "提取出版物");
        Ok(Epub::new(rootfile.to_string(), texts))
    }
}
