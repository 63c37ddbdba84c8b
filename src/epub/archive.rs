//! 归档流模块
//!
//! 以只进方式读取ZIP流中的条目。输入不需要支持Seek，也不需要知道总长度。
//! 每个条目在返回前都会被完整读完：需要的文本条目保留字节，其余条目的字节被读出后丢弃，
//! 这样下一个条目的本地文件头总是从正确的位置开始读取。

use crate::epub::error::{EpubError, Result};
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;
use tracing::{debug, warn};
use zip::read::read_zipfile_from_stream;
use zip::ZipArchive;

/// 需要保留内容的文件扩展名（小写，含前导点）
pub const CONTENT_EXTENSIONS: [&str; 3] = [".xhtml", ".xml", ".opf"];

/// 判断条目内容是否需要保留
///
/// 只按扩展名判断：扩展名转为小写后必须属于[`CONTENT_EXTENSIONS`]。
/// 没有扩展名的路径（如`mimetype`）永远不保留。
pub fn is_textual(path: &str) -> bool {
    Path::new(path)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{}", ext.to_lowercase()))
        .is_some_and(|ext| CONTENT_EXTENSIONS.contains(&ext.as_str()))
}

/// 归档中的一个条目
#[derive(Debug, Clone)]
pub struct ArchiveEntry {
    /// 归档中存储的路径（以`/`分隔）
    pub path: String,
    /// 本地文件头中声明的解压后大小
    pub size: u64,
    /// 文本条目的内容；非文本条目为None
    pub payload: Option<Vec<u8>>,
}

impl ArchiveEntry {
    /// 是否为文本条目
    pub fn is_textual(&self) -> bool {
        self.payload.is_some()
    }

    /// 路径的最后一段
    pub fn file_name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }
}

/// 本地文件头（含文件名和扩展字段）可能的最大长度
const MAX_LOCAL_HEADER_LEN: usize = 30 + 2 * u16::MAX as usize;

/// 本地文件头签名
const LOCAL_HEADER_SIGNATURE: [u8; 4] = *b"PK\x03\x04";

/// 通用标志位第3位：大小和CRC写在数据之后的数据描述符中
const DATA_DESCRIPTOR_FLAG: u16 = 1 << 3;

/// 检查本地文件头是否声明了数据描述符
fn uses_data_descriptor(header: &[u8]) -> bool {
    header.len() >= 8
        && header[..4] == LOCAL_HEADER_SIGNATURE
        && u16::from_le_bytes([header[6], header[7]]) & DATA_DESCRIPTOR_FLAG != 0
}

/// 记录已消费字节数和当前条目头部字节的输入包装
struct Tracked<R> {
    inner: R,
    position: u64,
    entry_start: u64,
    header: Vec<u8>,
}

impl<R: Read> Tracked<R> {
    fn begin_entry(&mut self) {
        self.entry_start = self.position;
        self.header.clear();
    }
}

impl<R: Read> Read for Tracked<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        let room = MAX_LOCAL_HEADER_LEN.saturating_sub(self.header.len());
        self.header.extend_from_slice(&buf[..n.min(room)]);
        self.position += n as u64;
        Ok(n)
    }
}

/// 从某个条目开始缓冲的剩余输入
///
/// 对外呈现原始归档的偏移：`skipped`之前的字节已经被流式消费，读取时返回零。
/// 中央目录里的偏移因此无需修正。
struct ResumedInput {
    skipped: u64,
    tail: Vec<u8>,
    position: u64,
}

impl ResumedInput {
    fn len(&self) -> u64 {
        self.skipped + self.tail.len() as u64
    }
}

impl Read for ResumedInput {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = if self.position < self.skipped {
            let n = buf.len().min((self.skipped - self.position) as usize);
            buf[..n].fill(0);
            n
        } else {
            let offset = ((self.position - self.skipped) as usize).min(self.tail.len());
            let available = &self.tail[offset..];
            let n = buf.len().min(available.len());
            buf[..n].copy_from_slice(&available[..n]);
            n
        };
        self.position += n as u64;
        Ok(n)
    }
}

impl Seek for ResumedInput {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(offset) => Some(offset),
            SeekFrom::End(delta) => self.len().checked_add_signed(delta),
            SeekFrom::Current(delta) => self.position.checked_add_signed(delta),
        };
        match target {
            Some(target) => {
                self.position = target;
                Ok(target)
            }
            None => Err(io::Error::new(io::ErrorKind::InvalidInput, "seek到归档开始之前")),
        }
    }
}

enum Source<R> {
    /// 逐个读取本地文件头
    Streaming(Tracked<R>),
    /// 遇到数据描述符后改为按中央目录读取剩余条目
    Buffered {
        archive: ZipArchive<ResumedInput>,
        next_index: usize,
    },
}

enum Step {
    Entry(ArchiveEntry),
    End,
    Resume(ResumedInput),
}

/// ZIP流读取器
///
/// 包装任意`Read`，逐个产出[`ArchiveEntry`]。条目内容在`next_entry`内部被完整消费，
/// 调用方无法拿到一个只读了一半的条目。
///
/// 本地文件头不带大小的条目（流式写出的ZIP会在数据后附加数据描述符）无法只靠本地头定位，
/// 遇到这种条目时读入剩余输入，改由中央目录继续产出后续条目，顺序不变。
pub struct ArchiveStream<R: Read> {
    source: Source<R>,
    max_entry_size: Option<u64>,
    yielded: usize,
    finished: bool,
}

impl<R: Read> ArchiveStream<R> {
    /// 创建新的流读取器
    pub fn new(reader: R) -> Self {
        Self {
            source: Source::Streaming(Tracked {
                inner: reader,
                position: 0,
                entry_start: 0,
                header: Vec::new(),
            }),
            max_entry_size: None,
            yielded: 0,
            finished: false,
        }
    }

    /// 限制文本条目声明的最大大小
    pub fn with_max_entry_size(mut self, limit: Option<u64>) -> Self {
        self.max_entry_size = limit;
        self
    }

    /// 读取下一个条目，流结束时返回`Ok(None)`
    pub fn next_entry(&mut self) -> Result<Option<ArchiveEntry>> {
        if self.finished {
            return Ok(None);
        }

        loop {
            let step = match &mut self.source {
                Source::Streaming(tracked) => next_streamed(tracked, self.max_entry_size)?,
                Source::Buffered { archive, next_index } => {
                    next_buffered(archive, next_index, self.max_entry_size)?
                }
            };

            match step {
                Step::Entry(entry) => {
                    self.yielded += 1;
                    return Ok(Some(entry));
                }
                Step::End => {
                    self.finished = true;
                    return Ok(None);
                }
                Step::Resume(input) => {
                    warn!(
                        offset = input.skipped,
                        entries = self.yielded,
                        "条目使用数据描述符，改为按中央目录读取剩余条目"
                    );
                    self.source = Source::Buffered {
                        archive: ZipArchive::new(input)?,
                        next_index: self.yielded,
                    };
                }
            }
        }
    }
}

fn next_streamed<R: Read>(tracked: &mut Tracked<R>, limit: Option<u64>) -> Result<Step> {
    tracked.begin_entry();
    let err = match read_zipfile_from_stream(tracked) {
        Ok(Some(mut file)) => {
            let path = file.name().to_string();
            let (size, is_dir) = (file.size(), file.is_dir());
            return Ok(Step::Entry(take_entry(path, size, is_dir, &mut file, limit)?));
        }
        Ok(None) => return Ok(Step::End),
        Err(err) => err,
    };

    if !uses_data_descriptor(&tracked.header) {
        return Err(err.into());
    }
    debug!("本地文件头不含大小: {}", err);
    let skipped = tracked.entry_start;
    let mut tail = std::mem::take(&mut tracked.header);
    tracked.inner.read_to_end(&mut tail)?;
    Ok(Step::Resume(ResumedInput {
        skipped,
        tail,
        position: 0,
    }))
}

fn next_buffered(
    archive: &mut ZipArchive<ResumedInput>,
    next_index: &mut usize,
    limit: Option<u64>,
) -> Result<Step> {
    if *next_index >= archive.len() {
        return Ok(Step::End);
    }
    let index = *next_index;
    *next_index += 1;

    let mut file = archive.by_index(index)?;
    let path = file.name().to_string();
    let (size, is_dir) = (file.size(), file.is_dir());
    Ok(Step::Entry(take_entry(path, size, is_dir, &mut file, limit)?))
}

/// 完整消费一个条目：文本条目保留字节，其余读出后丢弃
fn take_entry(
    path: String,
    size: u64,
    is_dir: bool,
    data: &mut dyn Read,
    limit: Option<u64>,
) -> Result<ArchiveEntry> {
    let textual = !is_dir && is_textual(&path);

    if textual {
        if let Some(limit) = limit.filter(|limit| size > *limit) {
            return Err(EpubError::EntryTooLarge { path, size, limit });
        }
    }

    let payload = if textual {
        let mut bytes = Vec::with_capacity(size.min(1 << 20) as usize);
        data.read_to_end(&mut bytes)?;
        debug!(path = %path, bytes = bytes.len(), "保留文本条目");
        Some(bytes)
    } else {
        let drained = io::copy(data, &mut io::sink())?;
        debug!(path = %path, bytes = drained, "丢弃非文本条目");
        None
    };

    Ok(ArchiveEntry { path, size, payload })
}

impl<R: Read> Iterator for ArchiveStream<R> {
    type Item = Result<ArchiveEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_entry() {
            Ok(entry) => entry.map(Ok),
            Err(err) => {
                // 出错后流的位置不可信，不再继续
                self.finished = true;
                Some(Err(err))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};
    use zip::write::FileOptions;
    use zip::ZipWriter;

    fn build_zip(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, data) in entries {
            zip.start_file(*name, FileOptions::<()>::default()).unwrap();
            zip.write_all(data).unwrap();
        }
        zip.finish().unwrap().into_inner()
    }

    #[test]
    fn test_is_textual() {
        assert!(is_textual("OEBPS/chapter1.xhtml"));
        assert!(is_textual("META-INF/container.xml"));
        assert!(is_textual("OEBPS/content.opf"));
        assert!(is_textual("OEBPS/CONTENT.OPF"));
        assert!(!is_textual("OEBPS/style.css"));
        assert!(!is_textual("OEBPS/images/cover.jpg"));
        assert!(!is_textual("OEBPS/toc.ncx"));
        assert!(!is_textual("mimetype"));
        assert!(!is_textual("OEBPS/"));
    }

    #[test]
    fn test_streamed_entries_agree_with_classifier() {
        let names = [
            "OEBPS/Chapter.XHTML",
            "OEBPS/Content.Opf",
            "META-INF/container.Xml",
            "OEBPS/cover.JPG",
            "OEBPS/notes.xhtml.bak",
            "README",
        ];
        let entries: Vec<(&str, &[u8])> = names.iter().map(|name| (*name, &b"<x/>"[..])).collect();

        let streamed: Vec<ArchiveEntry> = ArchiveStream::new(Cursor::new(build_zip(&entries)))
            .collect::<Result<_>>()
            .unwrap();

        assert_eq!(streamed.len(), names.len());
        for entry in &streamed {
            assert_eq!(entry.is_textual(), is_textual(&entry.path), "{}", entry.path);
        }
        let kept: Vec<&str> = streamed
            .iter()
            .filter(|e| e.is_textual())
            .map(|e| e.path.as_str())
            .collect();
        assert_eq!(
            kept,
            vec!["OEBPS/Chapter.XHTML", "OEBPS/Content.Opf", "META-INF/container.Xml"]
        );
    }

    #[test]
    fn test_stream_retains_only_textual_entries() {
        let data = build_zip(&[
            ("mimetype", &b"application/epub+zip"[..]),
            ("OEBPS/cover.jpg", &[0xFF, 0xD8, 0xFF, 0xE0][..]),
            ("OEBPS/chapter.xhtml", &b"<html/>"[..]),
            ("OEBPS/style.css", &b"body {}"[..]),
        ]);

        let entries: Vec<ArchiveEntry> = ArchiveStream::new(Cursor::new(data))
            .collect::<Result<_>>()
            .unwrap();

        let paths: Vec<&str> = entries.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(
            paths,
            vec!["mimetype", "OEBPS/cover.jpg", "OEBPS/chapter.xhtml", "OEBPS/style.css"]
        );
        assert!(entries[0].payload.is_none());
        assert!(entries[1].payload.is_none());
        assert_eq!(entries[2].payload.as_deref(), Some(&b"<html/>"[..]));
        assert_eq!(entries[2].file_name(), "chapter.xhtml");
        assert_eq!(entries[2].size, 7);
        assert!(entries[3].payload.is_none());
    }

    #[test]
    fn test_stream_enforces_entry_limit() {
        let data = build_zip(&[("big.xhtml", &[b'a'; 64][..])]);
        let mut stream = ArchiveStream::new(Cursor::new(data)).with_max_entry_size(Some(16));
        match stream.next_entry() {
            Err(EpubError::EntryTooLarge { path, size, limit }) => {
                assert_eq!(path, "big.xhtml");
                assert_eq!(size, 64);
                assert_eq!(limit, 16);
            }
            other => panic!("期望EntryTooLarge错误，得到 {:?}", other),
        }
    }

    #[test]
    fn test_truncated_stream_is_an_error() {
        let mut data = build_zip(&[("a.xhtml", &[b'x'; 256][..])]);
        // 截断在第一个条目的本地文件头内部
        data.truncate(33);
        let result: Result<Vec<ArchiveEntry>> = ArchiveStream::new(Cursor::new(data)).collect();
        assert!(result.is_err());
    }

    #[test]
    fn test_stream_reads_data_descriptor_entries() {
        let mut zip = ZipWriter::new_stream(Vec::new());
        for (name, data) in [
            ("mimetype", &b"application/epub+zip"[..]),
            ("OEBPS/chapter.xhtml", &b"<html>chapter</html>"[..]),
            ("OEBPS/cover.jpg", &[0xFF, 0xD8, 0xFF, 0xE0][..]),
            ("OEBPS/content.opf", &b"<package/>"[..]),
        ] {
            zip.start_file(name, FileOptions::<()>::default()).unwrap();
            zip.write_all(data).unwrap();
        }
        let data = zip.finish().unwrap().into_inner();

        let entries: Vec<ArchiveEntry> = ArchiveStream::new(&data[..])
            .collect::<Result<_>>()
            .unwrap();

        let paths: Vec<&str> = entries.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(
            paths,
            vec!["mimetype", "OEBPS/chapter.xhtml", "OEBPS/cover.jpg", "OEBPS/content.opf"]
        );
        assert!(entries[0].payload.is_none());
        assert_eq!(entries[1].payload.as_deref(), Some(&b"<html>chapter</html>"[..]));
        assert!(entries[2].payload.is_none());
        assert_eq!(entries[3].payload.as_deref(), Some(&b"<package/>"[..]));
    }

    #[test]
    fn test_stream_switches_to_central_directory_mid_archive() {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let stored = FileOptions::<()>::default().compression_method(zip::CompressionMethod::Stored);
        for (name, data) in [
            ("a.xhtml", &b"<p>first</p>"[..]),
            ("b.xhtml", &b"<p>second</p>"[..]),
            ("c.css", &b"p {}"[..]),
            ("d.opf", &b"<package/>"[..]),
        ] {
            zip.start_file(name, stored).unwrap();
            zip.write_all(data).unwrap();
        }
        let mut data = zip.finish().unwrap().into_inner();

        // 只在第二个条目的本地文件头上标记数据描述符
        let second = data
            .windows(4)
            .enumerate()
            .filter(|(_, window)| *window == LOCAL_HEADER_SIGNATURE)
            .map(|(offset, _)| offset)
            .nth(1)
            .unwrap();
        data[second + 6] |= DATA_DESCRIPTOR_FLAG as u8;

        let entries: Vec<ArchiveEntry> = ArchiveStream::new(&data[..])
            .collect::<Result<_>>()
            .unwrap();

        let paths: Vec<&str> = entries.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, vec!["a.xhtml", "b.xhtml", "c.css", "d.opf"]);
        assert_eq!(entries[0].payload.as_deref(), Some(&b"<p>first</p>"[..]));
        assert_eq!(entries[1].payload.as_deref(), Some(&b"<p>second</p>"[..]));
        assert!(entries[2].payload.is_none());
        assert_eq!(entries[3].payload.as_deref(), Some(&b"<package/>"[..]));
    }

    #[test]
    fn test_data_descriptor_flag_detection() {
        let mut header = [0u8; 30];
        header[..4].copy_from_slice(&LOCAL_HEADER_SIGNATURE);
        assert!(!uses_data_descriptor(&header));
        header[6] = 0x08;
        assert!(uses_data_descriptor(&header));
        assert!(!uses_data_descriptor(&header[..6]));
        header[0] = b'X';
        assert!(!uses_data_descriptor(&header));
    }
}
