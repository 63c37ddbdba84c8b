//! 路径规范化模块
//!
//! container.xml中的rootfile路径相对于OCF根目录，而OCF根目录不一定是归档的顶层：
//! 有些制作工具会把整个OCF结构再包一层目录，例如
//!
//! ```text
//! 归档顶层
//! ├── actual_epub_root
//! │   ├── EPUB_FILES
//! │   │   └── epub_content.opf
//! │   ├── META-INF
//! │   │   └── container.xml
//! │   └── mimetype
//! └── random_directory
//!     └── unimportant_file
//! ```
//!
//! 此时`EPUB_FILES/epub_content.opf`在归档里的真实路径多了一段前缀。
//! 这里只处理恰好多一层目录的情况。

use std::collections::HashMap;
use tracing::debug;

/// 规范化路径到文件内容的映射
pub type FileMap = HashMap<String, Vec<u8>>;

/// 解压后的归档
#[derive(Debug, Clone)]
pub struct UncompressedArchive {
    /// rootfile路径，按container.xml中的声明顺序
    pub rootfile_paths: Vec<String>,
    /// 规范化后的文本文件
    pub files: FileMap,
}

impl UncompressedArchive {
    /// 由收集到的文件构建，必要时规范化路径
    pub fn new(rootfile_paths: Vec<String>, files: FileMap) -> Self {
        let files = normalize_paths(&rootfile_paths, files);
        Self {
            rootfile_paths,
            files,
        }
    }
}

/// 让文件路径以OCF根目录为基准
///
/// 只检查第一个rootfile：同一个归档中的所有rootfile共享同一个OCF根目录。
/// 如果它已经是一个键，原样返回；否则去掉每个路径的第一段，
/// 直接位于归档顶层的文件被丢弃。
pub fn normalize_paths(rootfile_paths: &[String], files: FileMap) -> FileMap {
    match rootfile_paths.first() {
        Some(first) if !files.contains_key(first) => {}
        _ => return files,
    }

    debug!("rootfile不在归档顶层，去掉一层包装目录");

    files
        .into_iter()
        .filter_map(|(path, bytes)| {
            let (_, rest) = path.split_once('/')?;
            Some((rest.to_string(), bytes))
        })
        .collect()
}

/// rootfile所在的目录段，用于拼接manifest中的相对路径
///
/// 取路径的第一段。rootfile直接位于OCF根目录（路径中没有`/`）时有意不取第一段，
/// 而是返回空字符串：否则`content.opf`会被当成目录，href解析成`content.opf/<href>`，
/// 永远找不到对应文件。
pub fn rootfile_directory(rootfile_path: &str) -> &str {
    match rootfile_path.split_once('/') {
        Some((first, _)) => first,
        None => "",
    }
}

/// 把manifest中的href解析为FileMap中的键
pub fn resolve_href(root_dir: &str, href: &str) -> String {
    if root_dir.is_empty() {
        href.to_string()
    } else {
        format!("{}/{}", root_dir, href)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file_map(paths: &[&str]) -> FileMap {
        paths
            .iter()
            .map(|path| (path.to_string(), path.as_bytes().to_vec()))
            .collect()
    }

    fn sorted_keys(files: &FileMap) -> Vec<&str> {
        let mut keys: Vec<&str> = files.keys().map(String::as_str).collect();
        keys.sort();
        keys
    }

    #[test]
    fn test_no_normalization_when_rootfile_present() {
        let rootfiles = vec!["OEBPS/content.opf".to_string()];
        let files = file_map(&["OEBPS/content.opf", "OEBPS/ch1.xhtml"]);
        let normalized = normalize_paths(&rootfiles, files.clone());
        assert_eq!(normalized, files);
    }

    #[test]
    fn test_strips_wrapping_directory() {
        let rootfiles = vec!["EPUB_FILES/epub_content.opf".to_string()];
        let files = file_map(&[
            "actual_epub_root/EPUB_FILES/epub_content.opf",
            "actual_epub_root/EPUB_FILES/ch1.xhtml",
            "random_directory/unimportant_file.xml",
            "top_level.xml",
        ]);

        let normalized = normalize_paths(&rootfiles, files);
        assert_eq!(
            sorted_keys(&normalized),
            vec!["EPUB_FILES/ch1.xhtml", "EPUB_FILES/epub_content.opf", "unimportant_file.xml"]
        );
        assert_eq!(
            normalized["EPUB_FILES/ch1.xhtml"],
            b"actual_epub_root/EPUB_FILES/ch1.xhtml".to_vec()
        );
    }

    #[test]
    fn test_normalization_is_idempotent() {
        let rootfiles = vec!["EPUB_FILES/epub_content.opf".to_string()];
        let files = file_map(&[
            "wrap/EPUB_FILES/epub_content.opf",
            "wrap/EPUB_FILES/ch1.xhtml",
        ]);

        let once = normalize_paths(&rootfiles, files);
        let twice = normalize_paths(&rootfiles, once.clone());
        assert_eq!(once, twice);
    }

    #[test]
    fn test_only_one_level_is_stripped() {
        let rootfiles = vec!["OEBPS/content.opf".to_string()];
        let files = file_map(&["outer/inner/OEBPS/content.opf"]);
        let normalized = normalize_paths(&rootfiles, files);
        assert_eq!(sorted_keys(&normalized), vec!["inner/OEBPS/content.opf"]);
    }

    #[test]
    fn test_rootfile_directory() {
        assert_eq!(rootfile_directory("OEBPS/content.opf"), "OEBPS");
        assert_eq!(rootfile_directory("OEBPS/sub/content.opf"), "OEBPS");
        assert_eq!(rootfile_directory("content.opf"), "");
    }

    #[test]
    fn test_resolve_href() {
        assert_eq!(resolve_href("OEBPS", "text/ch1.xhtml"), "OEBPS/text/ch1.xhtml");
        assert_eq!(resolve_href("", "ch1.xhtml"), "ch1.xhtml");
    }
}
