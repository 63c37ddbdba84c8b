//! OPF（Open Packaging Format）文件解析模块
//!
//! 此模块解析EPUB包文件的manifest，按manifest顺序找出所有XHTML内容文档。

mod manifest;
mod parser;

pub use manifest::{normalize_media_type, ManifestItem, XHTML_MEDIA_TYPE};
pub use parser::Opf;
