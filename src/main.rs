use clap::Parser;
use epubtext::{EpubReader, ReaderConfig, Result, TextStyle};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// 📚 epubtext - EPUB文本提取工具
#[derive(Parser)]
#[command(name = "epubtext")]
#[command(about = "从EPUB文件中提取纯文本")]
#[command(version)]
struct Args {
    /// EPUB文件路径，使用 - 从标准输入读取
    #[arg(help = "要处理的EPUB文件路径（- 表示标准输入）", required_unless_present = "init_config")]
    epub_file: Option<String>,

    /// 文本输出格式
    #[arg(long, value_enum, help = "内容文档的输出格式（覆盖配置文件）")]
    format: Option<TextStyle>,

    /// 配置文件路径
    #[arg(long, help = "YAML配置文件路径")]
    config: Option<String>,

    /// 只输出指定的出版物
    #[arg(short, long, help = "只输出第N个出版物（从1开始）")]
    publication: Option<usize>,

    /// 只列出出版物信息
    #[arg(short, long, help = "列出各出版物的rootfile和文档数，不输出正文")]
    list: bool,

    /// 详细输出模式
    #[arg(short, long, help = "输出调试日志")]
    verbose: bool,

    /// 生成默认配置文件
    #[arg(long, help = "把默认配置写入指定路径后退出")]
    init_config: Option<String>,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let default_filter = if args.verbose { "epubtext=debug" } else { "epubtext=info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("❌ 错误: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<()> {
    if let Some(path) = &args.init_config {
        ReaderConfig::write_default(path)?;
        eprintln!("已生成配置文件: {}", path);
        return Ok(());
    }

    let mut config = match &args.config {
        Some(path) => ReaderConfig::from_file(path)?,
        None => ReaderConfig::default(),
    };
    if let Some(format) = args.format {
        config = config.with_text_style(format);
    }

    let reader = EpubReader::with_config(config);
    let epubs = match args.epub_file.as_deref() {
        Some("-") => reader.read(std::io::stdin().lock())?,
        Some(path) => reader.read_path(path)?,
        None => return Ok(()),
    };

    for (i, epub) in epubs.iter().enumerate() {
        if args.publication.is_some_and(|n| n != i + 1) {
            continue;
        }

        if args.list {
            println!("{}. {} ({} 个内容文档)", i + 1, epub.rootfile(), epub.len());
        } else {
            print!("{}", epub.dump_contents());
        }
    }

    Ok(())
}
