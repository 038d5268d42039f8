//! Pixel Mask - 命令行示例
//!
//! 加载图像, 可选择帧、转换灰度、旋转, 然后对颜色通道做遮罩并保存.
//!
//! 用法:
//!   pixel_mask [选项] <输入文件> [输出文件]

use anyhow::{Context, bail};
use pixel_mask::{
    Bitmap, ChannelMask, Document, ImageBuffer, ImageCodec, ImageRsCodec, apply_channel_mask,
};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_appender::rolling;

/// 应用程序名称
pub const APP_NAME: &str = "Pixel Mask";

/// 应用程序版本（从 Cargo.toml 读取）
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// 命令行选项
#[derive(Debug, Default, PartialEq)]
struct CliOptions {
    input: Option<PathBuf>,
    output: Option<PathBuf>,
    /// 从 1 开始的帧号
    frame: Option<usize>,
    greyscale: bool,
    /// 顺时针旋转角度, 归一化到 [0, 360)
    rotate: f32,
    mask: Option<ChannelMask>,
    info: bool,
    log_dir: Option<PathBuf>,
    help: bool,
}

/// 解析命令行参数 (不含程序名)
fn parse_args<I>(args: I) -> anyhow::Result<CliOptions>
where
    I: IntoIterator<Item = String>,
{
    let mut options = CliOptions::default();
    let mut args = args.into_iter();

    while let Some(arg) = args.next() {
        let mut value = |name: &str| {
            args.next()
                .with_context(|| format!("选项 {} 缺少参数", name))
        };

        match arg.as_str() {
            "--help" | "-h" => options.help = true,
            "--info" => options.info = true,
            "--greyscale" | "--grayscale" => options.greyscale = true,
            "--red-only" => options.mask = Some(ChannelMask::RED_ONLY),
            "--green-only" => options.mask = Some(ChannelMask::GREEN_ONLY),
            "--blue-only" => options.mask = Some(ChannelMask::BLUE_ONLY),
            "--mask" => {
                let raw = value("--mask")?;
                options.mask = Some(raw.parse().with_context(|| format!("无效的遮罩: {}", raw))?);
            }
            "--frame" => {
                let raw = value("--frame")?;
                let frame: usize = raw.parse().with_context(|| format!("无效的帧号: {}", raw))?;
                if frame == 0 {
                    bail!("帧号从 1 开始");
                }
                options.frame = Some(frame);
            }
            "--rotate" => {
                let raw = value("--rotate")?;
                let degrees: f32 = raw.parse().with_context(|| format!("无效的角度: {}", raw))?;
                if !degrees.is_finite() {
                    bail!("无效的角度: {}", raw);
                }
                options.rotate = degrees.rem_euclid(360.0);
            }
            "--log-dir" => options.log_dir = Some(PathBuf::from(value("--log-dir")?)),
            other if other.starts_with('-') => bail!("未知选项: {}", other),
            _ => {
                if options.input.is_none() {
                    options.input = Some(PathBuf::from(&arg));
                } else if options.output.is_none() {
                    options.output = Some(PathBuf::from(&arg));
                } else {
                    bail!("多余的参数: {}", arg);
                }
            }
        }
    }

    Ok(options)
}

fn print_usage() {
    println!("{} {}", APP_NAME, APP_VERSION);
    println!();
    println!("使用方法:");
    println!("  pixel_mask [选项] <输入文件> [输出文件]");
    println!();
    println!("选项:");
    println!("  --frame N          选择第 N 帧 (从 1 开始)");
    println!("  --greyscale        转换为 8 位灰阶");
    println!("  --rotate DEG       绕中心顺时针旋转任意角度");
    println!("  --red-only         只保留红色通道");
    println!("  --green-only       只保留绿色通道");
    println!("  --blue-only        只保留蓝色通道");
    println!("  --mask RR,GG,BB    自定义十六进制通道遮罩");
    println!("  --info             显示图像信息和调色板");
    println!("  --log-dir DIR      同时把日志写入 DIR 下按天滚动的文件");
    println!("  --help, -h         显示帮助信息");
    println!();
    println!("未给出输出文件时只显示图像信息. 日志级别可用 RUST_LOG 调整.");
}

/// 初始化日志 - 输出到控制台, 可选同时输出到文件
fn init_logging(log_dir: Option<&Path>) {
    use tracing_subscriber::{EnvFilter, Registry, layer::SubscriberExt, util::SubscriberInitExt};

    // 根据编译配置选择日志级别
    #[cfg(debug_assertions)]
    let default_level = "debug";
    #[cfg(not(debug_assertions))]
    let default_level = "info";

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let file_layer = log_dir.map(|dir| {
        tracing_subscriber::fmt::layer()
            .with_writer(rolling::daily(dir, "pixel-mask.log"))
            .with_ansi(false)
            .with_level(true)
            .with_target(true)
    });

    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .with_level(true)
        .with_target(false);

    Registry::default()
        .with(filter)
        .with(file_layer)
        .with(console_layer)
        .init();
}

/// 调色板条目的文本形式, 直接颜色图像为空
fn palette_lines(bitmap: &Bitmap) -> Vec<String> {
    bitmap
        .palette()
        .map(|palette| {
            palette
                .iter()
                .enumerate()
                .map(|(i, color)| format!("[{:3}] {}", i, color.to_hex_string(false)))
                .collect()
        })
        .unwrap_or_default()
}

/// 输出调色板条目
fn print_palette(bitmap: &Bitmap) {
    let lines = palette_lines(bitmap);
    if lines.is_empty() {
        return;
    }
    info!("调色板: {} 个条目", lines.len());
    for line in &lines {
        info!("  {}", line);
    }
}

/// 按 选帧 -> 灰度 -> 旋转 -> 遮罩 -> 保存 的顺序执行
fn run<C: ImageCodec>(codec: &C, options: &CliOptions) -> anyhow::Result<()> {
    let Some(input) = options.input.as_deref() else {
        bail!("缺少输入文件, 使用 --help 查看用法");
    };

    let mut document = Document::open(codec, input)
        .with_context(|| format!("加载图像失败: {}", input.display()))?;
    info!("图像格式: {}", document.format_name());
    if document.frame_count() > 1 {
        info!("帧数: {}", document.frame_count());
    }

    if let Some(frame) = options.frame {
        document
            .select_frame(frame - 1)
            .with_context(|| format!("切换帧失败: {}", frame))?;
    }

    if options.greyscale {
        let grey = codec.greyscale(document.active())?;
        document.replace_active(grey);
    }

    if options.rotate != 0.0 {
        let rotated = codec.rotate(document.active(), options.rotate)?;
        document.replace_active(rotated);
    }

    if let Some(mask) = options.mask {
        apply_channel_mask(document.active_mut(), mask)
            .with_context(|| format!("通道遮罩失败: {}", mask))?;
    }

    if options.info || options.output.is_none() {
        info!("{}", document.info()?);
        if options.info {
            print_palette(document.active());
        }
    }

    if let Some(output) = options.output.as_deref() {
        codec
            .save(document.active(), output)
            .with_context(|| format!("保存图像失败: {}", output.display()))?;
        info!("已保存: {}", output.display());
    }

    Ok(())
}

fn main() -> anyhow::Result<()> {
    let options = parse_args(std::env::args().skip(1))?;
    if options.help || options.input.is_none() {
        print_usage();
        return Ok(());
    }

    init_logging(options.log_dir.as_deref());
    info!("{} {} 启动", APP_NAME, APP_VERSION);

    let codec = ImageRsCodec::new();
    if let Err(e) = run(&codec, &options) {
        tracing::error!("{:#}", e);
        std::process::exit(1);
    }
    Ok(())
}
