/// 日志工具模块
///
/// 提供日志初始化、格式化和输出的辅助函数
use crate::config::Config;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// 初始化 tracing 日志
///
/// `RUST_LOG` 优先；否则 verbose 时为 debug，默认 info。
pub fn init(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// 记录程序启动信息
pub fn log_startup(config: &Config) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 作文批量评分模式");
    info!("🤖 API 提供方: {}", config.api_provider);
    info!("📊 最大并发数: {}", config.concurrency);
    info!("⏱️ 请求间隔: {}ms, 最大尝试次数: {}", config.request_interval_ms, config.max_retries);
    info!("{}", "=".repeat(60));
}

/// 记录本次待评分学生数量
pub fn log_jobs_selected(total: usize, concurrency: usize) {
    info!("✓ 找到 {} 名待评分学生", total);
    info!("📋 将以 {} 个并发 worker 处理\n", concurrency.min(total));
}

/// 打印最终统计信息
///
/// # 参数
/// - `success`: 成功数量
/// - `failed`: 失败数量
/// - `total`: 总数
/// - `output_file`: 结果文件路径
pub fn print_final_stats(success: usize, failed: usize, total: usize, output_file: &str) {
    info!("\n{}", "=".repeat(60));
    info!("📊 全部处理完成统计");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("✅ 成功: {}/{}", success, total);
    info!("❌ 失败: {}", failed);
    info!("{}", "=".repeat(60));
    info!("\n评分结果已保存至: {}", output_file);
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度（字符数）
///
/// # 返回
/// 返回截断后的文本
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}

/// 截断并显式标记，写入审计日志时使用
pub fn truncate_marked(text: &str, max_len: usize, marker: &str) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + marker
    } else {
        text.to_string()
    }
}
