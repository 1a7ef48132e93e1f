use anyhow::{bail, Context, Result};
use promptr::utils::logging;
use promptr::{App, Config, GenerateOutcome};
use tracing::info;

const USAGE: &str = "用法: promptr <主题> [题目数量] [子主题...]";

#[tokio::main]
async fn main() -> Result<()> {
    // 加载配置：PROMPTR_CONFIG 指向 TOML 文件时优先使用
    let config = match std::env::var("PROMPTR_CONFIG") {
        Ok(path) => Config::from_toml_file(&path)?,
        Err(_) => Config::from_env(),
    };

    // 初始化日志
    logging::init(config.verbose_logging);
    logging::log_startup(&config);

    let mut args = std::env::args().skip(1);
    let Some(topic) = args.next() else {
        bail!(USAGE);
    };
    let count = match args.next() {
        Some(raw) => raw
            .parse::<usize>()
            .with_context(|| format!("题目数量必须是整数: {}\n{}", raw, USAGE))?,
        None => 5,
    };
    let subtopics: Vec<String> = args.collect();

    let app = App::from_config(config);
    let outcome = app
        .generate_questions(&topic, count, Some(&subtopics))
        .await?;

    if let GenerateOutcome::Replaced { count } = outcome {
        info!("✅ 已生成 {} 道题目", count);
    }

    let snapshot = app.snapshot();
    for (index, question) in snapshot.questions.iter().enumerate() {
        let Some(version) = question.current_version() else {
            continue;
        };
        println!("{}. [{}] {}", index + 1, version.topics.join(", "), version.question);
        println!("   参考答案: {}", version.answer);
        println!("   版本 id: {}", version.version_id);
    }

    Ok(())
}
