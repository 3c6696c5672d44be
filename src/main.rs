use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use chat_stats::{
    config::Config,
    error::AppError,
    server,
    storage::{
        ChatId, RedisStore, Store, UserId,
        operations::{
            CsvImporter, KeyLayout, PopulateOptions, ScanOptions, chats_with_min_users, load_user,
            populate_users, users_with_chat_count,
        },
    },
    utils::duration_micros,
};
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::json;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// 聊天/用户统计工具：健康检查服务、CSV 导入、批量生成与统计查询
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 启动 HTTP 服务（/healthz, /metrics）
    Serve,

    /// 从 CSV 导入聊天成员关系
    Import {
        path: PathBuf,

        /// 最多导入的行数
        #[arg(long)]
        limit: Option<usize>,

        /// 首行就是数据，没有表头
        #[arg(long)]
        no_header: bool,
    },

    /// 批量写入合成用户
    Populate {
        #[arg(long, default_value_t = 1000)]
        count: usize,

        /// 同时写入的任务数，默认取 POPULATE_CONCURRENCY
        #[arg(long)]
        concurrency: Option<usize>,

        #[arg(long, default_value_t = KeyLayout::Legacy)]
        layout: KeyLayout,

        #[arg(long, default_value_t = 5481, allow_hyphen_values = true)]
        chat_id: i64,

        #[arg(long, default_value_t = 121_000_000)]
        base_user_id: i64,

        #[arg(long, default_value = "CHANNEL")]
        message_type: String,

        /// 过期秒数，不设置则永不过期（仅 legacy 布局）
        #[arg(long)]
        ttl_secs: Option<u64>,
    },

    /// 成员数不少于 N 的聊天
    Chats {
        #[arg(long)]
        min_users: u64,
    },

    /// 所在聊天数恰好为 N 的用户
    Users {
        #[arg(long)]
        chat_count: u64,
    },

    /// 读取一个字符串键
    Get { key: String },

    /// 查看用户记录
    User {
        #[arg(allow_hyphen_values = true)]
        id: i64,
    },

    /// 探活存储
    Ping,
}

#[tokio::main]
async fn main() -> ExitCode {
    // 初始化日志
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "Fatal error, exiting");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<(), AppError> {
    // 加载配置
    let config = Config::from_env()?;

    // 连接 Redis，失败直接退出
    let redis = RedisStore::connect(&config.redis).await?;
    let store: Arc<dyn Store> = Arc::new(redis.clone());

    let scan = ScanOptions {
        page_hint: config.scan_page_hint,
        page_retries: config.scan_page_retries,
        ..Default::default()
    };

    let result = match args.command.unwrap_or(Command::Serve) {
        Command::Serve => server::serve(&config, store.clone()).await,

        Command::Import {
            path,
            limit,
            no_header,
        } => {
            let importer = CsvImporter::new(path).has_header(!no_header);
            let report = importer.import(store.as_ref(), limit).await?;
            print_json(&report)
        }

        Command::Populate {
            count,
            concurrency,
            layout,
            chat_id,
            base_user_id,
            message_type,
            ttl_secs,
        } => {
            let options = PopulateOptions {
                count,
                concurrency: concurrency.unwrap_or(config.populate_concurrency),
                chat_id: ChatId(chat_id),
                base_user_id,
                message_type,
                ttl: ttl_secs.map(Duration::from_secs),
                layout,
            };
            let report = populate_users(store.clone(), &options).await?;
            print_json(&report)
        }

        Command::Chats { min_users } => {
            let report = chats_with_min_users(store.as_ref(), min_users, scan).await?;
            print_json(&report)
        }

        Command::Users { chat_count } => {
            let report = users_with_chat_count(store.as_ref(), chat_count, scan).await?;
            print_json(&report)
        }

        Command::Get { key } => {
            let value = store.get(&key).await?;
            print_json(&json!({ "key": key, "found": value.is_some(), "value": value }))
        }

        Command::User { id } => {
            let record = load_user(store.as_ref(), UserId(id)).await?;
            print_json(&json!({ "user_id": id, "found": record.is_some(), "record": record }))
        }

        Command::Ping => {
            let latency = store.ping().await?;
            print_json(&json!({ "latency_micros": duration_micros(latency) }))
        }
    };

    drop(store);
    redis.close();
    result
}

fn print_json<T: Serialize>(value: &T) -> Result<(), AppError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
