use booking_engine::{
    BackgroundTasks, BookingEngine, InMemoryLayout, Reclaimer, SystemClock, setup_environment,
};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. 设置环境 (dotenv, 日志) 并加载配置
    let config = setup_environment()?;

    tracing::info!("Booking engine starting...");

    // 2. 初始化引擎（布局由嵌入方提供，此处为空的内存布局）
    let engine = Arc::new(BookingEngine::new(
        config,
        Arc::new(SystemClock),
        Arc::new(InMemoryLayout::new()),
    ));

    // 3. 启动后台任务
    let mut tasks = BackgroundTasks::new();
    Reclaimer::spawn(engine.clone(), &mut tasks);
    tasks.log_summary();

    // 4. 等待关机信号
    tokio::signal::ctrl_c().await?;
    tracing::info!(stats = ?engine.stats(), "Shutdown signal received");
    tasks.shutdown().await;

    Ok(())
}
