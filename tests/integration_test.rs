use std::sync::Arc;
use std::time::Duration;

use video_id_scrape::browser::ChromiumFactory;
use video_id_scrape::config::Config;
use video_id_scrape::infrastructure::{FrameHandle, RenderSession, SessionFactory};
use video_id_scrape::logger;
use video_id_scrape::models::Target;
use video_id_scrape::services::Extractor;

#[tokio::test]
#[ignore] // 默认忽略，需要本机安装 Chrome：cargo test -- --ignored
async fn test_browser_session_lifecycle() {
    // 初始化日志
    logger::init(true);

    let config = Config::from_env().expect("加载配置失败");
    let factory = ChromiumFactory::new(config.browser_settings());

    let mut session = factory.create().await.expect("启动浏览器失败");
    let page = session
        .navigate(
            "data:text/html,<html><head><title>t</title></head><body><iframe id=\"video_1\" src=\"https://www.youtube.com/embed/abc?x=1\"></iframe></body></html>",
            Duration::from_secs(10),
        )
        .await
        .expect("导航失败");
    assert_eq!(page.title, "t");

    let frame = session
        .wait_for_frame(&FrameHandle::root(), r#"iframe[id^="video"]"#, Duration::from_secs(5))
        .await
        .expect("没有找到框架");
    let src = session.read_attribute(&frame, "src").await.expect("读取属性失败");
    assert_eq!(src.as_deref(), Some("https://www.youtube.com/embed/abc?x=1"));

    factory.destroy(session).await;
}

#[tokio::test]
#[ignore]
async fn test_extract_single_target() {
    // 初始化日志
    logger::init(true);

    // 通过环境变量指定一个真实目标
    let (Ok(creative_id), Ok(advertiser_id)) = (
        std::env::var("SMOKE_CREATIVE_ID"),
        std::env::var("SMOKE_ADVERTISER_ID"),
    ) else {
        eprintln!("未设置 SMOKE_CREATIVE_ID / SMOKE_ADVERTISER_ID，跳过");
        return;
    };

    let config = Config::from_env().expect("加载配置失败");
    let factory = Arc::new(ChromiumFactory::new(config.browser_settings()));
    let extractor = Extractor::new(config.extractor_policy()).expect("创建抽取器失败");

    let mut session = factory.create().await.expect("启动浏览器失败");
    let outcome = extractor
        .extract(&mut session, &Target::new(creative_id, advertiser_id))
        .await;
    println!("抽取结果: {}", outcome);
    assert!(!matches!(
        outcome,
        video_id_scrape::AttemptOutcome::TransientError(_)
    ));

    factory.destroy(session).await;
}
