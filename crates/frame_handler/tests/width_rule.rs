use frame_dom::scripted::ScriptedFrame;
use frame_handler::{ContentWidthMatch, EmbedFrame, FrameConfig, HostStyle};
use tokio::time::{self, Duration};

const POLL: Duration = Duration::from_millis(50);

async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}

fn auto_config() -> FrameConfig {
    FrameConfig {
        match_content_width: ContentWidthMatch::Auto,
        resize_debounce_millis: 0,
        ..FrameConfig::default()
    }
}

#[tokio::test(start_paused = true)]
async fn auto_matching_adopts_the_measured_width() {
    let _ = env_logger::builder().is_test(true).try_init();
    let (scripted, signals) = ScriptedFrame::new();
    scripted.set_body_size(640, 480);
    scripted.serve_stylesheet("h1 { margin: 0 }");
    scripted.serve_stylesheet("body { min-width: 300px }");
    let mut frame = EmbedFrame::spawn(scripted.clone(), signals, auto_config());
    let _events = frame.take_events().unwrap();
    settle().await;
    frame.set_source("page.html").unwrap();
    settle().await;
    scripted.fire_frame_load();
    settle().await;

    scripted.set_body_size(640, 500);
    time::advance(POLL).await;
    settle().await;

    assert_eq!(
        scripted.last_style(),
        Some(HostStyle {
            height: String::from("500px"),
            min_width: Some(String::from("640px")),
        })
    );
}

#[tokio::test(start_paused = true)]
async fn no_body_rule_means_height_only() {
    let (scripted, signals) = ScriptedFrame::new();
    scripted.set_body_size(640, 480);
    scripted.serve_stylesheet("div { width: 300px }");
    let mut frame = EmbedFrame::spawn(scripted.clone(), signals, auto_config());
    let _events = frame.take_events().unwrap();
    settle().await;
    frame.set_source("page.html").unwrap();
    settle().await;
    scripted.fire_frame_load();
    settle().await;

    scripted.set_body_size(640, 500);
    time::advance(POLL).await;
    settle().await;

    assert_eq!(
        scripted.last_style(),
        Some(HostStyle {
            height: String::from("500px"),
            min_width: None,
        })
    );
}

#[tokio::test(start_paused = true)]
async fn blocked_stylesheet_rules_degrade_to_no_match() {
    let (scripted, signals) = ScriptedFrame::new();
    scripted.set_body_size(640, 480);
    scripted.serve_stylesheet("body { min-width: 300px }");
    scripted.block_stylesheet_rules();
    let mut frame = EmbedFrame::spawn(scripted.clone(), signals, auto_config());
    let _events = frame.take_events().unwrap();
    settle().await;
    frame.set_source("page.html").unwrap();
    settle().await;
    scripted.fire_frame_load();
    settle().await;

    scripted.set_body_size(640, 500);
    time::advance(POLL).await;
    settle().await;

    let style = scripted.last_style().unwrap();
    assert_eq!(style.min_width, None);
}

#[tokio::test(start_paused = true)]
async fn explicit_min_width_override_always_applies() {
    let config = FrameConfig {
        min_width: Some(String::from("20rem")),
        resize_debounce_millis: 0,
        ..FrameConfig::default()
    };
    let (scripted, signals) = ScriptedFrame::new();
    scripted.set_body_size(640, 480);
    let mut frame = EmbedFrame::spawn(scripted.clone(), signals, config);
    let _events = frame.take_events().unwrap();
    settle().await;
    frame.set_source("page.html").unwrap();
    settle().await;
    scripted.fire_frame_load();
    settle().await;

    scripted.set_body_size(640, 500);
    time::advance(POLL).await;
    settle().await;

    assert_eq!(
        scripted.last_style(),
        Some(HostStyle {
            height: String::from("500px"),
            min_width: Some(String::from("20rem")),
        })
    );
}

#[tokio::test(start_paused = true)]
async fn enabled_matching_skips_the_stylesheet_scan() {
    let config = FrameConfig {
        match_content_width: ContentWidthMatch::Enabled,
        resize_debounce_millis: 0,
        ..FrameConfig::default()
    };
    // No stylesheets served at all; the policy says to match anyway.
    let (scripted, signals) = ScriptedFrame::new();
    scripted.set_body_size(640, 480);
    let mut frame = EmbedFrame::spawn(scripted.clone(), signals, config);
    let _events = frame.take_events().unwrap();
    settle().await;
    frame.set_source("page.html").unwrap();
    settle().await;
    scripted.fire_frame_load();
    settle().await;

    scripted.set_body_size(640, 500);
    time::advance(POLL).await;
    settle().await;

    assert_eq!(
        scripted.last_style().and_then(|style| style.min_width),
        Some(String::from("640px"))
    );
}
