use crux_core::testing::AppTester;
use crux_http::testing::ResponseBuilder;

use reelay_shared::api::{PageMeta, Paged, VideoWire};
use reelay_shared::api::EngagementWire;
use reelay_shared::entity::VideoId;
use reelay_shared::{App, Effect, Event, Model};

fn tester() -> AppTester<App, Effect> {
    AppTester::default()
}

fn video_wire(id: &str, like_count: u64) -> VideoWire {
    VideoWire {
        id: id.to_string(),
        author_id: "author-1".into(),
        author_name: "Dana".into(),
        caption: "caught this at golden hour".into(),
        media_url: format!("https://cdn.reelay.app/{id}.mp4"),
        thumbnail_url: None,
        like_count,
        comment_count: 0,
        is_liked: false,
        is_saved: false,
        created_at_ms: 1_700_000_000_000,
    }
}

fn page_loaded(seq: u64, videos: Vec<VideoWire>, current: u32, last: u32) -> Event {
    let response = ResponseBuilder::ok()
        .body(Paged {
            data: videos,
            meta: PageMeta {
                current_page: current,
                last_page: last,
                total: None,
            },
        })
        .build();
    Event::FeedPageLoaded {
        seq,
        result: Box::new(Ok(response)),
    }
}

fn has_http_effect(effects: &[Effect]) -> bool {
    effects.iter().any(|e| matches!(e, Effect::Http(_)))
}

#[test]
fn opening_the_feed_fetches_and_applies_page_one() {
    let app = tester();
    let mut model = Model::default();

    let update = app.update(Event::FeedOpened, &mut model);
    assert!(
        has_http_effect(&update.effects),
        "opening an empty feed must fetch"
    );
    assert!(model.feed.pager.is_loading());

    let seq = model.feed.pager.seq();
    app.update(
        page_loaded(seq, vec![video_wire("v1", 3), video_wire("v2", 0)], 1, 2),
        &mut model,
    );

    assert_eq!(model.feed.videos.len(), 2);
    assert!(!model.feed.pager.is_loading());
    assert!(model.feed.pager.has_more());
    // The viewport settles on the first cell: exactly one active post.
    let active: Vec<_> = model
        .feed
        .videos
        .snapshot()
        .iter()
        .filter(|v| v.is_active_playback)
        .collect();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].id.as_str(), "v1");
}

#[test]
fn load_next_during_inflight_fetch_issues_nothing() {
    let app = tester();
    let mut model = Model::default();

    app.update(Event::FeedOpened, &mut model);
    assert!(model.feed.pager.is_loading());
    let page_before = model.feed.pager.current_page();

    let update = app.update(Event::FeedNextPageRequested, &mut model);

    assert!(
        !has_http_effect(&update.effects),
        "guarded load_next must not fetch"
    );
    assert_eq!(model.feed.pager.current_page(), page_before);
}

#[test]
fn refresh_replaces_twenty_videos_with_ten() {
    let app = tester();
    let mut model = Model::default();

    app.update(Event::FeedOpened, &mut model);
    let seq = model.feed.pager.seq();
    let first: Vec<_> = (0..10).map(|i| video_wire(&format!("a-{i}"), 0)).collect();
    app.update(page_loaded(seq, first, 1, 3), &mut model);

    app.update(Event::FeedNextPageRequested, &mut model);
    let seq = model.feed.pager.seq();
    let second: Vec<_> = (0..10).map(|i| video_wire(&format!("b-{i}"), 0)).collect();
    app.update(page_loaded(seq, second, 2, 3), &mut model);
    assert_eq!(model.feed.videos.len(), 20);

    app.update(Event::FeedRefreshRequested, &mut model);
    let seq = model.feed.pager.seq();
    let fresh: Vec<_> = (0..10).map(|i| video_wire(&format!("c-{i}"), 0)).collect();
    app.update(page_loaded(seq, fresh, 1, 1), &mut model);

    assert_eq!(model.feed.videos.len(), 10);
    assert!(model
        .feed
        .videos
        .snapshot()
        .iter()
        .all(|v| v.id.as_str().starts_with("c-")));
    assert!(!model.feed.pager.has_more());
}

#[test]
fn like_is_rendered_before_the_request_resolves() {
    let app = tester();
    let mut model = Model::default();

    app.update(Event::FeedOpened, &mut model);
    let seq = model.feed.pager.seq();
    app.update(page_loaded(seq, vec![video_wire("v1", 41)], 1, 1), &mut model);

    let update = app.update(
        Event::LikeToggled {
            video_id: VideoId::new("v1"),
        },
        &mut model,
    );

    assert!(has_http_effect(&update.effects), "a like issues one request");
    let video = &model.feed.videos.snapshot()[0];
    assert!(video.is_liked);
    assert_eq!(video.like_count, 42);
    assert!(video.confirmation.is_pending());
    assert_eq!(model.engagement.in_flight_len(), 1);
}

#[test]
fn failed_like_restores_the_exact_prior_state() {
    let app = tester();
    let mut model = Model::default();

    app.update(Event::FeedOpened, &mut model);
    let seq = model.feed.pager.seq();
    app.update(page_loaded(seq, vec![video_wire("v1", 41)], 1, 1), &mut model);
    app.update(
        Event::LikeToggled {
            video_id: VideoId::new("v1"),
        },
        &mut model,
    );

    let mutation_id = model
        .engagement
        .in_flight()
        .next()
        .map(|p| p.mutation_id.clone())
        .expect("one mutation in flight");
    app.update(
        Event::EngagementCompleted {
            mutation_id,
            result: Box::new(Err(crux_http::HttpError::Io(
                "connection reset by peer".into(),
            ))),
        },
        &mut model,
    );

    let video = &model.feed.videos.snapshot()[0];
    assert!(!video.is_liked);
    assert_eq!(video.like_count, 41);
    assert_eq!(model.engagement.in_flight_len(), 0);
}

#[test]
fn confirmed_like_adopts_the_server_count() {
    let app = tester();
    let mut model = Model::default();

    app.update(Event::FeedOpened, &mut model);
    let seq = model.feed.pager.seq();
    app.update(page_loaded(seq, vec![video_wire("v1", 41)], 1, 1), &mut model);
    app.update(
        Event::LikeToggled {
            video_id: VideoId::new("v1"),
        },
        &mut model,
    );

    let mutation_id = model
        .engagement
        .in_flight()
        .next()
        .map(|p| p.mutation_id.clone())
        .expect("one mutation in flight");
    let response = ResponseBuilder::ok()
        .body(EngagementWire {
            like_count: Some(42),
            is_liked: Some(true),
            is_saved: None,
        })
        .build();
    app.update(
        Event::EngagementCompleted {
            mutation_id,
            result: Box::new(Ok(response)),
        },
        &mut model,
    );

    let video = &model.feed.videos.snapshot()[0];
    assert!(video.is_liked);
    assert_eq!(video.like_count, 42);
    assert!(video.confirmation.is_confirmed());
}

#[test]
fn scrolling_swaps_the_single_active_post_and_records_a_view() {
    let app = tester();
    let mut model = Model::default();

    app.update(Event::FeedOpened, &mut model);
    let seq = model.feed.pager.seq();
    let videos: Vec<_> = (0..5).map(|i| video_wire(&format!("v-{i}"), 0)).collect();
    app.update(page_loaded(seq, videos, 1, 1), &mut model);

    let update = app.update(Event::ActiveVideoChanged { index: Some(3) }, &mut model);

    assert!(has_http_effect(&update.effects), "activation pings a view");
    let active: Vec<_> = model
        .feed
        .videos
        .snapshot()
        .iter()
        .filter(|v| v.is_active_playback)
        .map(|v| v.id.as_str().to_string())
        .collect();
    assert_eq!(active, vec!["v-3".to_string()]);

    // Re-reporting the same index is not a new view.
    let update = app.update(Event::ActiveVideoChanged { index: Some(3) }, &mut model);
    assert!(!has_http_effect(&update.effects));
}
