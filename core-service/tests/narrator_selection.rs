mod common;

use bridge_traits::storage::SettingsStore;
use common::{narrator, wait_for, Harness};
use core_content::VerseKey;
use core_playback::{DownloadKey, DownloadOutcome, DownloadState, EngineState};
use core_runtime::events::{CoreEvent, DownloadEvent, NarratorEvent};
use core_service::{CoreError, SELECTED_NARRATOR_KEY};
use std::sync::atomic::Ordering;

#[tokio::test]
async fn test_defaults_to_configured_narrator() {
    let harness = Harness::new();
    let service = harness.service().await;

    assert_eq!(service.narrators().selected().await, None);
    assert_eq!(service.narrators().selected_narrator_id().await, 1);
}

#[tokio::test]
async fn test_selection_is_persisted_and_restored() {
    let harness = Harness::new();
    let service = harness.service().await;

    assert!(service
        .narrators()
        .set_selected_narrator(narrator(7, "Mishari Rashid al-Afasy"))
        .await
        .unwrap());

    let stored = harness.settings.raw(SELECTED_NARRATOR_KEY).unwrap();
    assert!(stored.contains("\"id\":7"));

    service.shutdown().await;
    let restarted = harness.service().await;
    assert_eq!(restarted.narrators().selected_narrator_id().await, 7);
    assert_eq!(
        restarted.narrators().selected().await.map(|n| n.name),
        Some("Mishari Rashid al-Afasy".to_string())
    );
}

#[tokio::test]
async fn test_malformed_stored_selection_is_dropped() {
    let harness = Harness::new();
    harness
        .settings
        .set_string(SELECTED_NARRATOR_KEY, "{not json")
        .await
        .unwrap();

    let service = harness.service().await;

    assert_eq!(service.narrators().selected().await, None);
    assert_eq!(harness.settings.raw(SELECTED_NARRATOR_KEY), None);
}

#[tokio::test]
async fn test_selecting_same_narrator_is_noop() {
    let harness = Harness::new();
    let service = harness.service().await;
    service
        .narrators()
        .set_selected_narrator(narrator(7, "Alafasy"))
        .await
        .unwrap();
    service.open_chapter(5).await.unwrap();

    service.toggle_verse(VerseKey::new(5, 1)).await.unwrap();
    service.download_chapter(2).await;
    let calls_before = harness.adapter.calls().len();

    let changed = service
        .narrators()
        .set_selected_narrator(narrator(7, "Alafasy"))
        .await
        .unwrap();

    assert!(!changed);
    assert_eq!(service.engine().state().await, EngineState::Playing);
    assert_eq!(harness.adapter.calls().len(), calls_before);
    assert!(matches!(
        service.download_state(2).await,
        DownloadState::Complete { .. }
    ));
    assert_eq!(service.window().read().len(), 10);
}

#[tokio::test]
async fn test_narrator_switch_mid_playback() {
    let harness = Harness::new();
    let service = harness.service().await;
    let mut events = service.subscribe();
    service
        .narrators()
        .set_selected_narrator(narrator(1, "AbdulBaset"))
        .await
        .unwrap();
    service.open_chapter(5).await.unwrap();

    // A chapter download for narrator 1 is still running.
    harness.transfer.set_gated(true);
    let stale = service.spawn_chapter_download(5).await;
    wait_for(&mut events, |e| {
        matches!(e, CoreEvent::Download(DownloadEvent::Progress { narrator_id: 1, .. }))
    })
    .await;

    service.toggle_verse(VerseKey::new(5, 3)).await.unwrap();
    assert_eq!(service.engine().state().await, EngineState::Playing);

    service
        .select_narrator(narrator(7, "Alafasy"))
        .await
        .unwrap();

    // Playback was released before anything else happened for narrator 7.
    assert_eq!(service.engine().state().await, EngineState::Empty);
    assert_eq!(service.sequencer().active_key(), None);
    let calls = harness.adapter.calls();
    assert_eq!(&calls[calls.len() - 2..], ["stop", "unload"]);
    assert_eq!(
        service.downloads().state(DownloadKey::new(5, 1)),
        DownloadState::Idle
    );

    // The window was reloaded with narrator 7 annotations.
    assert_eq!(
        harness.api.page_requests.lock().last(),
        Some(&(5, 1, Some(7)))
    );

    harness.transfer.set_gated(false);
    harness.transfer.release();
    assert_eq!(stale.await.unwrap(), DownloadOutcome::Discarded);
    assert_eq!(
        service.downloads().state(DownloadKey::new(5, 1)),
        DownloadState::Idle
    );
    assert_eq!(service.download_state(5).await, DownloadState::Idle);

    let outcome = service.download_chapter(5).await;
    assert!(matches!(outcome, DownloadOutcome::Completed { .. }));
    assert_eq!(
        harness.transfer.urls.lock().last().map(String::as_str),
        Some("https://download.test/7/5.mp3")
    );

    let mut completed_for_one = false;
    while let Ok(event) = events.try_recv() {
        if matches!(
            event,
            CoreEvent::Download(DownloadEvent::Completed { narrator_id: 1, .. })
        ) {
            completed_for_one = true;
        }
    }
    assert!(!completed_for_one);
}

#[tokio::test]
async fn test_selection_change_emits_event() {
    let harness = Harness::new();
    let service = harness.service().await;
    let mut events = service.subscribe();

    service
        .narrators()
        .set_selected_narrator(narrator(7, "Alafasy"))
        .await
        .unwrap();

    let event = wait_for(&mut events, |e| matches!(e, CoreEvent::Narrator(_))).await;
    assert_eq!(
        event,
        CoreEvent::Narrator(NarratorEvent::SelectionChanged {
            previous: None,
            current: 7
        })
    );
}

#[tokio::test]
async fn test_catalog_is_fetched_once() {
    let harness = Harness::new();
    let service = harness.service().await;

    let first = service.narrator_catalog().await.unwrap();
    let second = service.narrator_catalog().await.unwrap();

    assert_eq!(first.len(), 2);
    assert_eq!(first, second);
    assert_eq!(harness.api.narrator_fetches.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_select_by_id_requires_catalog_entry() {
    let harness = Harness::new();
    let service = harness.service().await;
    service.narrator_catalog().await.unwrap();

    assert!(service
        .narrators()
        .set_selected_narrator_id(7)
        .await
        .unwrap());
    assert!(service
        .narrators()
        .set_selected_narrator_id(99)
        .await
        .is_err());
    assert_eq!(service.narrators().selected_narrator_id().await, 7);
}

#[tokio::test]
async fn test_recitations_clear_missing_selection() {
    let harness = Harness::new();
    let service = harness.service().await;
    let mut events = service.subscribe();
    service
        .narrators()
        .set_selected_narrator(narrator(7, "Alafasy"))
        .await
        .unwrap();

    service
        .narrators()
        .set_recitations(vec![narrator(1, "AbdulBaset"), narrator(3, "Sudais")])
        .await
        .unwrap();

    assert_eq!(service.narrators().selected().await, None);
    assert_eq!(harness.settings.raw(SELECTED_NARRATOR_KEY), None);
    wait_for(&mut events, |e| {
        e == &CoreEvent::Narrator(NarratorEvent::SelectionCleared { previous: 7 })
    })
    .await;
    wait_for(&mut events, |e| {
        e == &CoreEvent::Narrator(NarratorEvent::CatalogLoaded { count: 2 })
    })
    .await;
}

#[tokio::test]
async fn test_recitations_keep_present_selection() {
    let harness = Harness::new();
    let service = harness.service().await;
    service
        .narrators()
        .set_selected_narrator(narrator(7, "Alafasy"))
        .await
        .unwrap();

    for _ in 0..2 {
        service
            .narrators()
            .set_recitations(vec![narrator(7, "Alafasy")])
            .await
            .unwrap();
    }

    assert_eq!(service.narrators().selected_narrator_id().await, 7);
    assert_eq!(service.narrators().catalog().await.map(|c| c.len()), Some(1));
}

#[tokio::test]
async fn test_failed_persist_keeps_previous_selection() {
    let harness = Harness::new();
    let service = harness.service().await;
    service
        .narrators()
        .set_selected_narrator(narrator(1, "AbdulBaset"))
        .await
        .unwrap();
    service.open_chapter(5).await.unwrap();
    service.toggle_verse(VerseKey::new(5, 2)).await.unwrap();
    let mut events = service.subscribe();
    harness.settings.set_read_only(true);

    let result = service
        .narrators()
        .set_selected_narrator(narrator(7, "Alafasy"))
        .await;

    assert!(matches!(result, Err(CoreError::Settings(_))));
    assert_eq!(service.narrators().selected_narrator_id().await, 1);
    assert!(harness
        .settings
        .raw(SELECTED_NARRATOR_KEY)
        .unwrap()
        .contains("\"id\":1"));
    // Nothing narrator-scoped was torn down.
    assert_eq!(service.engine().state().await, EngineState::Playing);
    assert_eq!(service.sequencer().active_key(), Some(VerseKey::new(5, 2)));
    while let Ok(event) = events.try_recv() {
        assert!(!matches!(event, CoreEvent::Narrator(_)), "{:?}", event);
    }

    // Once the store accepts writes again the switch goes through.
    harness.settings.set_read_only(false);
    assert!(service
        .narrators()
        .set_selected_narrator(narrator(7, "Alafasy"))
        .await
        .unwrap());
    assert_eq!(service.engine().state().await, EngineState::Empty);
}

#[tokio::test]
async fn test_failed_clear_keeps_selection_and_catalog() {
    let harness = Harness::new();
    let service = harness.service().await;
    service
        .narrators()
        .set_selected_narrator(narrator(7, "Alafasy"))
        .await
        .unwrap();
    harness.settings.set_read_only(true);

    let result = service
        .narrators()
        .set_recitations(vec![narrator(1, "AbdulBaset")])
        .await;

    assert!(matches!(result, Err(CoreError::Settings(_))));
    assert_eq!(service.narrators().selected_narrator_id().await, 7);
    assert_eq!(service.narrators().catalog().await, None);
}

#[tokio::test]
async fn test_switch_stands_when_reload_fails() {
    let harness = Harness::new();
    let service = harness.service().await;
    service.open_chapter(5).await.unwrap();
    harness.api.fail_pages.store(true, Ordering::SeqCst);

    let changed = service
        .select_narrator(narrator(7, "Alafasy"))
        .await
        .unwrap();

    assert!(changed);
    assert_eq!(service.narrators().selected_narrator_id().await, 7);
    assert_eq!(
        harness.api.page_requests.lock().last(),
        Some(&(5, 1, Some(7)))
    );

    // Paging in again picks up the new narrator.
    harness.api.fail_pages.store(false, Ordering::SeqCst);
    assert_eq!(service.load_more_verses().await.unwrap(), 10);
    assert_eq!(
        harness.api.page_requests.lock().last(),
        Some(&(5, 1, Some(7)))
    );
}
