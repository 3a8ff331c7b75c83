use chrono::Duration;
use srs_core::model::{CardId, LearnerId, OutcomeSource, ReviewOutcome};
use srs_core::time::fixed_now;
use services::{AppServices, Clock, QueueLimits, ReviewBucket};
use storage::repository::Storage;

#[tokio::test]
async fn review_flow_walks_a_card_to_mastery() {
    let mut clock = Clock::fixed(fixed_now());
    let learner = LearnerId::new(1);
    let card = CardId::new(42);

    let storage = Storage::in_memory();
    let app = AppServices::from_storage(&storage, clock);

    let queue = app
        .queue()
        .build_queue(learner, &[card], QueueLimits::default())
        .await
        .unwrap();
    assert_eq!(queue.count(ReviewBucket::New), 1);

    // first answer starts the learning steps: 1 day, then 6
    let first = app.reviews().answer(card, learner, true).await.unwrap();
    assert!(first.was_new());
    assert_eq!(first.progress.interval_days, 1);

    let mut intervals = vec![first.progress.interval_days];
    let mut last = first;
    while !last.progress.is_mastered {
        clock.advance(Duration::days(i64::from(last.progress.interval_days)));
        let app = AppServices::from_storage(&storage, clock);
        last = app.reviews().answer(card, learner, true).await.unwrap();
        intervals.push(last.progress.interval_days);
        assert!(intervals.len() < 20, "never mastered: {intervals:?}");
    }

    // ease stays at its ceiling, so mastery arrives with the fifth repetition
    assert_eq!(intervals, vec![1, 6, 15, 38, 95]);
    assert_eq!(last.progress.repetitions, 5);
    assert!(last.newly_mastered());

    let history = app.review_history(card, learner).await.unwrap();
    assert_eq!(history.len(), intervals.len());
    assert!(history.iter().all(|log| log.source == OutcomeSource::Binary));
}

#[tokio::test]
async fn lapse_resets_and_graded_answers_are_logged() {
    let clock = Clock::fixed(fixed_now());
    let learner = LearnerId::new(2);
    let card = CardId::new(7);
    let app = AppServices::in_memory(clock);
    let reviews = app.reviews();

    reviews.answer(card, learner, true).await.unwrap();
    reviews.answer(card, learner, true).await.unwrap();
    let lapse = reviews
        .review(card, learner, ReviewOutcome::graded(0))
        .await
        .unwrap();

    assert_eq!(lapse.progress.repetitions, 0);
    assert_eq!(lapse.progress.streak, 0);
    assert_eq!(lapse.progress.interval_days, 1);
    assert_eq!(lapse.progress.times_seen, 3);
    assert_eq!(lapse.progress.times_correct, 2);
    // 2.5 clamped twice, then the flat lapse decrease
    assert!((lapse.progress.ease_factor - 2.3).abs() < 1e-9);

    let history = app.review_history(card, learner).await.unwrap();
    assert_eq!(history.last().map(|log| log.quality), Some(0));
    assert_eq!(history.last().map(|log| log.source), Some(OutcomeSource::Graded));

    let stats = app.queue().stats(learner).await.unwrap();
    assert_eq!(stats.total, 1);
    assert_eq!(stats.mastered, 0);
}

#[tokio::test]
async fn sqlite_backed_services_round_trip() {
    let app = AppServices::new_sqlite(
        "sqlite:file:memdb_services_flow?mode=memory&cache=shared",
        Clock::fixed(fixed_now()),
    )
    .await
    .expect("sqlite services");
    let learner = LearnerId::new(3);

    app.settings()
        .import_json(learner, r#"{ "learning_interval_1": 2 }"#)
        .await
        .unwrap();

    let reviews = app.reviews();
    let first = reviews.answer(CardId::new(1), learner, true).await.unwrap();
    let second = reviews.answer(CardId::new(2), learner, false).await.unwrap();
    assert_eq!(first.progress.interval_days, 2);
    assert_eq!(second.progress.interval_days, 1);
    assert_eq!(second.version, 1);

    let later = reviews
        .as_ref()
        .clone()
        .with_clock(Clock::fixed(fixed_now() + Duration::days(3)));
    let preview = later.preview(CardId::new(1), learner).await.unwrap();
    assert_eq!(preview.on_correct.interval_days, 6);

    assert_eq!(later.reset_learner(learner).await.unwrap(), 2);
    assert!(
        app.review_history(CardId::new(1), learner)
            .await
            .unwrap()
            .is_empty()
    );
}
