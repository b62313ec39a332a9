//! Tests for live task queries and the filtered list views built on them.

use multitask::bus::NotificationBus;
use multitask::coordinator::TaskCompletionCoordinator;
use multitask::db::Database;
use multitask::db::live::ChangeSet;
use multitask::feedback::SilentFeedback;
use multitask::types::{ItemUpdate, NewItem, TaskFilter};
use multitask::views::TaskListView;
use std::sync::{Arc, Mutex};

struct Setup {
    db: Database,
    bus: Arc<NotificationBus>,
    coordinator: TaskCompletionCoordinator,
}

fn setup() -> Setup {
    let db = Database::open_in_memory().expect("Failed to create in-memory database");
    let bus = Arc::new(NotificationBus::new());
    let coordinator =
        TaskCompletionCoordinator::new(db.clone(), Arc::clone(&bus), Arc::new(SilentFeedback));
    Setup {
        db,
        bus,
        coordinator,
    }
}

/// Task "t" with one open item "a".
fn task_with_open_item(s: &Setup) {
    s.db.create_task(Some("t".into()), "t").unwrap();
    s.coordinator
        .on_item_created("t", NewItem::new("a").with_id("a"))
        .unwrap();
}

fn record(db: &Database, filter: TaskFilter) -> (Arc<Mutex<Vec<(ChangeSet, Vec<String>)>>>, multitask::db::live::LiveQuery) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let query = db
        .observe_tasks(filter, move |changes, tasks| {
            let ids = tasks.iter().map(|t| t.id.clone()).collect();
            sink.lock().unwrap().push((changes.clone(), ids));
        })
        .unwrap();
    (seen, query)
}

mod live_queries {
    use super::*;

    #[test]
    fn insert_is_delivered_to_empty_query() {
        let s = setup();
        let (seen, _query) = record(&s.db, TaskFilter::All);

        s.db.create_task(Some("t".into()), "t").unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0.insertions, vec![0]);
        assert_eq!(seen[0].1, vec!["t".to_string()]);
    }

    #[test]
    fn completion_moves_task_between_filtered_queries() {
        let s = setup();
        task_with_open_item(&s);
        let (pending, _p) = record(&s.db, TaskFilter::Pending);
        let (completed, _c) = record(&s.db, TaskFilter::Completed);

        s.coordinator
            .on_item_mutated("t", "a", ItemUpdate::complete())
            .unwrap();

        let pending = pending.lock().unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].0.deletions, vec![0]);
        assert!(pending[0].1.is_empty());

        let completed = completed.lock().unwrap();
        assert_eq!(completed.len(), 1);
        assert_eq!(completed[0].0.insertions, vec![0]);
    }

    #[test]
    fn item_change_is_a_modification() {
        let s = setup();
        task_with_open_item(&s);
        s.coordinator
            .on_item_created("t", NewItem::new("b").with_id("b"))
            .unwrap();
        let (seen, _query) = record(&s.db, TaskFilter::All);

        s.coordinator
            .on_item_mutated("t", "a", ItemUpdate::complete())
            .unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0.modifications, vec![0]);
        assert!(seen[0].0.insertions.is_empty());
        assert!(seen[0].0.deletions.is_empty());
    }

    #[test]
    fn unrelated_writes_are_not_delivered() {
        let s = setup();
        task_with_open_item(&s);
        let (seen, _query) = record(&s.db, TaskFilter::Completed);

        s.db.create_task(None, "another pending task").unwrap();

        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn dropping_handle_unregisters() {
        let s = setup();
        let (seen, query) = record(&s.db, TaskFilter::All);
        assert_eq!(s.db.live_query_count(), 1);

        query.cancel();
        s.db.create_task(None, "t").unwrap();

        assert_eq!(s.db.live_query_count(), 0);
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn last_delivery_reflects_all_concurrent_writes() {
        for _ in 0..25 {
            let s = setup();
            let (seen, _query) = record(&s.db, TaskFilter::All);

            let handles: Vec<_> = (0..4)
                .map(|writer| {
                    let db = s.db.clone();
                    std::thread::spawn(move || {
                        for n in 0..5 {
                            db.create_task(None, &format!("task {writer}-{n}")).unwrap();
                        }
                    })
                })
                .collect();
            for handle in handles {
                handle.join().unwrap();
            }

            let seen = seen.lock().unwrap();
            let (_, last) = seen.last().expect("at least one delivery");
            assert_eq!(last.len(), 20);
            let sizes: Vec<usize> = seen.iter().map(|(_, ids)| ids.len()).collect();
            assert!(sizes.windows(2).all(|w| w[0] <= w[1]), "deliveries went backwards: {sizes:?}");
        }
    }

    #[test]
    fn failed_write_delivers_nothing() {
        let s = setup();
        task_with_open_item(&s);
        let (seen, _query) = record(&s.db, TaskFilter::All);

        assert!(
            s.coordinator
                .on_item_mutated("t", "missing", ItemUpdate::complete())
                .is_err()
        );

        assert!(seen.lock().unwrap().is_empty());
    }
}

mod list_views {
    use super::*;

    #[test]
    fn empty_view_is_not_live() {
        let s = setup();

        let view = TaskListView::new(s.db.clone(), Arc::clone(&s.bus), TaskFilter::Completed).unwrap();

        assert!(view.is_empty());
        assert!(!view.is_live());
    }

    #[test]
    fn empty_completed_view_refetches_on_completion_event() {
        let s = setup();
        task_with_open_item(&s);
        let pending = TaskListView::new(s.db.clone(), Arc::clone(&s.bus), TaskFilter::Pending).unwrap();
        let completed =
            TaskListView::new(s.db.clone(), Arc::clone(&s.bus), TaskFilter::Completed).unwrap();
        assert!(pending.is_live());
        assert!(!completed.is_live());

        s.coordinator
            .on_item_mutated("t", "a", ItemUpdate::complete())
            .unwrap();

        // The completed list only learns about the task through the bus
        assert_eq!(completed.task_ids(), vec!["t".to_string()]);
        assert_eq!(completed.manual_refreshes(), 1);
        assert!(completed.is_live());

        // The pending list drops it through its live query
        assert!(pending.is_empty());
        assert_eq!(pending.manual_refreshes(), 0);
        assert_eq!(pending.live_updates(), 1);
        assert_eq!(pending.last_changes().unwrap().deletions, vec![0]);
    }

    #[test]
    fn live_view_does_not_refetch_for_visible_task() {
        let s = setup();
        task_with_open_item(&s);
        let completed =
            TaskListView::new(s.db.clone(), Arc::clone(&s.bus), TaskFilter::Completed).unwrap();
        let pending = TaskListView::new(s.db.clone(), Arc::clone(&s.bus), TaskFilter::Pending).unwrap();

        s.coordinator
            .on_item_mutated("t", "a", ItemUpdate::complete())
            .unwrap();
        s.coordinator
            .on_item_mutated("t", "a", ItemUpdate::revert())
            .unwrap();

        // Pending stayed live while empty, so the reopened task arrived
        // through the live query before the event was published.
        assert_eq!(pending.task_ids(), vec!["t".to_string()]);
        assert_eq!(pending.manual_refreshes(), 0);
        assert_eq!(pending.live_updates(), 2);

        assert!(completed.is_empty());
        assert_eq!(completed.manual_refreshes(), 1);
    }

    #[test]
    fn empty_pending_view_refetches_when_new_item_reopens_task() {
        let s = setup();
        task_with_open_item(&s);
        s.coordinator
            .on_item_mutated("t", "a", ItemUpdate::complete())
            .unwrap();
        let pending = TaskListView::new(s.db.clone(), Arc::clone(&s.bus), TaskFilter::Pending).unwrap();
        assert!(!pending.is_live());

        s.coordinator
            .on_item_created("t", NewItem::new("b"))
            .unwrap();

        assert_eq!(pending.task_ids(), vec!["t".to_string()]);
        assert_eq!(pending.manual_refreshes(), 1);
        assert!(pending.is_live());
    }

    #[test]
    fn all_view_never_needs_fallback_once_populated() {
        let s = setup();
        task_with_open_item(&s);
        let all = TaskListView::new(s.db.clone(), Arc::clone(&s.bus), TaskFilter::All).unwrap();

        s.coordinator
            .on_item_mutated("t", "a", ItemUpdate::complete())
            .unwrap();

        assert_eq!(all.len(), 1);
        assert!(all.tasks()[0].is_completed);
        assert_eq!(all.manual_refreshes(), 0);
    }

    #[test]
    fn dropping_view_releases_subscriptions() {
        let s = setup();
        task_with_open_item(&s);
        let view = TaskListView::new(s.db.clone(), Arc::clone(&s.bus), TaskFilter::Pending).unwrap();
        assert_eq!(s.db.live_query_count(), 1);

        drop(view);

        assert_eq!(s.db.live_query_count(), 0);
        assert_eq!(
            s.bus.subscriber_count(multitask::bus::EventKind::TaskCompletion),
            0
        );
    }

    #[test]
    fn views_built_during_concurrent_toggles_settle_on_final_state() {
        let s = setup();
        task_with_open_item(&s);

        let writer = {
            let coordinator = s.coordinator.clone();
            std::thread::spawn(move || {
                for round in 0..40 {
                    let update = if round % 2 == 0 {
                        ItemUpdate::complete()
                    } else {
                        ItemUpdate::revert()
                    };
                    coordinator.on_item_mutated("t", "a", update).unwrap();
                }
                coordinator
                    .on_item_mutated("t", "a", ItemUpdate::complete())
                    .unwrap();
            })
        };

        let mut views = Vec::new();
        while !writer.is_finished() && views.len() < 200 {
            for filter in [TaskFilter::Completed, TaskFilter::Pending] {
                views.push(TaskListView::new(s.db.clone(), Arc::clone(&s.bus), filter).unwrap());
            }
        }
        writer.join().unwrap();

        for view in &views {
            let expected = match view.filter() {
                TaskFilter::Completed => vec!["t".to_string()],
                _ => Vec::new(),
            };
            assert_eq!(view.task_ids(), expected, "stale {:?} view", view.filter());
        }
    }

    #[test]
    fn explicit_refresh_counts() {
        let s = setup();
        let view = TaskListView::new(s.db.clone(), Arc::clone(&s.bus), TaskFilter::Pending).unwrap();
        s.db.create_task(Some("t".into()), "t").unwrap();
        assert!(view.is_empty());

        view.refresh().unwrap();

        assert_eq!(view.len(), 1);
        assert_eq!(view.manual_refreshes(), 1);
        assert!(view.is_live());
    }
}
