use lifewire::{
    DependencyManagerExt, DependencyError, ErrorKind, Lifecycle, ResolutionKey, ResolutionObserver,
    StrategyCollection, TracingObserver,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<String>>,
}

impl ResolutionObserver for Recorder {
    fn resolving(&self, key: &ResolutionKey) {
        self.events.lock().unwrap().push(format!("resolving {}", key));
    }

    fn resolved(&self, key: &ResolutionKey, _elapsed: Duration) {
        self.events.lock().unwrap().push(format!("resolved {}", key));
    }

    fn failed(&self, key: &ResolutionKey, error: &DependencyError, _elapsed: Duration) {
        self.events
            .lock()
            .unwrap()
            .push(format!("failed {} ({})", key, error.kind()));
    }
}

struct Outer;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[test]
fn observers_see_nested_resolutions() {
    init_tracing();
    let recorder = Arc::new(Recorder::default());
    let mut strategies = StrategyCollection::new();
    strategies.add_instance("", 5u8);
    strategies.add_transient_factory::<Outer, _>("", |m| {
        m.resolve::<u8>("")?;
        Ok(Outer)
    });
    strategies.add_observer(recorder.clone());
    strategies.add_observer(Arc::new(TracingObserver::new()));

    let container = strategies.build().unwrap();
    container.resolve::<Outer>("").unwrap();

    let outer = std::any::type_name::<Outer>();
    assert_eq!(
        *recorder.events.lock().unwrap(),
        vec![
            format!("resolving {}", outer),
            "resolving u8".to_string(),
            "resolved u8".to_string(),
            format!("resolved {}", outer),
        ]
    );
    container.dispose().unwrap();
}

#[test]
fn failures_are_reported() {
    let recorder = Arc::new(Recorder::default());
    let mut strategies = StrategyCollection::new();
    strategies.add_context_factory::<u16, _>("", |_| Ok(1));
    strategies.add_observer(recorder.clone());

    let container = strategies.build().unwrap();
    let scope = container.create_scope();
    scope.resolve::<u16>("").unwrap();
    assert_eq!(
        container.resolve::<u16>("").unwrap_err().kind(),
        ErrorKind::State
    );

    let events = recorder.events.lock().unwrap().clone();
    assert_eq!(events, vec!["resolving u16", "resolved u16"]);

    // Missing keys are answered before any strategy runs.
    assert!(container.try_resolve::<u64>("").unwrap().is_none());
    assert_eq!(recorder.events.lock().unwrap().len(), 2);

    scope.dispose().unwrap();
    container.dispose().unwrap();
}

#[test]
fn failing_strategy_is_reported_as_failed() {
    init_tracing();
    let recorder = Arc::new(Recorder::default());
    let mut strategies = StrategyCollection::new();
    strategies.add_transient_factory::<u32, _>("", |_| Err(DependencyError::activation("nope")));
    strategies.add_observer(recorder.clone());

    let container = strategies.build().unwrap();
    assert!(container.resolve::<u32>("").is_err());
    assert_eq!(
        *recorder.events.lock().unwrap(),
        vec!["resolving u32".to_string(), "failed u32 (resolution failed)".to_string()]
    );
    container.dispose().unwrap();
}
