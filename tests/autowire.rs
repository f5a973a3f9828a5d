use lifewire::{
    CancellationToken, Constructor, DependencyError, DependencyManagerExt, ErrorKind, Injectable, Lifecycle,
    StrategyCollection,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Debug)]
struct Config {
    port: u16,
}

trait Logger: Send + Sync {
    fn line(&self, message: &str) -> String;
}

struct Prefixed;

impl Logger for Prefixed {
    fn line(&self, message: &str) -> String {
        format!("[app] {}", message)
    }
}

struct Server {
    config: Arc<Config>,
    logger: Arc<dyn Logger>,
    banner: Option<Arc<String>>,
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server").finish_non_exhaustive()
    }
}

impl Injectable for Server {
    fn constructors() -> Vec<Constructor<Self>> {
        vec![
            Constructor::inject("")
                .param::<Config>("config", "")
                .param::<dyn Logger>("logger", "")
                .optional_param::<String>("banner", "banner")
                .activate(|args| {
                    Ok(Server {
                        config: args.next()?,
                        logger: args.next_trait()?,
                        banner: args.next_optional()?,
                    })
                }),
            Constructor::inject("admin")
                .named("admin")
                .param::<Config>("config", "admin")
                .param::<dyn Logger>("logger", "")
                .activate(|args| {
                    Ok(Server {
                        config: args.next()?,
                        logger: args.next_trait()?,
                        banner: Some(Arc::new("admin".to_string())),
                    })
                }),
        ]
    }
}

fn base() -> StrategyCollection {
    let mut strategies = StrategyCollection::new();
    strategies.add_instance("", Config { port: 8080 });
    strategies.add_instance("admin", Config { port: 9090 });
    strategies.add_instance_trait::<dyn Logger>("", Arc::new(Prefixed));
    strategies
}

#[test]
fn autowires_the_marked_constructor() {
    let mut strategies = base();
    strategies.add_autowired::<Server>("");

    let container = strategies.build().unwrap();
    let server = container.resolve::<Server>("").unwrap();
    assert_eq!(server.config.port, 8080);
    assert_eq!(server.logger.line("up"), "[app] up");
    assert!(server.banner.is_none());
    container.dispose().unwrap();
}

#[test]
fn optional_parameter_is_filled_when_registered() {
    let mut strategies = base();
    strategies.add_instance("banner", "welcome".to_string());
    strategies.add_autowired::<Server>("");

    let container = strategies.build().unwrap();
    let server = container.resolve::<Server>("").unwrap();
    assert_eq!(server.banner.as_deref().map(String::as_str), Some("welcome"));
    container.dispose().unwrap();
}

#[test]
fn selector_picks_the_constructor() {
    let mut strategies = base();
    strategies.add_autowired::<Server>("");
    strategies.add_autowired::<Server>("admin");

    let container = strategies.build().unwrap();
    assert_eq!(container.resolve::<Server>("admin").unwrap().config.port, 9090);
    assert_eq!(container.resolve::<Server>("").unwrap().config.port, 8080);
    container.dispose().unwrap();
}

#[test]
fn autowired_transients_are_fresh_and_singletons_are_frozen() {
    let mut strategies = base();
    strategies.add_autowired::<Server>("");
    strategies.add_singleton_autowired::<Server>("admin");

    let container = strategies.build().unwrap();
    let a = container.resolve::<Server>("").unwrap();
    let b = container.resolve::<Server>("").unwrap();
    assert!(!Arc::ptr_eq(&a, &b));
    assert!(Arc::ptr_eq(&a.config, &b.config));

    let x = container.resolve::<Server>("admin").unwrap();
    let y = container.resolve::<Server>("admin").unwrap();
    assert!(Arc::ptr_eq(&x, &y));
    container.dispose().unwrap();
}

#[test]
fn missing_required_argument_names_its_key() {
    let mut strategies = StrategyCollection::new();
    strategies.add_instance_trait::<dyn Logger>("", Arc::new(Prefixed));
    strategies.add_autowired::<Server>("");

    let container = strategies.build().unwrap();
    let err = container.resolve::<Server>("").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Resolution);
    assert!(err.find_kind(ErrorKind::NotRegistered).is_some());
    container.dispose().unwrap();
}

struct Probe;

static PROBE_CALLS: AtomicUsize = AtomicUsize::new(0);

#[derive(Debug)]
struct Unmarked;

impl Injectable for Unmarked {
    fn constructors() -> Vec<Constructor<Self>> {
        vec![Constructor::inject("")
            .param::<Probe>("probe", "")
            .unmarked_param::<String>("raw")
            .activate(|args| {
                args.next::<Probe>()?;
                Ok(Unmarked)
            })]
    }
}

#[test]
fn unmarked_parameter_fails_before_any_argument_resolves() {
    let mut strategies = StrategyCollection::new();
    strategies.add_transient_factory::<Probe, _>("", |_| {
        PROBE_CALLS.fetch_add(1, Ordering::SeqCst);
        Ok(Probe)
    });
    strategies.add_instance("", String::from("raw"));
    strategies.add_autowired::<Unmarked>("");

    let container = strategies.build().unwrap();
    let err = container.resolve::<Unmarked>("").unwrap_err();
    let config = err.find_kind(ErrorKind::Configuration).unwrap();
    assert!(config.message().contains("`raw: alloc::string::String`"));
    assert_eq!(PROBE_CALLS.load(Ordering::SeqCst), 0);
    container.dispose().unwrap();
}

#[derive(Debug)]
struct Ambiguous;

impl Injectable for Ambiguous {
    fn constructors() -> Vec<Constructor<Self>> {
        vec![
            Constructor::inject("").activate(|_| Ok(Ambiguous)),
            Constructor::inject("").named("with_defaults").activate(|_| Ok(Ambiguous)),
            Constructor::unmarked("plain").activate(|_| Ok(Ambiguous)),
        ]
    }
}

#[test]
fn constructor_selection_errors_are_configuration_errors() {
    let mut strategies = StrategyCollection::new();
    strategies.add_autowired::<Ambiguous>("");
    strategies.add_autowired::<Ambiguous>("nothing");

    let container = strategies.build().unwrap();
    let ambiguous = container.resolve::<Ambiguous>("").unwrap_err();
    assert!(ambiguous.root_cause().message().contains("ambiguous"));
    assert_eq!(ambiguous.root_cause().kind(), ErrorKind::Configuration);

    let none = container.resolve::<Ambiguous>("nothing").unwrap_err();
    assert!(none.root_cause().message().contains("no eligible constructor"));
    container.dispose().unwrap();
}

type Trail = Arc<Mutex<Vec<&'static str>>>;

struct First;
struct Second;
struct Ordered;

impl Injectable for Ordered {
    fn constructors() -> Vec<Constructor<Self>> {
        vec![Constructor::inject("")
            .param::<First>("first", "")
            .param::<Second>("second", "")
            .activate(|args| {
                assert_eq!(args.len(), 2);
                args.next::<First>()?;
                args.next::<Second>()?;
                Ok(Ordered)
            })]
    }
}

fn ordered_collection(trail: &Trail) -> StrategyCollection {
    let mut strategies = StrategyCollection::new();
    let first = trail.clone();
    strategies.add_transient_factory::<First, _>("", move |_| {
        first.lock().unwrap().push("first");
        Ok(First)
    });
    let second = trail.clone();
    strategies.add_transient_factory::<Second, _>("", move |_| {
        second.lock().unwrap().push("second");
        Ok(Second)
    });
    strategies.add_autowired::<Ordered>("");
    strategies
}

#[test]
fn arguments_resolve_in_declaration_order() {
    let trail = Trail::default();
    let container = ordered_collection(&trail).build().unwrap();
    container.resolve::<Ordered>("").unwrap();
    assert_eq!(*trail.lock().unwrap(), vec!["first", "second"]);
    container.dispose().unwrap();
}

#[tokio::test]
async fn async_autowiring_awaits_arguments_in_order() {
    let trail = Trail::default();
    let container = ordered_collection(&trail).build_async().await.unwrap();
    container
        .resolve_async::<Ordered>("", &CancellationToken::none())
        .await
        .unwrap();
    assert_eq!(*trail.lock().unwrap(), vec!["first", "second"]);
    container.dispose_async().await.unwrap();
}

#[derive(Debug)]
struct Token(u64);
#[derive(Debug)]
struct Session {
    token: Arc<Token>,
}

impl Injectable for Session {
    fn constructors() -> Vec<Constructor<Self>> {
        vec![Constructor::inject("")
            .param::<Token>("token", "")
            .activate(|args| Ok(Session { token: args.next()? }))]
    }
}

#[tokio::test]
async fn async_arguments_may_come_from_async_factories() {
    let mut strategies = StrategyCollection::new();
    strategies.add_transient_async::<Token, std::io::Error, _, _>("", || async {
        tokio::task::yield_now().await;
        Ok(Token(11))
    });
    strategies.add_autowired::<Session>("");

    let container = strategies.build_async().await.unwrap();
    let session = container
        .resolve_async::<Session>("", &CancellationToken::none())
        .await
        .unwrap();
    assert_eq!(session.token.0, 11);
    container.dispose_async().await.unwrap();
}

#[tokio::test]
async fn cancellation_stops_autowiring() {
    let mut strategies = StrategyCollection::new();
    strategies.add_instance("", Token(1));
    strategies.add_autowired::<Session>("");
    let container = strategies.build_async().await.unwrap();

    let cancel = CancellationToken::new();
    cancel.cancel();
    let err = container.resolve_async::<Session>("", &cancel).await.unwrap_err();
    assert!(err.find_kind(ErrorKind::Cancelled).is_some());
    container.dispose_async().await.unwrap();
}

#[derive(Debug)]
struct Refuses;

impl Injectable for Refuses {
    fn constructors() -> Vec<Constructor<Self>> {
        vec![Constructor::inject("").activate(|_| Err(DependencyError::state("not today")))]
    }
}

#[test]
fn constructor_errors_become_activation_errors() {
    let mut strategies = StrategyCollection::new();
    strategies.add_autowired::<Refuses>("");

    let container = strategies.build().unwrap();
    let err = container.resolve::<Refuses>("").unwrap_err();
    let activation = err.find_kind(ErrorKind::Activation).unwrap();
    assert!(activation.message().contains("constructor"));
    assert_eq!(err.root_cause().message(), "not today");
    container.dispose().unwrap();
}

#[test]
fn trait_service_bound_to_autowired_type() {
    struct Quiet;

    impl Logger for Quiet {
        fn line(&self, _message: &str) -> String {
            String::new()
        }
    }

    impl Injectable for Quiet {
        fn constructors() -> Vec<Constructor<Self>> {
            vec![Constructor::inject("quiet").activate(|_| Ok(Quiet))]
        }
    }

    let mut strategies = StrategyCollection::new();
    strategies.add_autowired_trait::<dyn Logger, Quiet, _>("quiet", |quiet| quiet as Arc<dyn Logger>);

    let container = strategies.build().unwrap();
    assert_eq!(container.resolve_trait::<dyn Logger>("quiet").unwrap().line("x"), "");
    container.dispose().unwrap();
}
