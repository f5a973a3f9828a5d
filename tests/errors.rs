use lifewire::{
    CancellationToken, ContainerOptions, DependencyManagerExt, ErrorKind, Lifecycle, ResolutionKey,
    StrategyCollection,
};
use std::error::Error;

#[derive(Debug)]
struct A;
#[derive(Debug)]
struct B;
#[derive(Debug)]
struct C;

fn cycle() -> StrategyCollection {
    let mut strategies = StrategyCollection::new();
    strategies.add_transient_factory::<A, _>("", |m| {
        m.resolve::<B>("")?;
        Ok(A)
    });
    strategies.add_transient_factory::<B, _>("", |m| {
        m.resolve::<C>("")?;
        Ok(B)
    });
    strategies.add_transient_factory::<C, _>("", |m| {
        m.resolve::<A>("")?;
        Ok(C)
    });
    strategies
}

#[test]
fn cycle_reports_the_full_path() {
    let container = cycle().build().unwrap();
    let err = container.resolve::<A>("").unwrap_err();

    let circular = err.find_kind(ErrorKind::Circular).unwrap();
    let a = std::any::type_name::<A>();
    let b = std::any::type_name::<B>();
    let c = std::any::type_name::<C>();
    assert_eq!(circular.message(), format!("{a} -> {b} -> {c} -> {a}"));
    assert_eq!(circular.key(), Some(&ResolutionKey::of::<A>("")));
    container.dispose().unwrap();
}

#[test]
fn guard_unwinds_after_a_cycle() {
    let container = cycle().build().unwrap();
    for _ in 0..3 {
        let err = container.resolve::<B>("").unwrap_err();
        assert!(err.find_kind(ErrorKind::Circular).is_some());
    }
    container.dispose().unwrap();
}

#[tokio::test]
async fn async_cycle_is_detected_per_task() {
    let container = cycle().build_async().await.unwrap();
    let err = container
        .resolve_async::<A>("", &CancellationToken::none())
        .await
        .unwrap_err();
    assert!(err.find_kind(ErrorKind::Circular).is_some());
    container.dispose_async().await.unwrap();
}

#[derive(Debug)]
struct Level<const N: usize>;

fn chain(max_depth: usize) -> StrategyCollection {
    let mut strategies = StrategyCollection::new();
    strategies.with_options(ContainerOptions::default().with_max_depth(max_depth));
    strategies.add_transient_factory::<Level<0>, _>("", |m| {
        m.resolve::<Level<1>>("")?;
        Ok(Level)
    });
    strategies.add_transient_factory::<Level<1>, _>("", |m| {
        m.resolve::<Level<2>>("")?;
        Ok(Level)
    });
    strategies.add_transient_factory::<Level<2>, _>("", |m| {
        m.resolve::<Level<3>>("")?;
        Ok(Level)
    });
    strategies.add_transient_factory::<Level<3>, _>("", |_| Ok(Level));
    strategies
}

#[test]
fn depth_limit_applies() {
    let shallow = chain(3).build().unwrap();
    let err = shallow.resolve::<Level<0>>("").unwrap_err();
    assert!(err.find_kind(ErrorKind::DepthExceeded).is_some());
    shallow.dispose().unwrap();

    let deep = chain(4).build().unwrap();
    assert!(deep.resolve::<Level<0>>("").is_ok());
    deep.dispose().unwrap();
}

#[test]
fn disabled_cycle_detection_still_hits_the_depth_limit() {
    let mut strategies = cycle();
    strategies.with_options(
        ContainerOptions::default()
            .with_detect_cycles(false)
            .with_max_depth(32),
    );
    let container = strategies.build().unwrap();
    let err = container.resolve::<A>("").unwrap_err();
    assert!(err.find_kind(ErrorKind::DepthExceeded).is_some());
    assert!(err.find_kind(ErrorKind::Circular).is_none());
    container.dispose().unwrap();
}

#[test]
fn errors_chain_through_source() {
    let container = cycle().build().unwrap();
    let err = container.resolve::<A>("").unwrap_err();

    let mut depth = 0;
    let mut current: Option<&(dyn Error + 'static)> = Some(&err);
    while let Some(e) = current {
        depth += 1;
        current = e.source();
    }
    assert!(depth >= 4);
    assert!(err.to_string().contains("caused by"));
    container.dispose().unwrap();
}

#[test]
fn type_mismatch_when_downcasting_to_the_wrong_type() {
    let err = lifewire::downcast::<u8>(lifewire::erase(1u16)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TypeMismatch);
}
