use std::time::Duration;

use pagedefer_activation::{
    metrics, ActivationCause, ActivationController, ActivationDefaults, ActivationPlan, ElementBox,
    ElementId, HostCapabilities, IdleWindow, IntersectionHost, PlanInput, Priority, SectionId,
    SimulatedViewport, TriggerConfig, TriggerKind,
};
use pagedefer_event_bus::{interaction_bus, InteractionEvent, InteractionKind};
use tokio::time::{sleep, Instant};

const WIDTH: u32 = 1280;
const HEIGHT: u32 = 800;

fn plan_for(input: PlanInput, host: &HostCapabilities) -> ActivationPlan {
    ActivationPlan::resolve(&input, &ActivationDefaults::default(), host)
}

fn below_fold(viewport: &SimulatedViewport, id: &str, top: i64) -> ElementId {
    let element = ElementId::from(id);
    viewport.mount_element(element.clone(), ElementBox::new(top, 400));
    element
}

#[tokio::test(start_paused = true)]
async fn idle_without_host_primitive_uses_fixed_delay() {
    let started = Instant::now();
    let plan = plan_for(
        PlanInput::new(ElementId::from("hours"), Priority::Medium),
        &HostCapabilities::headless(),
    );
    let controller = ActivationController::mount(SectionId::from("hours"), &plan);
    assert_eq!(controller.listener_count(), 1);

    sleep(Duration::from_millis(290)).await;
    assert!(controller.phase().is_pending());

    assert_eq!(controller.activated().await, Ok(ActivationCause::Idle));
    assert_eq!(started.elapsed(), Duration::from_millis(300));
    assert_eq!(controller.listener_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn idle_window_never_opening_times_out() {
    let started = Instant::now();
    let window = IdleWindow::new();
    let host = HostCapabilities::headless().with_idle(window.clone());
    let plan = plan_for(PlanInput::new(ElementId::from("faq"), Priority::Medium), &host);
    let controller = ActivationController::mount(SectionId::from("faq"), &plan);

    assert_eq!(controller.activated().await, Ok(ActivationCause::IdleTimeout));
    assert_eq!(started.elapsed(), Duration::from_millis(2_100));
}

#[tokio::test(start_paused = true)]
async fn idle_window_opening_activates_after_min_delay() {
    let window = IdleWindow::new();
    let host = HostCapabilities::headless().with_idle(window.clone());
    let plan = plan_for(PlanInput::new(ElementId::from("faq"), Priority::Medium), &host);
    let controller = ActivationController::mount(SectionId::from("faq"), &plan);

    sleep(Duration::from_millis(500)).await;
    window.open();
    let opened = Instant::now();
    assert_eq!(controller.activated().await, Ok(ActivationCause::Idle));
    assert_eq!(opened.elapsed(), Duration::from_millis(100));
}

#[test]
fn deferred_section_outside_runtime_activates_immediately() {
    let viewport = SimulatedViewport::new(WIDTH, HEIGHT);
    let element = below_fold(&viewport, "reviews", i64::from(HEIGHT) + 2_000);
    let host = HostCapabilities::headless().with_viewport(viewport.clone());
    let plan = plan_for(PlanInput::new(element, Priority::Low), &host);
    assert!(plan.needs_executor());

    let controller = ActivationController::mount(SectionId::from("reviews"), &plan);
    assert_eq!(
        controller.phase().cause(),
        Some(ActivationCause::CapabilityMissing)
    );
    assert_eq!(controller.listener_count(), 0);
    assert_eq!(viewport.active_observations(), 0);
}

#[test]
fn manual_section_outside_runtime_stays_pending() {
    let plan = plan_for(
        PlanInput::new(ElementId::from("gallery"), Priority::Low)
            .with_config(TriggerConfig::default().strategy(TriggerKind::Manual)),
        &HostCapabilities::headless(),
    );
    assert!(!plan.needs_executor());

    let controller = ActivationController::mount(SectionId::from("gallery"), &plan);
    assert!(controller.phase().is_pending());
    assert!(controller.fire(ActivationCause::Manual));
}

#[tokio::test(start_paused = true)]
async fn proximity_waits_for_root_margin() {
    let viewport = SimulatedViewport::new(WIDTH, HEIGHT);
    let element = below_fold(&viewport, "reviews", i64::from(HEIGHT) + 2_000);
    let host = HostCapabilities::headless().with_viewport(viewport.clone());
    let plan = plan_for(
        PlanInput::new(element, Priority::Low)
            .with_config(TriggerConfig::default().root_margin(1_000)),
        &host,
    );
    let controller = ActivationController::mount(SectionId::from("reviews"), &plan);
    assert_eq!(viewport.active_observations(), 1);
    assert_eq!(controller.listener_count(), 2);

    viewport.scroll_to(999);
    sleep(Duration::from_millis(500)).await;
    assert!(controller.phase().is_pending());

    viewport.scroll_to(1_000);
    let entered = Instant::now();
    assert_eq!(controller.activated().await, Ok(ActivationCause::Proximity));
    assert_eq!(entered.elapsed(), Duration::from_millis(100));
    assert_eq!(viewport.active_observations(), 0);
    assert_eq!(controller.listener_count(), 0);
    assert_eq!(controller.teardown_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn ceiling_bounds_a_never_scrolled_section() {
    let started = Instant::now();
    let viewport = SimulatedViewport::new(WIDTH, HEIGHT);
    let element = below_fold(&viewport, "more-items", 6_000);
    let host = HostCapabilities::headless().with_viewport(viewport.clone());
    let plan = plan_for(
        PlanInput::new(element, Priority::Low).with_config(
            TriggerConfig::default()
                .root_margin(800)
                .fallback(1_500),
        ),
        &host,
    );
    let controller = ActivationController::mount(SectionId::from("more-items"), &plan);

    assert_eq!(controller.activated().await, Ok(ActivationCause::Ceiling));
    assert_eq!(started.elapsed(), Duration::from_millis(1_500));
    assert_eq!(viewport.active_observations(), 0);
    assert_eq!(controller.transition_count(), 1);

    // Late scroll must not produce a second transition.
    viewport.scroll_to(6_000);
    sleep(Duration::from_millis(200)).await;
    assert_eq!(controller.transition_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn manual_strategy_stays_pending() {
    let viewport = SimulatedViewport::new(WIDTH, HEIGHT);
    let element = below_fold(&viewport, "more-items", 6_000);
    let host = HostCapabilities::headless().with_viewport(viewport.clone());
    let plan = plan_for(
        PlanInput::new(element, Priority::Low).with_config(
            TriggerConfig::default()
                .strategy(TriggerKind::Manual)
                .root_margin(800)
                .fallback(1_500),
        ),
        &host,
    );
    let controller = ActivationController::mount(SectionId::from("more-items"), &plan);
    assert_eq!(controller.listener_count(), 0);
    assert_eq!(viewport.active_observations(), 0);

    sleep(Duration::from_secs(60)).await;
    assert!(controller.phase().is_pending());

    assert!(controller.fire(ActivationCause::Manual));
    assert_eq!(controller.activated().await, Ok(ActivationCause::Manual));
}

#[tokio::test(start_paused = true)]
async fn interaction_fires_after_first_event_and_unsubscribes() {
    let bus = interaction_bus(16);
    let host = HostCapabilities::headless().with_interactions(bus.clone());
    let plan = plan_for(
        PlanInput::new(ElementId::from("map"), Priority::Medium)
            .with_config(TriggerConfig::default().strategy(TriggerKind::Interaction)),
        &host,
    );
    let controller = ActivationController::mount(SectionId::from("map"), &plan);
    assert_eq!(bus.subscriber_count(), 1);

    sleep(Duration::from_millis(400)).await;
    assert_eq!(bus.notify_dom_event("pointerdown"), 1);
    let interacted = Instant::now();
    sleep(Duration::from_millis(1)).await;
    assert_eq!(bus.subscriber_count(), 0);

    assert_eq!(controller.activated().await, Ok(ActivationCause::Interaction));
    assert_eq!(interacted.elapsed(), Duration::from_millis(100));
}

#[tokio::test(start_paused = true)]
async fn interaction_ceiling_fires_without_events() {
    let started = Instant::now();
    let bus = interaction_bus(16);
    let host = HostCapabilities::headless().with_interactions(bus.clone());
    let plan = plan_for(
        PlanInput::new(ElementId::from("map"), Priority::Medium)
            .with_config(TriggerConfig::default().strategy(TriggerKind::Interaction)),
        &host,
    );
    let controller = ActivationController::mount(SectionId::from("map"), &plan);

    assert_eq!(
        controller.activated().await,
        Ok(ActivationCause::InteractionCeiling)
    );
    assert_eq!(started.elapsed(), Duration::from_millis(3_000));
    assert_eq!(bus.subscriber_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn ceiling_wins_during_interaction_settle_delay() {
    let started = Instant::now();
    let bus = interaction_bus(16);
    let host = HostCapabilities::headless().with_interactions(bus.clone());
    let plan = plan_for(
        PlanInput::new(ElementId::from("map"), Priority::Medium).with_config(
            TriggerConfig::default()
                .strategy(TriggerKind::Interaction)
                .fallback(1_000),
        ),
        &host,
    );
    let controller = ActivationController::mount(SectionId::from("map"), &plan);

    sleep(Duration::from_millis(950)).await;
    bus.dispatch(InteractionEvent::new(InteractionKind::Scroll));

    assert_eq!(
        controller.activated().await,
        Ok(ActivationCause::InteractionCeiling)
    );
    assert_eq!(started.elapsed(), Duration::from_millis(1_000));
    assert_eq!(controller.transition_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn closed_interaction_bus_activates_immediately() {
    let bus = interaction_bus(4);
    let host = HostCapabilities::headless().with_interactions(bus);
    let plan = plan_for(
        PlanInput::new(ElementId::from("map"), Priority::Medium)
            .with_config(TriggerConfig::default().strategy(TriggerKind::Interaction)),
        &host,
    );
    let controller = ActivationController::mount(SectionId::from("map"), &plan);
    drop(plan);
    drop(host);

    assert_eq!(
        controller.activated().await,
        Ok(ActivationCause::CapabilityMissing)
    );
}

#[tokio::test(start_paused = true)]
async fn missing_root_element_activates_as_unobservable() {
    let viewport = SimulatedViewport::new(WIDTH, HEIGHT);
    let host = HostCapabilities::headless().with_viewport(viewport.clone());
    let plan = plan_for(
        PlanInput::new(ElementId::from("ghost"), Priority::Low),
        &host,
    );
    let controller = ActivationController::mount(SectionId::from("ghost"), &plan);

    assert_eq!(
        controller.phase().cause(),
        Some(ActivationCause::Unobservable)
    );
    assert_eq!(controller.listener_count(), 0);
    assert_eq!(viewport.active_observations(), 0);
    sleep(Duration::from_secs(10)).await;
    assert_eq!(controller.transition_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn element_removed_by_host_activates_as_unobservable() {
    let viewport = SimulatedViewport::new(WIDTH, HEIGHT);
    let element = below_fold(&viewport, "gallery", 5_000);
    let host = HostCapabilities::headless().with_viewport(viewport.clone());
    let plan = plan_for(PlanInput::new(element.clone(), Priority::Low), &host);
    let controller = ActivationController::mount(SectionId::from("gallery"), &plan);

    sleep(Duration::from_millis(100)).await;
    viewport.unmount_element(&element);
    assert_eq!(
        controller.activated().await,
        Ok(ActivationCause::Unobservable)
    );
}

#[tokio::test(start_paused = true)]
async fn unmount_before_activation_releases_everything() {
    let viewport = SimulatedViewport::new(WIDTH, HEIGHT);
    let element = below_fold(&viewport, "menu", 4_000);
    let host = HostCapabilities::headless().with_viewport(viewport.clone());
    let plan = plan_for(PlanInput::new(element, Priority::Low), &host);
    let controller = ActivationController::mount(SectionId::from("menu"), &plan);
    assert_eq!(controller.listener_count(), 2);

    let before = metrics::snapshot().unmounted_pending;
    assert!(controller.unmount());
    assert_eq!(controller.listener_count(), 0);
    assert_eq!(viewport.active_observations(), 0);
    assert!(metrics::snapshot().unmounted_pending > before);

    viewport.scroll_to(4_000);
    sleep(Duration::from_secs(30)).await;
    assert!(controller.phase().is_pending());
    assert_eq!(controller.transition_count(), 0);
    assert!(controller.activated().await.is_err());
}

#[tokio::test(start_paused = true)]
async fn dropping_the_controller_disconnects_observers() {
    let viewport = SimulatedViewport::new(WIDTH, HEIGHT);
    let element = below_fold(&viewport, "menu", 4_000);
    let host = HostCapabilities::headless().with_viewport(viewport.clone());
    let plan = plan_for(PlanInput::new(element, Priority::Low), &host);
    let controller = ActivationController::mount(SectionId::from("menu"), &plan);
    let handle = controller.fire_handle();
    assert_eq!(viewport.active_observations(), 1);

    drop(controller);
    assert_eq!(viewport.active_observations(), 0);
    assert!(!handle.is_live());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_fires_produce_one_transition() {
    let viewport = SimulatedViewport::new(WIDTH, HEIGHT);
    let element = below_fold(&viewport, "race", 9_000);
    let host = HostCapabilities::headless().with_viewport(viewport.clone());
    let plan = plan_for(PlanInput::new(element, Priority::Low), &host);
    let controller = ActivationController::mount(SectionId::from("race"), &plan);

    let causes = [
        ActivationCause::Manual,
        ActivationCause::Ceiling,
        ActivationCause::Proximity,
        ActivationCause::Idle,
    ];
    let tasks: Vec<_> = (0..32)
        .map(|n| {
            let handle = controller.fire_handle();
            let cause = causes[n % causes.len()];
            tokio::spawn(async move { handle.fire(cause) })
        })
        .collect();
    let mut winners = 0;
    for task in tasks {
        if task.await.unwrap() {
            winners += 1;
        }
    }

    assert_eq!(winners, 1);
    assert_eq!(controller.transition_count(), 1);
    assert_eq!(controller.teardown_count(), 1);
    assert_eq!(controller.listener_count(), 0);
    assert_eq!(viewport.active_observations(), 0);
}

#[tokio::test(start_paused = true)]
async fn high_and_low_sections_activate_independently() {
    let viewport = SimulatedViewport::new(WIDTH, HEIGHT);
    let high = below_fold(&viewport, "hero-deals", 3_000);
    let low = below_fold(&viewport, "nearby", 3_500);
    let host = HostCapabilities::headless().with_viewport(viewport.clone());

    let high = ActivationController::mount(
        SectionId::from("hero-deals"),
        &plan_for(PlanInput::new(high, Priority::High), &host),
    );
    let low = ActivationController::mount(
        SectionId::from("nearby"),
        &plan_for(
            PlanInput::new(low, Priority::Low)
                .with_config(TriggerConfig::default().root_margin(1_000)),
            &host,
        ),
    );

    assert_eq!(high.phase().cause(), Some(ActivationCause::Immediate));
    assert_eq!(high.listener_count(), 0);
    assert!(low.phase().is_pending());

    viewport.scroll_to(2_000);
    assert_eq!(low.activated().await, Ok(ActivationCause::Proximity));
    assert_eq!(high.transition_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn subscribers_observe_the_single_transition() {
    let plan = plan_for(
        PlanInput::new(ElementId::from("hours"), Priority::Medium),
        &HostCapabilities::headless(),
    );
    let controller = ActivationController::mount(SectionId::from("hours"), &plan);
    let mut phases = controller.subscribe();
    assert!(phases.borrow().is_pending());

    phases.changed().await.unwrap();
    assert_eq!(phases.borrow().cause(), Some(ActivationCause::Idle));
    assert!(controller.activation_latency().is_some());
}
