use crate::helpers::{
    orders_registry, wait_for_exit, CapturedLogs, ClaimingHandler, InMemoryFactory,
    StartedConsumer,
};
use carrot_binder::consumers::{BindingError, ConsumerBindings};
use carrot_binder::declarations::{
    AcknowledgeMode, ConfigurationError, QueueDeclaration, QueueRegistry,
};
use carrot_binder::orchestrator::{
    BindingContext, BindingOrchestrator, DeclarationOutcome, StartupError,
};
use std::sync::Arc;

#[tokio::test]
async fn owned_queue_is_bound_and_its_dead_letter_queue_is_not() {
    let factory = InMemoryFactory::new();
    let orchestrator = BindingOrchestrator::new(
        BindingContext::new("svc-a").with_handler(ClaimingHandler::new("orders", &["orders"])),
        orders_registry(),
        Arc::clone(&factory),
    );
    let mut bindings = ConsumerBindings::new();
    let logs = CapturedLogs::start();

    let report = orchestrator.run(&mut bindings).await.unwrap();

    assert!(logs.warnings().is_empty(), "{:?}", logs.warnings());
    assert_eq!(bindings.len(), 1);
    let binding = bindings.get("ordersContainer").unwrap();
    assert_eq!(binding.queue_name(), "orders");
    assert_eq!(binding.handler_name(), "orders");
    assert_eq!(binding.acknowledge_mode(), AcknowledgeMode::Manual);
    assert_eq!(binding.prefetch_count(), 10);
    assert_eq!(binding.concurrent_consumers(), 2);
    assert!(!bindings.contains_queue("orders.dlq"));

    assert_eq!(report.bound(), vec!["ordersContainer"]);
    assert!(report.unbound().is_empty());
    assert!(matches!(
        report.outcome("orders.dlq"),
        Some(DeclarationOutcome::SkippedDeadLetter)
    ));
    assert_eq!(
        factory.started(),
        vec![StartedConsumer {
            queue_name: "orders".into(),
            handler_name: "orders".into(),
            dead_letter: Some("orders.dlq".into()),
        }]
    );

    bindings.shutdown_all().await.unwrap();
}

#[tokio::test]
async fn queues_owned_by_another_application_are_skipped() {
    let factory = InMemoryFactory::new();
    let orchestrator = BindingOrchestrator::new(
        BindingContext::new("svc-b").with_handler(ClaimingHandler::new("orders", &["orders"])),
        orders_registry(),
        Arc::clone(&factory),
    );
    let mut bindings = ConsumerBindings::new();
    let logs = CapturedLogs::start();

    let report = orchestrator.run(&mut bindings).await.unwrap();

    assert!(logs.warnings().is_empty(), "{:?}", logs.warnings());
    assert!(bindings.is_empty());
    assert!(report.unbound().is_empty());
    assert!(report.bound().is_empty());
    assert!(matches!(
        report.outcome("orders"),
        Some(DeclarationOutcome::SkippedNotOwned)
    ));
    assert!(matches!(
        report.outcome("orders.dlq"),
        Some(DeclarationOutcome::SkippedDeadLetter)
    ));
    assert!(factory.started().is_empty());
}

#[tokio::test]
async fn queues_without_a_handler_are_reported_as_unbound() {
    let registry = QueueRegistry::new(vec![
        QueueDeclaration::new("orders", "svc-a"),
        QueueDeclaration::new("payments", "svc-a"),
        QueueDeclaration::new("refunds", "svc-a"),
    ])
    .unwrap();
    let orchestrator = BindingOrchestrator::new(
        BindingContext::new("svc-a").with_handler(ClaimingHandler::new("orders", &["orders"])),
        registry,
        InMemoryFactory::new(),
    );
    let mut bindings = ConsumerBindings::new();
    let logs = CapturedLogs::start();

    let report = orchestrator.run(&mut bindings).await.unwrap();

    let warnings = logs.warnings();
    assert_eq!(warnings.len(), 1, "{warnings:?}");
    assert!(warnings[0].contains("No consumers in the current queues"));
    assert!(warnings[0].contains("[payments, refunds]"));
    assert_eq!(
        bindings.container_names().collect::<Vec<_>>(),
        vec!["ordersContainer"]
    );
    let unbound = report.unbound();
    assert_eq!(unbound.queue_names(), ["payments", "refunds"]);
    assert_eq!(unbound.to_string(), "[payments, refunds]");
    assert_eq!(report.failures().count(), 0);

    bindings.shutdown_all().await.unwrap();
}

#[tokio::test]
async fn the_first_registered_handler_wins_an_ambiguous_claim() {
    let factory = InMemoryFactory::new();
    let orchestrator = BindingOrchestrator::new(
        BindingContext::new("svc-a")
            .with_handler(ClaimingHandler::new("first", &["orders"]))
            .with_handler(ClaimingHandler::new("second", &["orders"])),
        orders_registry(),
        Arc::clone(&factory),
    );
    let mut bindings = ConsumerBindings::new();
    let logs = CapturedLogs::start();

    let report = orchestrator.run(&mut bindings).await.unwrap();

    let warnings = logs.warnings();
    assert_eq!(warnings.len(), 1, "{warnings:?}");
    assert!(warnings[0].contains("More than one handler claims the queue"));
    assert!(warnings[0].contains("second"));
    assert_eq!(bindings.get_by_queue("orders").unwrap().handler_name(), "first");
    let claims = report.ambiguous_claims();
    assert_eq!(claims.len(), 1);
    assert_eq!(claims[0].queue_name, "orders");
    assert_eq!(claims[0].selected, "first");
    assert_eq!(claims[0].discarded, vec!["second".to_owned()]);
    assert_eq!(factory.started().len(), 1);

    bindings.shutdown_all().await.unwrap();
}

#[tokio::test]
async fn running_twice_does_not_start_a_second_consumer() {
    let factory = InMemoryFactory::new();
    let orchestrator = BindingOrchestrator::new(
        BindingContext::new("svc-a").with_handler(ClaimingHandler::new("orders", &["orders"])),
        orders_registry(),
        Arc::clone(&factory),
    );
    let mut bindings = ConsumerBindings::new();

    orchestrator.run(&mut bindings).await.unwrap();
    let second = orchestrator.run(&mut bindings).await.unwrap();

    assert_eq!(bindings.len(), 1);
    assert!(second.bound().is_empty());
    match second.outcome("orders") {
        Some(DeclarationOutcome::AlreadyBound { container_name }) => {
            assert_eq!(container_name, "ordersContainer")
        }
        other => panic!("Unexpected outcome: {other:?}"),
    }
    assert_eq!(factory.started().len(), 1);

    bindings.shutdown_all().await.unwrap();
}

#[tokio::test]
async fn invalid_tuning_fails_only_its_own_declaration() {
    let registry = QueueRegistry::new(vec![
        QueueDeclaration::new("orders", "svc-a").with_prefetch_count(0),
        QueueDeclaration::new("payments", "svc-a"),
    ])
    .unwrap();
    let orchestrator = BindingOrchestrator::new(
        BindingContext::new("svc-a")
            .with_handler(ClaimingHandler::new("all", &["orders", "payments"])),
        registry,
        InMemoryFactory::new(),
    );
    let mut bindings = ConsumerBindings::new();

    let report = orchestrator.run(&mut bindings).await.unwrap();

    assert!(bindings.contains_queue("payments"));
    assert!(!bindings.contains_queue("orders"));
    match report.outcome("orders") {
        Some(DeclarationOutcome::Failed(BindingError::Configuration(error))) => assert_eq!(
            error,
            &ConfigurationError::NonPositivePrefetchCount {
                queue_name: "orders".into()
            }
        ),
        other => panic!("Unexpected outcome: {other:?}"),
    }

    bindings.shutdown_all().await.unwrap();
}

#[tokio::test]
async fn startup_fails_when_the_broker_is_unreachable() {
    let orchestrator = BindingOrchestrator::new(
        BindingContext::new("svc-a").with_handler(ClaimingHandler::new("orders", &["orders"])),
        orders_registry(),
        InMemoryFactory::broker_down(),
    );
    let mut bindings = ConsumerBindings::new();

    let error = orchestrator.run(&mut bindings).await.unwrap_err();

    let StartupError::BrokerUnreachable { failed_queues } = error;
    assert_eq!(failed_queues, vec!["orders".to_owned()]);
    assert!(bindings.is_empty());
}

#[tokio::test]
async fn unreachable_queues_do_not_prevent_the_others_from_binding() {
    let registry = QueueRegistry::new(vec![
        QueueDeclaration::new("orders", "svc-a"),
        QueueDeclaration::new("payments", "svc-a"),
    ])
    .unwrap();
    let orchestrator = BindingOrchestrator::new(
        BindingContext::new("svc-a")
            .with_handler(ClaimingHandler::new("all", &["orders", "payments"])),
        registry,
        InMemoryFactory::unreachable_for(&["orders"]),
    );
    let mut bindings = ConsumerBindings::new();

    let report = orchestrator.run(&mut bindings).await.unwrap();

    assert_eq!(report.bound(), vec!["paymentsContainer"]);
    let failures: Vec<_> = report.failures().collect();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].0, "orders");
    assert!(failures[0].1.is_connection_error());

    bindings.shutdown_all().await.unwrap();
}

#[tokio::test]
async fn stopping_a_binding_removes_it_and_allows_rebinding() {
    let factory = InMemoryFactory::new();
    let orchestrator = BindingOrchestrator::new(
        BindingContext::new("svc-a").with_handler(ClaimingHandler::new("orders", &["orders"])),
        orders_registry(),
        Arc::clone(&factory),
    );
    let mut bindings = ConsumerBindings::new();
    orchestrator.run(&mut bindings).await.unwrap();

    assert!(bindings.stop("ordersContainer").await.unwrap());
    assert!(!bindings.stop("ordersContainer").await.unwrap());
    assert!(bindings.is_empty());

    let report = orchestrator.run(&mut bindings).await.unwrap();

    assert_eq!(report.bound(), vec!["ordersContainer"]);
    assert_eq!(factory.started().len(), 2);

    bindings.shutdown_all().await.unwrap();
    assert!(bindings.is_empty());
}

#[tokio::test]
async fn exited_consumers_are_started_again_on_the_next_run() {
    let factory = InMemoryFactory::with_exiting_consumers();
    let orchestrator = BindingOrchestrator::new(
        BindingContext::new("svc-a").with_handler(ClaimingHandler::new("orders", &["orders"])),
        orders_registry(),
        Arc::clone(&factory),
    );
    let mut bindings = ConsumerBindings::new();
    orchestrator.run(&mut bindings).await.unwrap();
    wait_for_exit(bindings.get("ordersContainer").unwrap()).await;
    assert_eq!(bindings.running().count(), 0);

    let second = orchestrator.run(&mut bindings).await.unwrap();

    assert!(matches!(
        second.outcome("orders"),
        Some(DeclarationOutcome::Bound { container_name }) if container_name == "ordersContainer"
    ));
    assert_eq!(bindings.len(), 1);
    assert_eq!(factory.started().len(), 2);

    bindings.shutdown_all().await.ok();
}

#[tokio::test]
async fn exited_consumers_do_not_count_as_live_when_the_broker_goes_away() {
    let factory = InMemoryFactory::with_exiting_consumers();
    let orchestrator = BindingOrchestrator::new(
        BindingContext::new("svc-a").with_handler(ClaimingHandler::new("orders", &["orders"])),
        orders_registry(),
        Arc::clone(&factory),
    );
    let mut bindings = ConsumerBindings::new();
    orchestrator.run(&mut bindings).await.unwrap();
    wait_for_exit(bindings.get("ordersContainer").unwrap()).await;

    factory.set_broker_down(true);
    let error = orchestrator.run(&mut bindings).await.unwrap_err();

    let StartupError::BrokerUnreachable { failed_queues } = error;
    assert_eq!(failed_queues, vec!["orders".to_owned()]);
    assert!(bindings.is_empty());
}
