//! End-to-end pipeline scenarios
//!
//! Copyright (c) 2026 Canopy Team
//! Licensed under the MIT OR Apache-2.0 license

use canopy_core::{
    CheckerInstancing, Error, Format, Pipeline, PoolConfig, Transform, ValidationPolicy,
};
use canopy_schemas::{descriptor_from_json, Node, NodeDescriptor, ScalarType, SchemaDescriptor, Severity};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

fn order_descriptor() -> SchemaDescriptor {
    SchemaDescriptor::new(
        NodeDescriptor::object(
            "Order",
            vec![
                NodeDescriptor::scalar("OrderId", ScalarType::String).required(),
                NodeDescriptor::scalar("Total", ScalarType::Number),
                NodeDescriptor::object(
                    "Customer",
                    vec![
                        NodeDescriptor::scalar("Name", ScalarType::String),
                        NodeDescriptor::scalar("Email", ScalarType::String).required(),
                    ],
                ),
                NodeDescriptor::array(
                    "Items",
                    NodeDescriptor::scalar("Item", ScalarType::Number),
                ),
            ],
        )
        .with_attribute("currency", ScalarType::String),
    )
}

#[test]
fn strict_pipeline_rejects_order_missing_required_email() {
    let pipeline = Pipeline::builder(Format::Json)
        .descriptor(order_descriptor())
        .policy(ValidationPolicy::Strict)
        .build()
        .unwrap();

    let payload = r#"{"OrderId": "A-1", "Customer": {"Name": "Ada"}}"#;
    let err = pipeline.process(payload).unwrap_err();
    match err {
        Error::ValidationAborted { diagnostics, .. } => {
            let errors: Vec<_> = diagnostics
                .iter()
                .filter(|d| d.severity == Severity::Error)
                .collect();
            assert_eq!(errors.len(), 1);
            assert_eq!(errors[0].path, "Order.Customer.Email");
        }
        other => panic!("expected ValidationAborted, got {:?}", other),
    }
    // Aborted messages never touch the pool.
    let stats = pipeline.pool().unwrap().stats();
    assert_eq!(stats.reused + stats.allocated, 0);
}

#[test]
fn lenient_pipeline_emits_empty_email_for_the_same_payload() {
    let pipeline = Pipeline::builder(Format::Xml)
        .descriptor(order_descriptor())
        .policy(ValidationPolicy::WarnAndContinue)
        .build()
        .unwrap();

    let payload = concat!(
        "<Order>",
        "<OrderId>A-1</OrderId>",
        "<Customer><Name>Ada</Name></Customer>",
        "</Order>"
    );
    let report = pipeline.process(payload).unwrap();
    assert_eq!(report.diagnostics.len(), 1);
    assert_eq!(report.diagnostics[0].path, "Order.Customer.Email");
    // The missing node stays at its default: an empty string element.
    assert!(report.output.contains("<Email/>"));
    assert!(report
        .fill
        .missing()
        .contains(&"Order.Customer.Email".to_string()));
    assert_eq!(report.metadata.policy, "WarnAndContinue");
}

#[test]
fn generic_pipeline_passes_unknown_json_through() {
    let pipeline = Pipeline::builder(Format::Json).build().unwrap();
    assert!(pipeline.pool().is_none());

    let report = pipeline
        .process(r#"{"whatever": {"nested": ["x", "y"]}}"#)
        .unwrap();
    assert!(report.fill.is_complete());
    assert!(report.diagnostics.is_empty());
    assert_eq!(report.output, r#"{"whatever":{"nested":["x","y"]}}"#);
    assert_eq!(report.metadata.format, "json");
}

#[test]
fn three_concurrent_messages_share_a_pool_of_two() {
    let gate = Arc::new(Barrier::new(3));
    let hold = {
        let gate = Arc::clone(&gate);
        move |tree: &Node| -> anyhow::Result<Node> {
            // Park all three messages mid-transform so their instances are
            // held simultaneously.
            gate.wait();
            Ok(tree.clone())
        }
    };
    let pipeline = Arc::new(
        Pipeline::builder(Format::Json)
            .descriptor(order_descriptor())
            .pool(PoolConfig {
                max_size: 2,
                prewarm: 2,
            })
            .transform(Arc::new(hold) as Arc<dyn Transform>)
            .build()
            .unwrap(),
    );

    let handles: Vec<_> = (0..3)
        .map(|i| {
            let pipeline = Arc::clone(&pipeline);
            thread::spawn(move || {
                let payload = format!(
                    r#"{{"OrderId": "A-{}", "Customer": {{"Email": "a@example.com"}}}}"#,
                    i
                );
                pipeline.process(&payload).unwrap()
            })
        })
        .collect();
    for handle in handles {
        let report = handle.join().unwrap();
        assert!(!report.output.is_empty());
    }

    let pool = pipeline.pool().unwrap();
    let stats = pool.stats();
    // Two reuses, one fresh allocation, one release discarded at capacity.
    assert_eq!(stats.reused + stats.allocated, 3);
    assert!(stats.allocated >= 1);
    assert_eq!(stats.discarded, 1);
    assert_eq!(pool.resident(), 2);
}

#[test]
fn transform_fault_kills_the_message_but_releases_the_instance() {
    let pipeline = Pipeline::builder(Format::Json)
        .descriptor(order_descriptor())
        .policy(ValidationPolicy::WarnAndContinue)
        .pool(PoolConfig {
            max_size: 2,
            prewarm: 1,
        })
        .transform(Arc::new(|_: &Node| -> anyhow::Result<Node> {
            Err(anyhow::anyhow!("enrichment backend unavailable"))
        }) as Arc<dyn Transform>)
        .build()
        .unwrap();

    // Invalid payload so the fault carries the message's diagnostics.
    let err = pipeline.process(r#"{"Total": 5}"#).unwrap_err();
    match &err {
        Error::TransformFault { message, .. } => {
            assert!(message.contains("enrichment backend unavailable"));
        }
        other => panic!("expected TransformFault, got {:?}", other),
    }
    assert!(!err.diagnostics().is_empty());

    // The instance went back despite the fault.
    let pool = pipeline.pool().unwrap();
    assert_eq!(pool.resident(), 1);
    assert_eq!(pool.stats().reused, 1);
}

#[test]
fn deadline_expiry_mid_message_still_releases_the_instance() {
    let pipeline = Pipeline::builder(Format::Json)
        .descriptor(order_descriptor())
        .deadline(Duration::from_millis(40))
        .pool(PoolConfig {
            max_size: 2,
            prewarm: 1,
        })
        .transform(Arc::new(|tree: &Node| -> anyhow::Result<Node> {
            thread::sleep(Duration::from_millis(80));
            Ok(tree.clone())
        }) as Arc<dyn Transform>)
        .build()
        .unwrap();

    let payload = r#"{"OrderId": "A-1", "Customer": {"Email": "a@example.com"}}"#;
    let err = pipeline.process(payload).unwrap_err();
    assert!(matches!(err, Error::DeadlineExceeded { .. }));

    let pool = pipeline.pool().unwrap();
    assert_eq!(pool.resident(), 1);
    assert_eq!(pool.stats().reused, 1);
}

#[test]
fn no_data_bleeds_between_sequential_messages() {
    let pipeline = Pipeline::builder(Format::Json)
        .descriptor(order_descriptor())
        .pool(PoolConfig {
            max_size: 1,
            prewarm: 1,
        })
        .build()
        .unwrap();

    let first = pipeline
        .process(
            r#"{"OrderId": "FIRST", "Total": 99.5,
                "Customer": {"Name": "Ada", "Email": "ada@example.com"},
                "Items": [1, 2, 3]}"#,
        )
        .unwrap();
    assert!(first.output.contains("FIRST"));

    // The second message omits almost everything; nothing from the first
    // may survive in its output.
    let second = pipeline
        .process(r#"{"OrderId": "SECOND", "Customer": {"Email": "b@example.com"}}"#)
        .unwrap();
    assert!(!second.output.contains("FIRST"));
    assert!(!second.output.contains("ada@example.com"));
    assert!(second.output.contains(r#""Total":0"#));
    assert!(second.output.contains(r#""Items":[]"#));
    assert_eq!(pipeline.pool().unwrap().stats().reused, 2);
}

#[test]
fn warn_and_continue_emits_best_effort_output_with_diagnostics() {
    let pipeline = Pipeline::builder(Format::Json)
        .descriptor(order_descriptor())
        .policy(ValidationPolicy::WarnAndContinue)
        .build()
        .unwrap();

    let report = pipeline
        .process(r#"{"Total": 12.5, "Rogue": true}"#)
        .unwrap();
    // Missing required OrderId surfaced, fill proceeded with defaults.
    assert!(report
        .diagnostics
        .iter()
        .any(|d| d.path == "Order.OrderId" && d.severity == Severity::Error));
    assert!(!report.fill.is_complete());
    assert!(report.fill.extra().contains(&"Order.Rogue".to_string()));
    assert!(report.output.contains(r#""OrderId":"""#));
    assert!(report.output.contains(r#""Total":12.5"#));
}

#[test]
fn xml_order_round_trips_through_the_schema() {
    let pipeline = Pipeline::builder(Format::Xml)
        .descriptor(order_descriptor())
        .checker_instancing(CheckerInstancing::Serialized)
        .build()
        .unwrap();

    let payload = concat!(
        r#"<Order currency="EUR">"#,
        "<OrderId>A-1</OrderId>",
        "<Total>41.5</Total>",
        "<Customer><Name>Ada</Name><Email>ada@example.com</Email></Customer>",
        "<Items><Item>3</Item><Item>5</Item></Items>",
        "</Order>"
    );
    let report = pipeline.process(payload).unwrap();
    assert!(report.fill.is_complete());
    assert!(report.output.contains(r#"<Order currency="EUR">"#));
    assert!(report.output.contains("<Total>41.5</Total>"));
    assert!(report.output.contains("<Item>3</Item><Item>5</Item>"));
}

#[test]
fn csv_rows_fill_a_tabular_schema() {
    let descriptor = SchemaDescriptor::new(NodeDescriptor::array(
        "Rows",
        NodeDescriptor::object(
            "Row",
            vec![
                NodeDescriptor::scalar("sku", ScalarType::String).required(),
                NodeDescriptor::scalar("qty", ScalarType::Number),
            ],
        ),
    ));
    let pipeline = Pipeline::builder(Format::Csv)
        .descriptor(descriptor)
        .build()
        .unwrap();

    let report = pipeline.process("sku,qty\nwidget,3\ngadget,5\n").unwrap();
    assert!(report.fill.is_complete());
    assert_eq!(report.output, "sku,qty\nwidget,3\ngadget,5\n");
}

#[test]
fn pipeline_accepts_a_schema_loaded_from_json() {
    let schema = r#"{
        "root": {
            "name": "Ping",
            "kind": "object",
            "children": [
                {"name": "Seq", "kind": "scalar", "type": "number", "required": true}
            ]
        }
    }"#;
    let pipeline = Pipeline::builder(Format::Json)
        .descriptor(descriptor_from_json(schema).unwrap())
        .policy(ValidationPolicy::Strict)
        .build()
        .unwrap();

    assert!(pipeline.process(r#"{"Seq": 7}"#).is_ok());
    assert!(pipeline.process(r#"{}"#).is_err());
}

#[test]
fn shared_pipeline_survives_mixed_concurrent_traffic() {
    let processed = Arc::new(AtomicU64::new(0));
    let pipeline = Arc::new(
        Pipeline::builder(Format::Json)
            .descriptor(order_descriptor())
            .policy(ValidationPolicy::WarnAndContinue)
            .pool(PoolConfig {
                max_size: 4,
                prewarm: 2,
            })
            .build()
            .unwrap(),
    );

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let pipeline = Arc::clone(&pipeline);
            let processed = Arc::clone(&processed);
            thread::spawn(move || {
                for j in 0..25 {
                    let payload = if j % 3 == 0 {
                        // Invalid but processable under the lenient policy.
                        r#"{"Total": 1}"#.to_string()
                    } else {
                        format!(
                            r#"{{"OrderId": "T{}-{}", "Customer": {{"Email": "t@example.com"}}}}"#,
                            i, j
                        )
                    };
                    pipeline.process(&payload).unwrap();
                    processed.fetch_add(1, Ordering::Relaxed);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(processed.load(Ordering::Relaxed), 8 * 25);
    let pool = pipeline.pool().unwrap();
    assert!(pool.resident() <= 4);
    let stats = pool.stats();
    assert_eq!(stats.reused + stats.allocated, 8 * 25);
}
