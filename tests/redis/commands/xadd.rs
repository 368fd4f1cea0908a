use std::sync::Arc;

use bytes::Bytes;
use futures::{stream, StreamExt};
use redis_stream_adapter::{
    adapter::StreamCommandAdapter,
    commands::{AddRecord, CommandError, KeyCommand, RangeCommand},
    stream::RecordId,
};

use crate::test_utils::{FaultyProvider, TestEnv, TestUtils, GARBLED_KEY};

#[tokio::test]
async fn test_xadd_with_generated_id_then_range() {
    let env = TestEnv::new();
    let body = TestUtils::body(&[("temperature", "21"), ("humidity", "40")]);

    let ids = env
        .add_ok(vec![AddRecord::of(body.clone()).to("sensor")])
        .await;
    assert_eq!(ids.len(), 1);
    assert!(ids[0].is_concrete());

    let records = env.range(RangeCommand::stream("sensor")).await.unwrap();

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].id(), ids[0]);
    assert_eq!(records[0].stream(), "sensor");
    assert_eq!(records[0].body(), &body);
}

#[tokio::test]
async fn test_xadd_responses_follow_input_order() {
    let env = TestEnv::new();

    let commands = (1..=20)
        .map(|i| TestUtils::add("fruits", &format!("1526919030474-{}", i), "mango"))
        .collect::<Vec<AddRecord>>();

    let responses = env
        .adapter
        .xadd(stream::iter(commands.clone()))
        .collect::<Vec<_>>()
        .await;

    assert_eq!(responses.len(), commands.len());

    for (response, command) in responses.into_iter().zip(commands) {
        let response = response.unwrap();
        assert_eq!(response.input(), &command);
        assert_eq!(*response.output(), command.id);
    }
}

#[tokio::test]
async fn test_xadd_partial_ids() {
    let env = TestEnv::new();

    let test_cases = vec![
        ("0-*", "0-1"),
        ("0-*", "0-2"),
        ("1-*", "1-0"),
        ("1-*", "1-1"),
        ("1526919030474-*", "1526919030474-0"),
    ];

    for (requested, expected_id) in test_cases {
        let ids = env
            .add_ok(vec![AddRecord::of(TestUtils::fruit("apple"))
                .to("fruits")
                .with_id(requested.parse::<RecordId>().unwrap())])
            .await;

        assert_eq!(ids[0].value(), expected_id, "adding with id {}", requested);
    }
}

#[tokio::test]
async fn test_xadd_contract_violations_are_isolated() {
    let env = TestEnv::new();

    let commands = vec![
        TestUtils::add("fruits", "1-1", "mango"),
        AddRecord::of(TestUtils::fruit("apple")),
        AddRecord {
            body: None,
            ..AddRecord::default().to("fruits")
        },
        TestUtils::add("fruits", "1-2", "pear"),
    ];

    let responses = env
        .adapter
        .xadd(stream::iter(commands.clone()))
        .collect::<Vec<_>>()
        .await;

    assert_eq!(responses.len(), 4);
    assert!(responses[0].is_ok());
    assert!(responses[3].is_ok());

    let expected_failures = vec![
        (1, CommandError::ContractViolation("Key must not be null")),
        (2, CommandError::ContractViolation("Body must not be null")),
    ];

    for (index, expected_error) in expected_failures {
        let failure = responses[index].as_ref().unwrap_err();
        assert_eq!(failure.cause, expected_error, "response {}", index);
        assert_eq!(failure.command, commands[index], "response {}", index);
    }

    assert_eq!(env.stats.total_calls(), 2);
}

#[tokio::test]
async fn test_xadd_engine_error_ends_the_response_stream() {
    let env = TestEnv::new();

    let commands = vec![
        TestUtils::add("fruits", "5-0", "mango"),
        TestUtils::add("fruits", "3-0", "apple"),
        TestUtils::add("fruits", "6-0", "pear"),
    ];

    let responses = env
        .adapter
        .xadd(stream::iter(commands))
        .collect::<Vec<_>>()
        .await;

    assert_eq!(responses.len(), 2);
    assert!(responses[0].is_ok());

    let failure = responses[1].as_ref().unwrap_err();
    assert_eq!(
        failure.cause,
        CommandError::Server(
            "ERR The ID specified in XADD is equal or smaller than the target stream top item"
                .to_string()
        )
    );
    assert!(failure.cause.is_transport_failure());

    let lengths = env
        .adapter
        .xlen(stream::iter([KeyCommand::new("fruits")]))
        .collect::<Vec<_>>()
        .await;
    assert_eq!(*lengths[0].as_ref().unwrap().output(), 1);
}

#[tokio::test]
async fn test_xadd_rejects_zero_id() {
    let env = TestEnv::new();

    let responses = env
        .adapter
        .xadd(stream::iter([TestUtils::add("fruits", "0-0", "mango")]))
        .collect::<Vec<_>>()
        .await;

    assert_eq!(
        responses[0].as_ref().unwrap_err().cause,
        CommandError::Server("ERR The ID specified in XADD must be greater than 0-0".to_string())
    );
}

#[tokio::test]
async fn test_xadd_unreadable_reply_ends_the_response_stream() {
    let env = TestEnv::new();
    let adapter = StreamCommandAdapter::new(
        Arc::new(FaultyProvider::new(env.provider.clone(), "broken")),
        TestUtils::config(),
    );

    let responses = adapter
        .xadd(stream::iter([
            AddRecord::of(TestUtils::fruit("mango")).to(GARBLED_KEY),
            AddRecord::of(TestUtils::fruit("apple")).to("fruits"),
        ]))
        .collect::<Vec<_>>()
        .await;

    assert_eq!(responses.len(), 1);

    let failure = responses[0].as_ref().unwrap_err();
    assert_eq!(
        failure.cause,
        CommandError::Server("ERR Unexpected XADD reply 'garbled'".to_string())
    );
    assert!(!failure.cause.is_contract_violation());

    assert_eq!(env.engine.xlen(&Bytes::from(GARBLED_KEY)).await, 1);
    assert_eq!(env.engine.xlen(&Bytes::from("fruits")).await, 0);
}
