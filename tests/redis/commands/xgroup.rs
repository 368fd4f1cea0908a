use bytes::Bytes;
use futures::{stream, StreamExt};
use redis_stream_adapter::{
    commands::{CommandError, GroupCommand, ReadCommand},
    stream::{Consumer, ReadOffset, ReadOptions, RecordId, StreamOffset},
};

use crate::test_utils::{TestEnv, TestUtils};

async fn add_orders(env: &TestEnv) -> Vec<RecordId> {
    env.add_ok(vec![
        TestUtils::add("orders", "1-1", "apple"),
        TestUtils::add("orders", "1-2", "pear"),
        TestUtils::add("orders", "1-3", "plum"),
    ])
    .await
}

async fn group_ok(env: &TestEnv, commands: Vec<GroupCommand>) -> Vec<String> {
    env.adapter
        .xgroup(stream::iter(commands))
        .map(|response| response.expect("group command failed").into_output())
        .collect()
        .await
}

fn group_read(consumer: &str, offset: ReadOffset) -> ReadCommand {
    ReadCommand::new([StreamOffset::create("orders", offset)])
        .read_options(ReadOptions::empty())
        .as_consumer(Consumer::new("billing", consumer))
}

#[tokio::test]
async fn test_group_read_delivers_each_record_once() {
    let env = TestEnv::new();
    add_orders(&env).await;

    let statuses = group_ok(
        &env,
        vec![GroupCommand::create_group(ReadOffset::after(RecordId::MIN))
            .at("orders")
            .group("billing")],
    )
    .await;
    assert_eq!(statuses, vec!["OK"]);

    let first = env
        .read(
            group_read("worker-1", ReadOffset::last_consumed())
                .read_options(ReadOptions::empty().count(2)),
        )
        .await
        .unwrap();
    let second = env
        .read(group_read("worker-2", ReadOffset::last_consumed()))
        .await
        .unwrap();
    let third = env
        .read(group_read("worker-1", ReadOffset::last_consumed()))
        .await
        .unwrap();

    assert_eq!(TestEnv::ids(&first), vec!["1-1", "1-2"]);
    assert_eq!(TestEnv::ids(&second), vec!["1-3"]);
    assert!(third.is_empty());

    let group = Bytes::from("billing");
    let key = Bytes::from("orders");
    assert_eq!(env.engine.pending_count(&key, &group).await, Some(3));

    let history = env
        .read(group_read("worker-1", ReadOffset::after(RecordId::MIN)))
        .await
        .unwrap();
    assert_eq!(TestEnv::ids(&history), vec!["1-1", "1-2"]);
}

#[tokio::test]
async fn test_group_created_at_latest_only_sees_new_records() {
    let env = TestEnv::new();
    add_orders(&env).await;

    group_ok(
        &env,
        vec![GroupCommand::create_group(ReadOffset::latest())
            .at("orders")
            .group("billing")],
    )
    .await;

    let before = env
        .read(group_read("worker-1", ReadOffset::last_consumed()))
        .await
        .unwrap();
    assert!(before.is_empty());

    env.add_ok(vec![TestUtils::add("orders", "2-0", "fig")]).await;

    let after = env
        .read(group_read("worker-1", ReadOffset::last_consumed()))
        .await
        .unwrap();
    assert_eq!(TestEnv::ids(&after), vec!["2-0"]);
}

#[tokio::test]
async fn test_group_read_without_ack() {
    let env = TestEnv::new();
    add_orders(&env).await;

    group_ok(
        &env,
        vec![GroupCommand::create_group(ReadOffset::after(RecordId::MIN))
            .at("orders")
            .group("billing")],
    )
    .await;

    let records = env
        .read(
            group_read("worker-1", ReadOffset::last_consumed())
                .read_options(ReadOptions::empty().no_ack()),
        )
        .await
        .unwrap();
    assert_eq!(records.len(), 3);

    assert_eq!(
        env.engine
            .pending_count(&Bytes::from("orders"), &Bytes::from("billing"))
            .await,
        Some(0)
    );
}

#[tokio::test]
async fn test_group_status_mapping() {
    let env = TestEnv::new();
    add_orders(&env).await;

    group_ok(
        &env,
        vec![GroupCommand::create_group(ReadOffset::after(RecordId::MIN))
            .at("orders")
            .group("billing")],
    )
    .await;
    env.read(group_read("worker-1", ReadOffset::last_consumed()))
        .await
        .unwrap();

    let statuses = group_ok(
        &env,
        vec![
            GroupCommand::delete_consumer(Consumer::new("billing", "worker-1")).at("orders"),
            GroupCommand::delete_consumer(Consumer::new("billing", "worker-1")).at("orders"),
            GroupCommand::destroy_group().at("orders").group("billing"),
            GroupCommand::destroy_group().at("orders").group("billing"),
        ],
    )
    .await;

    assert_eq!(statuses, vec!["OK", "Error", "OK", "Error"]);
    assert_eq!(
        env.engine
            .pending_count(&Bytes::from("orders"), &Bytes::from("billing"))
            .await,
        None
    );
}

#[tokio::test]
async fn test_delete_consumer_drops_its_pending_records() {
    let env = TestEnv::new();
    add_orders(&env).await;

    group_ok(
        &env,
        vec![GroupCommand::create_group(ReadOffset::after(RecordId::MIN))
            .at("orders")
            .group("billing")],
    )
    .await;
    env.read(
        group_read("worker-1", ReadOffset::last_consumed())
            .read_options(ReadOptions::empty().count(1)),
    )
    .await
    .unwrap();
    env.read(group_read("worker-2", ReadOffset::last_consumed()))
        .await
        .unwrap();

    group_ok(
        &env,
        vec![GroupCommand::delete_consumer(Consumer::new("billing", "worker-2")).at("orders")],
    )
    .await;

    assert_eq!(
        env.engine
            .pending_count(&Bytes::from("orders"), &Bytes::from("billing"))
            .await,
        Some(1)
    );
}

#[tokio::test]
async fn test_group_errors() {
    let env = TestEnv::new();
    add_orders(&env).await;

    let commands = vec![
        GroupCommand::create_group(ReadOffset::latest()).at("orders"),
        GroupCommand::create_group(ReadOffset::latest())
            .at("orders")
            .group("billing"),
        GroupCommand::create_group(ReadOffset::latest())
            .at("orders")
            .group("billing"),
        GroupCommand::destroy_group().at("orders").group("billing"),
    ];

    let responses = env
        .adapter
        .xgroup(stream::iter(commands))
        .collect::<Vec<_>>()
        .await;

    assert_eq!(responses.len(), 3);
    assert_eq!(
        responses[0].as_ref().unwrap_err().cause,
        CommandError::ContractViolation("GroupName must not be null")
    );
    assert_eq!(responses[1].as_ref().unwrap().output(), "OK");
    assert_eq!(
        responses[2].as_ref().unwrap_err().cause,
        CommandError::Server("BUSYGROUP Consumer Group name already exists".to_string())
    );
}

#[tokio::test]
async fn test_group_commands_on_missing_stream() {
    let env = TestEnv::new();

    let responses = env
        .adapter
        .xgroup(stream::iter([GroupCommand::create_group(ReadOffset::latest())
            .at("orders")
            .group("billing")]))
        .collect::<Vec<_>>()
        .await;

    match &responses[0] {
        Err(failure) => assert!(matches!(failure.cause, CommandError::Server(_))),
        Ok(_) => panic!("expected group creation on a missing stream to fail"),
    }

    let error = env
        .read(group_read("worker-1", ReadOffset::last_consumed()))
        .await
        .unwrap_err();
    assert_eq!(
        error,
        CommandError::Server(
            "NOGROUP No such key 'orders' or consumer group 'billing'".to_string()
        )
    );
}
