//! Runs against a real server on 127.0.0.1:6379. Ignored by default, run them with
//! `cargo test -- --ignored` while a server is up.

use bytes::Bytes;
use serial_test::serial;

use rustdis_client::{Client, Command, Error, Frame};

fn connect() -> Client {
    let mut client = Client::open("127.0.0.1:6379");
    client.connect().unwrap();

    // Since we use the same Redis instance for all tests, we flush it to start fresh.
    let reply = client.execute(Command::new("FLUSHDB")).unwrap();
    assert!(reply.is_ok());

    client
}

#[test]
#[ignore = "requires a Redis server on 127.0.0.1:6379"]
#[serial]
fn test_set_and_get() {
    let mut client = connect();

    let set = client
        .execute(Command::new("SET").arg("set_get_key_1").arg(1))
        .unwrap();
    assert_eq!(set, Frame::Simple("OK".to_string()));

    let binary = Bytes::from_static(b"Hello,\r\nWorld!\x00");
    client
        .execute(Command::new("SET").arg("set_get_key_2").arg(binary.clone()))
        .unwrap();

    let get = client.execute(Command::new("GET").arg("set_get_key_1"));
    assert_eq!(get.unwrap(), Frame::Bulk(Bytes::from("1")));

    let get = client.execute(Command::new("GET").arg("set_get_key_2"));
    assert_eq!(get.unwrap(), Frame::Bulk(binary));

    let get = client.execute(Command::new("GET").arg("set_get_nonexistentkey"));
    assert_eq!(get.unwrap(), Frame::NullBulk);
}

#[test]
#[ignore = "requires a Redis server on 127.0.0.1:6379"]
#[serial]
fn test_wrong_type() {
    let mut client = connect();

    client
        .execute(Command::new("SET").arg("wrong_type_key").arg("a"))
        .unwrap();

    let err = client
        .execute(Command::new("LPUSH").arg("wrong_type_key").arg("b"))
        .unwrap_err();

    assert!(matches!(err, Error::Server(ref msg) if msg.starts_with("WRONGTYPE")));
}

#[test]
#[ignore = "requires a Redis server on 127.0.0.1:6379"]
#[serial]
fn test_multi_exec() {
    let mut client = connect();

    client
        .enqueue(Command::new("SET").arg("tx_counter").arg(10))
        .unwrap();
    client.enqueue(Command::new("INCRBY").arg("tx_counter").arg(5)).unwrap();
    client
        .enqueue(Command::new("HSET").arg("tx_hash").arg("field").arg("value").arg("other").arg(2))
        .unwrap();

    let replies = client.execute_transaction().unwrap();

    assert_eq!(
        replies,
        vec![
            Frame::Simple("OK".to_string()),
            Frame::Simple("QUEUED".to_string()),
            Frame::Simple("QUEUED".to_string()),
            Frame::Simple("QUEUED".to_string()),
            Frame::Array(vec![
                Frame::Simple("OK".to_string()),
                Frame::Integer(15),
                Frame::Integer(2),
            ]),
        ]
    );
}

#[test]
#[ignore = "requires a Redis server on 127.0.0.1:6379"]
#[serial]
fn test_multi_exec_with_runtime_error() {
    let mut client = connect();

    client
        .enqueue(Command::new("SET").arg("tx_string").arg("a"))
        .unwrap();
    client
        .enqueue(Command::new("INCR").arg("tx_string"))
        .unwrap();

    let replies = client.execute_transaction().unwrap();

    match replies.last() {
        Some(Frame::Array(results)) => {
            assert_eq!(results[0], Frame::Simple("OK".to_string()));
            assert!(matches!(results[1], Frame::Error(ref msg) if msg.starts_with("ERR")));
        }
        reply => panic!("unexpected EXEC reply: {:?}", reply),
    }
}

#[test]
#[ignore = "requires a Redis server on 127.0.0.1:6379"]
#[serial]
fn test_nested_and_null_replies() {
    let mut client = connect();

    client
        .execute(Command::new("RPUSH").arg("nested_list").arg("a").arg("b"))
        .unwrap();

    let range = client.execute(Command::new("LRANGE").arg("nested_list").arg(0).arg(-1));
    assert_eq!(
        range.unwrap(),
        Frame::Array(vec![Frame::Bulk(Bytes::from("a")), Frame::Bulk(Bytes::from("b"))])
    );

    let empty = client.execute(Command::new("LRANGE").arg("missing_list").arg(0).arg(-1));
    assert_eq!(empty.unwrap(), Frame::Array(vec![]));

    let timeout = client.execute(Command::new("BLPOP").arg("missing_list").arg("0.01"));
    assert_eq!(timeout.unwrap(), Frame::NullArray);
}
