use crate::error::FrameError;
use crate::library::message::LibraryMessage;
use crate::library::message::LogonStatus;
use crate::library::message::SessionReplyStatus;

fn round_trip(message: LibraryMessage) {
    let mut frame = Vec::new();
    message.encode(&mut frame).expect("encode");
    assert_eq!(message, LibraryMessage::decode(&frame).expect("decode"));
}

#[test]
fn test_round_trip_all_variants() {
    round_trip(LibraryMessage::LibraryConnect {
        library_id: 7,
        correlation_id: 100,
        unique_value: -42,
    });
    round_trip(LibraryMessage::InitiateConnection {
        library_id: 7,
        correlation_id: 101,
        port: 9880,
        host: "fix.example.com".to_string(),
        sender_comp_id: "SENDER".to_string(),
        target_comp_id: "TARGET".to_string(),
    });
    round_trip(LibraryMessage::ReleaseSession {
        library_id: 7,
        correlation_id: 102,
        connection_id: 5,
    });
    round_trip(LibraryMessage::RequestSession {
        library_id: 7,
        correlation_id: 103,
        session_id: 11,
        last_received_sequence_number: 42,
    });
    round_trip(LibraryMessage::ManageConnection {
        library_id: 7,
        correlation_id: 104,
        connection_id: 5,
        session_id: 11,
    });
    round_trip(LibraryMessage::Logon {
        library_id: 7,
        connection_id: 5,
        session_id: 11,
        status: LogonStatus::LibraryNotification,
        sender_comp_id: "SENDER".to_string(),
        target_comp_id: "TARGET".to_string(),
    });
    round_trip(LibraryMessage::Disconnect {
        library_id: 7,
        connection_id: 5,
        reason: 2,
    });
    round_trip(LibraryMessage::Error {
        library_id: 7,
        correlation_id: 105,
        code: 1,
        message: "no route".to_string(),
    });
    round_trip(LibraryMessage::ApplicationHeartbeat { library_id: 7 });
    round_trip(LibraryMessage::RequestSessionReply {
        correlation_id: 106,
        status: SessionReplyStatus::UnknownSession,
    });
    round_trip(LibraryMessage::ReleaseSessionReply {
        correlation_id: 107,
        status: SessionReplyStatus::Ok,
    });
    round_trip(LibraryMessage::Catchup {
        library_id: 7,
        connection_id: 5,
        message_count: 12,
    });
    round_trip(LibraryMessage::NewSentPosition {
        library_id: 7,
        position: 4096,
    });
    round_trip(LibraryMessage::NotLeader {
        library_id: 7,
        channel: "aeron:udp?endpoint=engine-b".to_string(),
    });
    round_trip(LibraryMessage::NotLeader {
        library_id: 7,
        channel: String::new(),
    });
}

#[test]
fn test_decode_rejects_malformed() {
    tracing::info!("--- unknown type");
    assert_eq!(
        Err(FrameError::UnknownType { type_tag: 0x7f }),
        LibraryMessage::decode(&[0x7f, 1, 0, 0])
    );

    tracing::info!("--- truncated fixed fields");
    assert_eq!(
        Err(FrameError::Truncated { at: 4, needed: 2 }),
        LibraryMessage::decode(&[0x09, 1, 0, 0, 7, 0])
    );

    tracing::info!("--- string length runs past the frame");
    let mut frame = Vec::new();
    LibraryMessage::NotLeader {
        library_id: 7,
        channel: "chan".to_string(),
    }
    .encode(&mut frame)
    .expect("encode");
    let truncated = &frame[..frame.len() - 2];
    assert!(matches!(
        LibraryMessage::decode(truncated),
        Err(FrameError::Truncated { .. })
    ));

    tracing::info!("--- invalid utf-8 in a string field");
    let length = frame.len();
    frame[length - 1] = 0xff;
    frame[length - 2] = 0xfe;
    assert!(matches!(
        LibraryMessage::decode(&frame),
        Err(FrameError::BadString { .. })
    ));
}

#[test]
fn test_encode_rejects_string_longer_than_the_length_prefix() {
    let message = LibraryMessage::Error {
        library_id: 7,
        correlation_id: 1,
        code: 9,
        message: "x".repeat(70_000),
    };

    let mut frame = Vec::new();
    assert_eq!(
        Err(FrameError::StringTooLong { length: 70_000 }),
        message.encode(&mut frame)
    );
}
