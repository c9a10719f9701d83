use crate::cluster::control::DataFrame;
use crate::cluster::ControlMessage;
use crate::error::FrameError;

fn round_trip(message: ControlMessage) -> ControlMessage {
    let mut frame = [0u8; ControlMessage::MAX_FRAME_LENGTH];
    let length = message.encode(&mut frame);
    ControlMessage::decode(&frame[..length]).expect("decode")
}

#[test]
fn test_round_trip_all_variants() {
    let messages = vec![
        ControlMessage::RequestVote {
            term: 3,
            candidate_id: 2,
            last_position: 1024,
        },
        ControlMessage::ReplyVote {
            term: 3,
            candidate_id: 2,
            voter_id: 1,
            granted: true,
        },
        ControlMessage::ConsensusHeartbeat {
            term: 7,
            leader_id: 1,
            session_id: 42,
            position: i64::MAX,
        },
        ControlMessage::MessageAcknowledgement {
            term: 7,
            follower_id: 3,
            position: 2048,
        },
        ControlMessage::Resend {
            term: 7,
            leader_id: 1,
            start_position: 512,
            length: 128,
        },
    ];

    for message in messages {
        assert_eq!(message, round_trip(message));
    }
}

#[test]
fn test_header_layout() {
    let message = ControlMessage::MessageAcknowledgement {
        term: 1,
        follower_id: 2,
        position: 3,
    };
    let mut frame = [0u8; ControlMessage::MAX_FRAME_LENGTH];
    let length = message.encode(&mut frame);

    assert_eq!(18, length);
    assert_eq!(0x04, frame[0]);
    assert_eq!(1, frame[1]);
    assert_eq!(&[0, 0], &frame[2..4]);
    // Little-endian term right after the header.
    assert_eq!(&[1, 0, 0, 0], &frame[4..8]);
}

#[test]
fn test_decode_rejects_malformed() {
    tracing::info!("--- unknown type tag");
    let frame = [0x09u8, 1, 0, 0, 0, 0, 0, 0];
    assert_eq!(
        Err(FrameError::UnknownType { type_tag: 0x09 }),
        ControlMessage::decode(&frame)
    );

    tracing::info!("--- wrong version");
    let frame = [0x01u8, 2, 0, 0];
    assert_eq!(
        Err(FrameError::UnsupportedVersion { version: 2 }),
        ControlMessage::decode(&frame)
    );

    tracing::info!("--- truncated body");
    let frame = [0x01u8, 1, 0, 0, 5, 0];
    assert_eq!(
        Err(FrameError::WrongLength {
            expected: 18,
            actual: 6
        }),
        ControlMessage::decode(&frame)
    );

    tracing::info!("--- shorter than a header");
    assert_eq!(
        Err(FrameError::WrongLength {
            expected: 4,
            actual: 2
        }),
        ControlMessage::decode(&[0x01, 1])
    );
}

#[test]
fn test_data_frame() {
    let mut frame = Vec::new();
    DataFrame::encode(900, b"8=FIX\x01", &mut frame);

    let (end_position, payload) = DataFrame::decode(&frame).expect("decode");
    assert_eq!(900, end_position);
    assert_eq!(b"8=FIX\x01", payload);

    assert_eq!(
        Err(FrameError::WrongLength {
            expected: 8,
            actual: 3
        }),
        DataFrame::decode(&[1, 2, 3]).map(|_| ())
    );
}
