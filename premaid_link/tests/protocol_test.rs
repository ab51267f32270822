use premaid_link::packets::{build_pose, verify_checksum, xor_checksum};
use premaid_link::{Command, FrameParser, JointMask, JointSet, ParserConfig, ServoId, ServoValue};

#[test]
fn test_three_joint_scenario() {
    let servos = vec![
        ServoValue::from_angle(ServoId::HeadPitch, 10.0),
        ServoValue::from_angle(ServoId::HeadYaw, -5.0),
        ServoValue::from_angle(ServoId::HeadRoll, 0.0),
    ];
    let frame = build_pose(&servos, 40).unwrap();
    assert_eq!(frame.len(), 14);
    assert_eq!(frame[0], 0x0E);
    assert_eq!(frame[1..4], [0x18, 0x00, 40]);
    assert_eq!(frame[13], xor_checksum(&frame[..13]));
}

#[test]
fn test_every_frame_xors_to_zero() {
    let mut joints = JointSet::premaid();
    let mut commands = vec![
        Command::RelaxAll,
        Command::BatteryRequest,
        Command::FlashDump { page: 0x7F },
        Command::stretch(JointMask::FULL_BODY, 64, None),
        Command::servo_speed(JointMask::LEGS, 20, Some(-1)),
    ];
    for (i, id) in ServoId::ALL.into_iter().enumerate() {
        joints.set_value(id, i as f64 * 11.0 - 130.0);
        commands.push(Command::pose_from_joints(&joints, JointMask::FULL_BODY, i as i32 * 13));
        commands.push(Command::pose_from_joints(&joints, id.mask(), 255));
    }
    for command in commands {
        let frame = command.build().unwrap();
        assert!(verify_checksum(&frame), "{:?} does not xor to zero", command);
        assert_eq!(frame[0] as usize, frame.len());
    }
}

#[test]
fn test_masked_pose_length_follows_count() {
    let joints = JointSet::premaid();
    for mask in [JointMask::HEAD, JointMask::ARMS, JointMask::LEGS, JointMask::UPPER_BODY, JointMask::FULL_BODY] {
        let frame = Command::pose_from_joints(&joints, mask, 10).build().unwrap();
        assert_eq!(frame.len(), 3 * mask.count() + 5);
    }
}

#[test]
fn test_byte_at_a_time_matches_whole_frame() {
    let frame = Command::pose_from_joints(&JointSet::premaid(), JointMask::UPPER_BODY, 10).build().unwrap();
    let config = ParserConfig {
        max_buffered: 256,
        skip_separator: false,
    };

    let mut whole = FrameParser::new(config.clone());
    let expected = whole.push(&frame);
    assert_eq!(expected.len(), 1);

    let mut split = FrameParser::new(config);
    let mut got = Vec::new();
    for byte in &frame {
        got.extend(split.push(std::slice::from_ref(byte)));
    }
    assert_eq!(got, expected);
}

#[test]
fn test_merged_replies_with_separators() {
    let mut parser = FrameParser::new(ParserConfig::default());
    let stream = [
        0x04, 0x18, 0x00, 0x1C, 0x00, 0x04, 0x19, 0x00, 0x1D, 0x00, 0x04, 0x18, 0x08, 0x14, 0x00,
    ];
    let mut frames = Vec::new();
    for chunk in stream.chunks(4) {
        frames.extend(parser.push(chunk));
    }
    let opcodes: Vec<(u8, u8)> = frames.iter().map(|f| (f.bytes[1], f.bytes[2])).collect();
    assert_eq!(opcodes, vec![(0x18, 0x00), (0x19, 0x00), (0x18, 0x08)]);
    assert!(frames.iter().all(|f| f.checksum_ok));
}

#[test]
fn test_unresolvable_bytes_reset_the_buffer() {
    let mut parser = FrameParser::new(ParserConfig::default());
    let mut dispatched = 0;
    for _ in 0..10 {
        dispatched += parser.push(&[0xC8, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06]).len();
    }
    assert_eq!(dispatched, 0);
    assert!(parser.stats().resets >= 1);
    assert!(parser.buffered() <= 50);
}
