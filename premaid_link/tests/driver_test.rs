use std::time::Duration;

use premaid_link::packets::hex::from_hex;
use premaid_link::{BurstState, Command, DriverConfig, FrameParser, JointMask, JointSet, ParserConfig, PremaidDriver, ServoId};
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio::time::timeout;

fn test_config() -> DriverConfig {
    DriverConfig {
        cycle_period_ms: 5,
        ..DriverConfig::default()
    }
}

fn command_parser() -> FrameParser {
    FrameParser::new(ParserConfig {
        max_buffered: 512,
        skip_separator: false,
    })
}

async fn read_frames(robot: &mut DuplexStream, parser: &mut FrameParser, count: usize) -> Vec<Vec<u8>> {
    let mut frames = Vec::new();
    let mut buf = [0u8; 512];
    while frames.len() < count {
        let n = timeout(Duration::from_secs(2), robot.read(&mut buf))
            .await
            .expect("timed out waiting for frames")
            .expect("read failed");
        assert!(n > 0, "driver closed the stream early");
        frames.extend(parser.push(&buf[..n]).into_iter().map(|f| f.bytes));
    }
    frames
}

async fn wait_for_state(driver: &PremaidDriver, state: BurstState) {
    timeout(Duration::from_secs(2), async {
        while driver.burst_state() != state {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    })
    .await
    .expect("burst state never changed");
}

#[tokio::test]
async fn test_pose_is_written_as_built() {
    let (client, mut robot) = tokio::io::duplex(4096);
    let driver = PremaidDriver::attach(client, test_config());
    let mut parser = command_parser();

    let mut joints = JointSet::premaid();
    joints.set_value(ServoId::HeadYaw, 10.0);
    joints.set_value(ServoId::HeadPitch, -5.0);
    assert!(driver.apply_pose(&joints, JointMask::HEAD, 40));

    let frames = read_frames(&mut robot, &mut parser, 1).await;
    let expected = Command::pose_from_joints(&joints, JointMask::HEAD, 40).build().unwrap();
    assert_eq!(frames[0], expected);
    assert_eq!(frames[0][0], 0x0E);
    driver.close_and_wait().await;
}

#[tokio::test]
async fn test_frames_keep_enqueue_order() {
    let (client, mut robot) = tokio::io::duplex(4096);
    let driver = PremaidDriver::attach(client, test_config());
    let mut parser = command_parser();

    assert!(driver.request_battery());
    assert!(driver.request_flash_dump(2));
    assert!(driver.set_stretch(JointMask::ARMS, 30, None));

    let frames = read_frames(&mut robot, &mut parser, 3).await;
    assert_eq!(frames[0], Command::BatteryRequest.build().unwrap());
    assert_eq!(frames[1], Command::FlashDump { page: 2 }.build().unwrap());
    assert_eq!(frames[2], Command::stretch(JointMask::ARMS, 30, None).build().unwrap());
    driver.close_and_wait().await;
}

#[tokio::test]
async fn test_close_sends_one_relax_frame() {
    let (client, mut robot) = tokio::io::duplex(4096);
    let driver = PremaidDriver::attach(client, test_config());

    driver.close();
    driver.close();
    driver.close_and_wait().await;
    assert!(!driver.request_battery());
    assert!(!driver.is_connected());

    let mut written = Vec::new();
    timeout(Duration::from_secs(2), robot.read_to_end(&mut written))
        .await
        .expect("stream was not shut down")
        .unwrap();
    assert_eq!(written, Command::RelaxAll.build().unwrap());
}

#[tokio::test]
async fn test_burst_resends_last_pose_until_recovered() {
    let (client, mut robot) = tokio::io::duplex(64 * 1024);
    let driver = PremaidDriver::attach(client, test_config());
    let mut parser = command_parser();

    let joints = JointSet::premaid();
    assert!(driver.apply_pose_all(&joints, 20));
    let pose = read_frames(&mut robot, &mut parser, 1).await.remove(0);

    robot.write_all(&from_hex("04 18 08 14 00").unwrap()).await.unwrap();
    wait_for_state(&driver, BurstState::Bursting).await;

    let resent = read_frames(&mut robot, &mut parser, 3).await;
    assert!(resent.iter().all(|f| *f == pose));

    robot.write_all(&from_hex("04 18 00 1C 00").unwrap()).await.unwrap();
    wait_for_state(&driver, BurstState::Normal).await;
    driver.close_and_wait().await;
}

#[tokio::test]
async fn test_replies_are_reassembled_and_broadcast() {
    let (client, mut robot) = tokio::io::duplex(4096);
    let driver = PremaidDriver::attach(client, test_config());
    let mut replies = driver.subscribe_replies();

    for byte in from_hex("06 01 00 34 12 21 00").unwrap() {
        robot.write_all(&[byte]).await.unwrap();
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    let frame = timeout(Duration::from_secs(2), replies.recv()).await.unwrap().unwrap();
    assert_eq!(frame.bytes, vec![0x06, 0x01, 0x00, 0x34, 0x12, 0x21]);
    assert_eq!(frame.reply().battery_raw(), Some(0x1234));
    driver.close_and_wait().await;
}

#[tokio::test]
async fn test_corrupt_replies_do_not_reach_subscribers() {
    let (client, mut robot) = tokio::io::duplex(4096);
    let driver = PremaidDriver::attach(client, test_config());
    let mut replies = driver.subscribe_replies();

    // bad checksum, then a drop indicator
    robot.write_all(&from_hex("04 18 08 15 00 04 18 08 14 00").unwrap()).await.unwrap();
    let frame = timeout(Duration::from_secs(2), replies.recv()).await.unwrap().unwrap();
    assert_eq!(frame.bytes, vec![0x04, 0x18, 0x08, 0x14]);
    wait_for_state(&driver, BurstState::Bursting).await;
    driver.close_and_wait().await;
}

#[tokio::test]
async fn test_connect_failure_is_reported() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let config = DriverConfig {
        port: port as u32,
        connect_retries: 1,
        ..DriverConfig::default()
    };
    assert!(PremaidDriver::connect(config).await.is_err());
}
