// Scripted wave: both hands trace circles in front of the chest while the
// head follows the left hand.
// Run with: cargo run -p example -- [ADDR] [PORT]
// Make sure the simulator is running: cargo run -p sim

use std::time::Duration;

use premaid_ik::{RobotConfig, RobotModel, Vector3};
use premaid_link::{DriverConfig, JointMask, LinkError, PremaidDriver, Reply};
use tokio::time::{interval, sleep};

const TICK: Duration = Duration::from_millis(50);
const TICKS: u32 = 200;

fn driver_config() -> DriverConfig {
    let mut args = std::env::args().skip(1);
    let mut config = DriverConfig::default();
    if let Some(addr) = args.next() {
        config.addr = addr;
    }
    if let Some(port) = args.next().and_then(|p| p.parse().ok()) {
        config.port = port;
    }
    config
}

#[tokio::main]
async fn main() -> Result<(), LinkError> {
    tracing_subscriber::fmt::init();

    let config = driver_config();
    println!("Connecting to {}...", config.connection_url());
    let driver = match PremaidDriver::connect(config.clone()).await {
        Ok(driver) => driver,
        Err(e) => {
            println!("Failed to connect to {:?} : {}", config, e);
            return Err(e);
        }
    };

    let mut replies = driver.subscribe_replies();
    tokio::spawn(async move {
        while let Ok(frame) = replies.recv().await {
            match frame.reply() {
                reply @ Reply::ParameterRead { .. } => match reply.battery_raw() {
                    Some(raw) => println!("Battery: {:#06X}", raw),
                    None => println!("Short parameter reply: {}", frame.to_hex()),
                },
                reply if reply.is_drop() => println!("Pose dropped, resending"),
                reply if reply.is_recovery() => {}
                other => println!("Reply: {:?}", other),
            }
        }
    });

    let mut model = match RobotModel::new(RobotConfig::premaid()) {
        Ok(model) => model,
        Err(e) => return Err(LinkError::InvalidConfig(e.to_string())),
    };
    let neutral = model.neutral_targets();
    let mut targets = neutral;
    let dt = TICK.as_secs_f64();

    driver.set_stretch(JointMask::FULL_BODY, 60, None);
    driver.request_battery();

    let mut tick = interval(TICK);
    for count in 0..TICKS {
        tick.tick().await;
        let phase = count as f64 * 0.08;
        let offset = Vector3::new(0.0, 0.03 * phase.sin(), 0.06 + 0.03 * phase.cos());

        if let (Some(left), Some(start)) = (targets.left_hand.as_mut(), neutral.left_hand) {
            left.hand = start.hand + offset;
        }
        if let (Some(right), Some(start)) = (targets.right_hand.as_mut(), neutral.right_hand) {
            right.hand = start.hand + Vector3::new(0.0, -offset.y, offset.z);
        }
        if let (Some(head), Some(left)) = (targets.head.as_mut(), targets.left_hand) {
            head.look_at = left.hand;
        }

        model.tick_limited(&targets, dt);
        // ramp the servo speed up over the first ticks
        let speed = (count as i32 * 2).clamp(10, 40);
        if !driver.apply_pose(model.joints(), JointMask::UPPER_BODY, speed) {
            println!("Link closed");
            break;
        }
        if count % 50 == 49 {
            driver.request_battery();
        }
    }

    let pose = model.forward();
    println!(
        "Left hand ended at ({:.3}, {:.3}, {:.3})",
        pose.left_hand.tip.x, pose.left_hand.tip.y, pose.left_hand.tip.z
    );
    sleep(Duration::from_millis(200)).await;
    driver.close_and_wait().await;
    println!("Disconnected.");
    Ok(())
}
