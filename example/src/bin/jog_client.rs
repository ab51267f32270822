// Interactive jogging client for the PreMaid AI
// Run with: cargo run -p example --bin jog_client
// Make sure the simulator is running: cargo run -p sim

use std::error::Error;
use std::io::{self, Write};

use premaid_ik::{
    orientation_or_identity, PoseTargets, Quaternion, RobotConfig, RobotModel, TickReport,
    UnitQuaternion, Vector3,
};
use premaid_link::{DriverConfig, JointMask, PremaidDriver};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Limb {
    LeftHand,
    RightHand,
    LeftFoot,
    RightFoot,
}

impl std::fmt::Display for Limb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Limb::LeftHand => write!(f, "Left hand"),
            Limb::RightHand => write!(f, "Right hand"),
            Limb::LeftFoot => write!(f, "Left foot"),
            Limb::RightFoot => write!(f, "Right foot"),
        }
    }
}

#[derive(Debug, Clone)]
struct JogConfig {
    limb: Limb,
    step: f64,  // m
    speed: i32, // servo speed byte
}

impl Default for JogConfig {
    fn default() -> Self {
        Self {
            limb: Limb::LeftHand,
            step: 0.01,
            speed: 30,
        }
    }
}

fn prompt(text: &str) -> io::Result<String> {
    print!("{}", text);
    io::stdout().flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    tracing_subscriber::fmt::init();
    println!("=== PreMaid Interactive Jogging Client ===\n");

    let config = DriverConfig::default();
    println!("Connecting to robot at {}...", config.connection_url());
    let driver = PremaidDriver::connect(config).await?;

    let mut replies = driver.subscribe_replies();
    tokio::spawn(async move {
        while let Ok(frame) = replies.recv().await {
            match frame.reply() {
                reply if reply.is_recovery() => {}
                reply if reply.is_drop() => println!("Response: pose dropped, resending"),
                reply => match reply.battery_raw() {
                    Some(raw) => println!("Response: battery {:#06X}", raw),
                    None => println!("Response: {:?}", reply),
                },
            }
        }
    });

    let mut model = RobotModel::new(RobotConfig::premaid())?;
    let mut targets = model.neutral_targets();
    let mut jog = JogConfig::default();
    driver.set_stretch(JointMask::FULL_BODY, 60, None);
    println!("\nConnected!\n");

    loop {
        display_status(&jog, &targets);
        print_help();

        let input = prompt("\nCommand: ")?;
        let Some(cmd) = input.chars().next() else {
            continue;
        };

        match cmd {
            'q' => {
                println!("\nShutting down...");
                driver.close_and_wait().await;
                break;
            }
            '1' => jog.limb = Limb::LeftHand,
            '2' => jog.limb = Limb::RightHand,
            '3' => jog.limb = Limb::LeftFoot,
            '4' => jog.limb = Limb::RightFoot,
            'd' => match prompt("Enter step distance (m): ")?.parse::<f64>() {
                Ok(step) if step > 0.0 && step <= 0.05 => jog.step = step,
                _ => println!("Distance must be between 0 and 0.05 m"),
            },
            's' => match prompt("Enter servo speed (1-255): ")?.parse::<i32>() {
                Ok(speed) if (1..=255).contains(&speed) => jog.speed = speed,
                _ => println!("Speed must be between 1 and 255"),
            },
            'n' => {
                targets = model.neutral_targets();
                let report = model.tick(&targets);
                driver.apply_pose(model.joints(), model.enabled_mask(), jog.speed);
                print_report(&report);
            }
            'o' => {
                let parts: Vec<f64> = prompt("Enter orientation (w x y z): ")?
                    .split_whitespace()
                    .filter_map(|p| p.parse().ok())
                    .collect();
                let &[w, x, y, z] = parts.as_slice() else {
                    println!("Expected four numbers");
                    continue;
                };
                let (orientation, degenerate) =
                    orientation_or_identity(Quaternion::new(w, x, y, z));
                if degenerate {
                    println!("Zero quaternion, using identity");
                }
                if !set_orientation(&mut targets, jog.limb, orientation) {
                    println!("{} is not available", jog.limb);
                    continue;
                }
                let report = model.tick(&targets);
                driver.apply_pose(model.joints(), model.enabled_mask(), jog.speed);
                print_report(&report);
            }
            'r' => {
                driver.relax_all();
                println!("Relaxed all servos");
            }
            'x' => {
                driver.request_battery();
            }
            'p' => {
                let pose = model.forward();
                print_point("Left hand", pose.left_hand.tip);
                print_point("Right hand", pose.right_hand.tip);
                print_point("Left sole", pose.left_sole.tip);
                print_point("Right sole", pose.right_sole.tip);
            }
            'k' | 'j' | 'h' | 'l' | 'f' | 'b' => {
                if !move_target(&mut targets, jog.limb, direction(cmd) * jog.step) {
                    println!("{} is not available", jog.limb);
                    continue;
                }
                let report = model.tick(&targets);
                if !driver.apply_pose(model.joints(), model.enabled_mask(), jog.speed) {
                    println!("Link closed");
                    break;
                }
                println!("-> {} {}", jog.limb, direction_name(cmd));
                print_report(&report);
            }
            _ => println!("Unknown command: '{}'", cmd),
        }
    }

    println!("Disconnected.");
    Ok(())
}

fn move_target(targets: &mut PoseTargets, limb: Limb, delta: Vector3<f64>) -> bool {
    let point = match limb {
        Limb::LeftHand => targets.left_hand.as_mut().map(|t| &mut t.hand),
        Limb::RightHand => targets.right_hand.as_mut().map(|t| &mut t.hand),
        Limb::LeftFoot => targets.left_foot.as_mut().map(|t| &mut t.sole),
        Limb::RightFoot => targets.right_foot.as_mut().map(|t| &mut t.sole),
    };
    match point {
        Some(point) => {
            *point += delta;
            true
        }
        None => false,
    }
}

fn set_orientation(
    targets: &mut PoseTargets,
    limb: Limb,
    orientation: UnitQuaternion<f64>,
) -> bool {
    let slot = match limb {
        Limb::LeftHand => targets.left_hand.as_mut().map(|t| &mut t.orientation),
        Limb::RightHand => targets.right_hand.as_mut().map(|t| &mut t.orientation),
        Limb::LeftFoot => targets.left_foot.as_mut().map(|t| &mut t.orientation),
        Limb::RightFoot => targets.right_foot.as_mut().map(|t| &mut t.orientation),
    };
    match slot {
        Some(slot) => {
            *slot = Some(orientation);
            true
        }
        None => false,
    }
}

fn direction(key: char) -> Vector3<f64> {
    match key {
        'k' => Vector3::y(),
        'j' => -Vector3::y(),
        'h' => Vector3::x(),
        'l' => -Vector3::x(),
        'f' => Vector3::z(),
        'b' => -Vector3::z(),
        _ => Vector3::zeros(),
    }
}

fn direction_name(key: char) -> &'static str {
    match key {
        'k' => "Up (+Y)",
        'j' => "Down (-Y)",
        'h' => "Left (+X)",
        'l' => "Right (-X)",
        'f' => "Forward (+Z)",
        'b' => "Backward (-Z)",
        _ => "Unknown",
    }
}

fn print_point(name: &str, p: Vector3<f64>) {
    println!("{:>11}: ({:>7.3}, {:>7.3}, {:>7.3})", name, p.x, p.y, p.z);
}

fn print_report(report: &TickReport) {
    for (name, arm) in [("left arm", report.left_arm), ("right arm", report.right_arm)] {
        if let Some(arm) = arm {
            if arm.hyperextension > 0.0 || arm.folded {
                println!(
                    "   {} {:?}: hyperextension {:.2}, folded {}",
                    name, arm.strategy, arm.hyperextension, arm.folded
                );
            }
        }
    }
    for (name, leg) in [("left leg", report.left_leg), ("right leg", report.right_leg)] {
        if let Some(leg) = leg {
            if !leg.neutral {
                println!(
                    "   {}: yaw {:.1} roll {:.1} bend {:.1}",
                    name, leg.yaw, leg.roll, leg.bend
                );
            }
        }
    }
}

fn display_status(jog: &JogConfig, targets: &PoseTargets) {
    println!("\n+----------------------------------------+");
    println!("|          JOGGING CONFIGURATION         |");
    println!("+----------------------------------------+");
    println!("| Limb:           {:>12}           |", jog.limb.to_string());
    println!("| Step Distance:  {:>8.3} m             |", jog.step);
    println!("| Servo Speed:    {:>8}               |", jog.speed);
    println!("+----------------------------------------+");
    let target = match jog.limb {
        Limb::LeftHand => targets.left_hand.map(|t| t.hand),
        Limb::RightHand => targets.right_hand.map(|t| t.hand),
        Limb::LeftFoot => targets.left_foot.map(|t| t.sole),
        Limb::RightFoot => targets.right_foot.map(|t| t.sole),
    };
    if let Some(target) = target {
        print_point("Target", target);
    }
}

fn print_help() {
    println!("\n+-----------------------------------------+");
    println!("| MOTION CONTROLS:                        |");
    println!("|  k = Up    (+Y)    j = Down     (-Y)    |");
    println!("|  h = Left  (+X)    l = Right    (-X)    |");
    println!("|  f = Forward (+Z)  b = Backward (-Z)    |");
    println!("|  1-4 = Left/right hand, left/right foot |");
    println!("|  o = Set limb orientation               |");
    println!("|  n = Neutral pose  r = Relax all        |");
    println!("|                                         |");
    println!("| CONFIGURATION:                          |");
    println!("|  d = Set step distance                  |");
    println!("|  s = Set servo speed                    |");
    println!("|                                         |");
    println!("| OTHER:                                  |");
    println!("|  p = Print positions  x = Battery       |");
    println!("|  q = Quit                               |");
    println!("+-----------------------------------------+");
}
