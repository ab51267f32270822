use premaid_ik::rotation::rotation;
use premaid_ik::{ArmMode, ArmStrategy, HeadMode, RobotConfig, RobotModel, Vector3};
use premaid_link::{Axis, Command, JointMask, ServoId};

fn model() -> RobotModel {
    RobotModel::new(RobotConfig::premaid()).unwrap()
}

#[test]
fn test_hands_reach_targets_in_front() {
    let mut model = model();
    let mut targets = model.neutral_targets();
    let left = Vector3::new(0.06, 0.06, 0.07);
    let right = Vector3::new(-0.06, 0.06, 0.07);
    if let Some(hand) = targets.left_hand.as_mut() {
        hand.hand = left;
        hand.orientation = None;
    }
    if let Some(hand) = targets.right_hand.as_mut() {
        hand.hand = right;
        hand.orientation = None;
    }

    let report = model.tick(&targets);
    assert_eq!(report.left_arm.map(|r| r.strategy), Some(ArmStrategy::HandFirst));

    let pose = model.forward();
    assert!((pose.left_hand.tip - left).norm() < 1e-6, "{:?}", pose.left_hand.tip);
    assert!((pose.right_hand.tip - right).norm() < 1e-6, "{:?}", pose.right_hand.tip);
    // mirror image targets give mirror image joints
    let l = model.joints().angle(ServoId::LeftShoulderRoll).unwrap();
    let r = model.joints().angle(ServoId::RightShoulderRoll).unwrap();
    assert!((l + r).abs() < 1e-9);
}

#[test]
fn test_elbow_mode_uses_elbow_targets() {
    let mut config = RobotConfig::premaid();
    config.modes.arm = ArmMode::Elbow;
    let mut model = RobotModel::new(config).unwrap();
    let targets = model.neutral_targets();
    let report = model.tick(&targets);
    assert_eq!(report.left_arm.map(|r| r.strategy), Some(ArmStrategy::ElbowFirst));
    assert_eq!(report.right_arm.map(|r| r.strategy), Some(ArmStrategy::ElbowFirst));
}

#[test]
fn test_feet_follow_sole_targets() {
    let mut model = model();
    let mut targets = model.neutral_targets();
    let mut expected = Vector3::zeros();
    if let Some(foot) = targets.left_foot.as_mut() {
        foot.sole += Vector3::new(0.01, 0.02, 0.0);
        expected = foot.sole;
    }
    model.tick(&targets);
    assert!((model.forward().left_sole.tip - expected).norm() < 1e-6);
    assert_eq!(model.joints().angle(ServoId::RightLowerLegPitch), Some(0.0));
}

#[test]
fn test_head_orientation_mode() {
    let mut config = RobotConfig::premaid();
    config.modes.head = HeadMode::Orientation;
    let mut model = RobotModel::new(config).unwrap();
    let mut targets = model.neutral_targets();
    if let Some(head) = targets.head.as_mut() {
        head.orientation = Some(rotation(Axis::Y, -25.0));
    }
    model.tick(&targets);
    assert!((model.joints().angle(ServoId::HeadYaw).unwrap() + 25.0).abs() < 1e-6);
    let gaze = model.forward().gaze();
    assert!(gaze.x < 0.0);
}

#[test]
fn test_rate_limited_tick_moves_gradually() {
    let mut model = model();
    let mut targets = model.neutral_targets();
    if let Some(head) = targets.head.as_mut() {
        head.look_at = Vector3::new(1.0, 0.175, 0.0);
        head.tilt_point = None;
    }
    model.tick_limited(&targets, 0.1);
    assert!((model.joints().angle(ServoId::HeadYaw).unwrap() - 9.0).abs() < 1e-9);
    for _ in 0..20 {
        model.tick_limited(&targets, 0.1);
    }
    assert!((model.joints().angle(ServoId::HeadYaw).unwrap() - 90.0).abs() < 1e-9);
}

#[test]
fn test_solved_pose_encodes_for_the_wire() {
    let mut model = model();
    let targets = model.neutral_targets();
    model.tick(&targets);
    let frame = model.command(JointMask::FULL_BODY, 30).build().unwrap();
    assert_eq!(frame.len(), 3 * 25 + 5);
    assert_eq!(frame.iter().fold(0u8, |acc, b| acc ^ b), 0);
    // neutral pose is 7500 units on every servo
    assert_eq!(frame[5..7], [0x4C, 0x1D]);
    assert_eq!(frame.len(), Command::RelaxAll.build().unwrap().len());
}
