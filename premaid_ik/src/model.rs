use nalgebra::Vector3;
use premaid_link::{Command, JointMask, JointSet, ServoId};

use crate::errors::IkError;
use crate::kinematics::{Chain, ChainPose};
use crate::robot_config::RobotConfig;
use crate::rotation::{Actuator, Side};
use crate::solvers::{ArmReport, ArmSolver, ArmTarget, HeadReport, HeadSolver, HeadTarget, LegReport, LegSolver, LegTarget};

/// Targets for one tick. A limb without a target keeps its joint angles.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PoseTargets {
    pub head: Option<HeadTarget>,
    pub left_hand: Option<ArmTarget>,
    pub right_hand: Option<ArmTarget>,
    pub left_foot: Option<LegTarget>,
    pub right_foot: Option<LegTarget>,
}

/// What each solver did on a tick; `None` for limbs that were not solved.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TickReport {
    pub head: Option<HeadReport>,
    pub left_arm: Option<ArmReport>,
    pub right_arm: Option<ArmReport>,
    pub left_leg: Option<LegReport>,
    pub right_leg: Option<LegReport>,
}

/// Positions of the end effectors for the current joint angles.
#[derive(Debug, Clone, PartialEq)]
pub struct BodyPose {
    pub head: ChainPose,
    pub left_hand: ChainPose,
    pub right_hand: ChainPose,
    pub left_sole: ChainPose,
    pub right_sole: ChainPose,
}

impl BodyPose {
    pub fn gaze(&self) -> Vector3<f64> {
        self.head.forward()
    }
}

#[derive(Debug, Clone)]
struct Chains {
    head: Chain,
    left_arm: Chain,
    right_arm: Chain,
    left_leg: Chain,
    right_leg: Chain,
}

/// The joint table of the robot together with one solver per limb.
///
/// # Example
///
/// ```rust,ignore
/// let mut model = RobotModel::new(RobotConfig::premaid())?;
/// let mut targets = model.neutral_targets();
/// if let Some(hand) = targets.left_hand.as_mut() {
///     hand.hand.z += 0.05;
/// }
/// model.tick(&targets);
/// driver.send_command(model.command(JointMask::UPPER_BODY, 20));
/// ```
#[derive(Debug, Clone)]
pub struct RobotModel {
    config: RobotConfig,
    joints: JointSet,
    chains: Chains,
    head: Option<HeadSolver>,
    left_arm: Option<ArmSolver>,
    right_arm: Option<ArmSolver>,
    left_leg: Option<LegSolver>,
    right_leg: Option<LegSolver>,
}

impl RobotModel {
    /// Builds every limb solver. Fails if a limb is missing a joint or its
    /// geometry is unusable.
    pub fn new(config: RobotConfig) -> Result<Self, IkError> {
        config.validate()?;
        let head = Some(HeadSolver::new(&config.joints, &config.reference.head)?);
        let left_arm = Some(Self::arm(&config, Side::Left)?);
        let right_arm = Some(Self::arm(&config, Side::Right)?);
        let left_leg = Some(Self::leg(&config, Side::Left)?);
        let right_leg = Some(Self::leg(&config, Side::Right)?);
        Ok(Self::assemble(config, head, left_arm, right_arm, left_leg, right_leg))
    }

    /// Like [`new`](Self::new) but limbs that cannot be built are disabled
    /// and logged instead of failing the whole model.
    pub fn with_available_limbs(config: RobotConfig) -> Result<Self, IkError> {
        config.validate()?;
        let head = enabled("head", HeadSolver::new(&config.joints, &config.reference.head));
        let left_arm = enabled("left arm", Self::arm(&config, Side::Left));
        let right_arm = enabled("right arm", Self::arm(&config, Side::Right));
        let left_leg = enabled("left leg", Self::leg(&config, Side::Left));
        let right_leg = enabled("right leg", Self::leg(&config, Side::Right));
        Ok(Self::assemble(config, head, left_arm, right_arm, left_leg, right_leg))
    }

    fn arm(config: &RobotConfig, side: Side) -> Result<ArmSolver, IkError> {
        let reference = match side {
            Side::Right => config.reference.right_arm,
            _ => config.reference.left_arm,
        };
        ArmSolver::new(&config.joints, &reference, side, config.tuning.arm)
    }

    fn leg(config: &RobotConfig, side: Side) -> Result<LegSolver, IkError> {
        let reference = match side {
            Side::Right => config.reference.right_leg,
            _ => config.reference.left_leg,
        };
        LegSolver::new(&config.joints, &reference, side, config.tuning.leg)
    }

    fn assemble(
        config: RobotConfig,
        head: Option<HeadSolver>,
        left_arm: Option<ArmSolver>,
        right_arm: Option<ArmSolver>,
        left_leg: Option<LegSolver>,
        right_leg: Option<LegSolver>,
    ) -> Self {
        let reference = &config.reference;
        let chains = Chains {
            head: Chain::head(&reference.head),
            left_arm: Chain::arm(&reference.left_arm, ServoId::LEFT_ARM),
            right_arm: Chain::arm(&reference.right_arm, ServoId::RIGHT_ARM),
            left_leg: Chain::leg(&reference.left_leg, ServoId::LEFT_LEG),
            right_leg: Chain::leg(&reference.right_leg, ServoId::RIGHT_LEG),
        };
        Self {
            joints: config.joints.clone(),
            config,
            chains,
            head,
            left_arm,
            right_arm,
            left_leg,
            right_leg,
        }
    }

    pub fn config(&self) -> &RobotConfig {
        &self.config
    }

    pub fn joints(&self) -> &JointSet {
        &self.joints
    }

    pub fn joints_mut(&mut self) -> &mut JointSet {
        &mut self.joints
    }

    /// Joints driven by the limbs that are enabled.
    pub fn enabled_mask(&self) -> JointMask {
        let mut mask = JointMask::NONE;
        if self.head.is_some() {
            mask = mask | JointMask::of(&ServoId::HEAD);
        }
        if self.left_arm.is_some() {
            mask = mask | JointMask::of(&ServoId::LEFT_ARM);
        }
        if self.right_arm.is_some() {
            mask = mask | JointMask::of(&ServoId::RIGHT_ARM);
        }
        if self.left_leg.is_some() {
            mask = mask | JointMask::of(&ServoId::LEFT_LEG);
        }
        if self.right_leg.is_some() {
            mask = mask | JointMask::of(&ServoId::RIGHT_LEG);
        }
        mask
    }

    /// Targets that reproduce the neutral pose, for the enabled limbs.
    pub fn neutral_targets(&self) -> PoseTargets {
        PoseTargets {
            head: self.head.as_ref().map(|s| s.neutral_target(&self.config.tuning.head)),
            left_hand: self.left_arm.as_ref().map(ArmSolver::neutral_target),
            right_hand: self.right_arm.as_ref().map(ArmSolver::neutral_target),
            left_foot: self.left_leg.as_ref().map(LegSolver::neutral_target),
            right_foot: self.right_leg.as_ref().map(LegSolver::neutral_target),
        }
    }

    /// Solves every limb that has a target.
    pub fn tick(&mut self, targets: &PoseTargets) -> TickReport {
        self.solve(targets, None)
    }

    /// Like [`tick`](Self::tick) but no joint moves faster than its
    /// `max_speed` over `dt` seconds.
    pub fn tick_limited(&mut self, targets: &PoseTargets, dt: f64) -> TickReport {
        self.solve(targets, Some(dt))
    }

    fn solve(&mut self, targets: &PoseTargets, dt: Option<f64>) -> TickReport {
        let modes = self.config.modes;
        let mut act = Actuator::new(&mut self.joints, dt);
        let mut report = TickReport::default();

        if let (Some(solver), Some(target)) = (&self.head, &targets.head) {
            report.head = Some(solver.solve(&mut act, target, modes.head));
        }
        if let (Some(solver), Some(target)) = (&self.left_arm, &targets.left_hand) {
            report.left_arm = Some(solver.solve(&mut act, target, modes.arm));
        }
        if let (Some(solver), Some(target)) = (&self.right_arm, &targets.right_hand) {
            report.right_arm = Some(solver.solve(&mut act, target, modes.arm));
        }
        if let (Some(solver), Some(target)) = (&self.left_leg, &targets.left_foot) {
            report.left_leg = Some(solver.solve(&mut act, target, modes.leg));
        }
        if let (Some(solver), Some(target)) = (&self.right_leg, &targets.right_foot) {
            report.right_leg = Some(solver.solve(&mut act, target, modes.leg));
        }
        report
    }

    /// Pose command for the joints in `mask`, taken from the current angles.
    pub fn command(&self, mask: JointMask, speed: i32) -> Command {
        Command::pose_from_joints(&self.joints, mask, speed)
    }

    /// Zeroes every joint.
    pub fn reset(&mut self) {
        self.joints.reset();
    }

    pub fn forward(&self) -> BodyPose {
        BodyPose {
            head: self.chains.head.forward(&self.joints),
            left_hand: self.chains.left_arm.forward(&self.joints),
            right_hand: self.chains.right_arm.forward(&self.joints),
            left_sole: self.chains.left_leg.forward(&self.joints),
            right_sole: self.chains.right_leg.forward(&self.joints),
        }
    }
}

fn enabled<T>(limb: &str, solver: Result<T, IkError>) -> Option<T> {
    match solver {
        Ok(solver) => Some(solver),
        Err(e) => {
            tracing::warn!("{} disabled: {}", limb, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_joint_is_reported() {
        let mut config = RobotConfig::premaid();
        config.joints = JointSet::new(config.joints.iter().filter(|j| j.id != ServoId::LeftFootRoll).cloned().collect::<Vec<_>>());
        assert_eq!(RobotModel::new(config.clone()).err(), Some(IkError::MissingJoint(ServoId::LeftFootRoll)));

        let model = RobotModel::with_available_limbs(config).unwrap();
        assert!(!model.enabled_mask().contains(ServoId::LeftHipYaw));
        assert!(model.enabled_mask().contains(ServoId::RightHipYaw));
        assert!(model.neutral_targets().left_foot.is_none());
    }

    #[test]
    fn test_absent_targets_hold_angles() {
        let mut model = RobotModel::new(RobotConfig::premaid()).unwrap();
        model.joints_mut().set_value(ServoId::RightShoulderRoll, -30.0);
        let report = model.tick(&PoseTargets::default());
        assert_eq!(report, TickReport::default());
        assert_eq!(model.joints().angle(ServoId::RightShoulderRoll), Some(-30.0));
    }

    #[test]
    fn test_neutral_targets_keep_neutral_pose() {
        let mut model = RobotModel::new(RobotConfig::premaid()).unwrap();
        let targets = model.neutral_targets();
        model.tick(&targets);
        for joint in model.joints().iter() {
            assert!(joint.angle.abs() < 1e-4, "{} = {}", joint.id, joint.angle);
        }
    }

    #[test]
    fn test_command_covers_mask() {
        let model = RobotModel::new(RobotConfig::premaid()).unwrap();
        match model.command(JointMask::UPPER_BODY, 20) {
            Command::Pose { servos, speed } => {
                assert_eq!(speed, 20);
                assert_eq!(servos.len(), 13);
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
