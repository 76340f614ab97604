//! Instance batching for the standard pass.
//!
//! Every mesh type draws all of its instances with one indexed call. The
//! transforms of all types share one storage buffer, so each call starts at
//! the sum of the instance counts recorded before it.

use engine_resources::MeshType;
use engine_rhi::{RhiError, RhiResult};

use crate::ubo::TRANSFORM_CAPACITY;

/// One instanced draw call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DrawCommand {
    pub mesh_type: MeshType,
    /// First transform in the storage buffer.
    pub first_instance: u32,
    pub instance_count: u32,
}

/// Result of batching a frame's instances.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DrawPlan {
    pub commands: Vec<DrawCommand>,
    /// Total number of instances, equal to the final instance offset.
    pub total_instances: u32,
}

/// Plans one draw per mesh type with instances, in [`MeshType::ALL`] order.
///
/// `counts` is indexed by [`MeshType::index`]. Types with no instances get
/// no draw call.
///
/// # Errors
///
/// Returns [`RhiError::CapacityExceeded`] if the instances would not fit in
/// the transform buffer.
pub fn plan_draws(counts: &[usize; MeshType::COUNT]) -> RhiResult<DrawPlan> {
    let total: usize = counts.iter().sum();
    if total > TRANSFORM_CAPACITY {
        return Err(RhiError::CapacityExceeded {
            resource: "instance transforms",
            requested: total,
            capacity: TRANSFORM_CAPACITY,
        });
    }

    let mut commands = Vec::with_capacity(MeshType::COUNT);
    let mut start_instance = 0u32;
    for mesh_type in MeshType::ALL {
        let count = counts[mesh_type.index()] as u32;
        if count == 0 {
            continue;
        }
        commands.push(DrawCommand {
            mesh_type,
            first_instance: start_instance,
            instance_count: count,
        });
        start_instance += count;
    }

    Ok(DrawPlan {
        commands,
        total_instances: start_instance,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offsets_accumulate() {
        let plan = plan_draws(&[10, 10, 10]).unwrap();
        let firsts: Vec<u32> = plan.commands.iter().map(|c| c.first_instance).collect();
        assert_eq!(firsts, vec![0, 10, 20]);
        assert_eq!(plan.total_instances, 30);
    }

    #[test]
    fn test_offset_is_sum_of_previous_counts() {
        let counts = [3, 7, 2];
        let plan = plan_draws(&counts).unwrap();
        for (i, command) in plan.commands.iter().enumerate() {
            let expected: usize = counts[..i].iter().sum();
            assert_eq!(command.first_instance as usize, expected);
            assert_eq!(command.instance_count as usize, counts[i]);
        }
    }

    #[test]
    fn test_empty_groups_are_skipped() {
        let plan = plan_draws(&[0, 4, 0]).unwrap();
        assert_eq!(
            plan.commands,
            vec![DrawCommand {
                mesh_type: MeshType::Square,
                first_instance: 0,
                instance_count: 4,
            }]
        );
    }

    #[test]
    fn test_no_instances_no_draws() {
        let plan = plan_draws(&[0, 0, 0]).unwrap();
        assert!(plan.commands.is_empty());
        assert_eq!(plan.total_instances, 0);
    }

    #[test]
    fn test_capacity() {
        assert!(plan_draws(&[1024, 0, 0]).is_ok());
        let err = plan_draws(&[1000, 20, 5]).unwrap_err();
        assert!(matches!(
            err,
            RhiError::CapacityExceeded {
                requested: 1025,
                capacity: 1024,
                ..
            }
        ));
    }
}
