//! Known machine shapes

use crate::models::MachineShape;
use crate::resources::ResourceVector;

/// Sentinel shape bigger in every dimension than any machine in use.
///
/// Size changes smaller than this are not acted upon to avoid oscillating
/// scale ups and downs caused by rounding.
pub fn the_biggest_machine() -> MachineShape {
    MachineShape {
        name: "theBigOne".to_string(),
        resources: ResourceVector::new(96, 0, 800_000, 2_000_000, 25_000),
    }
}

pub fn m5_metal() -> MachineShape {
    MachineShape {
        name: "m5.metal".to_string(),
        resources: ResourceVector::new(96, 0, 393_216, 1_048_576, 25_000),
    }
}

pub fn r5_metal() -> MachineShape {
    MachineShape {
        name: "r5.metal".to_string(),
        resources: ResourceVector::new(96, 0, 786_432, 1_536_000, 25_000),
    }
}

pub fn find_machine<'a>(machines: &'a [MachineShape], name: &str) -> Option<&'a MachineShape> {
    machines.iter().find(|machine| machine.name == name)
}
