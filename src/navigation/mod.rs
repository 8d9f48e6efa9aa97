//! Navigation: flow fields, the shared field cache and formation slots.

pub mod flow_field;
pub mod formation;
pub mod manager;

pub use flow_field::{CostField, FlowField, COST_DIAGONAL, COST_STRAIGHT, IMPASSABLE};
pub use formation::{
    CenterRectangleFormation, Formation, FormationKind, RectangleFormation, SpiralFormation,
    FORMATION_SPACING,
};
pub use manager::FlowFieldManager;
