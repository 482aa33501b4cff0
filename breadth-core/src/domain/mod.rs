//! Domain types for the breadth engine

pub mod bar;
pub mod breadth;
pub mod group;

pub use bar::Bar;
pub use breadth::{BreadthRow, Checkpoint, GroupDayCounters};
pub use group::{Group, GroupId, GroupKind, GroupRegistry};
