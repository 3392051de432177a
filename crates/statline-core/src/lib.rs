//! statline-core - Refresh hub, bound cells and sheet wiring.

pub mod base_values;
pub mod cell;
pub mod definitions;
pub mod error;
pub mod refresher;
pub mod sheet;

pub use base_values::BaseValues;
pub use cell::{BoundCell, CellSpec, Combiner, Floor, Trigger};
pub use definitions::Definitions;
pub use error::{CoreError, Result};
pub use refresher::{Group, Refresher, Subscriber, SubscriberId};
pub use sheet::Sheet;

pub use statline_engine::engine::VarName;
