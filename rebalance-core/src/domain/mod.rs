//! Domain types for the rebalance engine

pub mod bar;
pub mod holding;
pub mod ids;
pub mod instrument;
pub mod order;

pub use bar::Bar;
pub use holding::Holding;
pub use ids::{ClientOrderId, RequestId};
pub use instrument::{InstrumentSnapshot, SnapshotError, UNCLASSIFIED_SECTOR};
pub use order::{OrderOutcome, OrderPlan, OrderSide, OrderStatus, OrderType};

/// Symbol type alias
pub type Symbol = String;
