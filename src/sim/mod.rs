//! Order-flow simulation: trader behaviors, the user pool, the adaptive
//! submission throttle and the simulator loop.

mod behavior;
mod orders;
mod simulator;
mod throttle;
mod users;

pub use behavior::Behavior;
pub use orders::OrderGenerator;
pub use simulator::{FlowSimulator, FlowSimulatorConfig, SimulatorError};
pub use throttle::{AdaptiveThrottle, Clock, SystemClock};
pub use users::{UserPool, UserSession};
