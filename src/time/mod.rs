//! Clock abstraction shared by the scheduler, the runtime, and logging.

pub mod source;

pub use source::{
    RealTimeSource, SimulatedTimeSource, TimeSource, init_time_source, parse_datetime,
    parse_datetime_in,
};
