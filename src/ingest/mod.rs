pub mod catalog;
pub mod frame;
pub mod simulated;
pub mod source;
pub mod worker;

pub use catalog::{SignalCatalog, SignalSpec};
pub use frame::{BusError, BusFrame, FrameError, FramePayload};
pub use simulated::SimulatedVehicle;
pub use source::{BusSource, ChannelSource, LineSource};
pub use worker::{IngestExit, IngestLoop};
