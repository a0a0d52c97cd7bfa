#[macro_use]
extern crate log;

pub mod csv_utils;
pub mod dataset;
pub mod eval;
pub mod opiterator;
pub mod query;
pub mod remote;
pub mod session;

pub use dataset::Dataset;
pub use remote::{Clock, FixedClock, RemoteEndpoint, RemoteService, SystemClock};
pub use session::MedSession;
