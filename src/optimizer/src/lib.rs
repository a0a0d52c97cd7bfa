#[macro_use]
extern crate log;

pub mod data_server;
pub mod delete_rule;
pub mod filter_printer;
pub mod planner;
pub mod projection;
pub mod pushdown;
pub mod query_text;
pub mod rule;
pub mod sarg;
pub mod scan_rule;

pub use data_server::{source_kind, update_row_type, MedDataServer};
pub use delete_rule::DeletedRangeRule;
pub use filter_printer::{print_filter, FilterPrinter};
pub use planner::Planner;
pub use projection::{valid_projection, validate_projection, ProjectionViolation, PushProjector};
pub use pushdown::{FallbackReason, PushdownOutcome, PushdownRule, PushdownShape};
pub use query_text::{QueryTextBuilder, SplicingQueryBuilder};
pub use rule::{Pattern, Rule};
pub use sarg::{Bound, Interval, SargAnalysis, SargBinding, SargExpr};
pub use scan_rule::RemoteScanConversionRule;
