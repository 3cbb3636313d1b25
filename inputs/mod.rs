pub mod bounds;
pub mod column;
pub mod data;
pub mod levels;
pub mod prepare;
pub mod validate;

pub use column::{ColumnKind, RawColumn};
pub use levels::{LevelMap, LevelMaps};
pub use prepare::{PreparedCovariates, RiskInputs};
pub use validate::{MissingDataReport, ValidationError};
