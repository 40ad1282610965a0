pub mod celestial;
pub mod cloud;
pub mod commands;
pub mod constants;
pub mod error;
pub mod output;
pub mod params;
pub mod settings;
pub mod tiling;

pub use commands::{Command, CommandQueue, EditTracker, PendingCommands};
pub use error::StratusError;
pub use output::OutputFormat;
pub use params::{BudgetVariant, SceneParameterSnapshot};
pub use settings::RenderSettings;
pub use tiling::{TileGrid, TileRect};
