pub mod atomic;
pub mod broadening;
pub mod experiment;
pub mod grid_scan;
pub mod ion_balance;
pub mod line_list;
pub mod pipeline;
pub mod project;
pub mod scoring;
pub mod serialization;
pub mod synthesis;

mod traits;

pub use pipeline::execute_module;
pub use traits::ModuleExecutor;
