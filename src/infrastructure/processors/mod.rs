// Processors module
pub mod bundle_renderer;
pub mod js_processor;
pub mod minifier;
pub mod module_linker;
pub mod tree_shaker;

pub use bundle_renderer::*;
pub use js_processor::*;
pub use minifier::*;
pub use module_linker::*;
pub use tree_shaker::*;
