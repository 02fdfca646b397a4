mod build_tests;
mod fixtures;
mod optimization_tests;
mod resolution_tests;
mod runtime_tests;
