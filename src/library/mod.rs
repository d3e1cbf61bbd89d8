// Clip library module
// Finds which tables have alert clips on disk

pub mod scanner;

pub use scanner::ClipScanner;
