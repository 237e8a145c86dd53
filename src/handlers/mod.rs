//! Built-in collaborators — enough to exercise the engine end to end
//!
//! Each handler implements the dispatch contracts from [`crate::dispatch`]
//! and declares exactly the capabilities it supports:
//!
//! | Handler                | Capabilities      | Targets          |
//! |------------------------|-------------------|------------------|
//! | `FormatIdentifier`     | identify          | everything       |
//! | `DirectoryHandler`     | parse             | directories      |
//! | `FileSetHandler`       | parse             | file sets        |
//! | `RiffHandler`          | parse, validate   | byte streams     |
//! | `ContentDigester`      | digest            | byte streams     |
//! | `ShapefileAggregator`  | (aggregator)      | aggregate probes |

pub mod digest;
pub mod directory;
pub mod identifier;
pub mod riff;
pub mod shapefile;

pub use digest::ContentDigester;
pub use directory::{DirectoryHandler, FileSetHandler};
pub use identifier::FormatIdentifier;
pub use riff::RiffHandler;
pub use shapefile::ShapefileAggregator;

use crate::dispatch::HandlerRegistry;
use crate::identify::FormatId;

/// The default identifier→handler table. Built eagerly, once, before any
/// dispatch; read-only afterwards.
pub fn builtin_registry() -> HandlerRegistry {
    HandlerRegistry::builder()
        .register(FormatId::native("directory"), || Box::new(DirectoryHandler::new()))
        .register(FormatId::native("file-set"), || Box::new(FileSetHandler::new()))
        .register(FormatId::native("riff"), || Box::new(RiffHandler::new()))
        .register(FormatId::native("wave"), || Box::new(RiffHandler::new()))
        .register(FormatId::native("avi"), || Box::new(RiffHandler::new()))
        .register(FormatId::native("webp"), || Box::new(RiffHandler::new()))
        .build()
}
