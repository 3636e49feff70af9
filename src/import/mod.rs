//! Importer framework.
//!
//! An importer translates one external document into the format-agnostic IR:
//!
//! ```text
//! ┌──────────────┐
//! │  EA XMI file │   (further formats plug in via the same trait)
//! └──────┬───────┘
//!        ▼
//! ┌──────────────────────────────────────────────────────┐
//! │                  ModelImporter trait                  │
//! │  - sniff(&SniffContext) -> bool                       │
//! │  - import(&[u8], &ImportOptions) -> ImportOutcome     │
//! └──────────────────────────────────────────────────────┘
//!        ▼
//! ┌──────────────────────────────────────────────────────┐
//! │          IrModel + ImportReport (ir module)           │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! `sniff` is cheap and conservative: it looks at a text prefix, raw bytes
//! and the file extension, never at a parsed document. `import` always
//! returns a best-effort IR alongside the report; it fails only on input the
//! importer cannot read at all.

pub mod ea_xmi;
mod error;
pub mod xml;

pub use error::ImportError;

use crate::ir::{ImportReport, IrModel};

/// Cheap format-detection context handed to [`ModelImporter::sniff`].
#[derive(Clone, Copy, Debug)]
pub struct SniffContext<'a> {
    /// Decoded text prefix of the file (a few KiB).
    pub sniff_text: &'a str,
    /// Raw byte prefix of the file.
    pub sniff_bytes: &'a [u8],
    /// Lowercased file extension, without the dot.
    pub extension: Option<&'a str>,
}

/// What an importer returns: the IR plus the ordered diagnostics that were
/// accumulated while producing it. Warnings never block application.
#[derive(Clone, Debug, Default)]
pub struct ImportOutcome {
    pub model: IrModel,
    pub report: ImportReport,
}

/// Controls when the EA importer materializes a package into an element.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PackageElementPolicy {
    /// Packages never become elements; alias references are still rewritten.
    Never,
    /// Synthesize an element only for diagram-referenced packages.
    #[default]
    DiagramReferenced,
    /// Synthesize an element for any alias reference, including
    /// relationship endpoints.
    AnyReference,
}

/// Per-import options.
#[derive(Clone, Debug, Default)]
pub struct ImportOptions {
    pub package_elements: PackageElementPolicy,
}

/// Trait implemented by every model importer.
pub trait ModelImporter: Send + Sync {
    /// Human-readable name of the format.
    fn name(&self) -> &'static str;

    /// File extension(s) this importer claims.
    fn extensions(&self) -> &'static [&'static str];

    /// Cheap heuristic: does this input look like this importer's format?
    fn sniff(&self, ctx: &SniffContext<'_>) -> bool;

    /// Import the document.
    ///
    /// Fails only on unreadable input (undecodable bytes, unparseable XML,
    /// wrong document root); every recoverable anomaly becomes a warning in
    /// the returned report instead.
    fn import(&self, input: &[u8], options: &ImportOptions)
    -> Result<ImportOutcome, ImportError>;
}

/// All built-in importers, in sniff order.
pub fn importers() -> Vec<Box<dyn ModelImporter>> {
    vec![Box::new(ea_xmi::EaXmi)]
}

/// Pick the first importer whose sniff accepts the input.
pub fn detect_importer(ctx: &SniffContext<'_>) -> Option<Box<dyn ModelImporter>> {
    importers().into_iter().find(|i| i.sniff(ctx))
}
