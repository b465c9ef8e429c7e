/*!
 * The editing core: one xi-rope buffer as the single source of truth,
 * commands that compile to deltas, and a patch describing each committed
 * transaction.
 *
 * - **`document`**: `Document` wrapping the rope buffer, selection and
 *   version counter; `apply` commits one command as one transaction.
 * - **`commands`**: the `Cmd` edit algebra and delta compilation.
 * - **`patch`**: `Patch` (changed ranges, new selection, version) and the
 *   `Origin` annotation that tags every transaction with what caused it.
 *
 * Saving writes the rope bytes verbatim: the persisted format is simply
 * the document text, delimiter markers included.
 */

pub mod commands;
pub mod document;
pub mod patch;

pub use commands::{Cmd, Edit};
pub use document::Document;
pub use patch::{Origin, Patch};
