//! TextureFE: raster texture editing core.
//!
//! A [`project::Project`] owns one live RGBA texture and everything that edits
//! it: the undo history, the region selection, brush strokes, and the bridge
//! to a generative inpainting service. Finished textures are pushed to a
//! character rig through [`rig::RigAdapter`].

pub mod canvas;
pub mod cli;
pub mod components;
pub mod error;
pub mod io;
pub mod logger;
pub mod ops;
pub mod project;
pub mod rig;
pub mod settings;

pub use canvas::{PixelBuffer, PixelRect, PixelSurface};
pub use error::{ExportError, ImageIoError, InpaintError, RigError, SelectionRejected};
pub use project::{InpaintPoll, Project, SelectOutcome};
pub use settings::EditorSettings;
