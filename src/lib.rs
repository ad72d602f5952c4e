//! Region redaction core: map a drag on the displayed canvas to image pixels,
//! pixelate that rectangle irreversibly, and overwrite the file on save.
//!
//! The GUI (`app`) and headless CLI (`cli`) live in the binary; everything
//! they drive is here.

pub mod logger;

pub mod error;
pub mod gateway;
pub mod geometry;
pub mod io;
pub mod ops;
pub mod session;
pub mod settings;

pub use error::SessionError;
pub use gateway::{FsGateway, GatewayError, PersistenceGateway};
pub use geometry::{CoordinateMapper, DisplayRect, ImagePoint, Rect};
pub use session::{EditSession, ImageAsset, SessionConfig, SessionState};
pub use settings::AppSettings;
