//! vimbridge-core – Gemeinsame Typen
//!
//! Dieses Crate stellt die Bausteine bereit, die Protokoll- und Bridge-Crate
//! gemeinsam nutzen: Identifikationstypen und die Faehigkeiten eines Editors.

pub mod faehigkeiten;
pub mod types;

// Re-Exporte fuer bequemen Zugriff
pub use faehigkeiten::Faehigkeiten;
pub use types::{BufferId, SessionId};
