//! systemd unit generation: calendar translation and file rendering

pub mod calendar;
pub mod render;

pub use calendar::{translate_calendar, CalendarTranslation};
pub use render::{RenderedUnit, UnitRenderer, UnitTemplates};
