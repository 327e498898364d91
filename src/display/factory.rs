/*
 *  display/factory.rs
 *
 *  spotify-ish - now playing, on the wall
 *  (c) 2020-26 Stuart Hunter
 *
 *  Binds the matrix, or a stand-in when no panel can exist here
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU General Public License for more details.
 *
 *  See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *  Public License.
 *
 */

use log::{info, warn};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::config::MatrixSettings;
use crate::display::drivers::stand_in::StandInDisplay;
use crate::display::error::DisplayFactoryError;
use crate::display::traits::MatrixDisplay;

#[cfg(feature = "hardware")]
use crate::display::drivers::led_matrix::LedMatrixDisplay;

/// Shared handle owned by main and lent to the sync loop and the HTTP shell
pub type DisplayHandle = Arc<Mutex<Box<dyn MatrixDisplay>>>;

/// Result of the hardware capability probe
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Capability {
    Available,
    /// The binding itself cannot exist here, with the reason
    Absent(String),
}

/// What initialization bound to
pub enum BoundDisplay {
    Hardware(Box<dyn MatrixDisplay>),
    StandIn(StandInDisplay),
}

impl BoundDisplay {
    pub fn is_stand_in(&self) -> bool {
        matches!(self, BoundDisplay::StandIn(_))
    }

    pub fn into_handle(self) -> DisplayHandle {
        let display: Box<dyn MatrixDisplay> = match self {
            BoundDisplay::Hardware(d) => d,
            BoundDisplay::StandIn(d) => Box::new(d),
        };
        Arc::new(Mutex::new(display))
    }
}

/// Checks whether the matrix binding can exist on this machine: support
/// compiled in, a Raspberry Pi SoC, and the GPIO memory device present.
pub fn probe_hardware() -> Capability {
    #[cfg(not(feature = "hardware"))]
    {
        Capability::Absent("built without the `hardware` feature".to_string())
    }

    #[cfg(feature = "hardware")]
    {
        if let Err(e) = rppal::system::DeviceInfo::new() {
            return Capability::Absent(format!("not a Raspberry Pi: {}", e));
        }
        if !std::path::Path::new("/dev/gpiomem").exists() {
            return Capability::Absent("/dev/gpiomem not present".to_string());
        }
        Capability::Available
    }
}

/// Factory for the display surface
pub struct DisplayFactory;

impl DisplayFactory {
    /// Probe, then bind. A missing capability falls back to the stand-in;
    /// any other initialization failure is returned.
    pub fn initialize(settings: &MatrixSettings) -> Result<BoundDisplay, DisplayFactoryError> {
        Self::initialize_with(settings, probe_hardware())
    }

    pub fn initialize_with(
        settings: &MatrixSettings,
        capability: Capability,
    ) -> Result<BoundDisplay, DisplayFactoryError> {
        if settings.width == 0 || settings.height == 0 {
            return Err(DisplayFactoryError::ConfigError(format!(
                "invalid matrix size {}x{}",
                settings.width, settings.height
            )));
        }

        match capability {
            Capability::Absent(reason) => {
                warn!("LED matrix unavailable ({}), using stand-in display", reason);
                Ok(BoundDisplay::StandIn(StandInDisplay::new(settings.width, settings.height)))
            }
            Capability::Available => Self::bind_hardware(settings),
        }
    }

    #[cfg(feature = "hardware")]
    fn bind_hardware(settings: &MatrixSettings) -> Result<BoundDisplay, DisplayFactoryError> {
        let display = LedMatrixDisplay::new(settings)?;
        info!("Using LED matrix {}x{}", settings.width, settings.height);
        Ok(BoundDisplay::Hardware(Box::new(display)))
    }

    #[cfg(not(feature = "hardware"))]
    fn bind_hardware(_settings: &MatrixSettings) -> Result<BoundDisplay, DisplayFactoryError> {
        info!("Hardware reported available but support is not compiled in");
        Err(DisplayFactoryError::ConfigError(
            "LED matrix driver not enabled. Enable with --features hardware".to_string(),
        ))
    }
}
