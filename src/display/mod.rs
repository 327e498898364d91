/*
 *  display/mod.rs
 *
 *  spotify-ish - now playing, on the wall
 *  (c) 2020-26 Stuart Hunter
 *
 *  Display adapter - a matrix when we have one, a stand-in when we don't
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

pub mod drivers;
pub mod error;
pub mod factory;
pub mod traits;

pub use drivers::stand_in::{StandInDisplay, StandInState};
pub use error::{DisplayError, DisplayFactoryError};
pub use factory::{probe_hardware, BoundDisplay, Capability, DisplayFactory, DisplayHandle};
pub use traits::{rgb_frame_len, DisplayKind, MatrixDisplay};
